// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Overseer Daemon (ovd)
//!
//! Background process that owns the work queues and keeps the agent's
//! background loops alive.
//!
//! Architecture:
//! - Supervisor: restarts failed jobs with bounded, jittered backoff
//! - Ingest Job: reads work items from stdin into the inbound queue
//! - Dispatcher Job: relays inbound -> processing, FIFO or by priority
//! - Executor Job: drains the processing queue into the sandbox engine
//! - Autotune Job: flips the dispatcher mode from queue saturation
//! - Watchdog Job: turns scheduler lag into the global throttle

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::info;

use ov_core::{Shutdown, Throttle};
use ov_runtime::{
    queue_depth, Autotune, AutotuneConfig, BackoffConfig, Dispatcher, Executor, JobSpec,
    LiveSettings, RuntimeError, Supervisor, Watchdog, WatchdogConfig,
};
use ov_sandbox::{SandboxConfig, SandboxEngine};

/// How long a paused consumer sleeps before rechecking the throttle.
const THROTTLE_PAUSE: Duration = Duration::from_millis(100);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before touching any state
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("ovd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("ovd {}", env!("CARGO_PKG_VERSION"));
                println!("Overseer Daemon - supervised work-queue runtime for agent jobs");
                println!();
                println!("USAGE:");
                println!("    ovd");
                println!();
                println!("Work items are read from stdin, one per line. A leading '!'");
                println!("marks an urgent item and a leading 'bulk:' marks background");
                println!("work. Everything else dispatches in arrival order.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: ovd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    // Blocking offload (sandbox process waits, file IO) is sized from the
    // worker-thread hint.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(ov_core::config::threads_max_workers())
        .build()?;
    runtime.block_on(run())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let state_dir = ov_core::config::state_dir()?;
    std::fs::create_dir_all(&state_dir)?;
    let _log_guard = setup_logging(&state_dir)?;

    info!("Starting overseer daemon");

    let settings = LiveSettings::from_env();
    let shutdown = Shutdown::new();
    let throttle = Throttle::new();

    let queue_size = ov_core::config::queue_maxsize();
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(queue_size);
    let (processing_tx, processing_rx) = mpsc::channel::<String>(queue_size);
    // Receivers live behind async mutexes so a restarted job can reclaim
    // its end of the queue; the previous holder's guard dies with its task.
    let inbound_rx = Arc::new(tokio::sync::Mutex::new(inbound_rx));
    let processing_rx = Arc::new(tokio::sync::Mutex::new(processing_rx));

    let sandbox = Arc::new(SandboxEngine::new(SandboxConfig::from_env()));

    let ingest = {
        let inbound_tx = inbound_tx.clone();
        let throttle = throttle.clone();
        let shutdown = shutdown.clone();
        JobSpec::new("ingest", move || {
            ingest_loop(inbound_tx.clone(), throttle.clone(), shutdown.clone())
        })
    };

    let dispatcher = {
        let settings = Arc::clone(&settings);
        let shutdown = shutdown.clone();
        let inbound_rx = Arc::clone(&inbound_rx);
        let processing_tx = processing_tx.clone();
        JobSpec::new("dispatcher", move || {
            let settings = Arc::clone(&settings);
            let shutdown = shutdown.clone();
            let inbound_rx = Arc::clone(&inbound_rx);
            let processing_tx = processing_tx.clone();
            async move {
                let mut rx = inbound_rx.lock_owned().await;
                Dispatcher::new(settings, shutdown).run(&mut rx, processing_tx).await
            }
        })
    };

    let executor = {
        let processing_rx = Arc::clone(&processing_rx);
        let sandbox = Arc::clone(&sandbox);
        let throttle = throttle.clone();
        let shutdown = shutdown.clone();
        JobSpec::new("executor", move || {
            let processing_rx = Arc::clone(&processing_rx);
            let executor =
                Executor::new(Arc::clone(&sandbox), throttle.clone(), shutdown.clone());
            async move {
                let mut rx = processing_rx.lock_owned().await;
                executor.run(&mut rx).await
            }
        })
    };

    let autotune = {
        let config = AutotuneConfig::from_env()?;
        let settings = Arc::clone(&settings);
        let shutdown = shutdown.clone();
        let processing_tx = processing_tx.clone();
        JobSpec::new("autotune", move || {
            let config = config.clone();
            let settings = Arc::clone(&settings);
            let shutdown = shutdown.clone();
            let processing_tx = processing_tx.clone();
            async move {
                Autotune::new(config, settings)
                    .run(move || queue_depth(&processing_tx), shutdown)
                    .await
            }
        })
    };

    let watchdog = {
        let throttle = throttle.clone();
        let shutdown = shutdown.clone();
        JobSpec::new("watchdog", move || {
            Watchdog::new(WatchdogConfig::from_env()).run(throttle.clone(), shutdown.clone())
        })
    };

    // Graceful shutdown on SIGTERM / SIGINT
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
            }
            shutdown.trigger();
        });
    }

    info!("Daemon ready");
    println!("READY");

    Supervisor::new(BackoffConfig::from_env())
        .run(vec![ingest, dispatcher, executor, autotune, watchdog], shutdown)
        .await;

    info!("Daemon stopped");
    Ok(())
}

/// Read work items from stdin, one per line, into the inbound queue.
/// Pauses while the throttle is engaged.
async fn ingest_loop(
    inbound_tx: mpsc::Sender<String>,
    throttle: Throttle,
    shutdown: Shutdown,
) -> Result<(), RuntimeError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    while throttle.is_engaged() {
                        tokio::time::sleep(THROTTLE_PAUSE).await;
                    }
                    if inbound_tx.send(line).await.is_err() {
                        return Err(RuntimeError::QueueClosed);
                    }
                }
                Ok(None) => {
                    info!("input closed");
                    return Ok(());
                }
                Err(e) => return Err(RuntimeError::Io(e)),
            },
        }
    }
}

fn setup_logging(
    state_dir: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file_appender = tracing_appender::rolling::never(state_dir, "ovd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
