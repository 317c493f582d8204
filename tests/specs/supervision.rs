// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervision specs
//!
//! A crashed relay job must come back and keep draining its queue, and a
//! triggered shutdown must wind every job down.

use crate::prelude::*;

use ov_runtime::{BackoffConfig, JobSpec, RuntimeError, Supervisor};

fn quick_backoff(limit: u32) -> BackoffConfig {
    BackoffConfig {
        min: Duration::from_millis(10),
        max: Duration::from_millis(100),
        restart_limit: limit,
    }
}

#[tokio::test(start_paused = true)]
async fn restarted_relay_keeps_draining_its_queue() {
    let (tx, rx) = mpsc::channel::<String>(16);
    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let (out_tx, mut out_rx) = mpsc::channel::<String>(16);

    // A relay that dies on a poison item. The receiver sits behind a shared
    // mutex, so the restarted incarnation reclaims the queue.
    let relay = {
        let rx = Arc::clone(&rx);
        JobSpec::new("relay", move || {
            let rx = Arc::clone(&rx);
            let out_tx = out_tx.clone();
            async move {
                let mut rx = rx.lock_owned().await;
                while let Some(item) = rx.recv().await {
                    if item == "poison" {
                        return Err(RuntimeError::Job("poison item".into()));
                    }
                    if out_tx.send(item).await.is_err() {
                        return Err(RuntimeError::QueueClosed);
                    }
                }
                Ok(())
            }
        })
    };

    for item in ["one", "poison", "two"] {
        tx.send(item.to_string()).await.unwrap();
    }
    drop(tx);

    Supervisor::new(quick_backoff(5)).run(vec![relay], Shutdown::new()).await;

    let mut delivered = Vec::new();
    while let Ok(item) = out_rx.try_recv() {
        delivered.push(item);
    }
    assert_eq!(delivered, ["one", "two"]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_winds_down_every_job() {
    let shutdown = Shutdown::new();
    let stopped = Arc::new(AtomicUsize::new(0));

    let jobs: Vec<JobSpec> = ["first", "second", "third"]
        .into_iter()
        .map(|name| {
            let shutdown = shutdown.clone();
            let stopped = Arc::clone(&stopped);
            JobSpec::new(name, move || {
                let shutdown = shutdown.clone();
                let stopped = Arc::clone(&stopped);
                async move {
                    shutdown.cancelled().await;
                    stopped.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        })
        .collect();

    let supervisor = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { Supervisor::new(quick_backoff(5)).run(jobs, shutdown).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.trigger();
    supervisor.await.unwrap();
    assert_eq!(stopped.load(Ordering::SeqCst), 3);
}
