// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatch mode specs
//!
//! The autotune controller watches queue saturation and flips the live
//! dispatcher mode; the dispatcher must honor the flip mid-stream and the
//! decision must survive on disk.

use std::sync::Mutex;

use crate::prelude::*;

use ov_runtime::{load_decision, Autotune, AutotuneConfig, Dispatcher, LiveSettings};

async fn collect(rx: &mut mpsc::Receiver<String>, n: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        match rx.recv().await {
            Some(item) => out.push(item),
            None => break,
        }
    }
    out
}

#[tokio::test(start_paused = true)]
async fn saturation_flips_the_relay_to_priority_order() {
    let dir = tempfile::tempdir().unwrap();
    let decision_path = dir.path().join("autotune.json");
    let settings = LiveSettings::new(false, Duration::from_millis(50));
    let shutdown = Shutdown::new();
    let fill = Arc::new(Mutex::new((0usize, 64usize)));

    let controller = {
        let config = AutotuneConfig {
            enabled: true,
            enable_ratio: 0.6,
            disable_ratio: 0.25,
            window: Duration::from_millis(2_000),
            decision_path: decision_path.clone(),
        };
        let settings = Arc::clone(&settings);
        let shutdown = shutdown.clone();
        let fill = Arc::clone(&fill);
        tokio::spawn(async move {
            Autotune::new(config, settings)
                .run(move || *fill.lock().unwrap(), shutdown)
                .await
        })
    };

    let (tx, mut source) = mpsc::channel(16);
    let (dest, mut out) = mpsc::channel(16);
    let relay = {
        let settings = Arc::clone(&settings);
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            Dispatcher::new(settings, shutdown).run(&mut source, dest).await
        })
    };

    // Calm queue: strict arrival order.
    tx.send("plain".to_string()).await.unwrap();
    assert_eq!(out.recv().await.unwrap(), "plain");
    assert!(!settings.use_priority());

    // Sustained saturation: autotune engages priority mode and tightens
    // the dispatch budget.
    *fill.lock().unwrap() = (64, 64);
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(settings.use_priority());
    assert_eq!(settings.budget_ms(), 25);

    tx.send("bulk:reindex".to_string()).await.unwrap();
    tx.send("!hotfix".to_string()).await.unwrap();
    drop(tx);
    assert_eq!(collect(&mut out, 2).await, ["!hotfix", "bulk:reindex"]);
    relay.await.unwrap().unwrap();

    let decision = load_decision(&decision_path).expect("decision persisted");
    assert!(decision.use_priority_queue);

    shutdown.trigger();
    controller.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn persisted_decision_restores_mode_on_restart() {
    let dir = tempfile::tempdir().unwrap();
    let decision_path = dir.path().join("autotune.json");
    let config = AutotuneConfig {
        enabled: true,
        enable_ratio: 0.6,
        disable_ratio: 0.25,
        window: Duration::from_millis(2_000),
        decision_path: decision_path.clone(),
    };

    // First life: earn priority mode under load.
    {
        let settings = LiveSettings::new(false, Duration::from_millis(50));
        let shutdown = Shutdown::new();
        let controller = {
            let config = config.clone();
            let settings = Arc::clone(&settings);
            let shutdown = shutdown.clone();
            tokio::spawn(
                async move { Autotune::new(config, settings).run(|| (64, 64), shutdown).await },
            )
        };
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(settings.use_priority());
        shutdown.trigger();
        controller.await.unwrap().unwrap();
    }

    // Second life: the mode comes back before any sampling happens.
    let settings = LiveSettings::new(false, Duration::from_millis(50));
    Autotune::new(config, Arc::clone(&settings)).apply_persisted();
    assert!(settings.use_priority());
    assert_eq!(settings.budget_ms(), 25);
}
