// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox pipeline specs
//!
//! Items travel inbound queue -> dispatcher -> executor -> sandbox process,
//! and every run leaves a log file whose name records the outcome.

use crate::prelude::*;

use ov_runtime::{Dispatcher, Executor, LiveSettings};
use ov_sandbox::{SandboxConfig, SandboxEngine};

fn shell_engine(dir: &tempfile::TempDir) -> Arc<SandboxEngine> {
    Arc::new(SandboxEngine::new(SandboxConfig {
        interpreter: vec!["/bin/sh".to_string(), "-c".to_string()],
        log_dir: dir.path().to_path_buf(),
        max_run: Duration::from_secs(5),
        ttl: Duration::ZERO,
        max_concurrency: 2,
    }))
}

fn sorted_log_names(dir: &tempfile::TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn queue_items_execute_and_leave_outcome_logs() {
    let dir = tempfile::tempdir().unwrap();
    let engine = shell_engine(&dir);
    let settings = LiveSettings::new(false, Duration::from_millis(50));
    let shutdown = Shutdown::new();

    let (tx, mut source) = mpsc::channel(16);
    let (processing_tx, mut processing_rx) = mpsc::channel(16);

    let relay = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            Dispatcher::new(settings, shutdown).run(&mut source, processing_tx).await
        })
    };
    let consumer = {
        let executor = Executor::new(Arc::clone(&engine), Throttle::new(), shutdown.clone());
        tokio::spawn(async move { executor.run(&mut processing_rx).await })
    };

    tx.send("echo first".to_string()).await.unwrap();
    tx.send("!echo urgent".to_string()).await.unwrap();
    tx.send("exit 5".to_string()).await.unwrap();
    drop(tx);

    relay.await.unwrap().unwrap();
    consumer.await.unwrap().unwrap();

    let names = sorted_log_names(&dir);
    assert_eq!(names.len(), 3);
    let errors = names.iter().filter(|n| n.starts_with("error_")).count();
    let oks = names.iter().filter(|n| n.starts_with("ok_")).count();
    assert_eq!((oks, errors), (2, 1));
}

#[tokio::test]
async fn duplicate_items_share_one_sandbox_run() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SandboxEngine::new(SandboxConfig {
        interpreter: vec!["/bin/sh".to_string(), "-c".to_string()],
        log_dir: dir.path().to_path_buf(),
        max_run: Duration::from_secs(5),
        ttl: Duration::from_secs(30),
        max_concurrency: 2,
    });

    let first = engine.run("echo dedup").await;
    let second = engine.run("echo dedup   # comment only").await;
    assert!(first.is_ok());
    assert_eq!(first.log_path, second.log_path);
    assert_eq!(sorted_log_names(&dir).len(), 1);
}
