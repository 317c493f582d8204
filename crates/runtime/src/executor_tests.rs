// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use tempfile::TempDir;

use ov_sandbox::SandboxConfig;

use super::*;

fn shell_engine(dir: &TempDir) -> Arc<SandboxEngine> {
    Arc::new(SandboxEngine::new(SandboxConfig {
        interpreter: vec!["/bin/sh".to_string(), "-c".to_string()],
        log_dir: dir.path().to_path_buf(),
        max_run: Duration::from_secs(5),
        ttl: Duration::ZERO,
        max_concurrency: 2,
    }))
}

fn log_count(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).map(|entries| entries.count()).unwrap_or(0)
}

#[test]
fn class_prefixes_are_stripped_before_execution() {
    assert_eq!(strip_class_prefix("!echo now"), "echo now");
    assert_eq!(strip_class_prefix("bulk: echo later"), "echo later");
    assert_eq!(strip_class_prefix("  echo plain"), "echo plain");
    assert_eq!(strip_class_prefix("echo bulk:inline"), "echo bulk:inline");
}

#[tokio::test]
async fn items_flow_from_queue_to_sandbox() {
    let dir = TempDir::new().unwrap();
    let executor = Executor::new(shell_engine(&dir), Throttle::new(), Shutdown::new());
    let (tx, mut rx) = mpsc::channel(8);

    tx.send("echo one".to_string()).await.unwrap();
    tx.send("exit 9".to_string()).await.unwrap();
    drop(tx);
    executor.run(&mut rx).await.unwrap();

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2);
    assert!(names[0].starts_with("error_"), "exit 9 should produce an error log");
    assert!(names[1].starts_with("ok_"));
}

#[tokio::test]
async fn engaged_throttle_pauses_consumption() {
    let dir = TempDir::new().unwrap();
    let throttle = Throttle::new();
    let shutdown = Shutdown::new();
    throttle.engage();

    let executor =
        Executor::new(shell_engine(&dir), throttle.clone(), shutdown.clone());
    let (tx, mut rx) = mpsc::channel(8);
    let task = tokio::spawn(async move { executor.run(&mut rx).await });

    tx.send("echo held".to_string()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(log_count(&dir), 0, "nothing should execute while throttled");

    throttle.release();
    drop(tx);
    task.await.unwrap().unwrap();
    assert_eq!(log_count(&dir), 1);
}
