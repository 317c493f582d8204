// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue dispatcher: relays items from the inbound queue to the processing
//! queue.
//!
//! Two modes, selected by the live settings on every cycle. Pass-through
//! forwards items in strict arrival order. Priority mode classifies each
//! item, holds pending work in a heap, and always forwards the best class
//! first, FIFO within a class. Both modes yield to the scheduler once the
//! dispatch budget of wall time has elapsed, so a hot relay loop cannot
//! starve sibling tasks.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::debug;

use ov_core::{Classified, Shutdown};

use crate::settings::LiveSettings;
use crate::RuntimeError;

pub struct Dispatcher {
    settings: Arc<LiveSettings>,
    shutdown: Shutdown,
}

impl Dispatcher {
    pub fn new(settings: Arc<LiveSettings>, shutdown: Shutdown) -> Self {
        Self { settings, shutdown }
    }

    /// Relay until the source closes or shutdown fires. In priority mode any
    /// heap backlog is drained before returning on a closed source.
    pub async fn run(
        &self,
        source: &mut mpsc::Receiver<String>,
        dest: mpsc::Sender<String>,
    ) -> Result<(), RuntimeError> {
        let mut heap: BinaryHeap<Reverse<Classified>> = BinaryHeap::new();
        let mut source_closed = false;
        let mut last_yield = Instant::now();

        loop {
            // Mode and budget are re-read every cycle so autotune flips
            // take effect mid-stream.
            let budget = self.settings.budget();

            if self.settings.use_priority() {
                if heap.is_empty() {
                    if source_closed {
                        return Ok(());
                    }
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return Ok(()),
                        item = source.recv() => match item {
                            Some(body) => heap.push(Reverse(Classified::new(body))),
                            None => source_closed = true,
                        },
                        _ = sleep(budget) => {}
                    }
                }
                // Top up with everything already queued, then forward the
                // best pending item.
                while let Ok(more) = source.try_recv() {
                    heap.push(Reverse(Classified::new(more)));
                }
                if let Some(Reverse(item)) = heap.pop() {
                    debug!(priority = ?item.priority, seq = item.seq, "dispatching");
                    if dest.send(item.body).await.is_err() {
                        return Err(RuntimeError::QueueClosed);
                    }
                }
            } else {
                if source_closed {
                    return Ok(());
                }
                tokio::select! {
                    _ = self.shutdown.cancelled() => return Ok(()),
                    item = source.recv() => match item {
                        Some(body) => {
                            if dest.send(body).await.is_err() {
                                return Err(RuntimeError::QueueClosed);
                            }
                        }
                        None => source_closed = true,
                    },
                    _ = sleep(budget) => {}
                }
            }

            if last_yield.elapsed() >= budget {
                tokio::task::yield_now().await;
                last_yield = Instant::now();
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
