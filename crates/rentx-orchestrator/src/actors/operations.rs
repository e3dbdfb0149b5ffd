//! # Async Operations
//!
//! Adapter calls run in their own tasks so an actor's mailbox never blocks.
//! Results come back as mailbox messages.

use crate::domain::{ChainError, ConfirmationStatus};
use crate::ports::SourceChain;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// In-flight operation tasks, one per key. Dropping the set aborts them all.
#[derive(Default)]
pub(crate) struct OperationSet {
    tasks: HashMap<String, JoinHandle<()>>,
}

impl OperationSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `operation` under `key`, aborting any previous task with that key.
    pub(crate) fn spawn<F>(&mut self, key: impl Into<String>, operation: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|_, task| !task.is_finished());
        if let Some(previous) = self.tasks.insert(key.into(), tokio::spawn(operation)) {
            previous.abort();
        }
    }

    pub(crate) fn abort_all(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }

    /// Tasks still running.
    pub(crate) fn active(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }
}

impl Drop for OperationSet {
    fn drop(&mut self) {
        self.abort_all();
    }
}

/// Await `operation` while forwarding its progress updates.
///
/// Updates sent before the operation finished are all delivered before it
/// returns.
pub(crate) async fn drive_with_progress<T, P, F>(
    operation: F,
    mut progress: UnboundedReceiver<P>,
    mut on_progress: impl FnMut(P),
) -> T
where
    F: Future<Output = T>,
{
    tokio::pin!(operation);
    let result = loop {
        tokio::select! {
            biased;
            Some(update) = progress.recv() => on_progress(update),
            result = &mut operation => break result,
        }
    };
    while let Ok(update) = progress.try_recv() {
        on_progress(update);
    }
    result
}

#[derive(Debug)]
pub(crate) enum ConfirmationUpdate {
    Progress(ConfirmationStatus),
    /// Target reached. Last update.
    Reached(ConfirmationStatus),
    /// Lookup failed. Last update.
    Failed(ChainError),
}

/// Poll confirmations for `tx_hash` until the target is reached.
///
/// Unchanged readings are not reported. `emit` returning `false` stops the
/// monitor.
pub(crate) async fn watch_confirmations<F>(
    source: Arc<dyn SourceChain>,
    tx_hash: String,
    interval: Duration,
    mut emit: F,
) where
    F: FnMut(ConfirmationUpdate) -> bool,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<ConfirmationStatus> = None;

    loop {
        ticker.tick().await;
        match source.confirmation_status(&tx_hash).await {
            Ok(status) if status.is_final() => {
                emit(ConfirmationUpdate::Reached(status));
                return;
            }
            Ok(status) => {
                if last == Some(status) {
                    continue;
                }
                last = Some(status);
                if !emit(ConfirmationUpdate::Progress(status)) {
                    return;
                }
            }
            Err(e) => {
                emit(ConfirmationUpdate::Failed(e));
                return;
            }
        }
    }
}
