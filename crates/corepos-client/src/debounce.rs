//! Trailing-edge debouncer.
//!
//! Triggers arriving within `window` of each other collapse into one run,
//! started `window` after the last trigger.
//!
//! ```text
//! trigger ─┬──┬────┬─────────────────────────┬──────────────
//!          │  │    │◄──── window ────►│      │◄── window ──►│
//!                                     run                   run
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct Debouncer {
    tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Starts the background task. Must be called inside a Tokio runtime.
    pub fn spawn<F, Fut>(window: Duration, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                let mut coalesced = 0u32;
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(window) => break,
                        next = rx.recv() => match next {
                            Some(()) => coalesced += 1,
                            // Sender gone: nobody is waiting for the run.
                            None => return,
                        },
                    }
                }
                debug!(coalesced, "Debounce window elapsed");
                action().await;
            }
        });

        Debouncer { tx, task }
    }

    pub fn trigger(&self) {
        // Fails only after the task ended, when there is nothing left to run.
        let _ = self.tx.send(());
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting(window: Duration) -> (Debouncer, Arc<AtomicU32>) {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        let debouncer = Debouncer::spawn(window, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (debouncer, runs)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_once() {
        let (debouncer, runs) = counting(Duration::from_secs(1));

        for _ in 0..5 {
            debouncer.trigger();
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_run_separately() {
        let (debouncer, runs) = counting(Duration::from_secs(1));

        debouncer.trigger();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        debouncer.trigger();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_run() {
        let (debouncer, runs) = counting(Duration::from_secs(1));
        debouncer.trigger();
        drop(debouncer);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
