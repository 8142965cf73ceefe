//! Debounced propagation of a fast-changing value.

use std::time::Duration;

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

/// Emits the latest pushed value once no newer value arrived for `delay`.
///
/// Every push before the delay elapses restarts the wait, so a burst of
/// input produces a single emission carrying the final value. Dropping or
/// cancelling the debouncer discards any pending emission.
#[derive(Debug)]
pub struct Debouncer<T> {
    input: watch::Sender<T>,
    task: JoinHandle<()>,
}

impl<T> Debouncer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start a debouncer; settled values arrive on the returned receiver.
    pub fn spawn(initial: T, delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (input, mut changes) = watch::channel(initial);
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                loop {
                    tokio::select! {
                        changed = changes.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                        () = tokio::time::sleep(delay) => break,
                    }
                }

                let settled = changes.borrow_and_update().clone();
                if settled_tx.send(settled).is_err() {
                    return;
                }
            }
        });

        (Self { input, task }, settled_rx)
    }

    pub fn push(&self, value: T) {
        self.input.send_replace(value);
    }

    /// Most recent pushed value, settled or not.
    pub fn latest(&self) -> T {
        self.input.borrow().clone()
    }

    /// Replace the latest value without scheduling an emission.
    pub fn reset(&self, value: T) {
        self.input.send_if_modified(|current| {
            *current = value;
            false
        });
    }

    /// Stop the debouncer; a pending emission is dropped.
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(1500);

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(value) = rx.try_recv() {
            out.push(value);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_input_emits_only_the_final_value() {
        let (debouncer, mut rx) = Debouncer::spawn(String::new(), DELAY);
        for value in ["H", "He", "Hel", "Hell", "Hello"] {
            debouncer.push(value.to_string());
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(drain(&mut rx).is_empty());

        tokio::time::sleep(DELAY).await;
        assert_eq!(drain(&mut rx), vec!["Hello".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_input_emits_every_value() {
        let (debouncer, mut rx) = Debouncer::spawn(String::new(), DELAY);
        for value in ["a", "b", "c"] {
            debouncer.push(value.to_string());
            tokio::time::sleep(DELAY + Duration::from_millis(100)).await;
        }
        assert_eq!(drain(&mut rx), vec!["a", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_emission() {
        let (debouncer, mut rx) = Debouncer::spawn(String::new(), DELAY);
        debouncer.push("draft".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.cancel();
        tokio::time::sleep(DELAY * 2).await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(debouncer.latest(), "draft");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_does_not_emit() {
        let (debouncer, mut rx) = Debouncer::spawn(String::new(), DELAY);
        debouncer.reset("quiet".to_string());
        tokio::time::sleep(DELAY * 2).await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(debouncer.latest(), "quiet");
    }
}
