//! Cancellable background refresh loops

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A running poll loop; cancelling (or dropping) the handle stops it
pub struct PollHandle {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Run `fetch` immediately and then every `interval`, sending each result
    ///
    /// The loop also ends once the receiving side is gone.
    pub fn spawn<T, F, Fut>(interval: Duration, tx: UnboundedSender<T>, mut fetch: F) -> Self
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let result = tokio::select! {
                    _ = child.cancelled() => break,
                    result = fetch() => result,
                };

                if child.is_cancelled() || tx.send(result).is_err() {
                    break;
                }
            }
            tracing::debug!("poller stopped");
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel and wait for the loop to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_cancelled_poller_stops_sending() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let poller = PollHandle::spawn(Duration::from_millis(10), tx, move || {
            let counter = Arc::clone(&counter);
            async move { counter.fetch_add(1, Ordering::SeqCst) }
        });

        assert_eq!(rx.recv().await, Some(0));
        assert_eq!(rx.recv().await, Some(1));

        poller.shutdown().await;

        // drain whatever was sent before cancellation, then the channel closes
        while rx.recv().await.is_some() {}
        let after = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after);
    }

    #[tokio::test]
    async fn test_drop_cancels() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u8>();
        let poller = PollHandle::spawn(Duration::from_millis(10), tx, || async { 1 });
        assert_eq!(rx.recv().await, Some(1));

        drop(poller);
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok());
    }
}
