//! Correlation-id request/response primitive.
//!
//! One [`PendingCalls`] table underlies every wait the orchestrator
//! performs: human decisions from the approval surface and executor round
//! trips both register a call, hand the generated id to the other side, and
//! await the one-shot result under a deadline. A call resolves exactly once;
//! after the deadline passes the id is forgotten, so a late resolution finds
//! nothing and is inert.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

/// Table of in-flight correlated calls.
#[derive(Debug)]
pub struct PendingCalls<T> {
    slots: Mutex<HashMap<Uuid, oneshot::Sender<T>>>,
}

impl<T> Default for PendingCalls<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> PendingCalls<T> {
    /// Registers a new call, returning its generated id and the receiver the
    /// caller awaits.
    pub fn register(&self) -> (Uuid, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let id = Uuid::new_v4();
        self.lock().insert(id, tx);
        (id, rx)
    }

    /// Resolves the call with `value`.
    ///
    /// Returns `false` if the id is unknown (already resolved, timed out,
    /// or never registered), in which case `value` is dropped.
    pub fn resolve(&self, id: Uuid, value: T) -> bool {
        let Some(tx) = self.lock().remove(&id) else {
            return false;
        };
        tx.send(value).is_ok()
    }

    /// Drops the call without resolving it. Returns whether it was still
    /// registered.
    pub fn forget(&self, id: Uuid) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Awaits the call's resolution for at most `deadline`.
    ///
    /// On timeout the id is forgotten before returning, so whichever of the
    /// resolution and the timeout is observed first wins and the loser is
    /// inert. A resolution that is already buffered when the deadline
    /// expires still wins, because the receiver is polled before the timer.
    pub async fn wait(&self, id: Uuid, rx: oneshot::Receiver<T>, deadline: Duration) -> Option<T> {
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(value)) => Some(value),
            // Deadline elapsed, or the sender was dropped unresolved.
            Ok(Err(_)) | Err(_) => {
                self.forget(id);
                None
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, oneshot::Sender<T>>> {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_resolves_exactly_once() {
        let calls = PendingCalls::default();
        let (id, rx) = calls.register();

        assert!(calls.resolve(id, 7u32));
        assert!(!calls.resolve(id, 8u32));
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_resolution_after_timeout_is_inert() {
        let calls = PendingCalls::default();
        let (id, rx) = calls.register();

        let value = calls.wait(id, rx, Duration::from_secs(30)).await;
        assert!(value.is_none());

        // 1ms later the loser must already be deregistered.
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!calls.resolve(id, 1u32));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_value_before_deadline() {
        let calls = std::sync::Arc::new(PendingCalls::default());
        let (id, rx) = calls.register();

        let resolver = std::sync::Arc::clone(&calls);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            assert!(resolver.resolve(id, "approved"));
        });

        let value = calls.wait(id, rx, Duration::from_secs(30)).await;
        assert_eq!(value, Some("approved"));
    }

    #[tokio::test]
    async fn test_forget_makes_resolution_inert() {
        let calls = PendingCalls::<u32>::default();
        let (id, _rx) = calls.register();
        assert!(calls.forget(id));
        assert!(!calls.resolve(id, 1));
    }
}
