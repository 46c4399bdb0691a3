//! Idle auto-lock.
//!
//! The wallet locks itself after five minutes without user activity. The
//! timer is an abortable task: activity and unlock signals replace it,
//! a manual lock cancels it, and expiry persists the lock flag and
//! broadcasts [`Notification::WalletLocked`] to every page context.

use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::defaults;
use crate::message::Notification;
use crate::store::BridgeStore;

/// The idle lock timer.
pub(super) struct IdleLock {
    store: BridgeStore,
    notifications: broadcast::Sender<Notification>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl IdleLock {
    pub(super) const fn new(
        store: BridgeStore,
        notifications: broadcast::Sender<Notification>,
    ) -> Self {
        Self {
            store,
            notifications,
            timer: Mutex::new(None),
        }
    }

    /// Restarts the idle countdown, replacing any running timer.
    pub(super) fn reset(&self) {
        let store = self.store.clone();
        let notifications = self.notifications.clone();
        let handle = tokio::spawn(async move {
            sleep(defaults::IDLE_LOCK).await;
            match store.set_locked(true) {
                Ok(()) => {
                    log::info!("wallet locked after idle period");
                    let _ = notifications.send(Notification::WalletLocked);
                }
                Err(err) => log::error!("cannot persist lock flag: {err}"),
            }
        });

        if let Some(previous) = self.swap_timer(Some(handle)) {
            previous.abort();
        }
    }

    /// Cancels the countdown; used when the wallet is locked manually.
    pub(super) fn cancel(&self) {
        if let Some(previous) = self.swap_timer(None) {
            previous.abort();
        }
    }

    fn swap_timer(&self, next: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
        let mut guard = self
            .timer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn idle_lock() -> (IdleLock, broadcast::Receiver<Notification>) {
        let store = BridgeStore::new(Arc::new(MemoryStore::new()));
        let (notifications, rx) = broadcast::channel(8);
        (IdleLock::new(store, notifications), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_locks_and_broadcasts() {
        let (lock, mut rx) = idle_lock();
        lock.reset();
        tokio::task::yield_now().await;

        tokio::time::advance(defaults::IDLE_LOCK + Duration::from_millis(1)).await;
        tokio::task::yield_now().await;

        assert!(matches!(rx.try_recv(), Ok(Notification::WalletLocked)));
        assert!(lock.store.locked().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_pushes_the_deadline_out() {
        let (lock, mut rx) = idle_lock();
        lock.reset();
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(4 * 60)).await;
        lock.reset();
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(!lock.store.locked().unwrap());

        tokio::time::advance(Duration::from_secs(3 * 60 + 1)).await;
        tokio::task::yield_now().await;
        assert!(matches!(rx.try_recv(), Ok(Notification::WalletLocked)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_the_countdown() {
        let (lock, mut rx) = idle_lock();
        lock.reset();
        lock.cancel();

        tokio::time::advance(defaults::IDLE_LOCK * 2).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(!lock.store.locked().unwrap());
    }
}
