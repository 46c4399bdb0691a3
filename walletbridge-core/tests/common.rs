//! Shared harness for the integration suites.
//!
//! Wires an orchestrator to an in-memory store, a scripted approval
//! surface and a hand-driven executor channel. Tests run on a paused
//! virtual clock and drive decisions and executor responses explicitly.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use walletbridge_core::store::MemoryStore;
use walletbridge_core::{
    executor_channel, ApprovalSurface, BridgeError, ExecutorStream, Notification, Orchestrator,
};

/// Approval surface whose availability and open count the test controls.
pub struct ScriptedSurface {
    available: AtomicBool,
    opens: AtomicUsize,
}

impl ScriptedSurface {
    /// A visible surface that has not been opened yet.
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            opens: AtomicUsize::new(0),
        }
    }

    /// Makes subsequent `open` calls fail with `SurfaceUnavailable`.
    #[allow(dead_code)]
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of times the orchestrator tried to show the surface.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalSurface for ScriptedSurface {
    fn open(&self) -> Result<(), BridgeError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BridgeError::SurfaceUnavailable)
        }
    }
}

/// One orchestrator with its collaborators, ready to drive.
pub struct Harness {
    /// The orchestrator under test.
    pub orchestrator: Arc<Orchestrator>,
    /// The scripted approval surface wired into the orchestrator.
    pub surface: Arc<ScriptedSurface>,
    /// Hand-driven executor request stream.
    #[allow(dead_code)]
    pub executor_requests: ExecutorStream,
    /// Receiver for notifications the orchestrator broadcasts.
    pub notifications: broadcast::Receiver<Notification>,
}

impl Harness {
    /// Fresh orchestrator over an empty in-memory store.
    pub fn new() -> Self {
        let surface = Arc::new(ScriptedSurface::new());
        let (executor, executor_requests) = executor_channel();
        let orchestrator = Orchestrator::new(
            Arc::new(MemoryStore::new()),
            Arc::clone(&surface) as Arc<dyn ApprovalSurface>,
            executor,
        );
        let notifications = orchestrator.subscribe();
        Self {
            orchestrator,
            surface,
            executor_requests,
            notifications,
        }
    }

    /// Drains every notification delivered so far.
    #[allow(dead_code)]
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            drained.push(notification);
        }
        drained
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Lets spawned tasks run up to their next suspension point without
/// advancing the paused clock.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
