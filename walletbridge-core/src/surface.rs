//! The approval surface boundary.
//!
//! The orchestrator never renders anything; it only needs to make the
//! human-facing surface visible and to receive the decision, which comes
//! back as a [`crate::message::SurfaceMessage`] through
//! [`crate::orchestrator::Orchestrator::deliver_decision`].

use crate::error::BridgeError;

/// Thin contract for causing the approval UI to become visible.
///
/// `open` is called once per pending request, before the decision wait
/// starts. No decision is ever waited on without a visible surface: if
/// `open` fails, the request is removed and the caller receives a
/// [`BridgeError::SurfaceUnavailable`] failure.
pub trait ApprovalSurface: Send + Sync {
    /// Makes the approval surface visible.
    ///
    /// # Errors
    /// Returns [`BridgeError::SurfaceUnavailable`] if the surface cannot be
    /// shown (no window, host refused, etc.).
    fn open(&self) -> Result<(), BridgeError>;
}
