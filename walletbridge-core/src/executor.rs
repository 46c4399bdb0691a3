//! The executor boundary.
//!
//! The executor is the external collaborator that performs the approved
//! operation: it receives one correlated [`ExecutorRequest`] per
//! transaction and answers with an [`ExecutorResponse`] carrying the same
//! id, delivered back through
//! [`crate::orchestrator::Orchestrator::deliver_executor_response`]. The
//! orchestrator waits at most [`crate::defaults::EXECUTOR_WAIT`] for the
//! answer.

use tokio::sync::mpsc;

use crate::message::ExecutorRequest;

/// Sending half handed to the orchestrator.
pub type ExecutorSink = mpsc::UnboundedSender<ExecutorRequest>;

/// Receiving half handed to the executor collaborator.
pub type ExecutorStream = mpsc::UnboundedReceiver<ExecutorRequest>;

/// Creates the channel pair wiring an orchestrator to its executor.
#[must_use]
pub fn executor_channel() -> (ExecutorSink, ExecutorStream) {
    mpsc::unbounded_channel()
}
