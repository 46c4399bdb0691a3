//! Approval-orchestration core for the DID wallet bridge.
//!
//! An untrusted page requests wallet operations (address disclosure,
//! credential issuance, credential storage, zero-knowledge proof
//! submission) and a human approves each one in a separate surface. This
//! crate is the coordinator in the middle: it relays typed requests across
//! the page, relay and approval-surface contexts, persists in-flight
//! request state in a durable store so a surface restart loses nothing,
//! enforces single-flight concurrency per request class, and resolves
//! every request exactly once via approval, rejection, or timeout.
//!
//! Rendering, real proof computation, key management and transaction
//! signing live outside this crate, behind the [`ApprovalSurface`] and
//! executor boundaries.

mod calls;
pub use calls::*;

mod credential;
pub use credential::*;

mod credential_store;
pub use credential_store::*;

pub mod defaults;

mod error;
pub use error::*;

mod executor;
pub use executor::*;

pub mod logger;

mod message;
pub use message::*;

mod orchestrator;
pub use orchestrator::Orchestrator;

mod page;
pub use page::*;

mod pending;
pub use pending::*;

pub mod store;

mod surface;
pub use surface::*;
