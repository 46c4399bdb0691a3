//! Pending request records and their state machine.
//!
//! One [`PendingRequest`] exists per request class at a time; it is created
//! by the orchestrator, persisted in the durable store so a surface restart
//! can pick it up, mutated only by the orchestrator, and removed on terminal
//! transition (immediately for rejection and timeout, after a short
//! retention window for completion and failure).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::credential::Credential;
use crate::defaults;

/// The four classes of wallet operation a page can request.
///
/// Single-flight is enforced per class: a non-terminal record of a class
/// blocks creation of another one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum RequestClass {
    /// Wallet address disclosure.
    Address,
    /// Credential issuance approval.
    Issuance,
    /// Credential save (duplicate-confirmation path).
    CredentialSave,
    /// Zero-knowledge proof submission, with or without address disclosure.
    Proof,
}

impl RequestClass {
    /// Returns the durable-store slot this class persists its pending
    /// record under.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Address => defaults::KEY_PENDING_ADDRESS,
            Self::Issuance => defaults::KEY_PENDING_ISSUANCE,
            Self::CredentialSave => defaults::KEY_PENDING_SAVE,
            Self::Proof => defaults::KEY_PENDING_PROOF,
        }
    }
}

/// Status of a pending request.
///
/// Transitions are strictly monotonic; see [`RequestStatus::can_advance_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestStatus {
    /// Persisted, waiting for the approval surface to become visible.
    #[serde(rename = "awaiting-approval-surface")]
    AwaitingSurface,
    /// Surface visible, waiting for the human decision.
    AwaitingDecision,
    /// Proof class only: simulated proof generation in progress.
    GeneratingProof,
    /// Proof class only: transaction submission in progress.
    SubmittingTransaction,
    /// Proof class only: waiting for the correlated executor response.
    ExecutorPending,
    /// Terminal: the human rejected the request, or the decision timed out.
    Rejected,
    /// Terminal: the operation completed successfully.
    Completed,
    /// Terminal: the operation failed.
    Failed,
}

impl RequestStatus {
    /// Whether this status ends the request's lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Failed)
    }

    const fn rank(self) -> u8 {
        match self {
            Self::AwaitingSurface => 0,
            Self::AwaitingDecision => 1,
            Self::GeneratingProof => 2,
            Self::SubmittingTransaction => 3,
            Self::ExecutorPending => 4,
            Self::Rejected | Self::Completed | Self::Failed => 5,
        }
    }

    /// Whether `next` is a legal forward transition from this status.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        !self.is_terminal() && self.rank() < next.rank()
    }
}

/// Class-specific immutable request data, fixed at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RequestPayload {
    /// Address disclosure carries no payload beyond the origin.
    Address,
    /// The credential to issue and the subject it concerns.
    Issuance {
        /// Credential document awaiting issuance approval.
        credential: Credential,
        /// Issuer-supplied subject details for display in the surface.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subject: Option<Value>,
    },
    /// The credential to save.
    CredentialSave {
        /// Credential document awaiting save confirmation.
        credential: Credential,
    },
    /// Proof submission parameters.
    Proof(ProofPayload),
}

/// Parameters of a proof-submission request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofPayload {
    /// Region the proof is scoped to.
    pub region: String,
    /// Credential type the proof is generated over.
    pub vc_type: String,
    /// Opaque preparation payload handed through from the verifier page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep: Option<Value>,
    /// Contract-invocation descriptor, present on the combined
    /// address-and-proof flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_info: Option<Value>,
    /// Whether the flow also discloses the wallet address and performs the
    /// real executor round trip.
    #[serde(default)]
    pub needs_address: bool,
}

/// The persisted record of one in-flight cross-context operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    /// Record identity; lets the retention sweep verify it is removing the
    /// record it was scheduled for and not a successor in the same slot.
    pub id: Uuid,
    /// Request class; also selects the storage slot.
    pub class: RequestClass,
    /// Origin of the requesting page.
    pub origin: String,
    /// Class-specific immutable payload.
    pub payload: RequestPayload,
    /// Current state-machine status.
    pub status: RequestStatus,
    /// Creation time, unix-epoch milliseconds.
    pub created_at: u64,
    /// Time the current status was entered, unix-epoch milliseconds.
    pub state_entered_at: u64,
    /// Wallet address resolved by the approval surface (combined flow).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Transaction hash reported by the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Terminal error message, if the request failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Soulbound-token descriptor attached by the verifier page while the
    /// request was in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soulbound: Option<Value>,
    /// Token URI accompanying the soulbound descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    /// Whether the payload's dedup key matched an existing saved record.
    #[serde(default)]
    pub is_duplicate: bool,
    /// Identifier of the matched record, when `is_duplicate` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_id: Option<String>,
}

impl PendingRequest {
    /// Creates a fresh record in [`RequestStatus::AwaitingSurface`].
    #[must_use]
    pub fn new(class: RequestClass, origin: &str, payload: RequestPayload) -> Self {
        let now = unix_millis();
        Self {
            id: Uuid::new_v4(),
            class,
            origin: origin.to_string(),
            payload,
            status: RequestStatus::AwaitingSurface,
            created_at: now,
            state_entered_at: now,
            address: None,
            tx_hash: None,
            error: None,
            soulbound: None,
            token_uri: None,
            is_duplicate: false,
            duplicate_id: None,
        }
    }

    /// Advances the record to `next`, stamping the entry time.
    ///
    /// Returns `false` (leaving the record untouched) if the transition
    /// would move backwards or leave a terminal state.
    pub fn advance(&mut self, next: RequestStatus) -> bool {
        if !self.status.can_advance_to(next) {
            log::warn!(
                "refusing illegal transition {:?} -> {:?} for {} request",
                self.status,
                next,
                self.class
            );
            return false;
        }
        self.status = next;
        self.state_entered_at = unix_millis();
        true
    }
}

/// Current wall-clock time as unix-epoch milliseconds.
///
/// Recorded for observability only; timers, not timestamps, drive
/// transitions.
#[must_use]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
