//! Wire messages for every context boundary.
//!
//! All payloads are tagged unions carrying a `type` discriminator, one
//! variant per request class, each with only its own fields. The tag
//! strings are the original extension protocol and must stay stable:
//! pages, surfaces and executors in the field match on them literally.
//!
//! Layers, outermost first:
//! - [`PageRequest`] / [`PageEvent`]: between the hosting page and the
//!   page adapter (same-window messaging).
//! - [`WalletRequest`] / [`WalletResponse`]: between the page adapter and
//!   the orchestrator, over the relay.
//! - [`SurfaceMessage`]: decisions from the approval surface.
//! - [`ExecutorRequest`] / [`ExecutorResponse`]: the correlated executor
//!   round trip.
//! - [`Notification`]: unsolicited broadcasts fanned out to every
//!   subscribed context.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;
use uuid::Uuid;

use crate::credential::Credential;
use crate::pending::RequestClass;

// Page layer

/// Requests a page can post to the page adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageRequest {
    /// Liveness ping; answered with [`PageEvent::ExtensionDetected`].
    #[serde(rename = "DID_WALLET_PING")]
    Ping,
    /// Wallet address disclosure.
    #[serde(rename = "DID_WALLET_REQUEST_ADDRESS")]
    RequestAddress,
    /// Credential issuance approval.
    #[serde(rename = "DID_WALLET_REQUEST_VC_ISSUANCE")]
    RequestIssuance {
        /// Credential the issuer wants to issue.
        vc: Credential,
        /// Subject details for display in the surface.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        student: Option<Value>,
    },
    /// Credential save with duplicate confirmation.
    #[serde(rename = "DID_WALLET_SAVE_VC")]
    SaveCredential {
        /// Credential to save.
        vc: Credential,
    },
    /// Soulbound-record save; always refused (records are only written
    /// after a confirmed transaction).
    #[serde(rename = "DID_WALLET_SAVE_SBT")]
    SaveSoulbound {
        /// Soulbound descriptor the page tried to save.
        sbt: Value,
    },
    /// Proof submission without address disclosure.
    #[serde(rename = "DID_WALLET_REQUEST_PROOF")]
    RequestProof {
        /// Region the proof is scoped to.
        region: String,
        /// Credential type the proof is generated over.
        #[serde(rename = "vcType")]
        vc_type: String,
        /// Opaque preparation payload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prep: Option<Value>,
    },
    /// Combined address disclosure and proof submission.
    #[serde(rename = "DID_WALLET_REQUEST_PROOF_WITH_ADDRESS")]
    RequestProofWithAddress {
        /// Region the proof is scoped to.
        region: String,
        /// Credential type the proof is generated over.
        #[serde(rename = "vcType")]
        vc_type: String,
        /// Opaque preparation payload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prep: Option<Value>,
        /// Contract-invocation descriptor for the executor.
        #[serde(rename = "contractInfo", default, skip_serializing_if = "Option::is_none")]
        contract_info: Option<Value>,
    },
    /// Attaches a soulbound descriptor to the in-flight proof request.
    #[serde(rename = "DID_WALLET_PROOF_WITH_ADDRESS_SBT")]
    AttachSoulbound {
        /// Soulbound descriptor to store once the transaction confirms.
        sbt: Value,
        /// Token URI accompanying the descriptor.
        #[serde(rename = "tokenURI", default, skip_serializing_if = "Option::is_none")]
        token_uri: Option<String>,
    },
    /// Best-effort surface pre-warm; creates no pending record.
    #[serde(rename = "DID_WALLET_PREPARE_PROOF_INTENT")]
    PrepareProofIntent,
}

/// Events the page adapter posts back to the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageEvent {
    /// Presence announcement, on load and in answer to a ping.
    #[serde(rename = "DID_WALLET_EXTENSION_DETECTED")]
    ExtensionDetected,
    /// Terminal answer to [`PageRequest::RequestAddress`].
    #[serde(rename = "DID_WALLET_ADDRESS_RESPONSE")]
    AddressResponse(AddressOutcome),
    /// Terminal answer to [`PageRequest::RequestIssuance`].
    #[serde(rename = "DID_WALLET_VC_ISSUANCE_RESPONSE")]
    IssuanceResponse(ApprovalOutcome),
    /// Terminal answer to [`PageRequest::SaveCredential`].
    #[serde(rename = "DID_WALLET_VC_SAVE_RESPONSE")]
    CredentialSaveResponse(SaveOutcome),
    /// Terminal answer to [`PageRequest::SaveSoulbound`].
    #[serde(rename = "DID_WALLET_SBT_SAVE_RESPONSE")]
    SoulboundSaveResponse(SaveOutcome),
    /// Terminal answer to [`PageRequest::RequestProof`].
    #[serde(rename = "DID_WALLET_PROOF_RESPONSE")]
    ProofResponse(ProofOutcome),
    /// Terminal answer to [`PageRequest::RequestProofWithAddress`].
    #[serde(rename = "DID_WALLET_PROOF_WITH_ADDRESS_RESPONSE")]
    ProofWithAddressResponse(ProofWithAddressOutcome),
    /// Unsolicited completion notice for the origin's proof transaction.
    #[serde(rename = "DID_WALLET_PROOF_COMPLETED")]
    ProofCompleted {
        /// Whether the transaction confirmed.
        success: bool,
        /// Transaction hash, on success.
        #[serde(rename = "txHash", default, skip_serializing_if = "Option::is_none")]
        tx_hash: Option<String>,
        /// Block number the transaction landed in.
        #[serde(rename = "blockNumber", default, skip_serializing_if = "Option::is_none")]
        block_number: Option<String>,
        /// Failure message, on failure.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The wallet locked itself after the idle period.
    #[serde(rename = "WALLET_LOCKED")]
    WalletLocked,
}

// Relay layer

/// Typed requests the page adapter forwards to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WalletRequest {
    /// Wallet address disclosure.
    #[serde(rename = "REQUEST_WALLET_ADDRESS")]
    Address {
        /// Origin of the requesting page.
        origin: String,
    },
    /// Credential issuance approval.
    #[serde(rename = "REQUEST_VC_ISSUANCE")]
    Issuance {
        /// Credential awaiting approval.
        vc: Credential,
        /// Subject details for display.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        student: Option<Value>,
        /// Origin of the requesting page.
        origin: String,
    },
    /// Credential save; duplicates are parked in the surface for
    /// confirmation.
    ///
    /// The page-level tag is accepted as an alias; legacy pages send it to
    /// the relay directly.
    #[serde(rename = "SAVE_VC", alias = "DID_WALLET_SAVE_VC")]
    SaveCredential {
        /// Credential to save.
        vc: Credential,
        /// Origin of the requesting page.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<String>,
    },
    /// Credential save that commits immediately, duplicates included.
    #[serde(rename = "SAVE_VC_DIRECT")]
    SaveCredentialDirect {
        /// Credential to save.
        vc: Credential,
        /// Origin of the requesting page.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<String>,
    },
    /// Deletes a saved credential by identifier.
    #[serde(rename = "DELETE_VC")]
    DeleteCredential {
        /// Identifier of the credential to delete.
        #[serde(rename = "vcId")]
        vc_id: String,
    },
    /// Proof submission without address disclosure.
    #[serde(rename = "REQUEST_PROOF_SUBMISSION")]
    Proof {
        /// Origin of the requesting page.
        origin: String,
        /// Region the proof is scoped to.
        region: String,
        /// Credential type the proof is generated over.
        #[serde(rename = "vcType")]
        vc_type: String,
        /// Opaque preparation payload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prep: Option<Value>,
    },
    /// Combined address disclosure and proof submission.
    #[serde(rename = "REQUEST_PROOF_WITH_ADDRESS")]
    ProofWithAddress {
        /// Origin of the requesting page.
        origin: String,
        /// Region the proof is scoped to.
        region: String,
        /// Credential type the proof is generated over.
        #[serde(rename = "vcType")]
        vc_type: String,
        /// Opaque preparation payload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prep: Option<Value>,
        /// Contract-invocation descriptor for the executor.
        #[serde(rename = "contractInfo", default, skip_serializing_if = "Option::is_none")]
        contract_info: Option<Value>,
    },
    /// Best-effort surface pre-warm.
    #[serde(rename = "PREPARE_PROOF_POPUP")]
    PrepareSurface,
    /// Attaches a soulbound descriptor to the in-flight proof request.
    #[serde(rename = "UPDATE_PROOF_REQUEST_SBT")]
    AttachSoulbound {
        /// Soulbound descriptor.
        sbt: Value,
        /// Token URI accompanying the descriptor.
        #[serde(rename = "tokenURI", default, skip_serializing_if = "Option::is_none")]
        token_uri: Option<String>,
    },
    /// Direct soulbound save; always refused.
    #[serde(rename = "SAVE_SBT")]
    SaveSoulbound {
        /// Soulbound descriptor the page tried to save.
        sbt: Value,
        /// Origin of the requesting page.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        origin: Option<String>,
    },
    /// User interacted with the wallet; resets the idle lock timer.
    #[serde(rename = "USER_ACTIVITY")]
    UserActivity,
    /// Wallet was unlocked; restarts the idle lock timer.
    #[serde(rename = "WALLET_UNLOCKED")]
    WalletUnlocked,
    /// Wallet was locked manually; cancels the idle lock timer.
    #[serde(rename = "WALLET_LOCKED")]
    WalletLocked,
}

/// Terminal answer to one [`WalletRequest`], shape depending on the class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum WalletResponse {
    /// Address disclosure outcome.
    Address(AddressOutcome),
    /// Approval outcome (issuance).
    Approval(ApprovalOutcome),
    /// Save or delete outcome.
    Save(SaveOutcome),
    /// Proof submission outcome.
    Proof(ProofOutcome),
    /// Combined proof and address outcome.
    ProofWithAddress(ProofWithAddressOutcome),
    /// Plain acknowledgement.
    Ack(AckOutcome),
}

/// `{success, address?, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressOutcome {
    /// Whether an address was disclosed.
    pub success: bool,
    /// The disclosed wallet address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Failure or rejection detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{approved, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    /// Whether the human approved.
    pub approved: bool,
    /// Failure detail; absent on plain rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{success, vcId?, message?, isDuplicate?, error?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    /// Whether the save (or delete) committed or was parked for
    /// confirmation.
    pub success: bool,
    /// Identifier of the affected record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vc_id: Option<String>,
    /// Informational text, e.g. the duplicate-confirmation notice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Set when the save matched an existing record's dedup key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_duplicate: Option<bool>,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{success, approved, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOutcome {
    /// Whether the request was processed without error.
    pub success: bool,
    /// Whether the human approved.
    pub approved: bool,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{success, approved, address?, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofWithAddressOutcome {
    /// Whether the request was processed without error.
    pub success: bool,
    /// Whether the human approved.
    pub approved: bool,
    /// The disclosed wallet address, on approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{success, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckOutcome {
    /// Whether the request was acknowledged.
    pub success: bool,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// Surface layer

/// Decision messages the approval surface sends back to the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SurfaceMessage {
    /// Answer to a pending address request.
    #[serde(rename = "ADDRESS_REQUEST_RESPONSE")]
    Address {
        /// Whether the user approved the disclosure.
        success: bool,
        /// The disclosed address, on approval.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
        /// Rejection detail.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Answer to a pending issuance request.
    #[serde(rename = "VC_ISSUANCE_RESPONSE")]
    Issuance {
        /// Whether the user approved.
        approved: bool,
        /// Rejection detail.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Answer to a pending duplicate-save confirmation.
    #[serde(rename = "VC_SAVE_RESPONSE")]
    CredentialSave {
        /// Whether the user confirmed the overwrite.
        approved: bool,
    },
    /// Answer to a pending proof request.
    #[serde(rename = "PROOF_SUBMISSION_RESPONSE")]
    Proof {
        /// Whether the user approved.
        approved: bool,
    },
    /// Answer to a pending combined proof-and-address request.
    #[serde(rename = "PROOF_WITH_ADDRESS_RESPONSE")]
    ProofWithAddress {
        /// Whether the user approved.
        approved: bool,
        /// The disclosed address, on approval.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
    },
}

impl SurfaceMessage {
    /// The request class this decision answers.
    #[must_use]
    pub const fn class(&self) -> RequestClass {
        match self {
            Self::Address { .. } => RequestClass::Address,
            Self::Issuance { .. } => RequestClass::Issuance,
            Self::CredentialSave { .. } => RequestClass::CredentialSave,
            Self::Proof { .. } | Self::ProofWithAddress { .. } => RequestClass::Proof,
        }
    }

    /// Collapses the wire form into the class-agnostic decision the
    /// orchestrator's waiters consume.
    #[must_use]
    pub fn into_decision(self) -> Decision {
        match self {
            Self::Address {
                success,
                address,
                error,
            } => Decision {
                approved: success,
                address,
                error,
            },
            Self::Issuance { approved, error } => Decision {
                approved,
                address: None,
                error,
            },
            Self::CredentialSave { approved } | Self::Proof { approved } => Decision {
                approved,
                address: None,
                error: None,
            },
            Self::ProofWithAddress { approved, address } => Decision {
                approved,
                address,
                error: None,
            },
        }
    }
}

/// A human decision, stripped of its wire envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the user approved the operation.
    pub approved: bool,
    /// Disclosed wallet address, for the classes that carry one.
    pub address: Option<String>,
    /// Rejection or failure detail supplied by the surface.
    pub error: Option<String>,
}

// Executor layer

/// Correlated transaction-submission request sent to the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "SEND_PROOF_TX", rename_all = "camelCase")]
pub struct ExecutorRequest {
    /// Correlation id; echoed in the response.
    pub id: Uuid,
    /// Wallet address submitting the transaction.
    pub address: String,
    /// Proof calldata (the fixed placeholder payload).
    pub proof_calldata: String,
    /// Contract-invocation descriptor from the verifier page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_info: Option<Value>,
    /// Token URI to mint against.
    #[serde(rename = "tokenURI")]
    pub token_uri: String,
}

/// Correlated answer from the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "PROOF_TX_RESPONSE", rename_all = "camelCase")]
pub struct ExecutorResponse {
    /// Correlation id from the request.
    pub id: Uuid,
    /// Whether the transaction confirmed.
    pub success: bool,
    /// Transaction hash, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Block number the transaction landed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<String>,
    /// Soulbound data parsed from the transaction receipt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sbt_data: Option<Value>,
    /// Failure detail, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// Broadcast layer

/// Proof pipeline progress states, broadcast to any listening context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    /// Proof generation started.
    GeneratingProof,
    /// Transaction submission started.
    SubmittingTransaction,
    /// The pipeline finished successfully.
    Completed,
    /// The pipeline failed.
    Failed,
    /// The terminal record was swept from the store.
    Removed,
}

/// Unsolicited notifications fanned out to all subscribed contexts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    /// Proof pipeline progress.
    #[serde(rename = "PROOF_PROGRESS")]
    ProofProgress {
        /// The state just entered.
        status: ProgressStatus,
        /// Failure detail, when `status` is `failed`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A proof transaction finished; delivered to the page context whose
    /// origin matches.
    #[serde(rename = "PROOF_TRANSACTION_COMPLETED")]
    TransactionCompleted {
        /// Whether the transaction confirmed.
        success: bool,
        /// Transaction hash, on success.
        #[serde(rename = "txHash", default, skip_serializing_if = "Option::is_none")]
        tx_hash: Option<String>,
        /// Block number the transaction landed in.
        #[serde(rename = "blockNumber", default, skip_serializing_if = "Option::is_none")]
        block_number: Option<String>,
        /// Failure detail.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Origin of the page that initiated the proof.
        origin: String,
    },
    /// A credential was saved.
    #[serde(rename = "VC_SAVED")]
    CredentialSaved {
        /// Identifier of the saved record.
        #[serde(rename = "vcId")]
        vc_id: String,
        /// Whether the save overwrote an existing record.
        #[serde(rename = "isDuplicate")]
        is_duplicate: bool,
    },
    /// A soulbound record was stored after transaction confirmation.
    #[serde(rename = "SBT_SAVED")]
    SoulboundSaved {
        /// Identifier of the stored record.
        id: String,
    },
    /// The wallet locked itself after the idle period.
    #[serde(rename = "WALLET_LOCKED")]
    WalletLocked,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wallet_request_wire_tags() {
        let request: WalletRequest = serde_json::from_value(json!({
            "type": "REQUEST_PROOF_SUBMISSION",
            "origin": "https://verifier.example",
            "region": "kr",
            "vcType": "IdentityCredential",
            "prep": {"circuit": "age"}
        }))
        .unwrap();
        assert!(matches!(request, WalletRequest::Proof { .. }));

        let request: WalletRequest =
            serde_json::from_value(json!({"type": "USER_ACTIVITY"})).unwrap();
        assert!(matches!(request, WalletRequest::UserActivity));
    }

    #[test]
    fn test_response_shapes_omit_empty_fields() {
        let outcome = WalletResponse::Proof(ProofOutcome {
            success: true,
            approved: true,
            error: None,
        });
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"success": true, "approved": true})
        );
    }

    #[test]
    fn test_progress_statuses_use_kebab_case() {
        let progress = Notification::ProofProgress {
            status: ProgressStatus::SubmittingTransaction,
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            json!({"type": "PROOF_PROGRESS", "status": "submitting-transaction"})
        );
    }

    #[test]
    fn test_executor_round_trip_echoes_the_discriminator() {
        let request = ExecutorRequest {
            id: Uuid::new_v4(),
            address: "0xabc".to_string(),
            proof_calldata: "[]".to_string(),
            contract_info: None,
            token_uri: "ipfs://Qm...".to_string(),
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["type"], "SEND_PROOF_TX");
        assert_eq!(wire["tokenURI"], "ipfs://Qm...");

        let response: ExecutorResponse = serde_json::from_value(json!({
            "type": "PROOF_TX_RESPONSE",
            "id": request.id,
            "success": false,
            "error": "network"
        }))
        .unwrap();
        assert_eq!(response.error.as_deref(), Some("network"));
    }

    #[test]
    fn test_surface_decisions_map_to_classes() {
        let decision: SurfaceMessage = serde_json::from_value(json!({
            "type": "PROOF_WITH_ADDRESS_RESPONSE",
            "approved": true,
            "address": "0xabc"
        }))
        .unwrap();
        assert_eq!(decision.class(), RequestClass::Proof);

        let decision = decision.into_decision();
        assert!(decision.approved);
        assert_eq!(decision.address.as_deref(), Some("0xabc"));
    }
}
