//! Protocol constants shared by every context.
//!
//! The timeout values are part of the wire contract with existing pages and
//! approval surfaces and must not drift.

use std::time::Duration;

/// How long the orchestrator waits for a human decision before a pending
/// request times out.
pub const DECISION_WAIT: Duration = Duration::from_secs(30);

/// Simulated latency of the proof-generation step.
pub const PROOF_GENERATION_LATENCY: Duration = Duration::from_secs(10);

/// Simulated latency of the transaction-submission step for proof requests
/// that carry no executor leg.
pub const TRANSACTION_SUBMISSION_LATENCY: Duration = Duration::from_secs(10);

/// How long the orchestrator waits for a correlated executor response.
pub const EXECUTOR_WAIT: Duration = Duration::from_secs(60);

/// How long a terminal proof record is retained so late subscribers can
/// still read it before the sweep removes it.
pub const RECORD_RETENTION: Duration = Duration::from_secs(3);

/// Idle period after which the wallet locks itself.
pub const IDLE_LOCK: Duration = Duration::from_secs(5 * 60);

/// Storage slot for the pending address-disclosure request.
pub const KEY_PENDING_ADDRESS: &str = "pendingAddressRequest";

/// Storage slot for the pending credential-issuance request.
pub const KEY_PENDING_ISSUANCE: &str = "pendingVCIssuance";

/// Storage slot for the pending credential-save request.
pub const KEY_PENDING_SAVE: &str = "pendingVCSave";

/// Storage slot for the pending proof-submission request.
pub const KEY_PENDING_PROOF: &str = "pendingProofRequest";

/// Storage slot holding the list of saved credentials.
pub const KEY_SAVED_CREDENTIALS: &str = "savedVCs";

/// Storage slot holding the list of saved soulbound records.
pub const KEY_SAVED_SOULBOUND: &str = "savedSBTs";

/// Storage slot holding the wallet lock flag.
pub const KEY_WALLET_LOCKED: &str = "walletLocked";

/// Message returned to the caller when a duplicate save is parked in the
/// approval surface for confirmation.
pub const CONFIRM_IN_SURFACE: &str = "confirm in surface";

/// Fixed Groth16-shaped calldata standing in for real proof generation.
///
/// Real proving is out of scope; the executor receives this payload
/// verbatim.
pub const PLACEHOLDER_PROOF_CALLDATA: &str = "[0x280ae4ad4c8c58ad7692b66a12d2b30a5c99186e4822124e11ca49bf8285d611, 0x185aac88d540a116143caef7cf31e72f02ad81100dcd0d39c2162b57fa077b18],[[0x10b36ed6db66bdd1daf23ec15b5f03421e5d8aaa7576fd2460144c7670e1b932, 0x1193d4e899d73b062a2b8591e16c0944c1e99c52a62635ed1c0185d6004fa7aa],[0x2cdc1c1f373f4f7ce57379f494176086b701d0985d7cb5994d4c8a6d5e6dbddc, 0x072fd6c6bca259a1f64a6f6d300706bac64ec83f34a95d2282cf98e33adf0d4b]],[0x012e66fcbaf82ddf81a834a5475458c773ff6dab1d3934f15c4f7ed6185a309e, 0x089a4ee10ce655f485ee6da990599ad22c845613ef6e7b051c1d2a8ccc011b99],[0x0000000000000000000000000000000000000000000000000000000000000002,0x0000000000000000000000000000000000000000000000000000000000000004,0x0000000000000000000000000000000000000000000000000000000000000001,0x1d5ac1f31407018b7d413a4f52c8f74463b30e6ac2238220ad8b254de4eaa3a2,0x1e1de8a908826c3f9ac2e0ceee929ecd0caf3b99b3ef24523aaab796a6f733c4]";

/// Default token URI used when neither the verifier page nor the executor
/// supplied one.
pub const DEFAULT_TOKEN_URI: &str = "ipfs://Qm...";
