//! The background-resident coordinator.
//!
//! Owns the per-class state machines, the single-flight guard, timeout
//! management and the fan-out of progress notifications. Every request
//! arriving over the relay resolves exactly once: approval, rejection, or
//! timeout. Errors never escape [`Orchestrator::handle`]; they are
//! converted into the failing response shape of the request's class.
//!
//! The orchestrator is the sole writer of the durable request store. Its
//! interior maps are guarded by plain mutexes that are never held across an
//! await, so transitions serialize without blocking the host runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use uuid::Uuid;

use crate::calls::PendingCalls;
use crate::credential::Credential;
use crate::credential_store::CredentialStore;
use crate::defaults;
use crate::error::BridgeError;
use crate::executor::ExecutorSink;
use crate::message::{
    AckOutcome, AddressOutcome, ApprovalOutcome, Decision, ExecutorResponse, Notification,
    ProofOutcome, ProofWithAddressOutcome, SaveOutcome, SurfaceMessage, WalletRequest,
    WalletResponse,
};
use crate::pending::{
    PendingRequest, ProofPayload, RequestClass, RequestPayload, RequestStatus,
};
use crate::store::{BridgeStore, KeyValueStore};
use crate::surface::ApprovalSurface;
use tokio::sync::{broadcast, oneshot};

mod autolock;
mod proof;

use autolock::IdleLock;

/// Capacity of the notification fan-out channel. Slow subscribers miss old
/// notifications rather than backpressuring the orchestrator.
const NOTIFICATION_CAPACITY: usize = 64;

/// The approval-orchestration coordinator.
pub struct Orchestrator {
    store: BridgeStore,
    credentials: CredentialStore,
    surface: Arc<dyn ApprovalSurface>,
    executor: ExecutorSink,
    decisions: PendingCalls<Decision>,
    decision_waiters: Mutex<HashMap<RequestClass, Uuid>>,
    executor_calls: PendingCalls<ExecutorResponse>,
    notifications: broadcast::Sender<Notification>,
    idle_lock: IdleLock,
}

impl Orchestrator {
    /// Creates an orchestrator over the given store backend, approval
    /// surface and executor channel.
    #[must_use]
    pub fn new(
        backend: Arc<dyn KeyValueStore>,
        surface: Arc<dyn ApprovalSurface>,
        executor: ExecutorSink,
    ) -> Arc<Self> {
        let store = BridgeStore::new(backend);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Arc::new(Self {
            credentials: CredentialStore::new(store.clone()),
            idle_lock: IdleLock::new(store.clone(), notifications.clone()),
            store,
            surface,
            executor,
            decisions: PendingCalls::default(),
            decision_waiters: Mutex::new(HashMap::new()),
            executor_calls: PendingCalls::default(),
            notifications,
        })
    }

    /// Subscribes to unsolicited notifications (progress, completion,
    /// saves, lock state).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Read access to the saved credential and soulbound lists, for the
    /// approval surface.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Read access to the durable request store, for surfaces picking up
    /// a pending record after a restart.
    #[must_use]
    pub const fn store(&self) -> &BridgeStore {
        &self.store
    }

    /// Starts the idle auto-lock timer unless the wallet is already locked.
    ///
    /// Call once at startup, from within the runtime; the timer then
    /// follows the activity signals arriving through [`Self::handle`].
    pub fn resume_idle_lock(&self) {
        match self.store.locked() {
            Ok(true) => {}
            Ok(false) => self.idle_lock.reset(),
            Err(err) => log::error!("cannot read lock flag: {err}"),
        }
    }

    /// Handles one relay request and returns its terminal response.
    ///
    /// Never panics and never returns an error: every failure becomes the
    /// failing response shape of the request's class.
    pub async fn handle(self: &Arc<Self>, request: WalletRequest) -> WalletResponse {
        match request {
            WalletRequest::Address { origin } => {
                WalletResponse::Address(self.handle_address(&origin).await)
            }
            WalletRequest::Issuance { vc, student, origin } => {
                WalletResponse::Approval(self.handle_issuance(vc, student, &origin).await)
            }
            WalletRequest::SaveCredential { vc, origin } => WalletResponse::Save(
                self.handle_save(vc, origin.as_deref().unwrap_or("manual-import"))
                    .await,
            ),
            WalletRequest::SaveCredentialDirect { vc, .. } => {
                WalletResponse::Save(self.handle_save_direct(&vc))
            }
            WalletRequest::DeleteCredential { vc_id } => {
                WalletResponse::Save(self.handle_delete(&vc_id))
            }
            WalletRequest::Proof {
                origin,
                region,
                vc_type,
                prep,
            } => {
                let payload = ProofPayload {
                    region,
                    vc_type,
                    prep,
                    contract_info: None,
                    needs_address: false,
                };
                WalletResponse::Proof(self.handle_proof(&origin, payload).await)
            }
            WalletRequest::ProofWithAddress {
                origin,
                region,
                vc_type,
                prep,
                contract_info,
            } => {
                let payload = ProofPayload {
                    region,
                    vc_type,
                    prep,
                    contract_info,
                    needs_address: true,
                };
                WalletResponse::ProofWithAddress(
                    self.handle_proof_with_address(&origin, payload).await,
                )
            }
            WalletRequest::PrepareSurface => WalletResponse::Ack(self.handle_prepare_surface()),
            WalletRequest::AttachSoulbound { sbt, token_uri } => {
                WalletResponse::Ack(self.handle_attach_soulbound(sbt, token_uri))
            }
            WalletRequest::SaveSoulbound { .. } => WalletResponse::Save(SaveOutcome {
                success: false,
                error: Some(BridgeError::SoulboundDirectSave.to_string()),
                ..SaveOutcome::default()
            }),
            WalletRequest::UserActivity | WalletRequest::WalletUnlocked => {
                self.idle_lock.reset();
                WalletResponse::Ack(AckOutcome {
                    success: true,
                    error: None,
                })
            }
            WalletRequest::WalletLocked => {
                self.idle_lock.cancel();
                WalletResponse::Ack(AckOutcome {
                    success: true,
                    error: None,
                })
            }
        }
    }

    /// Resolves the active decision wait of the message's class.
    ///
    /// Returns `false` when no wait is active (the request already timed
    /// out, was resolved, or never existed), in which case the decision is
    /// dropped without effect.
    pub fn deliver_decision(&self, message: SurfaceMessage) -> bool {
        let class = message.class();
        let decision = message.into_decision();
        // Deregister first: once taken, a racing timeout finds nothing.
        let Some(id) = self.lock_waiters().remove(&class) else {
            log::debug!("dropping {class} decision with no active wait");
            return false;
        };
        self.decisions.resolve(id, decision)
    }

    /// Resolves the executor wait correlated to `response.id`.
    ///
    /// Returns `false` when the wait already timed out or was never
    /// registered.
    pub fn deliver_executor_response(&self, response: ExecutorResponse) -> bool {
        self.executor_calls.resolve(response.id, response)
    }

    // Address disclosure

    async fn handle_address(self: &Arc<Self>, origin: &str) -> AddressOutcome {
        match self.run_address(origin).await {
            Ok(outcome) => outcome,
            Err(err) => AddressOutcome {
                success: false,
                address: None,
                error: Some(err.to_string()),
            },
        }
    }

    async fn run_address(self: &Arc<Self>, origin: &str) -> Result<AddressOutcome, BridgeError> {
        self.guard_single_flight(RequestClass::Address)?;
        let mut record = PendingRequest::new(RequestClass::Address, origin, RequestPayload::Address);
        self.store.put_pending(&record)?;

        let decision = self.await_decision(&mut record).await?;
        record.advance(if decision.approved {
            RequestStatus::Completed
        } else {
            RequestStatus::Rejected
        });
        self.store.clear_pending(RequestClass::Address)?;

        log::info!(
            "address request from {origin} {}",
            if decision.approved { "approved" } else { "rejected" }
        );
        Ok(AddressOutcome {
            success: decision.approved,
            address: decision.address,
            error: decision.error,
        })
    }

    // Credential issuance approval

    async fn handle_issuance(
        self: &Arc<Self>,
        vc: Credential,
        student: Option<Value>,
        origin: &str,
    ) -> ApprovalOutcome {
        match self.run_issuance(vc, student, origin).await {
            Ok(outcome) => outcome,
            Err(err) => ApprovalOutcome {
                approved: false,
                error: Some(err.to_string()),
            },
        }
    }

    async fn run_issuance(
        self: &Arc<Self>,
        vc: Credential,
        student: Option<Value>,
        origin: &str,
    ) -> Result<ApprovalOutcome, BridgeError> {
        self.guard_single_flight(RequestClass::Issuance)?;

        // Pre-compute the dedup result so the surface can warn about an
        // overwrite before the user approves.
        let duplicate = self.credentials.find_duplicate(&vc)?;
        let mut record = PendingRequest::new(
            RequestClass::Issuance,
            origin,
            RequestPayload::Issuance {
                credential: vc,
                subject: student,
            },
        );
        record.is_duplicate = duplicate.is_some();
        record.duplicate_id = duplicate.and_then(|d| d.id().map(str::to_string));
        self.store.put_pending(&record)?;

        let decision = self.await_decision(&mut record).await?;
        record.advance(if decision.approved {
            RequestStatus::Completed
        } else {
            RequestStatus::Rejected
        });
        self.store.clear_pending(RequestClass::Issuance)?;

        Ok(ApprovalOutcome {
            approved: decision.approved,
            error: decision.error,
        })
    }

    // Credential save

    async fn handle_save(self: &Arc<Self>, vc: Credential, origin: &str) -> SaveOutcome {
        match self.run_save(vc, origin).await {
            Ok(outcome) => outcome,
            Err(err) => save_failure(&err),
        }
    }

    async fn run_save(
        self: &Arc<Self>,
        vc: Credential,
        origin: &str,
    ) -> Result<SaveOutcome, BridgeError> {
        let Some(duplicate) = self.credentials.find_duplicate(&vc)? else {
            // No dedup conflict: commit immediately, no confirmation needed.
            return Ok(self.commit_save(&vc));
        };

        self.guard_single_flight(RequestClass::CredentialSave)?;
        let duplicate_id = duplicate.id().map(str::to_string);
        let mut record = PendingRequest::new(
            RequestClass::CredentialSave,
            origin,
            RequestPayload::CredentialSave {
                credential: vc.clone(),
            },
        );
        record.is_duplicate = true;
        record.duplicate_id.clone_from(&duplicate_id);
        self.store.put_pending(&record)?;

        if let Err(err) = self.surface.open() {
            self.store.clear_pending(RequestClass::CredentialSave)?;
            return Err(err);
        }
        record.advance(RequestStatus::AwaitingDecision);
        self.store.put_pending(&record)?;

        // Register the listener before answering the caller, so a surface
        // that decides immediately cannot race the spawn below.
        let (id, rx) = self.register_decision(RequestClass::CredentialSave);

        // The caller's round trip ends here; the overwrite commits (or is
        // discarded) when the surface answers.
        self.spawn_save_confirmation(record, vc, id, rx);
        Ok(SaveOutcome {
            success: true,
            vc_id: duplicate_id,
            message: Some(defaults::CONFIRM_IN_SURFACE.to_string()),
            is_duplicate: Some(true),
            error: None,
        })
    }

    /// Waits for the duplicate-overwrite confirmation and commits or
    /// discards accordingly.
    fn spawn_save_confirmation(
        self: &Arc<Self>,
        record: PendingRequest,
        vc: Credential,
        id: Uuid,
        rx: oneshot::Receiver<Decision>,
    ) {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let decision = orchestrator
                .wait_decision(RequestClass::CredentialSave, id, rx)
                .await;

            let mut record = record;
            match decision {
                Some(decision) if decision.approved => {
                    let outcome = orchestrator.commit_save(&vc);
                    record.advance(RequestStatus::Completed);
                    log::info!(
                        "duplicate overwrite confirmed, kept id {}",
                        outcome.vc_id.as_deref().unwrap_or("")
                    );
                }
                Some(_) => {
                    record.advance(RequestStatus::Rejected);
                    log::info!("duplicate overwrite rejected");
                }
                None => {
                    record.advance(RequestStatus::Rejected);
                    log::info!("duplicate overwrite confirmation timed out");
                }
            }
            if let Err(err) = orchestrator.store.clear_pending(RequestClass::CredentialSave) {
                log::error!("cannot clear credential-save slot: {err}");
            }
        });
    }

    /// Commits a save and broadcasts the result.
    fn commit_save(&self, vc: &Credential) -> SaveOutcome {
        match self.credentials.save(vc) {
            Ok(receipt) => {
                self.notify(Notification::CredentialSaved {
                    vc_id: receipt.vc_id.clone(),
                    is_duplicate: receipt.replaced,
                });
                SaveOutcome {
                    success: true,
                    vc_id: Some(receipt.vc_id),
                    message: None,
                    is_duplicate: receipt.replaced.then_some(true),
                    error: None,
                }
            }
            Err(err) => save_failure(&err),
        }
    }

    fn handle_save_direct(&self, vc: &Credential) -> SaveOutcome {
        self.commit_save(vc)
    }

    fn handle_delete(&self, vc_id: &str) -> SaveOutcome {
        if vc_id.is_empty() {
            return save_failure(&BridgeError::InvalidInput("vcId"));
        }
        match self.credentials.delete(vc_id) {
            Ok(()) => SaveOutcome {
                success: true,
                vc_id: Some(vc_id.to_string()),
                ..SaveOutcome::default()
            },
            Err(err) => save_failure(&err),
        }
    }

    // Proof submission

    async fn handle_proof(self: &Arc<Self>, origin: &str, payload: ProofPayload) -> ProofOutcome {
        match self.run_proof(origin, payload).await {
            Ok((approved, _)) => ProofOutcome {
                success: true,
                approved,
                error: None,
            },
            Err(err) => ProofOutcome {
                success: false,
                approved: false,
                error: Some(err.to_string()),
            },
        }
    }

    async fn handle_proof_with_address(
        self: &Arc<Self>,
        origin: &str,
        payload: ProofPayload,
    ) -> ProofWithAddressOutcome {
        match self.run_proof(origin, payload).await {
            Ok((approved, address)) => ProofWithAddressOutcome {
                success: true,
                approved,
                address,
                error: None,
            },
            Err(err) => ProofWithAddressOutcome {
                success: false,
                approved: false,
                address: None,
                error: Some(err.to_string()),
            },
        }
    }

    // Surface pre-warm and soulbound plumbing

    fn handle_prepare_surface(&self) -> AckOutcome {
        // Best effort by contract: a hidden surface here is not an error,
        // the real open happens when a request is created.
        if let Err(err) = self.surface.open() {
            log::debug!("surface pre-warm failed: {err}");
        }
        AckOutcome {
            success: true,
            error: None,
        }
    }

    fn handle_attach_soulbound(&self, sbt: Value, token_uri: Option<String>) -> AckOutcome {
        match self.attach_soulbound(sbt, token_uri) {
            Ok(()) => AckOutcome {
                success: true,
                error: None,
            },
            Err(err) => AckOutcome {
                success: false,
                error: Some(err.to_string()),
            },
        }
    }

    fn attach_soulbound(&self, sbt: Value, token_uri: Option<String>) -> Result<(), BridgeError> {
        let Some(mut record) = self.store.pending(RequestClass::Proof)? else {
            log::debug!("soulbound attach with no proof request in flight");
            return Ok(());
        };
        let attached_uri = token_uri.or_else(|| {
            sbt.get("tokenURI")
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        if let Some(uri) = attached_uri {
            record.token_uri = Some(uri);
        }
        record.soulbound = Some(sbt);
        self.store.put_pending(&record)?;
        log::info!(
            "soulbound descriptor attached, token URI {}",
            record.token_uri.as_deref().unwrap_or("unset")
        );
        Ok(())
    }

    // Shared plumbing

    /// Rejects creation when a non-terminal record of `class` exists.
    /// Terminal leftovers awaiting their retention sweep do not block.
    fn guard_single_flight(&self, class: RequestClass) -> Result<(), BridgeError> {
        let blocking = self
            .store
            .pending(class)?
            .is_some_and(|record| !record.status.is_terminal());
        if blocking {
            return Err(BridgeError::AlreadyInProgress(class));
        }
        Ok(())
    }

    /// Opens the surface and waits for the human decision on `record`.
    ///
    /// On success the record is in `awaiting-decision` and the decision is
    /// returned; the caller performs the terminal transition. On surface
    /// failure or timeout the record is removed before the error returns.
    async fn await_decision(
        &self,
        record: &mut PendingRequest,
    ) -> Result<Decision, BridgeError> {
        if let Err(err) = self.surface.open() {
            self.store.clear_pending(record.class)?;
            return Err(err);
        }
        record.advance(RequestStatus::AwaitingDecision);
        self.store.put_pending(record)?;

        match self.register_and_wait(record.class).await {
            Some(decision) => Ok(decision),
            None => {
                self.store.clear_pending(record.class)?;
                Err(BridgeError::DecisionTimeout)
            }
        }
    }

    /// Registers the one-shot decision listener for `class`.
    fn register_decision(&self, class: RequestClass) -> (Uuid, oneshot::Receiver<Decision>) {
        let (id, rx) = self.decisions.register();
        self.lock_waiters().insert(class, id);
        (id, rx)
    }

    /// Waits out the decision window for a registered listener.
    ///
    /// Whichever of the decision and the timer fires first wins; by the
    /// time either path returns, the loser is deregistered and inert.
    async fn wait_decision(
        &self,
        class: RequestClass,
        id: Uuid,
        rx: oneshot::Receiver<Decision>,
    ) -> Option<Decision> {
        let decision = self.decisions.wait(id, rx, defaults::DECISION_WAIT).await;

        let mut waiters = self.lock_waiters();
        if waiters.get(&class) == Some(&id) {
            waiters.remove(&class);
        }
        decision
    }

    /// Registers the decision listener and waits out the window in one
    /// step, for the flows whose caller stays parked on the decision.
    async fn register_and_wait(&self, class: RequestClass) -> Option<Decision> {
        let (id, rx) = self.register_decision(class);
        self.wait_decision(class, id, rx).await
    }

    pub(crate) fn notify(&self, notification: Notification) {
        // No subscribers is fine; notifications are best-effort.
        let _ = self.notifications.send(notification);
    }

    fn lock_waiters(&self) -> MutexGuard<'_, HashMap<RequestClass, Uuid>> {
        self.decision_waiters
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Converts an error into the save/delete failure shape.
fn save_failure(err: &BridgeError) -> SaveOutcome {
    SaveOutcome {
        success: false,
        error: Some(err.to_string()),
        ..SaveOutcome::default()
    }
}
