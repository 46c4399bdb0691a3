//! The proof-submission pipeline driver.
//!
//! After approval, a proof request advances through
//! `generating-proof → submitting-transaction → (executor) → terminal`
//! as an explicit state machine: entering a state schedules exactly that
//! state's timer or round trip, each entry emits one progress broadcast,
//! and the terminal record is retained briefly before the sweep removes
//! it so late subscribers can still read it.

use std::sync::Arc;

use serde_json::Value;
use tokio::time::sleep;
use uuid::Uuid;

use crate::defaults;
use crate::error::BridgeError;
use crate::message::{Decision, ExecutorRequest, ExecutorResponse, Notification, ProgressStatus};
use crate::pending::{PendingRequest, ProofPayload, RequestClass, RequestPayload, RequestStatus};

use super::Orchestrator;

impl Orchestrator {
    /// Runs the synchronous half of a proof request: single-flight guard,
    /// record creation, surface, decision. On approval the asynchronous
    /// pipeline is spawned and the approved response returns immediately;
    /// progress reaches interested contexts through broadcasts.
    ///
    /// Returns `(approved, disclosed address)`.
    pub(super) async fn run_proof(
        self: &Arc<Self>,
        origin: &str,
        payload: ProofPayload,
    ) -> Result<(bool, Option<String>), BridgeError> {
        self.guard_single_flight(RequestClass::Proof)?;

        let mut record =
            PendingRequest::new(RequestClass::Proof, origin, RequestPayload::Proof(payload));
        self.store.put_pending(&record)?;

        let decision = self.await_decision(&mut record).await?;
        if !decision.approved {
            record.advance(RequestStatus::Rejected);
            self.store.clear_pending(RequestClass::Proof)?;
            log::info!("proof request from {origin} rejected");
            return Ok((false, None));
        }

        let Decision { address, .. } = decision;
        record.address.clone_from(&address);
        record.advance(RequestStatus::GeneratingProof);
        self.store.put_pending(&record)?;
        self.notify(Notification::ProofProgress {
            status: ProgressStatus::GeneratingProof,
            error: None,
        });
        log::info!("proof request from {origin} approved, pipeline started");

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.run_proof_pipeline(record).await;
        });
        Ok((true, address))
    }

    /// Drives an approved record from `generating-proof` to removal.
    async fn run_proof_pipeline(self: Arc<Self>, mut record: PendingRequest) {
        sleep(defaults::PROOF_GENERATION_LATENCY).await;

        self.refresh_attachments(&mut record);
        record.advance(RequestStatus::SubmittingTransaction);
        self.persist(&record);
        self.notify(Notification::ProofProgress {
            status: ProgressStatus::SubmittingTransaction,
            error: None,
        });

        let needs_executor = matches!(
            &record.payload,
            RequestPayload::Proof(payload) if payload.needs_address
        );
        let result = if needs_executor {
            record.advance(RequestStatus::ExecutorPending);
            self.persist(&record);
            self.executor_round_trip(&record).await.map(Some)
        } else {
            // No executor leg: the submission itself is simulated.
            sleep(defaults::TRANSACTION_SUBMISSION_LATENCY).await;
            Ok(None)
        };

        match result {
            Ok(response) => self.complete_proof(&mut record, response),
            Err(err) => self.fail_proof(&mut record, &err),
        }

        sleep(defaults::RECORD_RETENTION).await;
        self.sweep(record.class, record.id);
    }

    /// Sends the correlated executor request and waits out the round trip.
    async fn executor_round_trip(
        &self,
        record: &PendingRequest,
    ) -> Result<ExecutorResponse, BridgeError> {
        let contract_info = match &record.payload {
            RequestPayload::Proof(payload) => payload.contract_info.clone(),
            _ => None,
        };
        let token_uri = record
            .token_uri
            .clone()
            .or_else(|| soulbound_token_uri(record.soulbound.as_ref()))
            .unwrap_or_else(|| defaults::DEFAULT_TOKEN_URI.to_string());

        let (id, rx) = self.executor_calls.register();
        let request = ExecutorRequest {
            id,
            address: record.address.clone().unwrap_or_default(),
            proof_calldata: defaults::PLACEHOLDER_PROOF_CALLDATA.to_string(),
            contract_info,
            token_uri,
        };
        if self.executor.send(request).is_err() {
            self.executor_calls.forget(id);
            return Err(BridgeError::ExecutorFailure(
                "executor unavailable".to_string(),
            ));
        }

        match self
            .executor_calls
            .wait(id, rx, defaults::EXECUTOR_WAIT)
            .await
        {
            Some(response) if response.success => Ok(response),
            Some(response) => Err(BridgeError::ExecutorFailure(
                response
                    .error
                    .unwrap_or_else(|| "transaction submission failed".to_string()),
            )),
            None => Err(BridgeError::ExecutorTimeout),
        }
    }

    /// Terminal success: records the hash, broadcasts, and stores the
    /// soulbound record when the executor confirmed one.
    fn complete_proof(&self, record: &mut PendingRequest, response: Option<ExecutorResponse>) {
        if let Some(response) = &response {
            record.tx_hash.clone_from(&response.tx_hash);
        }
        record.advance(RequestStatus::Completed);
        self.persist(record);
        self.notify(Notification::ProofProgress {
            status: ProgressStatus::Completed,
            error: None,
        });

        let Some(response) = response else {
            log::info!("simulated proof submission completed");
            return;
        };
        log::info!(
            "proof transaction confirmed, hash {}",
            response.tx_hash.as_deref().unwrap_or("unknown")
        );
        self.notify(Notification::TransactionCompleted {
            success: true,
            tx_hash: response.tx_hash.clone(),
            block_number: response.block_number.clone(),
            error: None,
            origin: record.origin.clone(),
        });

        // Receipt-parsed data wins over the page-attached descriptor.
        let descriptor = response.sbt_data.or_else(|| record.soulbound.clone());
        match descriptor {
            Some(descriptor) => {
                match self
                    .credentials
                    .save_soulbound(&descriptor, record.tx_hash.as_deref())
                {
                    Ok(id) => self.notify(Notification::SoulboundSaved { id }),
                    Err(err) => log::error!("cannot store soulbound record: {err}"),
                }
            }
            None => log::warn!("transaction confirmed but no soulbound data to store"),
        }
    }

    /// Terminal failure: records the error and notifies both the surface
    /// and the originating page context.
    fn fail_proof(&self, record: &mut PendingRequest, err: &BridgeError) {
        let error = err.to_string();
        record.error = Some(error.clone());
        record.advance(RequestStatus::Failed);
        self.persist(record);
        log::warn!("proof pipeline failed: {error}");

        self.notify(Notification::ProofProgress {
            status: ProgressStatus::Failed,
            error: Some(error.clone()),
        });
        self.notify(Notification::TransactionCompleted {
            success: false,
            tx_hash: None,
            block_number: None,
            error: Some(error),
            origin: record.origin.clone(),
        });
    }

    /// Removes the terminal record after its retention window, unless a
    /// successor already occupies the slot.
    fn sweep(&self, class: RequestClass, id: Uuid) {
        match self.store.pending(class) {
            Ok(Some(record)) if record.id == id => {
                if let Err(err) = self.store.clear_pending(class) {
                    log::error!("cannot sweep {class} slot: {err}");
                    return;
                }
                self.notify(Notification::ProofProgress {
                    status: ProgressStatus::Removed,
                    error: None,
                });
            }
            Ok(_) => {}
            Err(err) => log::error!("cannot read {class} slot for sweep: {err}"),
        }
    }

    /// Re-reads the stored record's page-attached fields; the verifier page
    /// may have attached a soulbound descriptor since the last persist.
    fn refresh_attachments(&self, record: &mut PendingRequest) {
        if let Ok(Some(latest)) = self.store.pending(record.class) {
            if latest.id == record.id {
                record.soulbound = latest.soulbound;
                record.token_uri = latest.token_uri;
            }
        }
    }

    fn persist(&self, record: &PendingRequest) {
        if let Err(err) = self.store.put_pending(record) {
            log::error!("cannot persist {} record: {err}", record.class);
        }
    }
}

fn soulbound_token_uri(descriptor: Option<&Value>) -> Option<String> {
    descriptor?
        .get("tokenURI")
        .and_then(Value::as_str)
        .map(str::to_string)
}
