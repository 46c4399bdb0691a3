//! The page adapter and the relay.
//!
//! The page adapter runs in the content of the requesting page: it
//! translates page-level requests into relay messages 1:1, relays exactly
//! one terminal response back per request, and forwards unsolicited
//! notifications without blocking on anything in flight. It announces its
//! presence on load and whenever the page pings.
//!
//! The relay itself is a stateless pass-through; in this system it
//! coincides with the message transport between the adapter and the
//! orchestrator.

use std::sync::Arc;

use crate::message::{
    AckOutcome, AddressOutcome, ApprovalOutcome, Notification, PageEvent, PageRequest,
    ProofOutcome, ProofWithAddressOutcome, SaveOutcome, WalletRequest, WalletResponse,
};
use crate::orchestrator::Orchestrator;

/// Stateless pass-through carrying typed requests to the orchestrator.
#[derive(Clone)]
pub struct Relay {
    orchestrator: Arc<Orchestrator>,
}

impl Relay {
    /// Wraps the orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Delivers one request and returns its terminal response.
    pub async fn send(&self, request: WalletRequest) -> WalletResponse {
        self.orchestrator.handle(request).await
    }
}

/// Translates between page messages and relay messages for one page.
#[derive(Clone)]
pub struct PageAdapter {
    origin: String,
    relay: Relay,
}

impl PageAdapter {
    /// Creates the adapter for a page at `origin`.
    #[must_use]
    pub fn new(origin: &str, relay: Relay) -> Self {
        Self {
            origin: origin.to_string(),
            relay,
        }
    }

    /// The origin this adapter serves.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Presence announcement, posted on load.
    #[must_use]
    pub const fn announce() -> PageEvent {
        PageEvent::ExtensionDetected
    }

    /// Handles one page request, returning the event to post back, if the
    /// request expects one.
    ///
    /// Never errors into the page: a response of an unexpected shape is
    /// surfaced as a failure response carrying the error text.
    pub async fn handle_page_message(&self, request: PageRequest) -> Option<PageEvent> {
        match request {
            PageRequest::Ping => Some(PageEvent::ExtensionDetected),
            PageRequest::RequestAddress => {
                let response = self
                    .relay
                    .send(WalletRequest::Address {
                        origin: self.origin.clone(),
                    })
                    .await;
                let outcome = match response {
                    WalletResponse::Address(outcome) => outcome,
                    other => AddressOutcome {
                        success: false,
                        address: None,
                        error: Some(transport_error(&other)),
                    },
                };
                Some(PageEvent::AddressResponse(outcome))
            }
            PageRequest::RequestIssuance { vc, student } => {
                let response = self
                    .relay
                    .send(WalletRequest::Issuance {
                        vc,
                        student,
                        origin: self.origin.clone(),
                    })
                    .await;
                let outcome = match response {
                    WalletResponse::Approval(outcome) => outcome,
                    other => ApprovalOutcome {
                        approved: false,
                        error: Some(transport_error(&other)),
                    },
                };
                Some(PageEvent::IssuanceResponse(outcome))
            }
            PageRequest::SaveCredential { vc } => {
                let response = self
                    .relay
                    .send(WalletRequest::SaveCredential {
                        vc,
                        origin: Some(self.origin.clone()),
                    })
                    .await;
                Some(PageEvent::CredentialSaveResponse(save_outcome(response)))
            }
            PageRequest::SaveSoulbound { sbt } => {
                let response = self
                    .relay
                    .send(WalletRequest::SaveSoulbound {
                        sbt,
                        origin: Some(self.origin.clone()),
                    })
                    .await;
                Some(PageEvent::SoulboundSaveResponse(save_outcome(response)))
            }
            PageRequest::RequestProof {
                region,
                vc_type,
                prep,
            } => {
                let response = self
                    .relay
                    .send(WalletRequest::Proof {
                        origin: self.origin.clone(),
                        region,
                        vc_type,
                        prep,
                    })
                    .await;
                let outcome = match response {
                    WalletResponse::Proof(outcome) => outcome,
                    other => ProofOutcome {
                        success: false,
                        approved: false,
                        error: Some(transport_error(&other)),
                    },
                };
                Some(PageEvent::ProofResponse(outcome))
            }
            PageRequest::RequestProofWithAddress {
                region,
                vc_type,
                prep,
                contract_info,
            } => {
                let response = self
                    .relay
                    .send(WalletRequest::ProofWithAddress {
                        origin: self.origin.clone(),
                        region,
                        vc_type,
                        prep,
                        contract_info,
                    })
                    .await;
                let outcome = match response {
                    WalletResponse::ProofWithAddress(outcome) => outcome,
                    other => ProofWithAddressOutcome {
                        success: false,
                        approved: false,
                        address: None,
                        error: Some(transport_error(&other)),
                    },
                };
                Some(PageEvent::ProofWithAddressResponse(outcome))
            }
            // Fire-and-forget: the page expects no reply to either of
            // these.
            PageRequest::AttachSoulbound { sbt, token_uri } => {
                let response = self
                    .relay
                    .send(WalletRequest::AttachSoulbound { sbt, token_uri })
                    .await;
                if let WalletResponse::Ack(AckOutcome {
                    success: false,
                    error,
                }) = response
                {
                    log::warn!(
                        "soulbound attach failed: {}",
                        error.as_deref().unwrap_or("unknown")
                    );
                }
                None
            }
            PageRequest::PrepareProofIntent => {
                self.relay.send(WalletRequest::PrepareSurface).await;
                None
            }
        }
    }

    /// Filters a broadcast notification down to the event this page should
    /// see, if any.
    ///
    /// Transaction completions are delivered only to the page whose origin
    /// initiated the proof; lock notices go to every page.
    #[must_use]
    pub fn forward_notification(&self, notification: &Notification) -> Option<PageEvent> {
        match notification {
            Notification::TransactionCompleted {
                success,
                tx_hash,
                block_number,
                error,
                origin,
            } if *origin == self.origin => Some(PageEvent::ProofCompleted {
                success: *success,
                tx_hash: tx_hash.clone(),
                block_number: block_number.clone(),
                error: error.clone(),
            }),
            Notification::WalletLocked => Some(PageEvent::WalletLocked),
            _ => None,
        }
    }
}

fn save_outcome(response: WalletResponse) -> SaveOutcome {
    match response {
        WalletResponse::Save(outcome) => outcome,
        other => SaveOutcome {
            success: false,
            error: Some(transport_error(&other)),
            ..SaveOutcome::default()
        },
    }
}

fn transport_error(response: &WalletResponse) -> String {
    format!("unexpected relay response: {response:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::executor::executor_channel;
    use crate::store::MemoryStore;
    use crate::surface::ApprovalSurface;

    struct HiddenSurface;

    impl ApprovalSurface for HiddenSurface {
        fn open(&self) -> Result<(), BridgeError> {
            Err(BridgeError::SurfaceUnavailable)
        }
    }

    fn adapter(origin: &str) -> PageAdapter {
        let (executor, _requests) = executor_channel();
        let orchestrator = Orchestrator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(HiddenSurface),
            executor,
        );
        PageAdapter::new(origin, Relay::new(orchestrator))
    }

    fn completion_for(origin: &str) -> Notification {
        Notification::TransactionCompleted {
            success: true,
            tx_hash: Some("0xfeed".to_string()),
            block_number: Some("12".to_string()),
            error: None,
            origin: origin.to_string(),
        }
    }

    #[test]
    fn test_transaction_completions_are_filtered_by_origin() {
        let adapter = adapter("https://verifier.example");

        let event = adapter
            .forward_notification(&completion_for("https://verifier.example"))
            .unwrap();
        assert!(matches!(
            event,
            PageEvent::ProofCompleted { success: true, .. }
        ));

        assert!(adapter
            .forward_notification(&completion_for("https://other.example"))
            .is_none());
    }

    #[test]
    fn test_lock_notices_reach_every_page() {
        let adapter = adapter("https://issuer.example");
        assert!(matches!(
            adapter.forward_notification(&Notification::WalletLocked),
            Some(PageEvent::WalletLocked)
        ));
        assert!(adapter
            .forward_notification(&Notification::SoulboundSaved {
                id: "sbt:1".to_string()
            })
            .is_none());
    }

    #[tokio::test]
    async fn test_ping_is_answered_without_touching_the_orchestrator() {
        let adapter = adapter("https://issuer.example");
        let event = adapter.handle_page_message(PageRequest::Ping).await;
        assert!(matches!(event, Some(PageEvent::ExtensionDetected)));
    }

    #[tokio::test]
    async fn test_surface_failure_reaches_the_page_as_a_failure_response() {
        let adapter = adapter("https://issuer.example");
        let event = adapter
            .handle_page_message(PageRequest::RequestAddress)
            .await;
        let Some(PageEvent::AddressResponse(outcome)) = event else {
            panic!("expected an address response");
        };
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("approval surface unavailable"));
    }
}
