//! Credential save, dedup and delete flows.

mod common;

use std::time::Duration;

use serde_json::json;

use common::{settle, Harness};
use walletbridge_core::{
    defaults, Credential, Notification, RequestClass, RequestStatus, SurfaceMessage,
    WalletRequest, WalletResponse,
};

fn identity_credential(id: &str, issuance_date: &str) -> Credential {
    Credential(json!({
        "id": id,
        "issuer": { "id": "https://gov.example/moi" },
        "credentialSubject": { "id": "did:ethr:0xABC" },
        "type": ["VerifiableCredential", "IdentityCredential"],
        "issuanceDate": issuance_date
    }))
}

fn save(vc: Credential) -> WalletRequest {
    WalletRequest::SaveCredential {
        vc,
        origin: Some("https://issuer.example".to_string()),
    }
}

fn save_direct(vc: Credential) -> WalletRequest {
    WalletRequest::SaveCredentialDirect {
        vc,
        origin: Some("https://issuer.example".to_string()),
    }
}

#[tokio::test(start_paused = true)]
async fn test_first_save_commits_without_confirmation() {
    let mut harness = Harness::new();

    let response = harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:a", "2024-01-01")))
        .await;
    let WalletResponse::Save(outcome) = response else {
        panic!("expected a save outcome");
    };
    assert!(outcome.success);
    assert_eq!(outcome.vc_id.as_deref(), Some("urn:uuid:a"));
    assert!(outcome.message.is_none());

    // No surface involvement for a conflict-free save.
    assert_eq!(harness.surface.opens(), 0);
    assert!(harness
        .drain_notifications()
        .iter()
        .any(|n| matches!(
            n,
            Notification::CredentialSaved {
                vc_id,
                is_duplicate: false,
            } if vc_id == "urn:uuid:a"
        )));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_save_parks_for_confirmation_then_overwrites() {
    let mut harness = Harness::new();
    harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:a", "2024-01-01")))
        .await;
    harness.drain_notifications();

    let response = harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:b", "2025-06-01")))
        .await;
    let WalletResponse::Save(outcome) = response else {
        panic!("expected a save outcome");
    };
    assert!(outcome.success);
    assert_eq!(outcome.message.as_deref(), Some(defaults::CONFIRM_IN_SURFACE));
    assert_eq!(outcome.is_duplicate, Some(true));
    assert_eq!(outcome.vc_id.as_deref(), Some("urn:uuid:a"));
    assert_eq!(harness.surface.opens(), 1);

    // Parked in the surface; nothing committed yet.
    let record = harness
        .orchestrator
        .store()
        .pending(RequestClass::CredentialSave)
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RequestStatus::AwaitingDecision);
    assert!(record.is_duplicate);
    assert_eq!(record.duplicate_id.as_deref(), Some("urn:uuid:a"));

    harness
        .orchestrator
        .deliver_decision(SurfaceMessage::CredentialSave { approved: true });
    settle().await;

    // One record, prior identifier, second document's contents.
    let items = harness.orchestrator.credentials().list().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "urn:uuid:a");
    assert_eq!(items[0]["issuanceDate"], "2025-06-01");

    assert!(harness
        .orchestrator
        .store()
        .pending(RequestClass::CredentialSave)
        .unwrap()
        .is_none());
    assert!(harness
        .drain_notifications()
        .iter()
        .any(|n| matches!(
            n,
            Notification::CredentialSaved {
                is_duplicate: true,
                ..
            }
        )));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_save_rejection_keeps_the_original() {
    let mut harness = Harness::new();
    harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:a", "2024-01-01")))
        .await;
    harness.drain_notifications();

    harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:b", "2025-06-01")))
        .await;
    harness
        .orchestrator
        .deliver_decision(SurfaceMessage::CredentialSave { approved: false });
    settle().await;

    let items = harness.orchestrator.credentials().list().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["issuanceDate"], "2024-01-01");
    assert!(harness
        .orchestrator
        .store()
        .pending(RequestClass::CredentialSave)
        .unwrap()
        .is_none());
    assert!(harness.drain_notifications().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_confirmation_timeout_discards_the_save() {
    let harness = Harness::new();
    harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:a", "2024-01-01")))
        .await;
    harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:b", "2025-06-01")))
        .await;
    settle().await;

    tokio::time::advance(defaults::DECISION_WAIT + Duration::from_millis(1)).await;
    settle().await;

    let items = harness.orchestrator.credentials().list().unwrap();
    assert_eq!(items[0]["issuanceDate"], "2024-01-01");
    assert!(harness
        .orchestrator
        .store()
        .pending(RequestClass::CredentialSave)
        .unwrap()
        .is_none());

    // The stale confirmation is inert.
    assert!(!harness
        .orchestrator
        .deliver_decision(SurfaceMessage::CredentialSave { approved: true }));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_duplicate_save_is_single_flight() {
    let harness = Harness::new();
    harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:a", "2024-01-01")))
        .await;

    harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:b", "2025-06-01")))
        .await;

    let response = harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:c", "2026-01-01")))
        .await;
    let WalletResponse::Save(outcome) = response else {
        panic!("expected a save outcome");
    };
    assert!(!outcome.success);
    assert_eq!(
        outcome.error.as_deref(),
        Some("credential-save request already in progress")
    );

    harness
        .orchestrator
        .deliver_decision(SurfaceMessage::CredentialSave { approved: false });
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn test_direct_save_overwrites_without_the_surface() {
    let mut harness = Harness::new();
    harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:a", "2024-01-01")))
        .await;
    harness.drain_notifications();

    let response = harness
        .orchestrator
        .handle(save_direct(identity_credential("urn:uuid:b", "2025-06-01")))
        .await;
    let WalletResponse::Save(outcome) = response else {
        panic!("expected a save outcome");
    };
    assert!(outcome.success);
    assert_eq!(outcome.vc_id.as_deref(), Some("urn:uuid:a"));
    assert_eq!(outcome.is_duplicate, Some(true));

    assert_eq!(harness.surface.opens(), 0);
    let items = harness.orchestrator.credentials().list().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], "urn:uuid:a");
    assert_eq!(items[0]["issuanceDate"], "2025-06-01");
}

#[tokio::test(start_paused = true)]
async fn test_delete_by_identifier() {
    let harness = Harness::new();
    harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:a", "2024-01-01")))
        .await;

    let response = harness
        .orchestrator
        .handle(WalletRequest::DeleteCredential {
            vc_id: "urn:uuid:a".to_string(),
        })
        .await;
    let WalletResponse::Save(outcome) = response else {
        panic!("expected a save outcome");
    };
    assert!(outcome.success);
    assert!(harness.orchestrator.credentials().list().unwrap().is_empty());

    let response = harness
        .orchestrator
        .handle(WalletRequest::DeleteCredential {
            vc_id: "urn:uuid:a".to_string(),
        })
        .await;
    let WalletResponse::Save(outcome) = response else {
        panic!("expected a save outcome");
    };
    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("credential_not_found"));
}

#[tokio::test(start_paused = true)]
async fn test_issuance_precheck_marks_duplicates_without_saving() {
    let harness = Harness::new();
    harness
        .orchestrator
        .handle(save(identity_credential("urn:uuid:a", "2024-01-01")))
        .await;

    let orchestrator = harness.orchestrator.clone();
    let task = tokio::spawn(async move {
        orchestrator
            .handle(WalletRequest::Issuance {
                vc: identity_credential("urn:uuid:b", "2025-06-01"),
                student: Some(json!({"name": "Alice"})),
                origin: "https://issuer.example".to_string(),
            })
            .await
    });
    settle().await;

    let record = harness
        .orchestrator
        .store()
        .pending(RequestClass::Issuance)
        .unwrap()
        .unwrap();
    assert!(record.is_duplicate);
    assert_eq!(record.duplicate_id.as_deref(), Some("urn:uuid:a"));

    harness
        .orchestrator
        .deliver_decision(SurfaceMessage::Issuance {
            approved: true,
            error: None,
        });
    let WalletResponse::Approval(outcome) = task.await.unwrap() else {
        panic!("expected an approval outcome");
    };
    assert!(outcome.approved);

    // Issuance approval never saves; the issuer page follows up with a
    // save request.
    assert_eq!(harness.orchestrator.credentials().list().unwrap().len(), 1);
    assert!(harness
        .orchestrator
        .store()
        .pending(RequestClass::Issuance)
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn test_direct_soulbound_save_is_refused() {
    let harness = Harness::new();
    let response = harness
        .orchestrator
        .handle(WalletRequest::SaveSoulbound {
            sbt: json!({"id": "sbt:1"}),
            origin: Some("https://verifier.example".to_string()),
        })
        .await;
    let WalletResponse::Save(outcome) = response else {
        panic!("expected a save outcome");
    };
    assert!(!outcome.success);
    assert_eq!(
        outcome.error.as_deref(),
        Some("soulbound records are only stored after a confirmed transaction")
    );
    assert!(harness
        .orchestrator
        .credentials()
        .soulbound_list()
        .unwrap()
        .is_empty());
}
