//! Saved credential and soulbound record lists.
//!
//! Backed by the durable store's `savedVCs` and `savedSBTs` slots. All
//! mutation goes through the orchestrator; the approval surface only reads.

use serde_json::Value;

use crate::credential::Credential;
use crate::defaults;
use crate::error::BridgeError;
use crate::pending::unix_millis;
use crate::store::BridgeStore;

/// Result of committing a credential save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Identifier of the stored record. On overwrite this is the prior
    /// record's identifier, which the replacement keeps.
    pub vc_id: String,
    /// Whether an existing record was overwritten.
    pub replaced: bool,
}

/// CRUD over the saved credential and soulbound lists.
#[derive(Clone)]
pub struct CredentialStore {
    store: BridgeStore,
}

impl CredentialStore {
    /// Wraps the durable store.
    #[must_use]
    pub const fn new(store: BridgeStore) -> Self {
        Self { store }
    }

    /// Returns all saved credentials.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn list(&self) -> Result<Vec<Value>, BridgeError> {
        self.store.record_list(defaults::KEY_SAVED_CREDENTIALS)
    }

    /// Finds the saved credential sharing `credential`'s dedup key, if any.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn find_duplicate(
        &self,
        credential: &Credential,
    ) -> Result<Option<Credential>, BridgeError> {
        let Some(key) = credential.dedup_key() else {
            return Ok(None);
        };
        let items = self.list()?;
        Ok(items
            .into_iter()
            .map(Credential)
            .find(|saved| saved.dedup_key().as_ref() == Some(&key)))
    }

    /// Commits `credential`, overwriting the record with a matching dedup
    /// key if one exists.
    ///
    /// An overwrite replaces the stored document in place but preserves the
    /// prior record's identifier, so references held by verifiers stay
    /// valid and the list size is unchanged.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or written.
    pub fn save(&self, credential: &Credential) -> Result<SaveReceipt, BridgeError> {
        let mut items = self.store.record_list(defaults::KEY_SAVED_CREDENTIALS)?;
        let key = credential.dedup_key();
        let existing = key.and_then(|key| {
            items
                .iter()
                .position(|saved| Credential(saved.clone()).dedup_key().as_ref() == Some(&key))
        });

        let receipt = if let Some(index) = existing {
            let prior_id = Credential(items[index].clone())
                .id()
                .map(str::to_string);
            let mut replacement = credential.0.clone();
            if let (Some(id), Some(object)) = (&prior_id, replacement.as_object_mut()) {
                object.insert("id".to_string(), Value::String(id.clone()));
            }
            items[index] = replacement;
            SaveReceipt {
                vc_id: prior_id
                    .or_else(|| credential.id().map(str::to_string))
                    .unwrap_or_default(),
                replaced: true,
            }
        } else {
            items.push(credential.0.clone());
            SaveReceipt {
                vc_id: credential.id().map(str::to_string).unwrap_or_default(),
                replaced: false,
            }
        };

        self.store
            .put_record_list(defaults::KEY_SAVED_CREDENTIALS, items)?;
        Ok(receipt)
    }

    /// Deletes the saved credential with identifier `vc_id`.
    ///
    /// # Errors
    /// Returns [`BridgeError::CredentialNotFound`] if no record matches, or
    /// a storage error.
    pub fn delete(&self, vc_id: &str) -> Result<(), BridgeError> {
        let mut items = self.store.record_list(defaults::KEY_SAVED_CREDENTIALS)?;
        let index = items
            .iter()
            .position(|saved| saved.get("id").and_then(Value::as_str) == Some(vc_id))
            .ok_or(BridgeError::CredentialNotFound)?;
        let removed = items.remove(index);
        self.store
            .put_record_list(defaults::KEY_SAVED_CREDENTIALS, items)?;
        log::info!(
            "deleted credential {vc_id} (type {})",
            Credential(removed).credential_type().unwrap_or("unknown")
        );
        Ok(())
    }

    /// Returns all saved soulbound records.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn soulbound_list(&self) -> Result<Vec<Value>, BridgeError> {
        self.store.record_list(defaults::KEY_SAVED_SOULBOUND)
    }

    /// Upserts a soulbound record after a confirmed transaction.
    ///
    /// The record identifier is the descriptor's `id` field, falling back to
    /// `sbt:<tx hash>` (or a timestamp when even the hash is missing).
    /// Returns the identifier used.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read or written.
    pub fn save_soulbound(
        &self,
        descriptor: &Value,
        tx_hash: Option<&str>,
    ) -> Result<String, BridgeError> {
        let id = descriptor
            .get("id")
            .and_then(Value::as_str)
            .map_or_else(
                || {
                    tx_hash.map_or_else(
                        || format!("sbt:{}", unix_millis()),
                        |hash| format!("sbt:{hash}"),
                    )
                },
                str::to_string,
            );

        let mut items = self.store.record_list(defaults::KEY_SAVED_SOULBOUND)?;
        let existing = items
            .iter()
            .position(|saved| saved.get("id").and_then(Value::as_str) == Some(id.as_str()));
        match existing {
            Some(index) => items[index] = descriptor.clone(),
            None => items.push(descriptor.clone()),
        }
        self.store
            .put_record_list(defaults::KEY_SAVED_SOULBOUND, items)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn store() -> CredentialStore {
        CredentialStore::new(BridgeStore::new(Arc::new(MemoryStore::new())))
    }

    fn identity_credential(id: &str, issuance_date: &str) -> Credential {
        Credential(json!({
            "id": id,
            "issuer": { "id": "https://gov.example/moi" },
            "credentialSubject": { "id": "did:ethr:0xABC" },
            "type": ["VerifiableCredential", "IdentityCredential"],
            "issuanceDate": issuance_date
        }))
    }

    #[test]
    fn test_first_save_appends() {
        let store = store();
        let receipt = store
            .save(&identity_credential("urn:uuid:a", "2024-01-01"))
            .unwrap();
        assert!(!receipt.replaced);
        assert_eq!(receipt.vc_id, "urn:uuid:a");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_save_overwrites_and_preserves_identifier() {
        let store = store();
        store
            .save(&identity_credential("urn:uuid:a", "2024-01-01"))
            .unwrap();
        let receipt = store
            .save(&identity_credential("urn:uuid:b", "2025-06-01"))
            .unwrap();

        assert!(receipt.replaced);
        assert_eq!(receipt.vc_id, "urn:uuid:a");

        let items = store.list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], "urn:uuid:a");
        assert_eq!(items[0]["issuanceDate"], "2025-06-01");
    }

    #[test]
    fn test_differing_key_field_appends() {
        let store = store();
        store
            .save(&identity_credential("urn:uuid:a", "2024-01-01"))
            .unwrap();

        let mut other_subject = identity_credential("urn:uuid:c", "2024-01-01");
        other_subject.0["credentialSubject"]["id"] = json!("did:ethr:0xDEF");
        store.save(&other_subject).unwrap();

        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_find_duplicate_matches_on_the_triple() {
        let store = store();
        store
            .save(&identity_credential("urn:uuid:a", "2024-01-01"))
            .unwrap();

        let probe = identity_credential("urn:uuid:z", "2030-01-01");
        let duplicate = store.find_duplicate(&probe).unwrap().unwrap();
        assert_eq!(duplicate.id(), Some("urn:uuid:a"));
    }

    #[test]
    fn test_delete_unknown_id_is_an_error() {
        let store = store();
        assert!(matches!(
            store.delete("urn:uuid:missing"),
            Err(BridgeError::CredentialNotFound)
        ));
    }

    #[test]
    fn test_delete_removes_the_record() {
        let store = store();
        store
            .save(&identity_credential("urn:uuid:a", "2024-01-01"))
            .unwrap();
        store.delete("urn:uuid:a").unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_soulbound_upsert_by_identifier() {
        let store = store();
        let id = store
            .save_soulbound(&json!({"id": "sbt:1", "tokenURI": "ipfs://a"}), None)
            .unwrap();
        assert_eq!(id, "sbt:1");

        store
            .save_soulbound(&json!({"id": "sbt:1", "tokenURI": "ipfs://b"}), None)
            .unwrap();
        let items = store.soulbound_list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["tokenURI"], "ipfs://b");
    }

    #[test]
    fn test_soulbound_identifier_falls_back_to_tx_hash() {
        let store = store();
        let id = store
            .save_soulbound(&json!({"tokenURI": "ipfs://a"}), Some("0xfeed"))
            .unwrap();
        assert_eq!(id, "sbt:0xfeed");
    }
}
