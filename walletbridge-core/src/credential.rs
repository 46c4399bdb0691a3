//! Verifiable-credential payloads and the deduplication key.
//!
//! Credentials arrive from pages as raw JSON documents. The bridge never
//! validates them cryptographically (out of scope); it only extracts the
//! handful of fields the dedup and display logic needs, tolerating the
//! field-shape variations seen in the wild (`issuer` as object or string,
//! subject identified by `id`, `name` or `studentName`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The generic type marker every verifiable credential carries; ignored when
/// picking the dedup type.
const GENERIC_TYPE_MARKER: &str = "VerifiableCredential";

/// A credential document as received from a page.
///
/// Wrapper over the raw JSON with best-effort accessors; the document itself
/// is stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(pub Value);

impl Credential {
    /// Returns the issuer identifier: the issuer object's `id` field, or the
    /// bare issuer string.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        let issuer = self.0.get("issuer")?;
        issuer
            .get("id")
            .and_then(Value::as_str)
            .or_else(|| issuer.as_str())
    }

    /// Returns the subject identifier: the credential subject's `id`, `name`
    /// or `studentName`, first present wins.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        let subject = self.0.get("credentialSubject")?;
        ["id", "name", "studentName"]
            .iter()
            .find_map(|field| subject.get(field).and_then(Value::as_str))
    }

    /// Returns the first declared type other than the generic
    /// `VerifiableCredential` marker.
    #[must_use]
    pub fn credential_type(&self) -> Option<&str> {
        self.0
            .get("type")?
            .as_array()?
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != GENERIC_TYPE_MARKER)
    }

    /// Returns the record identifier: the document `id`, falling back to the
    /// proof's Merkle root.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0
            .get("id")
            .and_then(Value::as_str)
            .or_else(|| self.0.pointer("/proof/merkleRoot").and_then(Value::as_str))
    }

    /// Computes the dedup key, if all three components are present.
    ///
    /// A credential missing any component never matches another record and
    /// is always appended.
    #[must_use]
    pub fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey {
            issuer: self.issuer()?.to_string(),
            subject: self.subject()?.to_string(),
            credential_type: self.credential_type()?.to_string(),
        })
    }
}

/// The `(issuer, subject, type)` triple deciding whether a saved credential
/// replaces an existing record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    /// Issuer identifier.
    pub issuer: String,
    /// Subject identifier or display name.
    pub subject: String,
    /// First non-generic declared type.
    pub credential_type: String,
}
