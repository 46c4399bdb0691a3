use thiserror::Error;

/// Error outputs from the wallet bridge.
///
/// Every variant is caught at the orchestrator boundary and converted into a
/// response message; none of these propagate into the page context as a
/// fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The approval surface could not be shown. Fatal to the request, no
    /// retry.
    #[error("approval surface unavailable")]
    SurfaceUnavailable,
    /// No human decision arrived within the decision window.
    ///
    /// The display text is part of the wire contract: pages match on the
    /// literal `timeout`.
    #[error("timeout")]
    DecisionTimeout,
    /// The executor did not answer a correlated request in time.
    #[error("executor timeout")]
    ExecutorTimeout,
    /// The executor answered with a failure; the message is passed through
    /// verbatim.
    #[error("{0}")]
    ExecutorFailure(String),
    /// A non-terminal request of the same class already exists.
    #[error("{0} request already in progress")]
    AlreadyInProgress(crate::pending::RequestClass),
    /// The request payload is missing a required field.
    #[error("invalid_input: {0}")]
    InvalidInput(&'static str),
    /// No saved credential matches the given identifier.
    #[error("credential_not_found")]
    CredentialNotFound,
    /// Soulbound records are only written after a confirmed transaction.
    #[error("soulbound records are only stored after a confirmed transaction")]
    SoulboundDirectSave,
    /// Unexpected error serializing information.
    #[error("serialization_error: {0}")]
    Serialization(String),
    /// The backing store failed to read or persist a slot.
    #[error("storage_error: {0}")]
    Storage(String),
}

impl BridgeError {
    /// Creates a serialization error from any displayable cause.
    pub fn serialization<E: std::fmt::Display>(err: E) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Creates a storage error from any displayable cause.
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pending::RequestClass;

    #[test]
    fn test_decision_timeout_is_the_literal_wire_text() {
        assert_eq!(BridgeError::DecisionTimeout.to_string(), "timeout");
    }

    #[test]
    fn test_executor_failure_passes_message_through_verbatim() {
        let err = BridgeError::ExecutorFailure("network".to_string());
        assert_eq!(err.to_string(), "network");
    }

    #[test]
    fn test_already_in_progress_names_the_class() {
        let err = BridgeError::AlreadyInProgress(RequestClass::Proof);
        assert_eq!(err.to_string(), "proof request already in progress");
    }
}
