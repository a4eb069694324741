//! Backend gateway error taxonomy

use thiserror::Error;

use super::Endpoint;

/// Errors raised by a gateway call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The call needs a session and none is stored. Raised before any
    /// network traffic.
    #[error("No session found. Upload a dataset first.")]
    MissingSession { endpoint: Endpoint },

    /// Network or HTTP failure. Displays exactly the message the user should see.
    #[error("{message}")]
    Transport {
        endpoint: Endpoint,
        status: Option<u16>,
        message: String,
    },

    /// A success response that does not match its contract
    #[error("{endpoint}: unexpected response from backend: {message}")]
    Contract { endpoint: Endpoint, message: String },

    /// A request for the same endpoint is already outstanding
    #[error("{0}: a request is already in progress")]
    Busy(Endpoint),
}

impl ApiError {
    pub fn missing_session(endpoint: Endpoint) -> Self {
        ApiError::MissingSession { endpoint }
    }

    pub fn transport(endpoint: Endpoint, status: Option<u16>, message: impl Into<String>) -> Self {
        ApiError::Transport {
            endpoint,
            status,
            message: message.into(),
        }
    }

    pub fn contract(endpoint: Endpoint, message: impl Into<String>) -> Self {
        ApiError::Contract {
            endpoint,
            message: message.into(),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            ApiError::MissingSession { endpoint }
            | ApiError::Transport { endpoint, .. }
            | ApiError::Contract { endpoint, .. } => *endpoint,
            ApiError::Busy(endpoint) => *endpoint,
        }
    }

    /// HTTP status of a transport failure, if the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_missing_session(&self) -> bool {
        matches!(self, ApiError::MissingSession { .. })
    }

    /// Contract drift between client and backend, not something the user can fix
    pub fn is_contract_error(&self) -> bool {
        matches!(self, ApiError::Contract { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_displays_message_only() {
        let err = ApiError::transport(Endpoint::Upload, Some(413), "file too large");
        assert_eq!(err.to_string(), "file too large");
        assert_eq!(err.status(), Some(413));
        assert_eq!(err.endpoint(), Endpoint::Upload);
    }

    #[test]
    fn test_kinds_are_distinct() {
        let missing = ApiError::missing_session(Endpoint::Eda);
        assert!(missing.is_missing_session());
        assert!(!missing.is_contract_error());
        assert_eq!(missing.status(), None);

        let contract = ApiError::contract(Endpoint::Train, "missing field `models`");
        assert!(contract.is_contract_error());
        assert_eq!(
            contract.to_string(),
            "train: unexpected response from backend: missing field `models`"
        );

        assert_eq!(
            ApiError::Busy(Endpoint::Preprocess).to_string(),
            "preprocess: a request is already in progress"
        );
    }
}
