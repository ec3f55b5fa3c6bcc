//! Error types for credential resolution and directory access
//!
//! Configuration loading, token acquisition and Microsoft Graph calls each
//! have their own error enum. None of them ever escapes the credential
//! validator: it folds every failure into a `ValidationVerdict`.

use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("Failed to read configuration file {path}: {source}")]
    Unreadable {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON.
    #[error("Failed to parse configuration file {path}: {source}")]
    Malformed {
        /// File path.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Token acquisition errors.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The identity provider rejected the credential.
    ///
    /// The message carries the provider's own description, including any
    /// `AADSTS` error code.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The credential source is not available in this environment
    /// (no Azure CLI login, no managed identity endpoint, ...).
    #[error("Credential unavailable: {0}")]
    Unavailable(String),

    /// Demo mode placeholder credential.
    #[error("Demo credential cannot authenticate against a real tenant")]
    Demo,

    /// HTTP request failed.
    #[error("Token request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The token request did not complete in time.
    #[error("Token request timed out after {0:?}")]
    Timeout(Duration),

    /// Unexpected token response shape.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

impl CredentialError {
    /// Whether the identity provider itself rejected the credential.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, CredentialError::AuthenticationFailed(_))
    }
}

/// Microsoft Graph directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The credential could not obtain a token.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Graph rejected the token (401).
    #[error("Graph authentication rejected: {0}")]
    Authentication(String),

    /// Token accepted, but the application lacks permission (403).
    #[error("Graph access forbidden ({code}): {message}")]
    Forbidden {
        /// Graph error code, e.g. `Authorization_RequestDenied`.
        code: String,
        /// Graph error message.
        message: String,
    },

    /// Resource not found (404).
    #[error("Graph resource not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("Graph API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// The call did not complete within the configured timeout.
    #[error("Graph request timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP request failed.
    #[error("Graph request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid response from the API.
    #[error("Invalid Graph response: {0}")]
    InvalidResponse(String),
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

impl DirectoryError {
    /// Whether the failure happened at the identity layer, before Graph
    /// authorized anything.
    pub fn is_authentication_failure(&self) -> bool {
        match self {
            DirectoryError::Credential(inner) => inner.is_authentication_failure(),
            DirectoryError::Authentication(_) => true,
            _ => false,
        }
    }

    /// Whether Graph accepted the token but refused the operation.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, DirectoryError::Forbidden { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_classification() {
        let err = DirectoryError::from(CredentialError::AuthenticationFailed(
            "AADSTS90002: Tenant not found".to_string(),
        ));
        assert!(err.is_authentication_failure());
        assert!(!err.is_forbidden());

        let err = DirectoryError::from(CredentialError::Unavailable("no az".to_string()));
        assert!(!err.is_authentication_failure());
    }

    #[test]
    fn test_forbidden_classification() {
        let err = DirectoryError::Forbidden {
            code: "Authorization_RequestDenied".to_string(),
            message: "Insufficient privileges".to_string(),
        };
        assert!(err.is_forbidden());
    }

    #[test]
    fn test_timeout_message() {
        let err = DirectoryError::Timeout(Duration::from_secs(5));
        assert!(!err.is_authentication_failure());
        assert!(err.to_string().contains("timed out"));
    }
}
