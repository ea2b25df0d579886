//! Error types
//!
//! Typed errors for the store gateway and for rejected connections. Neither
//! ever reaches an editor: gateway errors are folded into log lines by the
//! gateway itself, and connection errors refuse the socket at the boundary.

use thiserror::Error;

/// Errors that can occur while talking to the document store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store explicitly does not know this document
    #[error("Document '{document_id}' not found in store")]
    NotFound { document_id: String },

    /// Request never completed (connect, timeout, TLS, body read)
    #[error("Store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Store answered with a non-success status
    #[error("Store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Store answered successfully but the body did not match the contract
    #[error("Malformed store response: {details}")]
    Malformed { details: String },

    /// Store base URL could not be turned into an endpoint
    #[error("Invalid store URL '{url}': {details}")]
    InvalidUrl { url: String, details: String },
}

impl StoreError {
    /// Whether the store told us the document does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Whether the failure happened before the store produced an answer
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Reasons a connection is refused before a session is created
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Origin '{origin}' is not allowed")]
    OriginRejected { origin: String },

    #[error("Origin header missing")]
    MissingOrigin,
}
