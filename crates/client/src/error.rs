use std::fmt;

use crunch_config::ConfigError;

use crate::recon::SnapshotKind;

/// Failure reported by a [`SigningTransport`](crate::transport::SigningTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection, TLS, or timeout failure
    Network(String),
    /// Non-2xx response
    Http { status: u16, body: String },
    /// Response body was not the expected JSON / form encoding
    Json(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Http { status, body } => write!(f, "HTTP {status}: {body}"),
            Self::Json(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug)]
pub enum CrunchError {
    /// The authorization endpoint refused to issue a request token.
    AuthorizationRequest(String),
    /// The verifier was rejected when exchanging for an access token.
    Verification(String),
    /// An API call was attempted without an access token.
    NotAuthenticated,
    /// `complete_authorization` was called without a pending request token.
    NoPendingAuthorization,
    /// Expense type is in neither the liable nor the exempt table.
    UnknownVatClassification(String),
    /// A reconciliation lookup ran before its snapshot was loaded.
    SnapshotNotLoaded(SnapshotKind),
    Transport(TransportError),
    /// Invoice line quantity is NaN, infinite, or negative.
    InvalidQuantity(f64),
    /// Receipt file could not be read.
    Attachment(String),
    /// A response decoded as JSON but not into the expected records.
    Decode(String),
    Config(ConfigError),
}

impl fmt::Display for CrunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthorizationRequest(msg) => write!(f, "authorization request rejected: {msg}"),
            Self::Verification(msg) => write!(f, "verifier rejected: {msg}"),
            Self::NotAuthenticated => {
                write!(f, "not authenticated: complete the authorization handshake first")
            }
            Self::NoPendingAuthorization => {
                write!(f, "no authorization in progress: call begin_authorization first")
            }
            Self::UnknownVatClassification(code) => {
                write!(f, "don't know if expense type {code} is subject to VAT")
            }
            Self::SnapshotNotLoaded(kind) => {
                write!(f, "{kind} snapshot not loaded: call ensure_loaded first")
            }
            Self::Transport(e) => write!(f, "{e}"),
            Self::InvalidQuantity(q) => write!(f, "invalid invoice quantity: {q}"),
            Self::Attachment(msg) => write!(f, "attachment error: {msg}"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::Config(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CrunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for CrunchError {
    fn from(e: TransportError) -> Self {
        CrunchError::Transport(e)
    }
}

impl From<ConfigError> for CrunchError {
    fn from(e: ConfigError) -> Self {
        CrunchError::Config(e)
    }
}
