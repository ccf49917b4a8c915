//! Rotation error taxonomy.
//!
//! Missing, revoked and expired tokens all surface as
//! [`RotationError::TokenReuseDetected`]. The ledger distinguishes them
//! internally (see [`sentinel_db::TokenLookup`]) and the engine logs the
//! distinction, but the public error is the same for all three so callers
//! cannot infer ledger state.

use sentinel_core::error::CoreError;
use sentinel_db::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RotationError {
    /// The presented token is malformed (empty, oversized, padded).
    #[error("Invalid rotation token: {0}")]
    InvalidToken(String),

    /// Some other part of the request is malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Registration of a hash that is already live.
    #[error("Rotation token is already registered")]
    DuplicateToken,

    /// The token is not a currently valid rotation credential. Security
    /// critical: the caller must tear down the local session.
    #[error("Rotation token reuse detected")]
    TokenReuseDetected,

    /// The credential issuer failed or timed out. Retryable; the presented
    /// token is still valid.
    #[error("Credential issuer failure: {0}")]
    IssuerFailure(String),

    /// The ledger failed. Retryable; never implies reuse or success.
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl RotationError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            RotationError::InvalidToken(_) => "INVALID_TOKEN",
            RotationError::Validation(_) => "VALIDATION_ERROR",
            RotationError::DuplicateToken => "CONFLICT",
            RotationError::TokenReuseDetected => "TOKEN_REUSE_DETECTED",
            RotationError::IssuerFailure(_) => "ISSUER_FAILURE",
            RotationError::Storage(_) => "STORAGE_FAILURE",
        }
    }

    /// Whether retrying the same request later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RotationError::IssuerFailure(_) | RotationError::Storage(_)
        )
    }

    /// Rebuild an error from its wire code and message.
    pub fn from_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "INVALID_TOKEN" => RotationError::InvalidToken(message),
            "VALIDATION_ERROR" => RotationError::Validation(message),
            "CONFLICT" => RotationError::DuplicateToken,
            "TOKEN_REUSE_DETECTED" => RotationError::TokenReuseDetected,
            "ISSUER_FAILURE" => RotationError::IssuerFailure(message),
            _ => RotationError::Storage(message),
        }
    }
}

impl From<LedgerError> for RotationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound => RotationError::TokenReuseDetected,
            LedgerError::ConstraintViolation(_) => RotationError::DuplicateToken,
            LedgerError::Database(e) => {
                tracing::error!(error = %e, "Ledger storage failure");
                RotationError::Storage(e.to_string())
            }
        }
    }
}

impl From<CoreError> for RotationError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => RotationError::Validation(msg),
            other => RotationError::Storage(other.to_string()),
        }
    }
}
