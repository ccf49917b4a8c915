use sentinel_rotation::RotationError;

use crate::storage::StoreError;

/// Errors surfaced by the client coordinator and its backends.
///
/// Must stay `Clone`: callers joining one in-flight rotation share its result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The rotation backend rejected the operation.
    #[error(transparent)]
    Rotation(#[from] RotationError),

    /// No rotation token or user is held locally.
    #[error("Not signed in")]
    NotSignedIn,

    /// The server rejected or did not receive the bearer credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The server returned an error outside the rotation taxonomy.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The local secret store failed.
    #[error("Secret store error: {0}")]
    Store(String),
}

impl ClientError {
    /// Whether the current token is known to be dead and the user must sign
    /// in again.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            ClientError::Rotation(RotationError::TokenReuseDetected) | ClientError::NotSignedIn
        )
    }
}

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        ClientError::Store(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}
