use crate::types::DbId;

/// Failures that are not specific to token rotation.
///
/// The API layer maps each variant onto one HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wire code sent in the `code` field of error responses.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_entity() {
        let err = CoreError::NotFound {
            entity: "Session",
            id: 9,
        };
        assert_eq!(err.to_string(), "Session 9 not found");
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
