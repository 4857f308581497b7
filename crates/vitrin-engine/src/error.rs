//! # Engine Error Types
//!
//! Orchestration-level errors. Each service returns `EngineResult`; callers
//! pattern-match the closed set of domain outcomes inside
//! [`EngineError::Core`] and treat the other variants as infrastructure
//! failures (retryable, nothing mutated).

use thiserror::Error;

use vitrin_core::{CoreError, ValidationError};
use vitrin_db::DbError;

use crate::gateway::GatewayError;

/// Errors surfaced by the engine services.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the operation. The store is unchanged.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The persistence layer failed (connection, constraint, migration).
    #[error(transparent)]
    Db(#[from] DbError),

    /// The external payment gateway failed or timed out. The engine never
    /// guesses success; the order stays where it was for a later retry.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_wraps_into_core() {
        let err: EngineError = ValidationError::EmptyBasket.into();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::Validation(ValidationError::EmptyBasket))
        ));
    }
}
