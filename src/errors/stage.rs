//! Staging engine error types
//!
//! Errors fall into four groups: user-correctable validation problems (always the
//! full list), missing records addressed by a stale id, failures talking to the
//! mapping server, and cascades that stopped part way through.
//!
//! # Examples
//!
//! ```rust
//! use etl_stage::errors::StageError;
//! use etl_stage::database::entities::EntityKind;
//!
//! let err = StageError::NotFound { kind: EntityKind::Table, id: 7 };
//! assert!(err.is_not_found());
//! assert_eq!(err.to_string(), "table 7 not found");
//! ```

use thiserror::Error;

use super::violation::{format_violations, Violation};
use crate::database::entities::EntityKind;

/// Errors raised by the staging engine
#[derive(Error, Debug)]
pub enum StageError {
    /// One or more structural rules are broken; nothing was written
    #[error("Validation failed: {}", format_violations(.0))]
    Validation(Vec<Violation>),

    /// A mutator was pointed at a record that no longer exists
    #[error("{kind} {id} not found")]
    NotFound {
        kind: EntityKind,
        id: i32,
    },

    /// The mapping server rejected the request or could not be reached
    #[error("Mapping server error: {0}")]
    Remote(String),

    /// A cascading delete stopped after some records were already written
    #[error("Cascade delete of {kind} {id} stopped part way: {source}")]
    CascadeIncomplete {
        kind: EntityKind,
        id: i32,
        #[source]
        source: Box<StageError>,
    },

    /// Hydration, commit or revert is in flight; editing is disabled
    #[error("Staging store is busy reloading; try again once it finishes")]
    Busy,

    /// Revert discards every local edit and needs explicit confirmation
    #[error("Revert discards all pending edits and must be confirmed")]
    RevertNotConfirmed,

    /// A status column held a value outside the known set
    #[error("Invalid entity status '{0}'")]
    InvalidStatus(String),

    /// Input could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl StageError {
    pub fn not_found(kind: EntityKind, id: i32) -> Self {
        StageError::NotFound { kind, id }
    }

    pub fn validation(violation: Violation) -> Self {
        StageError::Validation(vec![violation])
    }

    /// Check if this is a client error (user can fix the input)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StageError::Validation(_)
                | StageError::RevertNotConfirmed
                | StageError::Parse(_)
                | StageError::Busy
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StageError::NotFound { .. })
    }

    /// Violations carried by a validation failure, empty for every other error
    pub fn violations(&self) -> &[Violation] {
        match self {
            StageError::Validation(violations) => violations,
            _ => &[],
        }
    }

    /// Get error code for API responses and CLI exit reporting
    pub fn error_code(&self) -> &'static str {
        match self {
            StageError::Validation(_) | StageError::Parse(_) => "VALIDATION_FAILED",
            StageError::NotFound { .. } => "NOT_FOUND",
            StageError::Remote(_) => "REMOTE_ERROR",
            StageError::CascadeIncomplete { .. } => "CASCADE_INCOMPLETE",
            StageError::Busy => "BUSY",
            StageError::RevertNotConfirmed => "CONFIRMATION_REQUIRED",
            StageError::InvalidStatus(_) => "CORRUPT_STATE",
            StageError::Io(_) => "IO_ERROR",
            StageError::Database(_) => "DATABASE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_violation() {
        let err = StageError::Validation(vec![
            Violation::new(EntityKind::Table, Some(1), "s/d/t", "has no fields"),
            Violation::new(EntityKind::Database, Some(2), "s/e", "has no tables"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: Table 's/d/t': has no fields; Database 's/e': has no tables"
        );
        assert!(err.is_client_error());
        assert_eq!(err.violations().len(), 2);
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[test]
    fn cascade_error_keeps_its_cause() {
        let err = StageError::CascadeIncomplete {
            kind: EntityKind::Service,
            id: 4,
            source: Box::new(StageError::not_found(EntityKind::Table, 12)),
        };
        assert_eq!(
            err.to_string(),
            "Cascade delete of service 4 stopped part way: table 12 not found"
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_client_error());
        assert_eq!(err.error_code(), "CASCADE_INCOMPLETE");
    }

    #[test]
    fn remote_errors_are_not_client_errors() {
        let err = StageError::Remote("503 Service Unavailable".to_string());
        assert!(!err.is_client_error());
        assert!(err.violations().is_empty());
        assert_eq!(err.error_code(), "REMOTE_ERROR");
    }
}
