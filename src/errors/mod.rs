//! Error types for the staging engine
//!
//! - **StageError**: everything a store, mutator, validator or commit can fail with
//! - **Violation**: one broken structural rule, collected into `StageError::Validation`

pub mod stage;
pub mod violation;

pub use stage::StageError;
pub use violation::{format_violations, Violation};

/// Result type alias for staging operations
pub type StageResult<T> = Result<T, StageError>;
