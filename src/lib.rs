//! Local staging engine for ETL schema mappings.
//!
//! The server's mapping (services, source databases, tables, fields) is loaded into a
//! local sqlite store, edited offline with per-record change tracking, and sent back as
//! a single change-set on commit.

pub mod config;
pub mod database;
pub mod engine;
pub mod errors;
pub mod payload;
pub mod remote;
pub mod services;

pub use config::StageConfig;
pub use engine::{StagingEngine, TreeCounts};
pub use errors::{StageError, StageResult};
