pub mod common_types;
pub mod stage_databases;
pub mod stage_fields;
pub mod stage_services;
pub mod stage_tables;

pub use common_types::{EntityKind, EntityStatus};
