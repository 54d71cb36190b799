pub mod commit_service;
pub mod diff_collector;
pub mod entity_store;
pub mod hydration_service;
pub mod loading_gate;
pub mod mutation_service;
pub mod validation;

pub use commit_service::{CommitOutcome, CommitPhase, CommitService};
pub use diff_collector::DiffCollector;
pub use entity_store::{EntityStore, StagedEntity, TableAncestry};
pub use hydration_service::{HydrationReport, HydrationService};
pub use loading_gate::{LoadingGate, LoadingGuard};
pub use mutation_service::{
    CascadeOutcome, DatabasePatch, FieldPatch, MoveDirection, MutationService, NewDatabase,
    NewField, NewService, NewTable, ServicePatch, TablePatch,
};
pub use validation::{FieldCandidate, StructureValidator};
