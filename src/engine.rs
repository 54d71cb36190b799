use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::database::entities::{
    stage_databases, stage_fields, stage_services, stage_tables,
};
use crate::errors::{StageResult, Violation};
use crate::payload::{ChangeSet, ChangeSummary, MappingRow};
use crate::remote::MappingServer;
use crate::services::{
    CommitOutcome, CommitPhase, CommitService, DiffCollector, EntityStore, HydrationReport,
    HydrationService, LoadingGate, MutationService, StructureValidator,
};

/// Counts of live records per level
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct TreeCounts {
    pub services: usize,
    pub databases: usize,
    pub tables: usize,
    pub fields: usize,
}

/// Entry point tying the store, mutators, validator and commit protocol to one
/// staging database.
///
/// Each engine owns its own connection handle, so independent engines (one per test,
/// say) never share state.
#[derive(Clone)]
pub struct StagingEngine {
    store: EntityStore,
    validator: StructureValidator,
    collector: DiffCollector,
    hydration: HydrationService,
    mutations: MutationService,
    commits: CommitService,
    gate: LoadingGate,
}

impl StagingEngine {
    pub fn new(db: DatabaseConnection) -> Self {
        let store = EntityStore::new(db);
        let gate = LoadingGate::new();
        let validator = StructureValidator::new(store.clone());
        let collector = DiffCollector::new(store.clone());
        let hydration = HydrationService::new(store.clone());
        let mutations = MutationService::new(store.clone(), validator.clone(), gate.clone());
        let commits = CommitService::new(
            validator.clone(),
            collector.clone(),
            hydration.clone(),
            gate.clone(),
        );

        Self {
            store,
            validator,
            collector,
            hydration,
            mutations,
            commits,
            gate,
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn mutations(&self) -> &MutationService {
        &self.mutations
    }

    /// True while a hydration, commit or revert holds the store
    pub fn is_loading(&self) -> bool {
        self.gate.is_loading()
    }

    pub async fn commit_phase(&self) -> CommitPhase {
        self.commits.phase().await
    }

    /// Replace the local tree with `rows`
    pub async fn hydrate(&self, rows: &[MappingRow]) -> StageResult<HydrationReport> {
        let _guard = self.gate.begin("hydrate")?;
        self.hydration.hydrate(rows).await
    }

    pub async fn hydrate_from(&self, server: &dyn MappingServer) -> StageResult<HydrationReport> {
        let _guard = self.gate.begin("hydrate")?;
        let rows = server.fetch_rows().await?;
        self.hydration.hydrate(&rows).await
    }

    /// Every structural problem in the live tree; empty when a commit would pass
    pub async fn validate(&self) -> StageResult<Vec<Violation>> {
        self.validator.validate_tree().await
    }

    pub async fn collect_changes(&self) -> StageResult<ChangeSet> {
        self.collector.collect().await
    }

    pub async fn pending_summary(&self) -> StageResult<ChangeSummary> {
        Ok(self.collector.collect().await?.summary())
    }

    pub async fn commit(&self, server: &dyn MappingServer) -> StageResult<CommitOutcome> {
        self.commits.commit(server).await
    }

    pub async fn revert(
        &self,
        server: &dyn MappingServer,
        confirmed: bool,
    ) -> StageResult<HydrationReport> {
        self.commits.revert(server, confirmed).await
    }

    pub async fn counts(&self) -> StageResult<TreeCounts> {
        let counts = TreeCounts {
            services: self.store.get_all::<stage_services::Entity>(false).await?.len(),
            databases: self.store.get_all::<stage_databases::Entity>(false).await?.len(),
            tables: self.store.get_all::<stage_tables::Entity>(false).await?.len(),
            fields: self.store.get_all::<stage_fields::Entity>(false).await?.len(),
        };
        debug!(
            "Staged tree: {} services, {} databases, {} tables, {} fields",
            counts.services, counts.databases, counts.tables, counts.fields
        );
        Ok(counts)
    }
}
