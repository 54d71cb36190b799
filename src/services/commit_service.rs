use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::errors::{StageError, StageResult};
use crate::payload::ChangeSummary;
use crate::remote::MappingServer;
use crate::services::diff_collector::DiffCollector;
use crate::services::hydration_service::{HydrationReport, HydrationService};
use crate::services::loading_gate::LoadingGate;
use crate::services::validation::StructureValidator;

/// Where a commit currently is. Every failure lands back on `Idle`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitPhase {
    #[default]
    Idle,
    Validating,
    Collecting,
    Sending,
    Reconciling,
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CommitPhase::Idle => "idle",
            CommitPhase::Validating => "validating",
            CommitPhase::Collecting => "collecting",
            CommitPhase::Sending => "sending",
            CommitPhase::Reconciling => "reconciling",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// Nothing was pending; the server was not contacted
    NoChanges,
    Committed {
        summary: ChangeSummary,
        hydration: HydrationReport,
    },
}

/// Validate, collect, send, then reload the whole tree from the server.
///
/// The loading gate is held from validation to reconciliation so no edit can slip in
/// between the diff being taken and the store being replaced.
#[derive(Clone)]
pub struct CommitService {
    validator: StructureValidator,
    collector: DiffCollector,
    hydration: HydrationService,
    gate: LoadingGate,
    phase: Arc<RwLock<CommitPhase>>,
}

impl CommitService {
    pub fn new(
        validator: StructureValidator,
        collector: DiffCollector,
        hydration: HydrationService,
        gate: LoadingGate,
    ) -> Self {
        Self {
            validator,
            collector,
            hydration,
            gate,
            phase: Arc::new(RwLock::new(CommitPhase::Idle)),
        }
    }

    pub async fn phase(&self) -> CommitPhase {
        *self.phase.read().await
    }

    pub async fn commit(&self, server: &dyn MappingServer) -> StageResult<CommitOutcome> {
        let _guard = self.gate.begin("commit")?;

        let result = self.run_commit(server).await;
        self.enter(CommitPhase::Idle).await;

        if let Err(err) = &result {
            warn!("Commit failed, pending edits kept: {}", err);
        }
        result
    }

    /// Drop every local edit and reload from the server's current rows.
    ///
    /// Destructive; refuses to run unless `confirmed` is set.
    pub async fn revert(
        &self,
        server: &dyn MappingServer,
        confirmed: bool,
    ) -> StageResult<HydrationReport> {
        if !confirmed {
            return Err(StageError::RevertNotConfirmed);
        }
        let _guard = self.gate.begin("revert")?;

        info!("Reverting all pending edits");
        let rows = server.fetch_rows().await?;
        self.hydration.hydrate(&rows).await
    }

    async fn run_commit(&self, server: &dyn MappingServer) -> StageResult<CommitOutcome> {
        self.enter(CommitPhase::Validating).await;
        self.validator.ensure_valid().await?;

        self.enter(CommitPhase::Collecting).await;
        let changes = self.collector.collect().await?;
        if changes.is_empty() {
            info!("Nothing to commit");
            return Ok(CommitOutcome::NoChanges);
        }
        let summary = changes.summary();

        self.enter(CommitPhase::Sending).await;
        server.apply_changes(&changes).await?;
        info!(
            "Server accepted {} deleted, {} updated, {} added",
            summary.deleted, summary.updated, summary.added
        );

        self.enter(CommitPhase::Reconciling).await;
        let hydration = self.reconcile(server).await?;

        Ok(CommitOutcome::Committed { summary, hydration })
    }

    async fn reconcile(&self, server: &dyn MappingServer) -> StageResult<HydrationReport> {
        let reloaded = match server.fetch_rows().await {
            Ok(rows) => self.hydration.hydrate(&rows).await,
            Err(err) => Err(err),
        };

        // The server already holds the changes; the local tree is stale until reloaded
        if let Err(err) = &reloaded {
            error!("Commit was applied but reloading failed, revert to resync: {}", err);
        }
        reloaded
    }

    async fn enter(&self, phase: CommitPhase) {
        let mut current = self.phase.write().await;
        if *current != phase {
            debug!("Commit phase {} -> {}", *current, phase);
            *current = phase;
        }
    }
}
