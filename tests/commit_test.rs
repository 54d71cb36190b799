mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{row, setup_engine, wide_rows, InMemoryMappingServer};
use etl_stage::database::entities::{
    stage_databases, stage_fields, stage_services, stage_tables, EntityStatus,
};
use etl_stage::payload::{ChangeSet, MappingRow};
use etl_stage::remote::MappingServer;
use etl_stage::services::{
    CommitOutcome, CommitPhase, FieldPatch, NewField, NewService, ServicePatch, TablePatch,
};
use etl_stage::{StageError, StageResult};
use tokio::sync::Notify;

fn new_field(name: &str) -> NewField {
    NewField {
        source_name: name.to_string(),
        source_type: "NUMBER".to_string(),
        target_name: name.to_string(),
        target_type: "INT".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn commit_without_changes_never_reaches_the_server() {
    let engine = setup_engine().await;
    let server = InMemoryMappingServer::with_rows(wide_rows());
    engine.hydrate_from(&server).await.unwrap();

    let outcome = engine.commit(&server).await.unwrap();

    assert_eq!(outcome, CommitOutcome::NoChanges);
    assert!(server.received().is_empty());
    assert_eq!(engine.commit_phase().await, CommitPhase::Idle);
    assert!(!engine.is_loading());
}

#[tokio::test]
async fn invalid_tree_is_not_sent() {
    let engine = setup_engine().await;
    let server = InMemoryMappingServer::with_rows(wide_rows());
    engine.hydrate_from(&server).await.unwrap();
    engine.mutations().delete_field(101).await.unwrap();

    let err = engine.commit(&server).await.unwrap_err();

    assert_eq!(err.violations().len(), 1);
    assert!(server.received().is_empty());
    assert_eq!(engine.commit_phase().await, CommitPhase::Idle);
    // The pending delete is still there to fix and retry
    assert_eq!(engine.pending_summary().await.unwrap().deleted, 1);
}

#[tokio::test]
async fn rejected_commit_keeps_pending_edits() {
    let engine = setup_engine().await;
    let server = InMemoryMappingServer::with_rows(wide_rows());
    engine.hydrate_from(&server).await.unwrap();
    let table = engine.store().table_ancestry(1).await.unwrap().table;
    engine
        .mutations()
        .add_field(table.id, new_field("amount"))
        .await
        .unwrap();
    let before = engine.collect_changes().await.unwrap();

    server.reject_commits(true);
    let err = engine.commit(&server).await.unwrap_err();

    assert!(matches!(err, StageError::Remote(_)));
    assert_eq!(engine.collect_changes().await.unwrap(), before);
    assert_eq!(engine.commit_phase().await, CommitPhase::Idle);
    assert!(!engine.is_loading());

    server.reject_commits(false);
    let retried = engine.commit(&server).await.unwrap();
    assert!(matches!(retried, CommitOutcome::Committed { .. }));
}

#[tokio::test]
async fn successful_commit_reloads_server_state() {
    let engine = setup_engine().await;
    let server = InMemoryMappingServer::with_rows(wide_rows());
    engine.hydrate_from(&server).await.unwrap();
    let ancestry = engine.store().table_ancestry(1).await.unwrap();
    let mutations = engine.mutations();

    mutations
        .update_table(
            ancestry.table.id,
            TablePatch {
                name: Some("orders".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    mutations
        .update_field(
            102,
            FieldPatch {
                target_name: Some("full_name".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    mutations.delete_field(103).await.unwrap();
    mutations
        .add_field(ancestry.table.id, new_field("amount"))
        .await
        .unwrap();

    let outcome = engine.commit(&server).await.unwrap();
    let CommitOutcome::Committed { summary, hydration } = outcome else {
        panic!("expected a committed outcome");
    };
    assert_eq!((summary.deleted, summary.updated, summary.added), (1, 2, 1));
    assert_eq!(hydration.fields, 12);
    assert_eq!(server.received().len(), 1);

    // Everything is back to unchanged and matches the server
    assert!(engine.collect_changes().await.unwrap().is_empty());
    let store = engine.store();
    let fields = store.get_all::<stage_fields::Entity>(true).await.unwrap();
    assert!(fields
        .iter()
        .all(|f| f.entity_status().unwrap() == EntityStatus::Unchanged));
    assert!(fields.iter().all(|f| f.id != 103));
    assert!(fields.iter().any(|f| f.target_name == "full_name"));

    let renamed = store
        .get_all::<stage_tables::Entity>(false)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.current_name == "orders")
        .unwrap();
    assert_eq!(renamed.original_name, "orders");
    assert_eq!(renamed.field_count, 3);

    // The new field now carries the server's id
    let amount = fields.iter().find(|f| f.source_name == "amount").unwrap();
    assert_eq!(amount.id, 113);
    assert_eq!(server.rows().len(), 12);
}

#[tokio::test]
async fn revert_needs_confirmation_then_discards_edits() {
    let engine = setup_engine().await;
    let server = InMemoryMappingServer::with_rows(wide_rows());
    engine.hydrate_from(&server).await.unwrap();
    engine
        .mutations()
        .add_service(NewService {
            name: "svc2".to_string(),
            target_db_type: "postgres".to_string(),
        })
        .await
        .unwrap();
    engine.mutations().delete_field(105).await.unwrap();

    let err = engine.revert(&server, false).await.unwrap_err();
    assert!(matches!(err, StageError::RevertNotConfirmed));
    assert_eq!(engine.counts().await.unwrap().services, 2);

    let report = engine.revert(&server, true).await.unwrap();
    assert_eq!(report.services, 1);
    assert_eq!(report.fields, 12);
    assert!(engine.collect_changes().await.unwrap().is_empty());
    assert!(server.received().is_empty());
}

#[tokio::test]
async fn changing_a_service_target_type_reaches_the_server() {
    let engine = setup_engine().await;
    let server = InMemoryMappingServer::with_rows(wide_rows());
    engine.hydrate_from(&server).await.unwrap();
    let service = engine
        .store()
        .get_all::<stage_services::Entity>(false)
        .await
        .unwrap()
        .remove(0);

    engine
        .mutations()
        .update_service(
            service.id,
            ServicePatch {
                target_db_type: Some("postgres".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let outcome = engine.commit(&server).await.unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed { .. }));

    let sent = &server.received()[0].services.updated[0];
    assert_eq!(sent.key.target_db_type, "mysql");
    assert_eq!(sent.target_db_type, "postgres");
    assert_eq!(server.rows().len(), 12);
    assert!(server.rows().iter().all(|r| r.target_db_type == "postgres"));

    let reloaded = engine
        .store()
        .get_all::<stage_services::Entity>(false)
        .await
        .unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].target_db_type, "postgres");
    assert_eq!(reloaded[0].original_target_db_type, "postgres");
    assert_eq!(reloaded[0].entity_status().unwrap(), EntityStatus::Unchanged);
}

#[tokio::test]
async fn deleting_a_database_spares_its_namesake_under_another_target_type() {
    let mut rows = vec![
        row(1, "svc1", "d1", "t1", "id", true, 1),
        row(2, "svc1", "d1", "t1", "id", true, 1),
        row(3, "svc1", "d2", "t1", "id", true, 1),
    ];
    rows[1].target_db_type = "postgres".to_string();
    rows[2].target_db_type = "postgres".to_string();
    let engine = setup_engine().await;
    let server = InMemoryMappingServer::with_rows(rows);
    engine.hydrate_from(&server).await.unwrap();
    assert_eq!(engine.counts().await.unwrap().services, 2);

    let store = engine.store();
    let postgres = store
        .get_all::<stage_services::Entity>(false)
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.target_db_type == "postgres")
        .unwrap();
    let doomed = store
        .get_children::<stage_databases::Entity>(postgres.id, false)
        .await
        .unwrap()
        .into_iter()
        .find(|d| d.current_name == "d1")
        .unwrap();
    engine.mutations().delete_database(doomed.id).await.unwrap();

    engine.commit(&server).await.unwrap();

    let sent = &server.received()[0].databases.deleted;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].target_db_type, "postgres");
    let mut left: Vec<_> = server.rows().iter().map(|r| r.id).collect();
    left.sort_unstable();
    assert_eq!(left, vec![1, 3]);
    assert_eq!(engine.counts().await.unwrap().databases, 2);
}

/// Holds `fetch_rows` open until released, so a test can act mid-hydration.
struct StalledServer {
    rows: Vec<MappingRow>,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl MappingServer for StalledServer {
    async fn fetch_rows(&self) -> StageResult<Vec<MappingRow>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.rows.clone())
    }

    async fn apply_changes(&self, _changes: &ChangeSet) -> StageResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn edits_are_refused_while_hydrating() {
    let engine = setup_engine().await;
    let server = Arc::new(StalledServer {
        rows: vec![row(1, "svc1", "d1", "t1", "id", true, 1)],
        entered: Notify::new(),
        release: Notify::new(),
    });

    let loading = {
        let engine = engine.clone();
        let server = server.clone();
        tokio::spawn(async move { engine.hydrate_from(server.as_ref()).await })
    };
    server.entered.notified().await;

    assert!(engine.is_loading());
    let err = engine
        .mutations()
        .add_service(NewService {
            name: "svc9".to_string(),
            target_db_type: "mysql".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StageError::Busy));
    let err = engine.commit(server.as_ref()).await.unwrap_err();
    assert!(matches!(err, StageError::Busy));

    server.release.notify_one();
    let report = loading.await.unwrap().unwrap();
    assert_eq!(report.fields, 1);
    assert!(!engine.is_loading());
    assert_eq!(engine.counts().await.unwrap().services, 1);
}
