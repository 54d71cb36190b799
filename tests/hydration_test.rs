mod common;

use common::{row, setup_engine, wide_rows};
use etl_stage::database::entities::{
    stage_databases, stage_fields, stage_services, stage_tables, EntityStatus,
};
use etl_stage::TreeCounts;

#[tokio::test]
async fn single_row_builds_one_record_per_level() {
    let engine = setup_engine().await;
    let report = engine
        .hydrate(&[row(1, "svc1", "d1", "t1", "id", true, 1)])
        .await
        .unwrap();

    assert_eq!(report.services, 1);
    assert_eq!(report.databases, 1);
    assert_eq!(report.tables, 1);
    assert_eq!(report.fields, 1);
    assert_eq!(report.dropped_rows, 0);
    assert_eq!(
        engine.counts().await.unwrap(),
        TreeCounts {
            services: 1,
            databases: 1,
            tables: 1,
            fields: 1
        }
    );
}

#[tokio::test]
async fn rows_are_grouped_and_field_ids_kept() {
    let engine = setup_engine().await;
    engine.hydrate(&wide_rows()).await.unwrap();
    let store = engine.store();

    let services = store.get_all::<stage_services::Entity>(false).await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].database_count, 2);
    assert_eq!(services[0].original_name, "svc1");
    assert_eq!(services[0].current_name, "svc1");

    let databases = store
        .get_children::<stage_databases::Entity>(services[0].id, false)
        .await
        .unwrap();
    let names: Vec<_> = databases.iter().map(|d| d.current_name.as_str()).collect();
    assert_eq!(names, vec!["d1", "d2"]);
    assert_eq!(databases[0].target_db_name, "d1_dw");
    assert_eq!(databases[0].source_db_type, "oracle");
    assert_eq!(databases[0].table_count, 2);

    let tables = store
        .get_children::<stage_tables::Entity>(databases[1].id, false)
        .await
        .unwrap();
    assert_eq!(tables[0].target_name, "t1_dw");
    assert_eq!(tables[0].field_count, 3);

    let fields = store
        .get_children::<stage_fields::Entity>(tables[0].id, false)
        .await
        .unwrap();
    let ids: Vec<_> = fields.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![107, 108, 109]);
    assert!(fields[0].is_primary_key);
    assert!(!fields[1].is_primary_key);
    assert!(fields
        .iter()
        .all(|f| f.entity_status().unwrap() == EntityStatus::Unchanged));
}

#[tokio::test]
async fn rows_missing_a_level_are_dropped_and_counted() {
    let engine = setup_engine().await;
    let no_field = row(2, "svc1", "d1", "t2", "", false, 1);
    let no_database = row(3, "svc2", "", "", "", false, 1);

    let report = engine
        .hydrate(&[row(1, "svc1", "d1", "t1", "id", true, 1), no_field, no_database])
        .await
        .unwrap();

    assert_eq!(report.dropped_rows, 2);
    assert_eq!(report.fields, 1);
    // Ancestors named by a dropped row still exist
    assert_eq!(report.services, 2);
    assert_eq!(report.tables, 2);
}

#[tokio::test]
async fn hydration_replaces_everything_including_pending_edits() {
    let engine = setup_engine().await;
    engine.hydrate(&wide_rows()).await.unwrap();
    engine.mutations().delete_field(101).await.unwrap();
    assert!(!engine.collect_changes().await.unwrap().is_empty());

    engine
        .hydrate(&[row(1, "other", "d9", "t9", "id", true, 1)])
        .await
        .unwrap();

    let store = engine.store();
    let services = store.get_all::<stage_services::Entity>(true).await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].current_name, "other");
    assert_eq!(store.get_all::<stage_fields::Entity>(true).await.unwrap().len(), 1);
    assert!(engine.collect_changes().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_default_value_is_stored_as_none() {
    let engine = setup_engine().await;
    let mut with_empty = row(1, "svc1", "d1", "t1", "id", true, 1);
    with_empty.target_default_value = Some(String::new());
    let mut with_value = row(2, "svc1", "d1", "t1", "flag", false, 2);
    with_value.target_default_value = Some("0".to_string());

    engine.hydrate(&[with_empty, with_value]).await.unwrap();

    let store = engine.store();
    let first = store.require::<stage_fields::Entity>(1).await.unwrap();
    let second = store.require::<stage_fields::Entity>(2).await.unwrap();
    assert_eq!(first.target_default_value, None);
    assert_eq!(second.target_default_value.as_deref(), Some("0"));
}
