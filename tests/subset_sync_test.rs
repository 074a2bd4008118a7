//! Orchestrator pipeline tests driven through the in-memory catalog and the
//! recording psql runner.

use pg_subset_sync::sync::{sync_with_source, SyncOpts};
use pg_subset_sync::testing::{storefront_catalog, test_config, RecordingRunner};
use pg_subset_sync::SyncError;
use std::path::PathBuf;

fn opts(output_dir: PathBuf) -> SyncOpts {
    SyncOpts {
        root_table: "users".to_string(),
        root_id: "42".to_string(),
        output_dir,
        dry_run: false,
        best_effort: false,
    }
}

#[tokio::test]
async fn test_full_pipeline_script_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new();

    sync_with_source(
        &test_config(),
        &opts(dir.path().join("out")),
        &storefront_catalog(),
        &runner,
    )
    .await
    .unwrap();

    let recorded = runner.recorded();
    // Root extraction, the extraction script, then one load per table.
    assert_eq!(recorded.len(), 6);

    assert_eq!(recorded[0].0, "source_db");
    assert!(recorded[0].1.contains("WHERE id = 42"));

    assert_eq!(recorded[1].0, "source_db");
    assert!(recorded[1].1.starts_with("BEGIN;\n"));
    assert!(recorded[1].1.ends_with("COMMIT;\n"));

    // Loads run against the destination in FK-valid order: products must
    // land before order_items even though it is extracted last.
    let load_order: Vec<&str> = recorded[2..]
        .iter()
        .map(|(db, script)| {
            assert_eq!(db, "destination_db");
            let start = script.find("\\copy \"").expect("load script shape") + 7;
            let end = script[start..].find('"').unwrap() + start;
            &script[start..end]
        })
        .collect();
    assert_eq!(load_order, vec!["products", "users", "orders", "order_items"]);
}

#[tokio::test]
async fn test_extraction_always_precedes_loads() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new();

    sync_with_source(
        &test_config(),
        &opts(dir.path().join("out")),
        &storefront_catalog(),
        &runner,
    )
    .await
    .unwrap();

    let recorded = runner.recorded();
    let last_source = recorded
        .iter()
        .rposition(|(db, _)| db == "source_db")
        .unwrap();
    let first_destination = recorded
        .iter()
        .position(|(db, _)| db == "destination_db")
        .unwrap();
    assert!(last_source < first_destination);
}

#[tokio::test]
async fn test_dry_run_writes_scripts_but_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let runner = RecordingRunner::new();
    let opts = SyncOpts {
        dry_run: true,
        ..opts(out.clone())
    };

    sync_with_source(&test_config(), &opts, &storefront_catalog(), &runner)
        .await
        .unwrap();

    assert!(runner.recorded().is_empty());

    let script = std::fs::read_to_string(out.join("full_script.sql")).unwrap();
    assert!(script.contains("WHERE id = 42"));
    assert!(script.contains("CREATE TEMP TABLE \"TEMP_users\""));

    let info = std::fs::read_to_string(out.join("graph-info.txt")).unwrap();
    assert!(info.contains("direct descendants:\nusers\norders\norder_items\n"));
    assert!(info.contains("outside tables:\nproducts\n"));
    assert!(info.contains("4 tables"));
}

#[tokio::test]
async fn test_load_failure_stops_the_run_and_forwards_the_code() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::failing_on("\\copy \"products\" FROM");

    let err = sync_with_source(
        &test_config(),
        &opts(dir.path().join("out")),
        &storefront_catalog(),
        &runner,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("load of \"products\" failed"));
    let sync_err = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<SyncError>())
        .expect("psql error missing from the chain");
    assert_eq!(sync_err.exit_code(), 3);

    // products is the first load; nothing after it ran.
    assert_eq!(runner.recorded().len(), 3);
}

#[tokio::test]
async fn test_best_effort_keeps_loading_after_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::failing_on("\\copy \"products\" FROM");
    let opts = SyncOpts {
        best_effort: true,
        ..opts(dir.path().join("out"))
    };

    sync_with_source(&test_config(), &opts, &storefront_catalog(), &runner)
        .await
        .unwrap();

    // All four loads were still attempted.
    assert_eq!(runner.recorded().len(), 6);
}

#[tokio::test]
async fn test_missing_root_table_fails_before_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new();
    let opts = SyncOpts {
        root_table: "no_such_table".to_string(),
        ..opts(dir.path().join("out"))
    };

    let err = sync_with_source(&test_config(), &opts, &storefront_catalog(), &runner)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no_such_table"));
    assert!(runner.recorded().is_empty());
}

#[tokio::test]
async fn test_root_without_id_column_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let runner = RecordingRunner::new();
    let catalog = pg_subset_sync::testing::MemoryCatalog::new()
        .with_columns("settings", &["key", "value"]);
    let opts = SyncOpts {
        root_table: "settings".to_string(),
        ..opts(dir.path().join("out"))
    };

    let err = sync_with_source(&test_config(), &opts, &catalog, &runner)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no \"id\" column"));
}
