use pg_subset_sync::{Endpoint, SyncOpts};
use std::path::PathBuf;

#[test]
fn test_sync_opts_creation() {
    let opts = SyncOpts {
        root_table: "users".to_string(),
        root_id: "42".to_string(),
        output_dir: PathBuf::from("query_order_results"),
        dry_run: false,
        best_effort: false,
    };

    assert_eq!(opts.root_table, "users");
    assert_eq!(opts.root_id, "42");
    assert_eq!(opts.output_dir, PathBuf::from("query_order_results"));
    assert!(!opts.dry_run);
    assert!(!opts.best_effort);
}

#[test]
fn test_endpoint_connection_string() {
    let endpoint = Endpoint {
        host: "db.internal".to_string(),
        port: 5432,
        db_name: "app".to_string(),
        username: "reader".to_string(),
        password: "secret".to_string(),
        ssl_enabled: false,
    };

    assert_eq!(
        endpoint.connection_string(),
        "host=db.internal port=5432 dbname=app user=reader password=secret"
    );
}
