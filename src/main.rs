use clap::Parser;
use pg_subset_sync::psql::Psql;
use pg_subset_sync::{run_subset_sync, Config, SyncError, SyncOpts};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "pg-subset-sync")]
#[command(about = "Copy an FK-consistent subset of rows around one root row between PostgreSQL databases")]
#[command(long_about = None)]
struct Cli {
    /// Table containing the root row
    root_table: String,

    /// Value of the root row's id column
    root_id: String,

    /// Path to the JSON endpoint config
    #[arg(long, default_value = ".env")]
    config: PathBuf,

    /// Working directory for extracted table files
    #[arg(long, default_value = "query_order_results")]
    output_dir: PathBuf,

    /// Plan and write scripts without executing psql
    #[arg(long)]
    dry_run: bool,

    /// Keep loading remaining tables after a per-table load failure
    #[arg(long)]
    best_effort: bool,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load config: {e:#}");
            process::exit(1);
        }
    };

    let opts = SyncOpts {
        root_table: cli.root_table,
        root_id: cli.root_id,
        output_dir: cli.output_dir,
        dry_run: cli.dry_run,
        best_effort: cli.best_effort,
    };

    if let Err(e) = run_subset_sync(&config, &opts, &Psql).await {
        tracing::error!("Subset sync failed: {e:#}");
        // psql failures forward the child's exit code; everything else is a
        // plain runtime error.
        let code = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<SyncError>())
            .map(SyncError::exit_code)
            .unwrap_or(1);
        process::exit(code);
    }
}
