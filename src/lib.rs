//! pg-subset-sync Library
//!
//! A library for extracting a relationally-consistent subset of rows from a
//! source PostgreSQL database and reloading it into a destination database.
//!
//! # How it works
//!
//! Starting from one root row `(table, id)`, the tool walks the foreign-key
//! graph in both directions through `information_schema`, so the extracted
//! subset contains every row the root transitively depends on and every row
//! that transitively depends on it:
//!
//! - Graph expansion: breadth-first discovery of dependents and supporters
//! - Planning: Kahn's algorithm produces the extraction and load orders
//! - Extraction: per-table `\copy` scripts filter each table against
//!   already-extracted key files staged into TEMP tables
//! - Load: extracted files are appended into the destination in
//!   FK-respecting order, one transaction per table
//!
//! Row movement is delegated to server-side `COPY` through the `psql`
//! client program; the process itself never materializes row data.
//!
//! # CLI Usage
//!
//! ```bash
//! # Copy user 42 and everything reachable from it
//! pg-subset-sync users 42
//!
//! # Plan only: write query_order_results/full_script.sql and stop
//! pg-subset-sync users 42 --dry-run
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod introspect;
pub mod load;
pub mod plan;
pub mod psql;
pub mod sync;
pub mod testing;

pub use config::{Config, Endpoint};
pub use error::SyncError;
pub use sync::{run_subset_sync, SyncOpts};
