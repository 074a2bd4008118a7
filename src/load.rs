//! Load script generation against the destination database.
//!
//! One transaction per table: a failed load rolls back that table alone and
//! the orchestrator decides whether the run continues.

use crate::extract::{table_file, COPY_OPTIONS};
use std::path::Path;

/// Append `table`'s extracted file into the destination.
pub fn load_script(table: &str, dir: &Path) -> String {
    format!(
        "BEGIN;\n\\copy \"{table}\" FROM '{}' {COPY_OPTIONS};\nCOMMIT;\n",
        table_file(dir, table).display()
    )
}
