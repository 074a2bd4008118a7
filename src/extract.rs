//! Extraction script generation against the source database.
//!
//! The root row is copied out by a dedicated statement; every other table is
//! covered by one transactional script that stages previously-extracted
//! files into TEMP tables and copies a filtered slice of the table out
//! through `\copy`. `\copy` is a client-side psql meta-command, so each
//! statement has to stay on a single line.

use crate::graph::TableGraph;
use crate::plan::Plan;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// COPY options shared by every extraction and load statement: unit
/// separator delimiter, header line, PostgreSQL text format (`\N` nulls, no
/// quoting).
pub const COPY_OPTIONS: &str = "WITH (DELIMITER E'\\x1f', HEADER)";

/// Where one table's extracted rows live inside the working directory.
pub fn table_file(dir: &Path, table: &str) -> PathBuf {
    dir.join(table)
}

/// Case A: copy the single root row out of the source.
pub fn root_extract_script(root: &str, root_id: &str, dir: &Path) -> String {
    format!(
        "\\copy (SELECT * FROM \"{root}\" WHERE id = {root_id}) TO '{}' {COPY_OPTIONS};\n",
        table_file(dir, root).display()
    )
}

/// Build the transactional extraction script covering every non-root table
/// in query order.
pub fn extraction_script(graph: &TableGraph, plan: &Plan, dir: &Path) -> String {
    let mut script = String::from("BEGIN;\n");
    let mut staged: BTreeSet<String> = BTreeSet::new();
    let mut extracted: BTreeSet<&str> = BTreeSet::new();
    extracted.insert(graph.root());

    for table in plan.query_order.iter().filter(|t| t.as_str() != graph.root()) {
        let node = graph.node(table);
        if node.direct_descendant || !node.supporters.is_empty() {
            emit_supporter_filtered(&mut script, graph, table, &mut staged, dir);
        } else {
            emit_dependent_filtered(&mut script, graph, table, &extracted, &mut staged, dir);
        }
        extracted.insert(table);
    }

    script.push_str("COMMIT;\n");
    script
}

/// Case B: restrict `table` to rows joining onto already-extracted supporter
/// keys. Direct descendants only gate on supporters that are themselves
/// direct descendants; outside supporters do not constrain them.
fn emit_supporter_filtered(
    script: &mut String,
    graph: &TableGraph,
    table: &str,
    staged: &mut BTreeSet<String>,
    dir: &Path,
) {
    let node = graph.node(table);
    let join_set: Vec<&str> = node
        .supporters
        .keys()
        .map(String::as_str)
        .filter(|sup| !node.direct_descendant || graph.node(sup).direct_descendant)
        .collect();

    for sup in &join_set {
        stage_once(script, staged, sup, dir);
    }

    let mut stmt = format!("\\copy (SELECT DISTINCT \"{table}\".* FROM \"{table}\"");
    for sup in &join_set {
        let conditions: Vec<String> = graph
            .join_pairs(sup, table)
            .iter()
            .map(|(sup_col, dep_col)| {
                format!("\"{table}\".\"{dep_col}\" = \"TEMP_{sup}\".\"{sup_col}\"")
            })
            .collect();
        let _ = write!(
            stmt,
            " INNER JOIN \"TEMP_{sup}\" ON {}",
            conditions.join(" AND ")
        );
    }
    let _ = writeln!(
        stmt,
        ") TO '{}' {COPY_OPTIONS};",
        table_file(dir, table).display()
    );
    script.push_str(&stmt);
}

/// Case C: an outside table with no supporters is restricted to rows some
/// already-extracted dependent actually references.
fn emit_dependent_filtered(
    script: &mut String,
    graph: &TableGraph,
    table: &str,
    extracted: &BTreeSet<&str>,
    staged: &mut BTreeSet<String>,
    dir: &Path,
) {
    let node = graph.node(table);
    let join_set: Vec<&str> = node
        .dependents
        .keys()
        .map(String::as_str)
        .filter(|dep| extracted.contains(*dep))
        .collect();

    if join_set.is_empty() {
        // No dependent has been extracted yet, so there is nothing to filter
        // against; copy the whole table rather than emit a filter over files
        // that do not exist.
        warn!("no extracted dependent available to filter \"{table}\"; copying it unfiltered");
        let _ = writeln!(
            script,
            "\\copy (SELECT DISTINCT \"{table}\".* FROM \"{table}\") TO '{}' {COPY_OPTIONS};",
            table_file(dir, table).display()
        );
        return;
    }

    for dep in &join_set {
        stage_once(script, staged, dep, dir);
    }

    let mut stmt = format!("\\copy (SELECT DISTINCT \"{table}\".* FROM \"{table}\"");
    let mut null_checks: Vec<String> = Vec::new();
    for dep in &join_set {
        let conditions: Vec<String> = graph
            .inv_join_pairs(table, dep)
            .iter()
            .map(|(dep_col, sup_col)| {
                format!("\"{table}\".\"{sup_col}\" = \"TEMP_{dep}\".\"{dep_col}\"")
            })
            .collect();
        let _ = write!(
            stmt,
            " LEFT JOIN \"TEMP_{dep}\" ON {}",
            conditions.join(" AND ")
        );
        for dep_col in graph.inv_join_pairs(table, dep).keys() {
            null_checks.push(format!("\"TEMP_{dep}\".\"{dep_col}\" IS NOT NULL"));
        }
    }
    let _ = writeln!(
        stmt,
        " WHERE {}) TO '{}' {COPY_OPTIONS};",
        null_checks.join(" OR "),
        table_file(dir, table).display()
    );
    script.push_str(&stmt);
}

// TEMP tables are created empty from the live table definition and filled
// from the already-extracted file. One staging per table per script.
fn stage_once(script: &mut String, staged: &mut BTreeSet<String>, table: &str, dir: &Path) {
    if !staged.insert(table.to_string()) {
        return;
    }
    let _ = writeln!(
        script,
        "CREATE TEMP TABLE \"TEMP_{table}\" AS SELECT * FROM \"{table}\" WHERE 1=0;"
    );
    let _ = writeln!(
        script,
        "\\copy \"TEMP_{table}\" FROM '{}' {COPY_OPTIONS};",
        table_file(dir, table).display()
    );
}
