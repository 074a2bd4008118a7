//! Kahn's algorithm over the discovered graph and the query/insert orders.

use crate::error::SyncError;
use crate::graph::TableGraph;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Table orders for one run.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Direct descendants in topological order.
    pub direct_descendants: Vec<String>,
    /// Outside tables in topological order.
    pub outside_tables: Vec<String>,
    /// Extraction order against the source: direct descendants first, so
    /// their key files exist before outside tables are filtered.
    pub query_order: Vec<String>,
    /// Load order against the destination: the unpartitioned topological
    /// order, so every table loads after all of its supporters.
    pub insert_order: Vec<String>,
}

/// Topologically sort the whole graph with Kahn's algorithm. Supporters come
/// before their dependents. Ties break lexicographically, so the order is
/// reproducible across runs.
pub fn topo_sort(graph: &TableGraph) -> Result<Vec<String>, SyncError> {
    // Disposable edge counts; the graph itself stays immutable.
    let mut remaining: BTreeMap<&str, BTreeSet<&str>> = graph
        .nodes()
        .map(|node| {
            (
                node.name.as_str(),
                node.supporters.keys().map(String::as_str).collect(),
            )
        })
        .collect();

    let mut ready: VecDeque<&str> = remaining
        .iter()
        .filter(|(_, supporters)| supporters.is_empty())
        .map(|(name, _)| *name)
        .collect();

    let mut order: Vec<String> = Vec::with_capacity(graph.len());
    while let Some(name) = ready.pop_front() {
        order.push(name.to_string());
        for dep in graph.node(name).dependents.keys() {
            let supporters = remaining
                .get_mut(dep.as_str())
                .unwrap_or_else(|| panic!("dependent \"{dep}\" missing from the node set"));
            supporters.remove(name);
            if supporters.is_empty() {
                ready.push_back(dep.as_str());
            }
        }
    }

    if order.len() != graph.len() {
        return Err(SyncError::Cycle {
            sorted: order.len(),
            total: graph.len(),
        });
    }
    Ok(order)
}

/// Sort and partition the graph into the run plan.
pub fn plan(graph: &TableGraph) -> Result<Plan, SyncError> {
    let order = topo_sort(graph)?;

    let mut direct_descendants = Vec::new();
    let mut outside_tables = Vec::new();
    for name in &order {
        if graph.node(name).direct_descendant {
            direct_descendants.push(name.clone());
        } else {
            outside_tables.push(name.clone());
        }
    }

    let mut query_order = direct_descendants.clone();
    query_order.extend(outside_tables.iter().cloned());

    Ok(Plan {
        direct_descendants,
        outside_tables,
        query_order,
        insert_order: order,
    })
}
