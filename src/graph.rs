//! The discovered foreign-key graph around the root table.
//!
//! Expansion walks breadth-first from the root, asking the schema source for
//! dependents and supporters of each table it dequeues. The node set ends up
//! closed under FK edges in both directions. All mutation goes through
//! [`TableGraph::add_edge`]; lookups that miss indicate a bug in expansion
//! and panic rather than fabricating phantom entries.

use crate::introspect::SchemaSource;
use anyhow::Result;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// One discovered table.
#[derive(Debug, Clone)]
pub struct TableNode {
    pub name: String,
    /// True for the root and for every table reachable from the root via
    /// dependent edges.
    pub direct_descendant: bool,
    /// Supporter table name -> referenced column in that supporter.
    pub supporters: BTreeMap<String, String>,
    /// Dependent table name -> FK column in that dependent.
    pub dependents: BTreeMap<String, String>,
}

impl TableNode {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            direct_descendant: false,
            supporters: BTreeMap::new(),
            dependents: BTreeMap::new(),
        }
    }
}

/// Column pairs of one supporter/dependent relationship, keyed by supporter
/// column. A composite FK contributes one entry per column pair.
pub type JoinPairs = BTreeMap<String, String>;

/// FK graph induced by the root table, plus the double-indexed column maps
/// extraction needs to build JOIN filters.
pub struct TableGraph {
    root: String,
    nodes: BTreeMap<String, TableNode>,
    /// fkey[supporter][dependent][supporter_col] = dependent_col
    fkey: BTreeMap<String, BTreeMap<String, JoinPairs>>,
    /// inv_fkey[supporter][dependent][dependent_col] = supporter_col
    inv_fkey: BTreeMap<String, BTreeMap<String, JoinPairs>>,
}

impl TableGraph {
    pub fn new(root: &str) -> Self {
        let mut nodes = BTreeMap::new();
        let mut root_node = TableNode::new(root);
        root_node.direct_descendant = true;
        nodes.insert(root.to_string(), root_node);
        Self {
            root: root.to_string(),
            nodes,
            fkey: BTreeMap::new(),
            inv_fkey: BTreeMap::new(),
        }
    }

    /// Discover the FK-closed subgraph around `root` by breadth-first
    /// expansion against the schema source.
    pub async fn discover(root: &str, source: &impl SchemaSource) -> Result<TableGraph> {
        let mut graph = TableGraph::new(root);
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = VecDeque::from([root.to_string()]);

        while let Some(curr) = queue.pop_front() {
            if !visited.insert(curr.clone()) {
                continue;
            }

            for dep in source.dependents_of(&curr).await? {
                debug!(
                    "discovered dependent {}.{} -> {}.{}",
                    dep.dependent_table, dep.dependent_col, curr, dep.supporter_col
                );
                graph.add_edge(
                    &dep.dependent_table,
                    &curr,
                    &dep.dependent_col,
                    &dep.supporter_col,
                );
                if dep.dependent_table != curr && !visited.contains(&dep.dependent_table) {
                    queue.push_back(dep.dependent_table);
                }
            }

            for sup in source.supporters_of(&curr).await? {
                debug!(
                    "discovered supporter {}.{} <- {}.{}",
                    sup.supporter_table, sup.supporter_col, sup.dependent_table, sup.dependent_col
                );
                graph.add_edge(
                    &sup.dependent_table,
                    &sup.supporter_table,
                    &sup.dependent_col,
                    &sup.supporter_col,
                );
                if sup.supporter_table != curr && !visited.contains(&sup.supporter_table) {
                    queue.push_back(sup.supporter_table);
                }
            }
        }

        graph.settle_direct_descendants();
        Ok(graph)
    }

    /// Record one FK column pair from `dependent` onto `supporter`.
    ///
    /// Both endpoints are created if unseen. Self-referential edges are kept
    /// out of the adjacency maps (the planner would read them as a cycle and
    /// extraction would join a table against itself) but their column pairs
    /// are still recorded.
    /// Within one supporter/dependent relationship the pairs are keyed by
    /// supporter column, so a composite FK keeps all of its pairs; a second
    /// constraint referencing the same supporter column overwrites the
    /// earlier pair.
    pub fn add_edge(
        &mut self,
        dependent: &str,
        supporter: &str,
        dependent_col: &str,
        supporter_col: &str,
    ) {
        self.nodes
            .entry(dependent.to_string())
            .or_insert_with(|| TableNode::new(dependent));
        self.nodes
            .entry(supporter.to_string())
            .or_insert_with(|| TableNode::new(supporter));

        if dependent != supporter {
            if let Some(node) = self.nodes.get_mut(dependent) {
                node.supporters
                    .insert(supporter.to_string(), supporter_col.to_string());
            }
            if let Some(node) = self.nodes.get_mut(supporter) {
                node.dependents
                    .insert(dependent.to_string(), dependent_col.to_string());
            }
        }

        self.fkey
            .entry(supporter.to_string())
            .or_default()
            .entry(dependent.to_string())
            .or_default()
            .insert(supporter_col.to_string(), dependent_col.to_string());
        self.inv_fkey
            .entry(supporter.to_string())
            .or_default()
            .entry(dependent.to_string())
            .or_default()
            .insert(dependent_col.to_string(), supporter_col.to_string());
    }

    // The flag is settled after expansion completes so the outcome does not
    // depend on BFS discovery order: a table is a direct descendant iff it
    // is reachable from the root following dependent edges only.
    fn settle_direct_descendants(&mut self) {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = VecDeque::from([self.root.clone()]);

        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let dependents: Vec<String> = self.node(&name).dependents.keys().cloned().collect();
            for dep in dependents {
                if let Some(node) = self.nodes.get_mut(&dep) {
                    node.direct_descendant = true;
                }
                queue.push_back(dep);
            }
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Nodes in name order.
    pub fn nodes(&self) -> impl Iterator<Item = &TableNode> {
        self.nodes.values()
    }

    pub fn node(&self, name: &str) -> &TableNode {
        self.nodes
            .get(name)
            .unwrap_or_else(|| panic!("table \"{name}\" was never discovered"))
    }

    /// Column pairs for joining `dependent` against `supporter`, keyed by
    /// supporter column.
    pub fn join_pairs(&self, supporter: &str, dependent: &str) -> &JoinPairs {
        self.fkey
            .get(supporter)
            .and_then(|deps| deps.get(dependent))
            .unwrap_or_else(|| {
                panic!("no foreign key recorded from \"{dependent}\" onto \"{supporter}\"")
            })
    }

    /// The inverse orientation: pairs keyed by dependent column.
    pub fn inv_join_pairs(&self, supporter: &str, dependent: &str) -> &JoinPairs {
        self.inv_fkey
            .get(supporter)
            .and_then(|deps| deps.get(dependent))
            .unwrap_or_else(|| {
                panic!("no foreign key recorded from \"{dependent}\" onto \"{supporter}\"")
            })
    }
}
