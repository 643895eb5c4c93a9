//! Materialized snapshots and the incremental diff between runs.

use crate::ids::NodeId;
use crate::materialize::MaterializationReport;
use crate::resolved::ResolvedNode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Resolved node values keyed by logical identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterializedGraph {
    nodes: BTreeMap<NodeId, ResolvedNode>,
}

impl MaterializedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &NodeId) -> Option<&ResolvedNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &ResolvedNode)> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub(crate) fn insert(&mut self, id: NodeId, node: ResolvedNode) {
        self.nodes.insert(id, node);
    }

    /// The snapshot to diff the next run against.
    ///
    /// Nodes materialized in `report` take their new value. Rejected and
    /// cancelled nodes keep their prior value, if any. Nodes no longer
    /// declared are dropped.
    pub fn advance(&self, report: &MaterializationReport) -> MaterializedGraph {
        let mut next = MaterializedGraph::new();
        for id in report.states.keys() {
            let carried = report
                .materialized
                .get(id)
                .or_else(|| self.nodes.get(id))
                .cloned();
            if let Some(node) = carried {
                next.insert(id.clone(), node);
            }
        }
        next
    }
}

/// Changes between a prior materialization and the current run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDiff {
    /// Materialized now, absent before.
    pub create: BTreeSet<NodeId>,
    /// Materialized in both, resolved value differs.
    pub update: BTreeSet<NodeId>,
    /// Present before, no longer declared.
    pub delete: BTreeSet<NodeId>,
    pub unchanged: BTreeSet<NodeId>,
}

impl GraphDiff {
    /// Rejected and cancelled nodes appear in no set: their prior
    /// materialization is left untouched.
    pub fn between(previous: &MaterializedGraph, current: &MaterializationReport) -> Self {
        let mut diff = GraphDiff::default();
        for (id, node) in current.materialized.iter() {
            match previous.get(id) {
                None => diff.create.insert(id.clone()),
                Some(prior) if prior == node => diff.unchanged.insert(id.clone()),
                Some(_) => diff.update.insert(id.clone()),
            };
        }
        for id in previous.node_ids() {
            if !current.is_declared(id) {
                diff.delete.insert(id.clone());
            }
        }

        info!(
            create = diff.create.len(),
            update = diff.update.len(),
            delete = diff.delete.len(),
            unchanged = diff.unchanged.len(),
            "graph diff computed"
        );
        diff
    }

    /// No creates, updates or deletes.
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }
}
