//! The composition graph and its builder.

use crate::config::AssemblyConfig;
use crate::error::{GraphError, Result};
use crate::ids::{NodeId, NodeKind};
use beacon_descriptors::{
    AlarmDescriptor, DashboardDescriptor, MetricDescriptor, ResourceRef, WidgetDescriptor,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// A declared node. Holds the descriptor it was added from.
#[derive(Clone, Debug)]
pub enum GraphNode {
    Resource(ResourceRef),
    Metric(MetricDescriptor),
    Alarm(AlarmDescriptor),
    Widget {
        dashboard: String,
        position: usize,
        widget: WidgetDescriptor,
    },
    Dashboard(DashboardDescriptor),
}

impl GraphNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Resource(_) => NodeKind::Resource,
            Self::Metric(_) => NodeKind::Metric,
            Self::Alarm(_) => NodeKind::Alarm,
            Self::Widget { .. } => NodeKind::Widget,
            Self::Dashboard(_) => NodeKind::Dashboard,
        }
    }
}

/// Read-only DAG of declared nodes: Resource → Metric → Alarm → Widget →
/// Dashboard. Produced by [`GraphBuilder::build`].
#[derive(Clone, Debug, Default)]
pub struct CompositionGraph {
    nodes: BTreeMap<NodeId, GraphNode>,
    dependencies: BTreeMap<NodeId, Vec<NodeId>>,
    dependents: BTreeMap<NodeId, Vec<NodeId>>,
    order: Vec<NodeId>,
}

impl CompositionGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &GraphNode)> {
        self.nodes.iter()
    }

    /// Direct upstream nodes of `id`.
    pub fn dependencies(&self, id: &NodeId) -> &[NodeId] {
        self.dependencies.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct downstream nodes of `id`.
    pub fn dependents(&self, id: &NodeId) -> &[NodeId] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every node reachable downstream of `id`.
    pub fn transitive_dependents(&self, id: &NodeId) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<&NodeId> = self.dependents(id).iter().collect();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next.clone()) {
                queue.extend(self.dependents(next));
            }
        }
        seen
    }

    /// Dependencies before dependents; ties keep insertion order.
    pub fn topological_order(&self) -> &[NodeId] {
        &self.order
    }
}

/// Nodes staged by one `add_*` call. Committed only when every check
/// passes, so a failed call leaves the builder untouched.
#[derive(Default)]
struct Plan {
    entries: Vec<(NodeId, GraphNode, Vec<NodeId>)>,
}

impl Plan {
    fn find(&self, id: &NodeId) -> Option<&GraphNode> {
        self.entries
            .iter()
            .find(|(staged, _, _)| staged == id)
            .map(|(_, node, _)| node)
    }

    fn stage(&mut self, id: NodeId, node: GraphNode, dependencies: Vec<NodeId>) {
        self.entries.push((id, node, dependencies));
    }
}

/// Assembles a [`CompositionGraph`] by explicit registration.
///
/// Every `add_*` call validates before mutating: on error nothing from that
/// call is added. With implicit dependencies enabled, missing upstream
/// nodes are registered along with the node that references them instead
/// of failing with [`GraphError::DanglingReference`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    implicit_dependencies: bool,
    nodes: BTreeMap<NodeId, GraphNode>,
    dependencies: BTreeMap<NodeId, Vec<NodeId>>,
    insertion: Vec<NodeId>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &AssemblyConfig) -> Self {
        Self::new().with_implicit_dependencies(config.implicit_dependencies)
    }

    pub fn with_implicit_dependencies(mut self, enabled: bool) -> Self {
        self.implicit_dependencies = enabled;
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Register a resource. Re-adding the same reference is a no-op; a
    /// different reference under the same logical name is a duplicate.
    pub fn add_resource(&mut self, resource: &ResourceRef) -> Result<NodeId> {
        let mut plan = Plan::default();
        let id = self.stage_resource(&mut plan, resource)?;
        self.commit(plan);
        Ok(id)
    }

    /// Register a metric. Its scoped resources must already be present.
    /// An identical declaration is deduplicated.
    pub fn add_metric(&mut self, metric: &MetricDescriptor) -> Result<NodeId> {
        let mut plan = Plan::default();
        let id = self.stage_metric(&mut plan, metric)?;
        self.commit(plan);
        Ok(id)
    }

    /// Register an alarm. Alarm names are unique within the graph.
    pub fn add_alarm(&mut self, alarm: &AlarmDescriptor) -> Result<NodeId> {
        let mut plan = Plan::default();
        let id = self.stage_alarm(&mut plan, alarm)?;
        self.commit(plan);
        Ok(id)
    }

    /// Register a dashboard, expanded into one widget node per widget.
    pub fn add_dashboard(&mut self, dashboard: &DashboardDescriptor) -> Result<NodeId> {
        let id = NodeId::dashboard(dashboard.name());
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }

        let mut plan = Plan::default();
        let mut widget_ids = Vec::with_capacity(dashboard.widgets().len());
        for (position, widget) in dashboard.widgets().iter().enumerate() {
            let widget_id = NodeId::widget(dashboard.name(), position);
            let mut deps = Vec::new();
            for metric in widget.metrics() {
                let dep = self.require_metric(&mut plan, metric, &widget_id)?;
                push_unique(&mut deps, dep);
            }
            for annotation in widget.annotations() {
                let dep = self.require_alarm(&mut plan, annotation.alarm(), &widget_id)?;
                push_unique(&mut deps, dep);
            }
            plan.stage(
                widget_id.clone(),
                GraphNode::Widget {
                    dashboard: dashboard.name().to_string(),
                    position,
                    widget: widget.clone(),
                },
                deps,
            );
            widget_ids.push(widget_id);
        }
        plan.stage(
            id.clone(),
            GraphNode::Dashboard(dashboard.clone()),
            widget_ids,
        );
        self.commit(plan);
        Ok(id)
    }

    /// Check the assembled graph is acyclic and freeze it.
    pub fn build(self) -> Result<CompositionGraph> {
        let mut dependents: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        let mut remaining: BTreeMap<&NodeId, usize> = BTreeMap::new();
        for id in &self.insertion {
            let deps = self.dependencies.get(id).map(Vec::as_slice).unwrap_or(&[]);
            remaining.insert(id, deps.len());
            for dep in deps {
                dependents.entry(dep.clone()).or_default().push(id.clone());
            }
        }

        let mut ready: VecDeque<&NodeId> = self
            .insertion
            .iter()
            .filter(|id| remaining.get(id).copied() == Some(0))
            .collect();
        let mut order = Vec::with_capacity(self.insertion.len());
        while let Some(id) = ready.pop_front() {
            order.push(id.clone());
            for dependent in dependents.get(id).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        if order.len() != self.insertion.len() {
            let stuck = self
                .insertion
                .iter()
                .find(|id| remaining.get(id).copied().unwrap_or(0) > 0)
                .cloned();
            if let Some(id) = stuck {
                return Err(GraphError::CycleDetected(id));
            }
        }

        debug!(nodes = order.len(), "composition graph built");
        Ok(CompositionGraph {
            nodes: self.nodes,
            dependencies: self.dependencies,
            dependents,
            order,
        })
    }

    fn lookup<'a>(&'a self, plan: &'a Plan, id: &NodeId) -> Option<&'a GraphNode> {
        self.nodes.get(id).or_else(|| plan.find(id))
    }

    fn stage_resource(&self, plan: &mut Plan, resource: &ResourceRef) -> Result<NodeId> {
        let id = NodeId::resource(resource.logical_name());
        let existing = self
            .lookup(plan, &id)
            .map(|node| matches!(node, GraphNode::Resource(r) if r.same_as(resource)));
        match existing {
            Some(true) => Ok(id),
            Some(false) => Err(GraphError::DuplicateNode(id)),
            None => {
                plan.stage(id.clone(), GraphNode::Resource(resource.clone()), Vec::new());
                Ok(id)
            }
        }
    }

    fn stage_metric(&self, plan: &mut Plan, metric: &MetricDescriptor) -> Result<NodeId> {
        let id = NodeId::metric(metric);
        let existing = self
            .lookup(plan, &id)
            .map(|node| matches!(node, GraphNode::Metric(m) if m.same_declaration(metric)));
        match existing {
            Some(true) => return Ok(id),
            Some(false) => return Err(GraphError::DuplicateNode(id)),
            None => {}
        }

        let mut deps = Vec::with_capacity(metric.scope().len());
        for resource in metric.scope() {
            let dep = self.require_resource(plan, resource, &id)?;
            push_unique(&mut deps, dep);
        }
        plan.stage(id.clone(), GraphNode::Metric(metric.clone()), deps);
        Ok(id)
    }

    fn stage_alarm(&self, plan: &mut Plan, alarm: &AlarmDescriptor) -> Result<NodeId> {
        let id = NodeId::alarm(alarm.name());
        if self.lookup(plan, &id).is_some() {
            return Err(GraphError::DuplicateNode(id));
        }
        let dep = self.require_metric(plan, alarm.source_metric(), &id)?;
        plan.stage(id.clone(), GraphNode::Alarm(alarm.clone()), vec![dep]);
        Ok(id)
    }

    fn require_resource(
        &self,
        plan: &mut Plan,
        resource: &ResourceRef,
        from: &NodeId,
    ) -> Result<NodeId> {
        let id = NodeId::resource(resource.logical_name());
        if self.lookup(plan, &id).is_none() && !self.implicit_dependencies {
            return Err(GraphError::DanglingReference {
                from: from.clone(),
                missing: id,
            });
        }
        self.stage_resource(plan, resource)
    }

    fn require_metric(
        &self,
        plan: &mut Plan,
        metric: &MetricDescriptor,
        from: &NodeId,
    ) -> Result<NodeId> {
        let id = NodeId::metric(metric);
        if self.lookup(plan, &id).is_none() && !self.implicit_dependencies {
            return Err(GraphError::DanglingReference {
                from: from.clone(),
                missing: id,
            });
        }
        self.stage_metric(plan, metric)
    }

    fn require_alarm(
        &self,
        plan: &mut Plan,
        alarm: &AlarmDescriptor,
        from: &NodeId,
    ) -> Result<NodeId> {
        let id = NodeId::alarm(alarm.name());
        let existing = self
            .lookup(plan, &id)
            .map(|node| matches!(node, GraphNode::Alarm(a) if a.same_declaration(alarm)));
        match existing {
            Some(true) => Ok(id),
            Some(false) => Err(GraphError::DuplicateNode(id)),
            None if self.implicit_dependencies => self.stage_alarm(plan, alarm),
            None => Err(GraphError::DanglingReference {
                from: from.clone(),
                missing: id,
            }),
        }
    }

    fn commit(&mut self, plan: Plan) {
        for (id, node, deps) in plan.entries {
            debug!(node = %id, dependencies = deps.len(), "node added");
            self.nodes.insert(id.clone(), node);
            self.dependencies.insert(id.clone(), deps);
            self.insertion.push(id);
        }
    }
}

fn push_unique(ids: &mut Vec<NodeId>, id: NodeId) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}
