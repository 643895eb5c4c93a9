//! Resolution of every deferred value in a graph into concrete node values.

use crate::capability::{CapabilityDescriptor, PeriodSupport};
use crate::config::BeaconConfig;
use crate::diff::MaterializedGraph;
use crate::graph::{CompositionGraph, GraphNode};
use crate::ids::NodeId;
use crate::resolved::{
    ResolvedAlarm, ResolvedAnnotation, ResolvedDashboard, ResolvedMetric, ResolvedNode,
    ResolvedResource, ResolvedWidget,
};
use crate::state::{NodeState, RejectionCause};
use beacon_deferred::{Deferred, DeferredError};
use beacon_descriptors::{
    AlarmDescriptor, DashboardDescriptor, MetricDescriptor, ResourceRef, WidgetDescriptor,
};
use futures::future::{self, BoxFuture};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A node that was not materialized, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub node: NodeId,
    pub cause: RejectionCause,
}

/// Warning-class finding that did not prevent materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub node: NodeId,
    pub message: String,
}

/// Outcome of one materialization run.
///
/// A non-empty rejection set is a warning; the caller decides whether to
/// proceed with the materialized subset.
#[derive(Debug, Clone, Default)]
pub struct MaterializationReport {
    /// Nodes materialized in this run.
    pub materialized: MaterializedGraph,
    /// Final state of every declared node.
    pub states: BTreeMap<NodeId, NodeState>,
    pub rejections: Vec<Rejection>,
    pub cancelled: Vec<NodeId>,
    pub diagnostics: Vec<Diagnostic>,
}

impl MaterializationReport {
    pub fn state(&self, id: &NodeId) -> Option<&NodeState> {
        self.states.get(id)
    }

    pub fn is_declared(&self, id: &NodeId) -> bool {
        self.states.contains_key(id)
    }

    pub fn rejection(&self, id: &NodeId) -> Option<&RejectionCause> {
        self.states.get(id).and_then(NodeState::rejection)
    }

    /// Every declared node materialized.
    pub fn is_complete(&self) -> bool {
        self.rejections.is_empty() && self.cancelled.is_empty()
    }
}

/// How a node stopped short of materialization.
enum Halt {
    Rejected(RejectionCause),
    Cancelled,
}

impl From<RejectionCause> for Halt {
    fn from(cause: RejectionCause) -> Self {
        Halt::Rejected(cause)
    }
}

/// Tracks node states through the lifecycle.
#[derive(Default)]
struct Lifecycle {
    states: BTreeMap<NodeId, NodeState>,
}

impl Lifecycle {
    fn declare(&mut self, id: &NodeId) {
        self.states.insert(id.clone(), NodeState::Declared);
    }

    fn advance(&mut self, id: &NodeId, next: NodeState) {
        let current = self
            .states
            .entry(id.clone())
            .or_insert(NodeState::Declared);
        debug_assert!(
            current.can_transition_to(&next),
            "invalid transition for {}: {:?} -> {:?}",
            id,
            current,
            next
        );
        *current = next;
    }

    fn get(&self, id: &NodeId) -> Option<&NodeState> {
        self.states.get(id)
    }
}

/// Resolves a [`CompositionGraph`] against the backend's capabilities.
#[derive(Debug, Clone, Default)]
pub struct Materializer {
    capabilities: CapabilityDescriptor,
    resolution_timeout: Option<Duration>,
}

impl Materializer {
    pub fn new(capabilities: CapabilityDescriptor) -> Self {
        Self {
            capabilities,
            resolution_timeout: None,
        }
    }

    pub fn from_config(config: &BeaconConfig) -> Self {
        Self {
            capabilities: config.capabilities.clone(),
            resolution_timeout: config.materialization.resolution_timeout(),
        }
    }

    /// Reject deferred values still pending after `timeout`.
    pub fn with_resolution_timeout(mut self, timeout: Duration) -> Self {
        self.resolution_timeout = Some(timeout);
        self
    }

    pub fn capabilities(&self) -> &CapabilityDescriptor {
        &self.capabilities
    }

    /// Resolve every node. Waits for all identifiers to settle, or for the
    /// resolution timeout if one is configured.
    ///
    /// Without a timeout, a [`Resolver`](beacon_deferred::Resolver) that is
    /// held but never settled blocks this call indefinitely. Set
    /// `materialization.resolution_timeout_ms` or use
    /// [`Materializer::materialize_until`] to bound it.
    pub async fn materialize(&self, graph: &CompositionGraph) -> MaterializationReport {
        self.materialize_until(graph, &CancellationToken::new()).await
    }

    /// Like [`Materializer::materialize`], but nodes still pending when
    /// `cancel` fires end up `Cancelled`.
    pub async fn materialize_until(
        &self,
        graph: &CompositionGraph,
        cancel: &CancellationToken,
    ) -> MaterializationReport {
        self.settle_all(graph, cancel).await;

        let mut lifecycle = Lifecycle::default();
        let mut report = MaterializationReport::default();
        for id in graph.topological_order() {
            let Some(node) = graph.get(id) else { continue };
            lifecycle.declare(id);
            lifecycle.advance(id, NodeState::Validated);

            if let Err(cause) = self.validate(id, node, &mut report) {
                self.reject(id, cause, &mut lifecycle, &mut report);
                continue;
            }
            lifecycle.advance(id, NodeState::Pending);

            let outcome = self
                .gate(graph, id, &lifecycle)
                .and_then(|()| self.resolve(node, &report.materialized, cancel));
            match outcome {
                Ok(resolved) => {
                    lifecycle.advance(id, NodeState::Resolved);
                    lifecycle.advance(id, NodeState::Materialized);
                    report.materialized.insert(id.clone(), resolved);
                }
                Err(Halt::Rejected(cause)) => {
                    self.reject(id, cause, &mut lifecycle, &mut report);
                }
                Err(Halt::Cancelled) => {
                    debug!(node = %id, "node cancelled");
                    lifecycle.advance(id, NodeState::Cancelled);
                    report.cancelled.push(id.clone());
                }
            }
        }
        report.states = lifecycle.states;

        info!(
            declared = graph.len(),
            materialized = report.materialized.len(),
            rejected = report.rejections.len(),
            cancelled = report.cancelled.len(),
            "materialization complete"
        );
        report
    }

    fn reject(
        &self,
        id: &NodeId,
        cause: RejectionCause,
        lifecycle: &mut Lifecycle,
        report: &mut MaterializationReport,
    ) {
        warn!(node = %id, %cause, "node rejected");
        lifecycle.advance(id, NodeState::Rejected {
            cause: cause.clone(),
        });
        report.rejections.push(Rejection {
            node: id.clone(),
            cause,
        });
    }

    /// Settle every identifier and dimension in the graph concurrently.
    async fn settle_all(&self, graph: &CompositionGraph, cancel: &CancellationToken) {
        let mut waits: Vec<BoxFuture<'_, ()>> = Vec::new();
        for (_, node) in graph.nodes() {
            match node {
                GraphNode::Resource(resource) => {
                    waits.push(Box::pin(self.bounded(resource.identifier(), cancel)));
                }
                GraphNode::Metric(metric) => {
                    for value in metric.dimensions().values() {
                        waits.push(Box::pin(self.bounded(value, cancel)));
                    }
                }
                _ => {}
            }
        }
        debug!(deferred = waits.len(), "settling deferred values");
        future::join_all(waits).await;
    }

    async fn bounded<T>(&self, value: &Deferred<T>, cancel: &CancellationToken)
    where
        T: Clone + Send + Sync + 'static,
    {
        if value.is_settled() {
            return;
        }
        let settle = async {
            match self.resolution_timeout {
                Some(limit) => {
                    let _ = tokio::time::timeout(limit, value.settle()).await;
                }
                None => {
                    let _ = value.settle().await;
                }
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {}
            _ = settle => {}
        }
    }

    /// Read a value settled (or given up on) by `settle_all`.
    fn read<T>(&self, value: &Deferred<T>, cancel: &CancellationToken) -> Result<T, Halt>
    where
        T: Clone + Send + Sync + 'static,
    {
        match value.peek() {
            Some(Ok(value)) => Ok(value),
            Some(Err(DeferredError::Cancelled)) => Err(Halt::Cancelled),
            Some(Err(DeferredError::Failed(reason))) => {
                Err(RejectionCause::ResolutionFailure { reason }.into())
            }
            None if cancel.is_cancelled() => Err(Halt::Cancelled),
            None => {
                let reason = match self.resolution_timeout {
                    Some(limit) => format!("still pending after {}ms", limit.as_millis()),
                    None => "never resolved".to_string(),
                };
                Err(RejectionCause::ResolutionFailure { reason }.into())
            }
        }
    }

    /// Capability checks that need no resolved values.
    fn validate(
        &self,
        id: &NodeId,
        node: &GraphNode,
        report: &mut MaterializationReport,
    ) -> Result<(), RejectionCause> {
        match node {
            GraphNode::Metric(metric) => {
                self.check_metric(metric)?;
                match self.capabilities.normalize_period(metric.period()) {
                    PeriodSupport::Supported(_) => {}
                    PeriodSupport::RoundedUp {
                        requested,
                        effective,
                    } => {
                        warn!(node = %id, requested, effective, "period rounded up");
                        report.diagnostics.push(Diagnostic {
                            node: id.clone(),
                            message: format!(
                                "period {}s not supported, rounded up to {}s",
                                requested, effective
                            ),
                        });
                    }
                    PeriodSupport::OutOfRange { requested } => {
                        return Err(RejectionCause::UnsupportedCapability {
                            capability: format!("period {}s", requested),
                        });
                    }
                }
                Ok(())
            }
            GraphNode::Alarm(alarm) => self.check_alarm(alarm),
            GraphNode::Widget { widget, .. } => self.check_widget(widget),
            GraphNode::Resource(_) | GraphNode::Dashboard(_) => Ok(()),
        }
    }

    fn check_metric(&self, metric: &MetricDescriptor) -> Result<(), RejectionCause> {
        let caps = &self.capabilities;
        if !caps.supports_statistic(metric.statistic()) {
            return Err(RejectionCause::UnsupportedCapability {
                capability: format!("statistic {}", metric.statistic()),
            });
        }
        if let Some(unit) = metric.unit() {
            if !caps.supports_unit(unit) {
                return Err(RejectionCause::UnsupportedCapability {
                    capability: format!("unit {}", unit),
                });
            }
            if !caps.unit_compatible(metric.statistic(), Some(unit)) {
                return Err(RejectionCause::IncompatibleUnit {
                    statistic: metric.statistic().to_string(),
                    unit: unit.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_alarm(&self, alarm: &AlarmDescriptor) -> Result<(), RejectionCause> {
        let period = self
            .capabilities
            .normalize_period(alarm.source_metric().period())
            .effective();
        let evaluation_periods = alarm.policy().evaluation_periods;
        if !self
            .capabilities
            .supports_evaluation_window(period, evaluation_periods)
        {
            return Err(RejectionCause::UnsupportedCapability {
                capability: format!(
                    "evaluation window of {}s",
                    u64::from(period) * u64::from(evaluation_periods)
                ),
            });
        }
        Ok(())
    }

    fn check_widget(&self, widget: &WidgetDescriptor) -> Result<(), RejectionCause> {
        if !self.capabilities.supports_widget(widget.kind()) {
            return Err(RejectionCause::UnsupportedCapability {
                capability: format!("widget kind {}", widget.kind()),
            });
        }
        Ok(())
    }

    /// A rejected dependency poisons the node; a cancelled one cancels it.
    fn gate(
        &self,
        graph: &CompositionGraph,
        id: &NodeId,
        lifecycle: &Lifecycle,
    ) -> Result<(), Halt> {
        let mut cancelled = false;
        for dep in graph.dependencies(id) {
            match lifecycle.get(dep) {
                Some(NodeState::Rejected { .. }) => {
                    return Err(RejectionCause::DependencyRejected {
                        dependency: dep.clone(),
                    }
                    .into());
                }
                Some(NodeState::Cancelled) => cancelled = true,
                _ => {}
            }
        }
        if cancelled {
            return Err(Halt::Cancelled);
        }
        Ok(())
    }

    fn resolve(
        &self,
        node: &GraphNode,
        done: &MaterializedGraph,
        cancel: &CancellationToken,
    ) -> Result<ResolvedNode, Halt> {
        match node {
            GraphNode::Resource(resource) => self
                .resolve_resource(resource, cancel)
                .map(ResolvedNode::Resource),
            GraphNode::Metric(metric) => self
                .resolve_metric(metric, cancel)
                .map(ResolvedNode::Metric),
            GraphNode::Alarm(alarm) => self.resolve_alarm(alarm, done).map(ResolvedNode::Alarm),
            GraphNode::Widget {
                dashboard,
                position,
                widget,
            } => self
                .resolve_widget(dashboard, *position, widget, done)
                .map(ResolvedNode::Widget),
            GraphNode::Dashboard(dashboard) => self
                .resolve_dashboard(dashboard, done)
                .map(ResolvedNode::Dashboard),
        }
    }

    fn resolve_resource(
        &self,
        resource: &ResourceRef,
        cancel: &CancellationToken,
    ) -> Result<ResolvedResource, Halt> {
        Ok(ResolvedResource {
            logical_name: resource.logical_name().to_string(),
            kind: resource.kind().clone(),
            physical_id: self.read(resource.identifier(), cancel)?,
        })
    }

    fn resolve_metric(
        &self,
        metric: &MetricDescriptor,
        cancel: &CancellationToken,
    ) -> Result<ResolvedMetric, Halt> {
        let mut dimensions = BTreeMap::new();
        for (name, value) in metric.dimensions() {
            dimensions.insert(name.clone(), self.read(value, cancel)?);
        }
        Ok(ResolvedMetric {
            namespace: metric.namespace().to_string(),
            name: metric.name().to_string(),
            dimensions,
            statistic: metric.statistic().clone(),
            period: self.capabilities.normalize_period(metric.period()).effective(),
            unit: metric.unit().map(str::to_string),
            label: metric.label().map(str::to_string),
        })
    }

    fn resolve_alarm(
        &self,
        alarm: &AlarmDescriptor,
        done: &MaterializedGraph,
    ) -> Result<ResolvedAlarm, Halt> {
        let metric_id = NodeId::metric(alarm.source_metric());
        let metric = done
            .get(&metric_id)
            .and_then(ResolvedNode::as_metric)
            .ok_or_else(|| unmaterialized(&metric_id))?;
        let policy = alarm.policy();
        Ok(ResolvedAlarm {
            name: alarm.name().to_string(),
            metric: metric.clone(),
            threshold: policy.threshold,
            comparison: policy.comparison,
            evaluation_periods: policy.evaluation_periods,
            datapoints_to_alarm: policy.datapoints_required(),
            treat_missing_data: policy.treat_missing_data,
            description: alarm.description().map(str::to_string),
        })
    }

    fn resolve_widget(
        &self,
        dashboard: &str,
        position: usize,
        widget: &WidgetDescriptor,
        done: &MaterializedGraph,
    ) -> Result<ResolvedWidget, Halt> {
        let mut metrics = Vec::with_capacity(widget.metrics().len());
        for metric in widget.metrics() {
            let metric_id = NodeId::metric(metric);
            let resolved = done
                .get(&metric_id)
                .and_then(ResolvedNode::as_metric)
                .ok_or_else(|| unmaterialized(&metric_id))?;
            metrics.push(resolved.clone());
        }

        let mut annotations = Vec::with_capacity(widget.annotations().len());
        for annotation in widget.annotations() {
            let alarm_id = NodeId::alarm(annotation.alarm().name());
            let alarm = done
                .get(&alarm_id)
                .and_then(ResolvedNode::as_alarm)
                .ok_or_else(|| unmaterialized(&alarm_id))?;
            annotations.push(ResolvedAnnotation {
                alarm: alarm.name.clone(),
                label: annotation.label().unwrap_or(&alarm.name).to_string(),
                threshold: alarm.threshold,
                comparison: alarm.comparison,
            });
        }

        Ok(ResolvedWidget {
            dashboard: dashboard.to_string(),
            position,
            kind: widget.kind(),
            width: widget.width(),
            height: widget.height(),
            title: widget.title().to_string(),
            metrics,
            annotations,
        })
    }

    fn resolve_dashboard(
        &self,
        dashboard: &DashboardDescriptor,
        done: &MaterializedGraph,
    ) -> Result<ResolvedDashboard, Halt> {
        let mut widgets = Vec::with_capacity(dashboard.widgets().len());
        for position in 0..dashboard.widgets().len() {
            let widget_id = NodeId::widget(dashboard.name(), position);
            let widget = done
                .get(&widget_id)
                .and_then(ResolvedNode::as_widget)
                .ok_or_else(|| unmaterialized(&widget_id))?;
            widgets.push(widget.clone());
        }
        Ok(ResolvedDashboard {
            name: dashboard.name().to_string(),
            widgets,
        })
    }
}

fn unmaterialized(id: &NodeId) -> Halt {
    RejectionCause::ResolutionFailure {
        reason: format!("dependency {} was not materialized", id),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use beacon_descriptors::{
        AlarmPolicy, Annotation, ComparisonDirection, PhysicalId, ResourceKind, Statistic,
        StatisticKind, WidgetKind,
    };

    fn function(name: &str, id: Deferred<PhysicalId>) -> ResourceRef {
        ResourceRef::new(name, ResourceKind::Function, id)
    }

    fn single_metric_graph(metric: &MetricDescriptor) -> CompositionGraph {
        let mut builder = GraphBuilder::new().with_implicit_dependencies(true);
        builder.add_metric(metric).unwrap();
        builder.build().unwrap()
    }

    #[tokio::test]
    async fn resolves_metric_dimensions() {
        let r = function("fn-events", Deferred::resolved("arn:fn:events-v3".into()));
        let m = MetricDescriptor::new("AWS/Lambda", "Duration", vec![r]).unwrap();
        let report = Materializer::default()
            .materialize(&single_metric_graph(&m))
            .await;

        assert!(report.is_complete());
        let metric = report
            .materialized
            .get(&NodeId::metric(&m))
            .and_then(ResolvedNode::as_metric)
            .unwrap();
        assert_eq!(metric.dimensions["FunctionName"], "arn:fn:events-v3");
        assert_eq!(
            report.state(&NodeId::metric(&m)),
            Some(&NodeState::Materialized)
        );
    }

    #[tokio::test]
    async fn waits_for_pending_identifiers() {
        let (id, resolver) = Deferred::pending();
        let m = MetricDescriptor::new("AWS/Lambda", "Errors", vec![function("fn-events", id)])
            .unwrap();
        let graph = single_metric_graph(&m);
        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            resolver.resolve(PhysicalId::new("arn:late"));
        });
        let report = Materializer::default().materialize(&graph).await;
        handle.await.unwrap();
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn unsupported_statistic_rejects_metric() {
        let r = function("fn-events", Deferred::resolved("arn:x".into()));
        let m = MetricDescriptor::new("AWS/Lambda", "Duration", vec![r])
            .unwrap()
            .with_statistic(Statistic::percentile(99.0));
        let caps = CapabilityDescriptor {
            statistics: vec![StatisticKind::Average],
            ..Default::default()
        };
        let report = Materializer::new(caps)
            .materialize(&single_metric_graph(&m))
            .await;
        assert!(matches!(
            report.rejection(&NodeId::metric(&m)),
            Some(RejectionCause::UnsupportedCapability { .. })
        ));
        assert_eq!(
            report.state(&NodeId::resource("fn-events")),
            Some(&NodeState::Materialized)
        );
    }

    #[tokio::test]
    async fn sample_count_in_seconds_is_incompatible() {
        let r = function("fn-events", Deferred::resolved("arn:x".into()));
        let m = MetricDescriptor::new("AWS/Lambda", "Invocations", vec![r])
            .unwrap()
            .with_statistic(Statistic::SampleCount)
            .with_unit("Seconds");
        let report = Materializer::default()
            .materialize(&single_metric_graph(&m))
            .await;
        assert!(matches!(
            report.rejection(&NodeId::metric(&m)),
            Some(RejectionCause::IncompatibleUnit { .. })
        ));
    }

    #[tokio::test]
    async fn odd_period_is_rounded_with_diagnostic() {
        let r = function("fn-events", Deferred::resolved("arn:x".into()));
        let m = MetricDescriptor::new("AWS/Lambda", "Duration", vec![r])
            .unwrap()
            .with_period(90)
            .unwrap();
        let report = Materializer::default()
            .materialize(&single_metric_graph(&m))
            .await;
        assert!(report.is_complete());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].node, NodeId::metric(&m));
        let metric = report
            .materialized
            .get(&NodeId::metric(&m))
            .and_then(ResolvedNode::as_metric)
            .unwrap();
        assert_eq!(metric.period, 120);
    }

    #[tokio::test]
    async fn unroundable_period_rejects_metric_without_aborting_run() {
        let r = function("fn-events", Deferred::resolved("arn:x".into()));
        let huge = MetricDescriptor::new("AWS/Lambda", "Duration", vec![r.clone()])
            .unwrap()
            .with_period(u32::MAX)
            .unwrap();
        let errors = MetricDescriptor::new("AWS/Lambda", "Errors", vec![r]).unwrap();
        let alarm = huge
            .create_alarm("Slow", AlarmPolicy::new(1.0, 1, ComparisonDirection::GreaterThan))
            .unwrap();
        let mut builder = GraphBuilder::new().with_implicit_dependencies(true);
        builder.add_alarm(&alarm).unwrap();
        builder.add_metric(&errors).unwrap();
        let report = Materializer::default()
            .materialize(&builder.build().unwrap())
            .await;

        assert_eq!(
            report.rejection(&NodeId::metric(&huge)),
            Some(&RejectionCause::UnsupportedCapability {
                capability: format!("period {}s", u32::MAX)
            })
        );
        assert!(report.state(&NodeId::alarm("Slow")).unwrap().is_rejected());
        assert_eq!(
            report.state(&NodeId::metric(&errors)),
            Some(&NodeState::Materialized)
        );
        assert!(report.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn oversized_evaluation_window_rejects_alarm() {
        let r = function("fn-events", Deferred::resolved("arn:x".into()));
        let m = MetricDescriptor::new("AWS/Lambda", "Duration", vec![r])
            .unwrap()
            .with_period(3600)
            .unwrap();
        let alarm = m
            .create_alarm(
                "Slow",
                AlarmPolicy::new(1.0, 48, ComparisonDirection::GreaterThan),
            )
            .unwrap();
        let mut builder = GraphBuilder::new().with_implicit_dependencies(true);
        builder.add_alarm(&alarm).unwrap();
        let report = Materializer::default()
            .materialize(&builder.build().unwrap())
            .await;
        assert!(matches!(
            report.rejection(&NodeId::alarm("Slow")),
            Some(RejectionCause::UnsupportedCapability { .. })
        ));
        assert_eq!(report.materialized.len(), 2);
    }

    #[tokio::test]
    async fn unsupported_widget_poisons_dashboard_only() {
        let r = function("fn-events", Deferred::resolved("arn:x".into()));
        let m = MetricDescriptor::new("AWS/Lambda", "Duration", vec![r]).unwrap();
        let alarm = m
            .create_alarm("TooLong", AlarmPolicy::new(5.0, 3, ComparisonDirection::GreaterThan))
            .unwrap();
        let dashboard = DashboardDescriptor::new("ops").with_widget(
            WidgetDescriptor::new(WidgetKind::Bar, "bars")
                .with_metric(&m)
                .with_annotation(Annotation::new(&alarm)),
        );
        let mut builder = GraphBuilder::new().with_implicit_dependencies(true);
        builder.add_dashboard(&dashboard).unwrap();
        let caps = CapabilityDescriptor {
            widget_kinds: vec![WidgetKind::LineGraph],
            ..Default::default()
        };
        let report = Materializer::new(caps)
            .materialize(&builder.build().unwrap())
            .await;

        assert!(matches!(
            report.rejection(&NodeId::widget("ops", 0)),
            Some(RejectionCause::UnsupportedCapability { .. })
        ));
        assert_eq!(
            report.rejection(&NodeId::dashboard("ops")),
            Some(&RejectionCause::DependencyRejected {
                dependency: NodeId::widget("ops", 0)
            })
        );
        assert_eq!(
            report.state(&NodeId::alarm("TooLong")),
            Some(&NodeState::Materialized)
        );
    }

    #[tokio::test]
    async fn timeout_rejects_stalled_identifier() {
        let (id, _resolver) = Deferred::pending();
        let m = MetricDescriptor::new("AWS/Lambda", "Duration", vec![function("fn-stuck", id)])
            .unwrap();
        let report = Materializer::default()
            .with_resolution_timeout(Duration::from_millis(20))
            .materialize(&single_metric_graph(&m))
            .await;
        match report.rejection(&NodeId::resource("fn-stuck")) {
            Some(RejectionCause::ResolutionFailure { reason }) => {
                assert!(reason.contains("20ms"))
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            report.rejection(&NodeId::metric(&m)),
            Some(RejectionCause::DependencyRejected { .. })
        ));
    }

    #[tokio::test]
    async fn cancellation_marks_pending_nodes() {
        let (id, _resolver) = Deferred::pending();
        let m = MetricDescriptor::new("AWS/Lambda", "Duration", vec![function("fn-slow", id)])
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = Materializer::default()
            .materialize_until(&single_metric_graph(&m), &cancel)
            .await;
        assert_eq!(
            report.cancelled,
            vec![NodeId::resource("fn-slow"), NodeId::metric(&m)]
        );
        assert!(report.rejections.is_empty());
        assert!(report.materialized.is_empty());
    }
}
