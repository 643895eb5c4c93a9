//! Cancellation, timeouts and the reconciler loop.

mod common;

use beacon_deferred::Deferred;
use beacon_descriptors::{MetricDescriptor, ResourceKind};
use beacon_graph::{
    GraphBuilder, IdentifierSupplier, InMemorySink, MaterializedGraph, Materializer, NodeId,
    NodeState, PendingIdentifiers, Reconciler,
};
use common::Mentionbot;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn cancel_while_pending_yields_cancelled_nodes() {
    let supplier = PendingIdentifiers::new();
    let stack = Mentionbot::declare(supplier.identifier("fn-events", &ResourceKind::Function));
    let graph = stack.graph();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let report = Materializer::default()
        .materialize_until(&graph, &cancel)
        .await;
    assert_eq!(report.cancelled.len(), 5);
    assert!(report.rejections.is_empty());
    assert!(report
        .states
        .values()
        .all(|state| *state == NodeState::Cancelled));
}

#[tokio::test]
async fn engine_cancellation_is_not_a_rejection() {
    let supplier = PendingIdentifiers::new();
    let stack = Mentionbot::declare(supplier.identifier("fn-events", &ResourceKind::Function));
    assert_eq!(supplier.cancel_all(), 1);

    let report = Materializer::default().materialize(&stack.graph()).await;
    assert_eq!(report.cancelled.len(), 5);
    assert!(report.rejections.is_empty());
}

#[tokio::test]
async fn cancelled_run_keeps_previous_snapshot() {
    let reconciler = Reconciler::new(Materializer::default(), InMemorySink::new());
    let never = CancellationToken::new();
    reconciler
        .reconcile(&Mentionbot::resolved("arn:fn:events-v3").graph(), &never)
        .await
        .unwrap();
    let before = reconciler.previous().await;
    assert_eq!(before.len(), 5);

    let (pending, _resolver) = Deferred::pending();
    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let outcome = reconciler
        .reconcile(&Mentionbot::declare(pending).graph(), &cancelled)
        .await
        .unwrap();

    assert!(!outcome.applied);
    assert!(outcome.diff.is_empty());
    assert_eq!(reconciler.previous().await, before);
    assert_eq!(reconciler.sink().applied().len(), 1);
}

#[tokio::test]
async fn timeout_rejects_only_the_stalled_subgraph() {
    let supplier = PendingIdentifiers::new();
    let slow = supplier.resource("fn-slow", ResourceKind::Function);
    let fast = supplier.resource("fn-fast", ResourceKind::Function);
    let slow_errors = MetricDescriptor::new("AWS/Lambda", "Errors", vec![slow]).unwrap();
    let fast_errors = MetricDescriptor::new("AWS/Lambda", "Errors", vec![fast]).unwrap();

    let mut builder = GraphBuilder::new().with_implicit_dependencies(true);
    builder.add_metric(&slow_errors).unwrap();
    builder.add_metric(&fast_errors).unwrap();
    let graph = builder.build().unwrap();

    supplier.resolve("fn-fast", "arn:fn:fast");
    let report = Materializer::default()
        .with_resolution_timeout(Duration::from_millis(25))
        .materialize(&graph)
        .await;

    assert_eq!(
        report.state(&NodeId::metric(&fast_errors)),
        Some(&NodeState::Materialized)
    );
    assert!(report.state(&NodeId::metric(&slow_errors)).unwrap().is_rejected());
    assert_eq!(supplier.pending(), vec!["fn-slow".to_string()]);
}

#[tokio::test]
async fn reconciler_applies_topology_change_as_updates() {
    let reconciler = Reconciler::new(Materializer::default(), InMemorySink::new())
        .with_previous(MaterializedGraph::new());
    let cancel = CancellationToken::new();

    let first = reconciler
        .reconcile(&Mentionbot::resolved("arn:fn:events-v3").graph(), &cancel)
        .await
        .unwrap();
    assert_eq!(first.diff.create.len(), 5);

    let second = reconciler
        .reconcile(&Mentionbot::resolved("arn:fn:events-v4").graph(), &cancel)
        .await
        .unwrap();
    assert!(second.applied);
    assert_eq!(second.diff.update.len(), 5);

    let last = reconciler.sink().last().unwrap();
    assert_eq!(
        last.payload["nodes"]["resource:fn-events"]["physical_id"],
        "arn:fn:events-v4"
    );
}
