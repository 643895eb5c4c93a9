//! Repeated materialize → diff → apply cycles against one sink.

use crate::diff::{GraphDiff, MaterializedGraph};
use crate::engine::MaterializationSink;
use crate::error::SinkError;
use crate::graph::CompositionGraph;
use crate::materialize::{MaterializationReport, Materializer};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub report: MaterializationReport,
    pub diff: GraphDiff,
    /// Whether the sink was called. An empty diff is not applied.
    pub applied: bool,
}

/// Keeps the last materialized snapshot and pushes changes to a sink.
///
/// Passes are serialized. The snapshot only advances once the sink accepts
/// the payload, so a failed apply is retried in full by the next pass.
pub struct Reconciler<S> {
    materializer: Materializer,
    sink: S,
    previous: Mutex<MaterializedGraph>,
}

impl<S: MaterializationSink> Reconciler<S> {
    pub fn new(materializer: Materializer, sink: S) -> Self {
        Self {
            materializer,
            sink,
            previous: Mutex::new(MaterializedGraph::new()),
        }
    }

    /// Start from a snapshot persisted by an earlier process.
    pub fn with_previous(self, previous: MaterializedGraph) -> Self {
        Self {
            previous: Mutex::new(previous),
            ..self
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn previous(&self) -> MaterializedGraph {
        self.previous.lock().await.clone()
    }

    pub async fn reconcile(
        &self,
        graph: &CompositionGraph,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, SinkError> {
        let mut previous = self.previous.lock().await;
        let report = self.materializer.materialize_until(graph, cancel).await;
        if !report.rejections.is_empty() {
            warn!(
                rejected = report.rejections.len(),
                "materialization finished with rejected nodes"
            );
        }

        let diff = GraphDiff::between(&previous, &report);
        let next = previous.advance(&report);
        let applied = if diff.is_empty() {
            debug!("no changes to apply");
            false
        } else {
            self.sink.apply(&next, &diff).await?;
            info!(changes = diff.change_count(), "changes applied");
            true
        };
        *previous = next;

        Ok(ReconcileOutcome {
            report,
            diff,
            applied,
        })
    }
}
