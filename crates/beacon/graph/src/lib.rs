#![deny(unsafe_code)]
//! # beacon-graph
//!
//! Assembles observability declarations into a composition graph, resolves
//! every deferred identifier in it, and diffs the result against the last
//! materialization.
//!
//! ```text
//! GraphBuilder ──build──▶ CompositionGraph ──Materializer──▶ MaterializationReport
//!                                                               │
//!            previous MaterializedGraph ──GraphDiff::between────┤
//!                                                               ▼
//!                                                   MaterializationSink::apply
//! ```
//!
//! A node whose resolution fails is rejected together with everything
//! downstream of it; independent subgraphs still materialize. Rejected and
//! cancelled nodes keep their prior materialization.

pub mod capability;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ids;
pub mod materialize;
pub mod reconcile;
pub mod resolved;
pub mod state;
pub mod telemetry;

pub use capability::{CapabilityDescriptor, PeriodSupport};
pub use config::{AssemblyConfig, BeaconConfig, MaterializationConfig};
pub use diff::{GraphDiff, MaterializedGraph};
pub use engine::{
    AppliedChange, IdentifierSupplier, InMemorySink, MaterializationSink, PendingIdentifiers,
};
pub use error::{ConfigError, GraphError, ParseNodeIdError, Result, SinkError};
pub use graph::{CompositionGraph, GraphBuilder, GraphNode};
pub use ids::{NodeId, NodeKind};
pub use materialize::{Diagnostic, MaterializationReport, Materializer, Rejection};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use resolved::{
    ResolvedAlarm, ResolvedAnnotation, ResolvedDashboard, ResolvedMetric, ResolvedNode,
    ResolvedResource, ResolvedWidget,
};
pub use state::{NodeState, RejectionCause};
pub use telemetry::{init_tracing, TelemetryConfig};
