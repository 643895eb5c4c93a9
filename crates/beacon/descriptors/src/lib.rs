#![deny(unsafe_code)]
//! # beacon-descriptors
//!
//! Immutable declarations of observability artifacts, scoped to resources
//! whose physical identifiers are still [`Deferred`](beacon_deferred::Deferred).
//!
//! ```text
//! ResourceRef → MetricDescriptor → AlarmDescriptor
//!                     │                  │
//!                     └──▶ WidgetDescriptor ◀── Annotation
//!                               │
//!                       DashboardDescriptor
//! ```
//!
//! Construction and derivation are synchronous and never wait on
//! resolution. Every derivation returns a new value that shares its
//! unchanged fields with the original.

pub mod alarm;
pub mod dashboard;
pub mod error;
pub mod metric;
pub mod resource;
pub mod widget;

pub use alarm::{AlarmDescriptor, AlarmPolicy, ComparisonDirection, MissingDataTreatment};
pub use dashboard::DashboardDescriptor;
pub use error::{ConstructionError, Result};
pub use metric::{MetricDescriptor, MetricOptions, Statistic, StatisticKind, DEFAULT_PERIOD_SECS};
pub use resource::{PhysicalId, ResourceKind, ResourceRef};
pub use widget::{
    Annotation, WidgetDescriptor, WidgetKind, DEFAULT_WIDGET_HEIGHT, DEFAULT_WIDGET_WIDTH,
    GRID_WIDTH,
};
