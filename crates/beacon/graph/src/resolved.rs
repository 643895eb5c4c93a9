//! Fully resolved node values, as handed to the rendering/alerting backend.
//!
//! Structural equality on these values is what the diff compares.

use beacon_descriptors::{
    ComparisonDirection, MissingDataTreatment, PhysicalId, ResourceKind, Statistic, WidgetKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedResource {
    pub logical_name: String,
    pub kind: ResourceKind,
    pub physical_id: PhysicalId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMetric {
    pub namespace: String,
    pub name: String,
    pub dimensions: BTreeMap<String, String>,
    pub statistic: Statistic,
    /// Effective period after backend normalization.
    pub period: u32,
    pub unit: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAlarm {
    pub name: String,
    pub metric: ResolvedMetric,
    pub threshold: f64,
    pub comparison: ComparisonDirection,
    pub evaluation_periods: u32,
    pub datapoints_to_alarm: u32,
    pub treat_missing_data: MissingDataTreatment,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAnnotation {
    pub alarm: String,
    pub label: String,
    pub threshold: f64,
    pub comparison: ComparisonDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWidget {
    pub dashboard: String,
    pub position: usize,
    pub kind: WidgetKind,
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub metrics: Vec<ResolvedMetric>,
    pub annotations: Vec<ResolvedAnnotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDashboard {
    pub name: String,
    pub widgets: Vec<ResolvedWidget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum ResolvedNode {
    Resource(ResolvedResource),
    Metric(ResolvedMetric),
    Alarm(ResolvedAlarm),
    Widget(ResolvedWidget),
    Dashboard(ResolvedDashboard),
}

impl ResolvedNode {
    pub fn as_metric(&self) -> Option<&ResolvedMetric> {
        match self {
            Self::Metric(metric) => Some(metric),
            _ => None,
        }
    }

    pub fn as_alarm(&self) -> Option<&ResolvedAlarm> {
        match self {
            Self::Alarm(alarm) => Some(alarm),
            _ => None,
        }
    }

    pub fn as_widget(&self) -> Option<&ResolvedWidget> {
        match self {
            Self::Widget(widget) => Some(widget),
            _ => None,
        }
    }

    pub fn as_dashboard(&self) -> Option<&ResolvedDashboard> {
        match self {
            Self::Dashboard(dashboard) => Some(dashboard),
            _ => None,
        }
    }
}
