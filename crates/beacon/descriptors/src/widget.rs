//! Widget descriptors and alarm annotations.

use crate::alarm::AlarmDescriptor;
use crate::error::{ConstructionError, Result};
use crate::metric::MetricDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Width of a dashboard row in grid units.
pub const GRID_WIDTH: u32 = 24;
pub const DEFAULT_WIDGET_WIDTH: u32 = 6;
pub const DEFAULT_WIDGET_HEIGHT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    LineGraph,
    StackedArea,
    SingleValue,
    Bar,
    AlarmStatus,
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineGraph => write!(f, "line_graph"),
            Self::StackedArea => write!(f, "stacked_area"),
            Self::SingleValue => write!(f, "single_value"),
            Self::Bar => write!(f, "bar"),
            Self::AlarmStatus => write!(f, "alarm_status"),
        }
    }
}

/// Renders an alarm's threshold line inside a widget.
#[derive(Clone, Debug)]
pub struct Annotation {
    alarm: AlarmDescriptor,
    label: Option<Arc<str>>,
}

impl Annotation {
    pub fn new(alarm: &AlarmDescriptor) -> Self {
        Self {
            alarm: alarm.clone(),
            label: None,
        }
    }

    pub fn with_label(&self, label: impl Into<String>) -> Self {
        let label: String = label.into();
        Self {
            label: Some(label.into()),
            ..self.clone()
        }
    }

    pub fn alarm(&self) -> &AlarmDescriptor {
        &self.alarm
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl From<&AlarmDescriptor> for Annotation {
    fn from(alarm: &AlarmDescriptor) -> Self {
        Self::new(alarm)
    }
}

/// A single dashboard tile. Positioned by insertion order in its dashboard.
#[derive(Clone, Debug)]
pub struct WidgetDescriptor {
    kind: WidgetKind,
    width: u32,
    height: u32,
    title: Arc<str>,
    metrics: Arc<Vec<MetricDescriptor>>,
    annotations: Arc<Vec<Annotation>>,
}

impl WidgetDescriptor {
    pub fn new(kind: WidgetKind, title: impl Into<String>) -> Self {
        let title: String = title.into();
        Self {
            kind,
            width: DEFAULT_WIDGET_WIDTH,
            height: DEFAULT_WIDGET_HEIGHT,
            title: title.into(),
            metrics: Arc::new(Vec::new()),
            annotations: Arc::new(Vec::new()),
        }
    }

    pub fn line_graph(title: impl Into<String>) -> Self {
        Self::new(WidgetKind::LineGraph, title)
    }

    pub fn single_value(title: impl Into<String>) -> Self {
        Self::new(WidgetKind::SingleValue, title)
    }

    pub fn alarm_status(title: impl Into<String>) -> Self {
        Self::new(WidgetKind::AlarmStatus, title)
    }

    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn metrics(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Width in grid units, 1 through [`GRID_WIDTH`]. Row overflow is left
    /// to the renderer.
    pub fn with_width(&self, width: u32) -> Result<Self> {
        if width == 0 || width > GRID_WIDTH {
            return Err(ConstructionError::InvalidWidth {
                width,
                max: GRID_WIDTH,
            });
        }
        Ok(Self {
            width,
            ..self.clone()
        })
    }

    pub fn with_height(&self, height: u32) -> Result<Self> {
        if height == 0 {
            return Err(ConstructionError::InvalidHeight { height });
        }
        Ok(Self {
            height,
            ..self.clone()
        })
    }

    pub fn with_metric(&self, metric: &MetricDescriptor) -> Self {
        let mut metrics = (*self.metrics).clone();
        metrics.push(metric.clone());
        Self {
            metrics: Arc::new(metrics),
            ..self.clone()
        }
    }

    pub fn with_metrics<'a>(&self, metrics: impl IntoIterator<Item = &'a MetricDescriptor>) -> Self {
        let mut all = (*self.metrics).clone();
        all.extend(metrics.into_iter().cloned());
        Self {
            metrics: Arc::new(all),
            ..self.clone()
        }
    }

    pub fn with_annotation(&self, annotation: Annotation) -> Self {
        let mut annotations = (*self.annotations).clone();
        annotations.push(annotation);
        Self {
            annotations: Arc::new(annotations),
            ..self.clone()
        }
    }
}
