//! Metric descriptors and their fluent derivations.

use crate::alarm::{AlarmDescriptor, AlarmPolicy};
use crate::error::{ConstructionError, Result};
use crate::resource::ResourceRef;
use beacon_deferred::Deferred;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Period applied when a metric is declared without one.
pub const DEFAULT_PERIOD_SECS: u32 = 300;

/// Aggregation applied to a metric over its period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Average,
    Sum,
    Minimum,
    Maximum,
    SampleCount,
    /// Percentile in the open range (0, 100), e.g. `99.9`.
    ExtendedPercentile(f64),
}

/// Statistic without its parameter; what a backend declares support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticKind {
    Average,
    Sum,
    Minimum,
    Maximum,
    SampleCount,
    ExtendedPercentile,
}

impl Statistic {
    pub fn percentile(p: f64) -> Self {
        Self::ExtendedPercentile(p)
    }

    pub fn kind(&self) -> StatisticKind {
        match self {
            Self::Average => StatisticKind::Average,
            Self::Sum => StatisticKind::Sum,
            Self::Minimum => StatisticKind::Minimum,
            Self::Maximum => StatisticKind::Maximum,
            Self::SampleCount => StatisticKind::SampleCount,
            Self::ExtendedPercentile(_) => StatisticKind::ExtendedPercentile,
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Average => write!(f, "Average"),
            Self::Sum => write!(f, "Sum"),
            Self::Minimum => write!(f, "Minimum"),
            Self::Maximum => write!(f, "Maximum"),
            Self::SampleCount => write!(f, "SampleCount"),
            Self::ExtendedPercentile(p) => write!(f, "p{}", p),
        }
    }
}

/// Partial set of presentation fields for [`MetricDescriptor::with`].
/// Fields left as `None` keep the descriptor's current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricOptions {
    pub statistic: Option<Statistic>,
    pub period: Option<u32>,
    pub unit: Option<String>,
    pub label: Option<String>,
}

/// Immutable description of a measurable quantity scoped to one or more
/// resources.
///
/// Every `with_*` derivation returns a new descriptor; unchanged fields are
/// shared with the original, which is never modified.
#[derive(Clone, Debug)]
pub struct MetricDescriptor {
    scope: Arc<[ResourceRef]>,
    namespace: Arc<str>,
    name: Arc<str>,
    dimensions: Arc<BTreeMap<String, Deferred<String>>>,
    statistic: Statistic,
    period: u32,
    unit: Option<Arc<str>>,
    label: Option<Arc<str>>,
}

impl MetricDescriptor {
    /// Declare a metric scoped to `scope`. Each resource contributes the
    /// dimension of its kind, valued by its deferred identifier.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        scope: Vec<ResourceRef>,
    ) -> Result<Self> {
        let namespace: String = namespace.into();
        let name: String = name.into();
        if scope.is_empty() {
            return Err(ConstructionError::EmptyScope { metric: name });
        }

        let mut dimensions = BTreeMap::new();
        for resource in &scope {
            let base = resource.kind().dimension_name();
            let key = if dimensions.contains_key(base) {
                format!("{}/{}", base, resource.logical_name())
            } else {
                base.to_string()
            };
            dimensions.insert(key, resource.dimension_value().clone());
        }

        Ok(Self {
            scope: scope.into(),
            namespace: namespace.into(),
            name: name.into(),
            dimensions: Arc::new(dimensions),
            statistic: Statistic::Average,
            period: DEFAULT_PERIOD_SECS,
            unit: None,
            label: None,
        })
    }

    pub fn scope(&self) -> &[ResourceRef] {
        &self.scope
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> &BTreeMap<String, Deferred<String>> {
        &self.dimensions
    }

    pub fn statistic(&self) -> &Statistic {
        &self.statistic
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn with_unit(&self, unit: impl Into<String>) -> Self {
        let unit: String = unit.into();
        Self {
            unit: Some(unit.into()),
            ..self.clone()
        }
    }

    pub fn with_period(&self, period: u32) -> Result<Self> {
        if period == 0 {
            return Err(ConstructionError::InvalidPeriod { period });
        }
        Ok(Self {
            period,
            ..self.clone()
        })
    }

    pub fn with_statistic(&self, statistic: Statistic) -> Self {
        Self {
            statistic,
            ..self.clone()
        }
    }

    pub fn with_label(&self, label: impl Into<String>) -> Self {
        let label: String = label.into();
        Self {
            label: Some(label.into()),
            ..self.clone()
        }
    }

    /// Add or replace a dimension. The value may come from any deferred
    /// source, e.g. an attribute of another resource.
    pub fn with_dimension(&self, name: impl Into<String>, value: Deferred<String>) -> Self {
        let mut dimensions = (*self.dimensions).clone();
        dimensions.insert(name.into(), value);
        Self {
            dimensions: Arc::new(dimensions),
            ..self.clone()
        }
    }

    /// Merge any subset of presentation fields.
    pub fn with(&self, options: MetricOptions) -> Result<Self> {
        let mut derived = self.clone();
        if let Some(period) = options.period {
            derived = derived.with_period(period)?;
        }
        if let Some(statistic) = options.statistic {
            derived.statistic = statistic;
        }
        if let Some(unit) = options.unit {
            derived.unit = Some(unit.into());
        }
        if let Some(label) = options.label {
            derived.label = Some(label.into());
        }
        Ok(derived)
    }

    /// Derive an alarm watching this metric.
    pub fn create_alarm(&self, name: impl Into<String>, policy: AlarmPolicy) -> Result<AlarmDescriptor> {
        AlarmDescriptor::new(name, self.clone(), policy)
    }

    /// Logical identity, stable across runs: namespace, name, scoped resource
    /// names, dimension names, statistic and period. Dimension values and
    /// physical identifiers never take part.
    pub fn logical_key(&self) -> String {
        let scope: Vec<&str> = self.scope.iter().map(ResourceRef::logical_name).collect();
        let dimensions: Vec<&str> = self.dimensions.keys().map(String::as_str).collect();
        format!(
            "{}/{}[{}]{{{}}}/{}/{}s",
            self.namespace,
            self.name,
            scope.join(","),
            dimensions.join(","),
            self.statistic,
            self.period
        )
    }

    /// Whether `other` declares the same metric: same fields, same scoped
    /// resources and the same dimension sources.
    pub fn same_declaration(&self, other: &MetricDescriptor) -> bool {
        self.namespace == other.namespace
            && self.name == other.name
            && self.statistic == other.statistic
            && self.period == other.period
            && self.unit == other.unit
            && self.label == other.label
            && self.scope.len() == other.scope.len()
            && self
                .scope
                .iter()
                .zip(other.scope.iter())
                .all(|(a, b)| a.same_as(b))
            && self.dimensions.len() == other.dimensions.len()
            && self
                .dimensions
                .iter()
                .zip(other.dimensions.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && Deferred::ptr_eq(va, vb))
    }
}
