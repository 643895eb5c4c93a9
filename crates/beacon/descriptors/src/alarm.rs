//! Alarm descriptors: threshold policies derived from a single metric.

use crate::error::{ConstructionError, Result};
use crate::metric::MetricDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How the metric value is compared against the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonDirection {
    GreaterThanOrEqual,
    GreaterThan,
    LessThan,
    LessThanOrEqual,
}

impl fmt::Display for ComparisonDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GreaterThanOrEqual => write!(f, "GreaterThanOrEqualToThreshold"),
            Self::GreaterThan => write!(f, "GreaterThanThreshold"),
            Self::LessThan => write!(f, "LessThanThreshold"),
            Self::LessThanOrEqual => write!(f, "LessThanOrEqualToThreshold"),
        }
    }
}

/// How periods without data points are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDataTreatment {
    #[default]
    Missing,
    Ignore,
    Breaching,
    NotBreaching,
}

/// Threshold policy applied to the source metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmPolicy {
    pub threshold: f64,
    pub evaluation_periods: u32,
    pub comparison: ComparisonDirection,
    /// Breaching data points (M of N) needed to alarm. `None` means every
    /// evaluated period must breach.
    pub datapoints_to_alarm: Option<u32>,
    pub treat_missing_data: MissingDataTreatment,
}

impl AlarmPolicy {
    pub fn new(threshold: f64, evaluation_periods: u32, comparison: ComparisonDirection) -> Self {
        Self {
            threshold,
            evaluation_periods,
            comparison,
            datapoints_to_alarm: None,
            treat_missing_data: MissingDataTreatment::default(),
        }
    }

    pub fn with_datapoints_to_alarm(mut self, datapoints: u32) -> Self {
        self.datapoints_to_alarm = Some(datapoints);
        self
    }

    pub fn with_missing_data(mut self, treatment: MissingDataTreatment) -> Self {
        self.treat_missing_data = treatment;
        self
    }

    pub fn datapoints_required(&self) -> u32 {
        self.datapoints_to_alarm.unwrap_or(self.evaluation_periods)
    }

    fn validate(&self, alarm: &str) -> Result<()> {
        let invalid = |reason: String| ConstructionError::InvalidAlarmPolicy {
            alarm: alarm.to_string(),
            reason,
        };
        if !self.threshold.is_finite() {
            return Err(invalid(format!("threshold {} is not finite", self.threshold)));
        }
        if self.evaluation_periods < 1 {
            return Err(invalid("evaluation_periods must be at least 1".into()));
        }
        let required = self.datapoints_required();
        if required < 1 {
            return Err(invalid("datapoints_to_alarm must be at least 1".into()));
        }
        if required > self.evaluation_periods {
            return Err(invalid(format!(
                "{} breaching datapoints required but only {} periods evaluated",
                required, self.evaluation_periods
            )));
        }
        Ok(())
    }
}

/// Immutable alarm declaration. Provisioned by the external engine as a
/// resource of its own, with a lifecycle independent of its metric.
#[derive(Clone, Debug)]
pub struct AlarmDescriptor {
    name: Arc<str>,
    source_metric: MetricDescriptor,
    policy: Arc<AlarmPolicy>,
    description: Option<Arc<str>>,
}

impl AlarmDescriptor {
    /// Usually reached through [`MetricDescriptor::create_alarm`].
    pub fn new(
        name: impl Into<String>,
        source_metric: MetricDescriptor,
        policy: AlarmPolicy,
    ) -> Result<Self> {
        let name: String = name.into();
        policy.validate(&name)?;
        Ok(Self {
            name: name.into(),
            source_metric,
            policy: Arc::new(policy),
            description: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_metric(&self) -> &MetricDescriptor {
        &self.source_metric
    }

    pub fn policy(&self) -> &AlarmPolicy {
        &self.policy
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn with_description(&self, description: impl Into<String>) -> Self {
        let description: String = description.into();
        Self {
            description: Some(description.into()),
            ..self.clone()
        }
    }

    pub fn same_declaration(&self, other: &AlarmDescriptor) -> bool {
        self.name == other.name
            && self.description == other.description
            && *self.policy == *other.policy
            && self.source_metric.same_declaration(&other.source_metric)
    }
}
