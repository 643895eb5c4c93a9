//! What the monitoring backend supports, and checks against it.

use crate::error::ConfigError;
use beacon_descriptors::{Statistic, StatisticKind, WidgetKind};
use serde::{Deserialize, Serialize};

/// Capabilities declared by the monitoring backend. Consulted at resolution
/// time, never at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityDescriptor {
    pub statistics: Vec<StatisticKind>,
    /// Standard periods must be a multiple of this many seconds.
    pub period_granularity_secs: u32,
    /// Sub-granularity periods accepted as-is.
    pub high_resolution_periods: Vec<u32>,
    pub widget_kinds: Vec<WidgetKind>,
    /// Accepted units. `None` accepts any unit.
    pub units: Option<Vec<String>>,
    /// Upper bound on `period * evaluation_periods` for alarms.
    pub max_evaluation_window_secs: Option<u64>,
}

impl Default for CapabilityDescriptor {
    fn default() -> Self {
        Self {
            statistics: vec![
                StatisticKind::Average,
                StatisticKind::Sum,
                StatisticKind::Minimum,
                StatisticKind::Maximum,
                StatisticKind::SampleCount,
                StatisticKind::ExtendedPercentile,
            ],
            period_granularity_secs: 60,
            high_resolution_periods: vec![1, 5, 10, 30],
            widget_kinds: vec![
                WidgetKind::LineGraph,
                WidgetKind::StackedArea,
                WidgetKind::SingleValue,
                WidgetKind::Bar,
                WidgetKind::AlarmStatus,
            ],
            units: None,
            max_evaluation_window_secs: Some(86_400),
        }
    }
}

/// Outcome of checking a requested period against the backend granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodSupport {
    Supported(u32),
    RoundedUp { requested: u32, effective: u32 },
    /// No supported period at or above `requested` fits in a `u32`.
    OutOfRange { requested: u32 },
}

impl PeriodSupport {
    /// The period to use. `OutOfRange` yields the requested period unchanged.
    pub fn effective(&self) -> u32 {
        match self {
            Self::Supported(period) => *period,
            Self::RoundedUp { effective, .. } => *effective,
            Self::OutOfRange { requested } => *requested,
        }
    }
}

impl CapabilityDescriptor {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn supports_statistic(&self, statistic: &Statistic) -> bool {
        if !self.statistics.contains(&statistic.kind()) {
            return false;
        }
        match statistic {
            Statistic::ExtendedPercentile(p) => p.is_finite() && *p > 0.0 && *p < 100.0,
            _ => true,
        }
    }

    /// Round `period` up to the nearest value the backend accepts.
    pub fn normalize_period(&self, period: u32) -> PeriodSupport {
        let granularity = self.period_granularity_secs;
        if granularity == 0
            || self.high_resolution_periods.contains(&period)
            || (period >= granularity && period % granularity == 0)
        {
            return PeriodSupport::Supported(period);
        }

        let effective = if period < granularity {
            Some(
                self.high_resolution_periods
                    .iter()
                    .copied()
                    .filter(|hr| *hr >= period)
                    .min()
                    .unwrap_or(granularity),
            )
        } else {
            period.div_ceil(granularity).checked_mul(granularity)
        };
        match effective {
            Some(effective) => PeriodSupport::RoundedUp {
                requested: period,
                effective,
            },
            None => PeriodSupport::OutOfRange { requested: period },
        }
    }

    pub fn supports_widget(&self, kind: WidgetKind) -> bool {
        self.widget_kinds.contains(&kind)
    }

    pub fn supports_unit(&self, unit: &str) -> bool {
        match &self.units {
            Some(units) => units.iter().any(|u| u == unit),
            None => true,
        }
    }

    /// A sample count is a count; any other unit on it is meaningless.
    pub fn unit_compatible(&self, statistic: &Statistic, unit: Option<&str>) -> bool {
        match (statistic, unit) {
            (Statistic::SampleCount, Some(unit)) => unit == "Count",
            _ => true,
        }
    }

    pub fn supports_evaluation_window(&self, period: u32, evaluation_periods: u32) -> bool {
        match self.max_evaluation_window_secs {
            Some(max) => u64::from(period) * u64::from(evaluation_periods) <= max,
            None => true,
        }
    }
}
