//! Per-node lifecycle and rejection causes.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a node was not materialized. Reported, never propagated as an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum RejectionCause {
    /// A deferred value the node depends on failed or never settled.
    ResolutionFailure { reason: String },
    /// The monitoring backend does not support something the node asks for.
    UnsupportedCapability { capability: String },
    IncompatibleUnit { statistic: String, unit: String },
    /// A transitive dependency was rejected.
    DependencyRejected { dependency: NodeId },
}

impl fmt::Display for RejectionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolutionFailure { reason } => write!(f, "resolution failed: {}", reason),
            Self::UnsupportedCapability { capability } => {
                write!(f, "unsupported capability: {}", capability)
            }
            Self::IncompatibleUnit { statistic, unit } => {
                write!(f, "unit {} is incompatible with statistic {}", unit, statistic)
            }
            Self::DependencyRejected { dependency } => {
                write!(f, "dependency {} was rejected", dependency)
            }
        }
    }
}

/// Node lifecycle:
///
/// ```text
/// Declared → Validated → Pending → Resolved → Materialized
///                │          │
///                └─▶ Rejected ◀─┤
///                           └─▶ Cancelled
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeState {
    Declared,
    Validated,
    Pending,
    Resolved,
    Materialized,
    Rejected { cause: RejectionCause },
    Cancelled,
}

impl NodeState {
    pub fn can_transition_to(&self, next: &NodeState) -> bool {
        use NodeState::*;
        matches!(
            (self, next),
            (Declared, Validated)
                | (Validated, Pending)
                | (Validated, Rejected { .. })
                | (Pending, Resolved)
                | (Pending, Rejected { .. })
                | (Pending, Cancelled)
                | (Resolved, Materialized)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Materialized | Self::Rejected { .. } | Self::Cancelled
        )
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    pub fn rejection(&self) -> Option<&RejectionCause> {
        match self {
            Self::Rejected { cause } => Some(cause),
            _ => None,
        }
    }
}
