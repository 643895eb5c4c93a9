use serde::{Deserialize, Serialize};

/// Terminal non-success states of a [`Deferred`](crate::Deferred).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DeferredError {
    #[error("resolution failed: {0}")]
    Failed(String),
    #[error("resolution cancelled")]
    Cancelled,
}

impl DeferredError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// The resolver was dropped before it settled the value.
    pub fn abandoned() -> Self {
        Self::Failed("resolver dropped before settling".into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Outcome of a settled deferred value.
pub type Settlement<T> = Result<T, DeferredError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_display_includes_reason() {
        let e = DeferredError::failed("stack rolled back");
        assert!(e.to_string().contains("stack rolled back"));
        assert!(!e.is_cancelled());
    }

    #[test]
    fn cancelled_is_distinct_from_failed() {
        assert!(DeferredError::Cancelled.is_cancelled());
        assert_ne!(DeferredError::Cancelled, DeferredError::abandoned());
    }
}
