/// Errors raised synchronously while constructing or deriving a descriptor.
///
/// A construction error aborts only the descriptor being built; anything
/// derived earlier stays valid.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstructionError {
    #[error("metric '{metric}' must be scoped to at least one resource")]
    EmptyScope { metric: String },

    #[error("invalid alarm policy for '{alarm}': {reason}")]
    InvalidAlarmPolicy { alarm: String, reason: String },

    #[error("invalid period {period}s: must be greater than zero")]
    InvalidPeriod { period: u32 },

    #[error("invalid widget width {width}: must be between 1 and {max}")]
    InvalidWidth { width: u32, max: u32 },

    #[error("invalid widget height {height}: must be at least 1")]
    InvalidHeight { height: u32 },
}

pub type Result<T> = std::result::Result<T, ConstructionError>;
