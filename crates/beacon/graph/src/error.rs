use crate::ids::NodeId;
use beacon_descriptors::ConstructionError;

/// Errors raised while assembling a composition graph. Each aborts only the
/// node being added.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("construction error: {0}")]
    Construction(#[from] ConstructionError),
    #[error("duplicate node: {0}")]
    DuplicateNode(NodeId),
    #[error("dangling reference: {from} depends on undeclared {missing}")]
    DanglingReference { from: NodeId, missing: NodeId },
    #[error("cycle detected at {0}")]
    CycleDetected(NodeId),
}

/// Errors reported by a materialization sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink rejected payload: {0}")]
    Rejected(String),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from loading configuration or installing telemetry.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("telemetry init failed: {0}")]
    Telemetry(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid node id: {0}")]
pub struct ParseNodeIdError(pub String);

pub type Result<T> = std::result::Result<T, GraphError>;
