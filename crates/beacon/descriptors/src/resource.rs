//! Handles to provisioned entities whose physical identity arrives later.

use beacon_deferred::Deferred;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Physical identifier assigned by the provisioning engine (an ARN, a URL, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhysicalId(String);

impl PhysicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhysicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PhysicalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Kind of provisioned entity. Determines the dimension a metric scoped to
/// the resource is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Function,
    Queue,
    Table,
    Topic,
    Api,
    Custom(String),
}

impl ResourceKind {
    pub fn dimension_name(&self) -> &str {
        match self {
            Self::Function => "FunctionName",
            Self::Queue => "QueueName",
            Self::Table => "TableName",
            Self::Topic => "TopicName",
            Self::Api => "ApiName",
            Self::Custom(dimension) => dimension,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => write!(f, "function"),
            Self::Queue => write!(f, "queue"),
            Self::Table => write!(f, "table"),
            Self::Topic => write!(f, "topic"),
            Self::Api => write!(f, "api"),
            Self::Custom(dimension) => write!(f, "custom({})", dimension),
        }
    }
}

/// Reference to a provisioned entity: a stable logical name plus the
/// deferred physical identifier the engine fills in.
///
/// Immutable; clones share the same identifier cell.
#[derive(Clone)]
pub struct ResourceRef {
    inner: Arc<ResourceInner>,
}

struct ResourceInner {
    logical_name: String,
    kind: ResourceKind,
    identifier: Deferred<PhysicalId>,
    dimension: Deferred<String>,
}

impl ResourceRef {
    pub fn new(
        logical_name: impl Into<String>,
        kind: ResourceKind,
        identifier: Deferred<PhysicalId>,
    ) -> Self {
        let dimension = identifier.map(|id| id.as_str().to_string());
        Self {
            inner: Arc::new(ResourceInner {
                logical_name: logical_name.into(),
                kind,
                identifier,
                dimension,
            }),
        }
    }

    pub fn logical_name(&self) -> &str {
        &self.inner.logical_name
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.inner.kind
    }

    pub fn identifier(&self) -> &Deferred<PhysicalId> {
        &self.inner.identifier
    }

    /// Dimension value for metrics scoped to this resource. Shared by every
    /// metric built from this reference.
    pub fn dimension_value(&self) -> &Deferred<String> {
        &self.inner.dimension
    }

    /// Whether both handles refer to the same declared resource.
    pub fn same_as(&self, other: &ResourceRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRef")
            .field("logical_name", &self.inner.logical_name)
            .field("kind", &self.inner.kind)
            .field("identifier", &self.inner.identifier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_follows_identifier() {
        let (id, resolver) = Deferred::pending();
        let r = ResourceRef::new("fn-events", ResourceKind::Function, id);
        assert!(r.dimension_value().peek().is_none());
        resolver.resolve(PhysicalId::new("arn:fn:events-v3"));
        assert_eq!(
            r.dimension_value().peek(),
            Some(Ok("arn:fn:events-v3".to_string()))
        );
    }

    #[test]
    fn clones_share_identity() {
        let r = ResourceRef::new(
            "queue",
            ResourceKind::Queue,
            Deferred::resolved(PhysicalId::new("q-1")),
        );
        let other = ResourceRef::new(
            "queue",
            ResourceKind::Queue,
            Deferred::resolved(PhysicalId::new("q-1")),
        );
        assert!(r.same_as(&r.clone()));
        assert!(!r.same_as(&other));
    }

    #[test]
    fn dimension_names_per_kind() {
        assert_eq!(ResourceKind::Function.dimension_name(), "FunctionName");
        assert_eq!(ResourceKind::Queue.dimension_name(), "QueueName");
        assert_eq!(
            ResourceKind::Custom("StreamName".into()).dimension_name(),
            "StreamName"
        );
    }

    #[test]
    fn physical_id_display() {
        assert_eq!(PhysicalId::from("arn:x").to_string(), "arn:x");
    }
}
