//! Logical node identities, stable across runs.

use crate::error::ParseNodeIdError;
use beacon_descriptors::MetricDescriptor;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Kind of a composition graph node, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Resource,
    Metric,
    Alarm,
    Widget,
    Dashboard,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Metric => "metric",
            Self::Alarm => "alarm",
            Self::Widget => "widget",
            Self::Dashboard => "dashboard",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resource" => Ok(Self::Resource),
            "metric" => Ok(Self::Metric),
            "alarm" => Ok(Self::Alarm),
            "widget" => Ok(Self::Widget),
            "dashboard" => Ok(Self::Dashboard),
            other => Err(ParseNodeIdError(format!("unknown node kind '{}'", other))),
        }
    }
}

/// Identity of a node. Derived from logical names only, so the same
/// declaration maps to the same id whatever physical identifiers it
/// resolves to.
///
/// Rendered as `kind:name`, which is also its serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    kind: NodeKind,
    name: String,
}

impl NodeId {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn resource(logical_name: &str) -> Self {
        Self::new(NodeKind::Resource, logical_name)
    }

    pub fn metric(metric: &MetricDescriptor) -> Self {
        Self::new(NodeKind::Metric, metric.logical_key())
    }

    pub fn alarm(name: &str) -> Self {
        Self::new(NodeKind::Alarm, name)
    }

    pub fn widget(dashboard: &str, position: usize) -> Self {
        Self::new(NodeKind::Widget, format!("{}/{}", dashboard, position))
    }

    pub fn dashboard(name: &str) -> Self {
        Self::new(NodeKind::Dashboard, name)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| ParseNodeIdError(format!("missing kind prefix in '{}'", s)))?;
        if name.is_empty() {
            return Err(ParseNodeIdError(format!("empty name in '{}'", s)));
        }
        Ok(Self::new(kind.parse()?, name))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
