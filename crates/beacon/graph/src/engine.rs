//! Interfaces to the external provisioning engine: identifiers in,
//! materialized payloads out.

use crate::diff::{GraphDiff, MaterializedGraph};
use crate::error::SinkError;
use async_trait::async_trait;
use beacon_deferred::{Deferred, Resolver};
use beacon_descriptors::{PhysicalId, ResourceKind, ResourceRef};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::debug;

/// Supplies the deferred physical identifier of each declared resource.
pub trait IdentifierSupplier: Send + Sync {
    fn identifier(&self, logical_name: &str, kind: &ResourceKind) -> Deferred<PhysicalId>;

    /// Declare a resource whose identifier comes from this supplier.
    fn resource(&self, logical_name: &str, kind: ResourceKind) -> ResourceRef {
        let identifier = self.identifier(logical_name, &kind);
        ResourceRef::new(logical_name, kind, identifier)
    }
}

#[derive(Default)]
struct PendingState {
    issued: HashMap<String, Deferred<PhysicalId>>,
    resolvers: HashMap<String, Resolver<PhysicalId>>,
}

/// In-process supplier: hands out pending identifiers and lets the engine
/// settle them by logical name.
///
/// Asking twice for the same name returns the same deferred value.
#[derive(Default)]
pub struct PendingIdentifiers {
    state: Mutex<PendingState>,
}

impl PendingIdentifiers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if `logical_name` was never issued or already settled.
    pub fn resolve(&self, logical_name: &str, id: impl Into<String>) -> bool {
        match self.take(logical_name) {
            Some(resolver) => {
                resolver.resolve(PhysicalId::new(id));
                true
            }
            None => false,
        }
    }

    pub fn fail(&self, logical_name: &str, reason: impl Into<String>) -> bool {
        match self.take(logical_name) {
            Some(resolver) => {
                resolver.fail(reason);
                true
            }
            None => false,
        }
    }

    pub fn cancel(&self, logical_name: &str) -> bool {
        match self.take(logical_name) {
            Some(resolver) => {
                resolver.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every unsettled identifier. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let resolvers: Vec<_> = self.state.lock().resolvers.drain().collect();
        let count = resolvers.len();
        for (_, resolver) in resolvers {
            resolver.cancel();
        }
        count
    }

    /// Logical names still awaiting an identifier, sorted.
    pub fn pending(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().resolvers.keys().cloned().collect();
        names.sort();
        names
    }

    fn take(&self, logical_name: &str) -> Option<Resolver<PhysicalId>> {
        self.state.lock().resolvers.remove(logical_name)
    }
}

impl IdentifierSupplier for PendingIdentifiers {
    fn identifier(&self, logical_name: &str, kind: &ResourceKind) -> Deferred<PhysicalId> {
        let mut state = self.state.lock();
        if let Some(existing) = state.issued.get(logical_name) {
            return existing.clone();
        }
        debug!(resource = logical_name, %kind, "identifier issued");
        let (deferred, resolver) = Deferred::pending();
        state
            .issued
            .insert(logical_name.to_string(), deferred.clone());
        state.resolvers.insert(logical_name.to_string(), resolver);
        deferred
    }
}

/// Receives the materialized payload and the diff that produced it.
#[async_trait]
pub trait MaterializationSink: Send + Sync {
    async fn apply(&self, payload: &MaterializedGraph, diff: &GraphDiff) -> Result<(), SinkError>;
}

/// One payload accepted by an [`InMemorySink`], JSON-encoded as it would
/// travel to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    pub payload: serde_json::Value,
    pub diff: GraphDiff,
}

/// In-memory sink for testing
#[derive(Default)]
pub struct InMemorySink {
    applied: RwLock<Vec<AppliedChange>>,
    reject_next: Mutex<Option<String>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn applied(&self) -> Vec<AppliedChange> {
        self.applied.read().clone()
    }

    pub fn last(&self) -> Option<AppliedChange> {
        self.applied.read().last().cloned()
    }

    /// Make the next `apply` fail with `reason`.
    pub fn reject_next(&self, reason: impl Into<String>) {
        *self.reject_next.lock() = Some(reason.into());
    }
}

#[async_trait]
impl MaterializationSink for InMemorySink {
    async fn apply(&self, payload: &MaterializedGraph, diff: &GraphDiff) -> Result<(), SinkError> {
        if let Some(reason) = self.reject_next.lock().take() {
            return Err(SinkError::Rejected(reason));
        }
        let payload = serde_json::to_value(payload)?;
        self.applied.write().push(AppliedChange {
            payload,
            diff: diff.clone(),
        });
        Ok(())
    }
}
