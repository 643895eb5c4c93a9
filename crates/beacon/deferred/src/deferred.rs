use crate::error::{DeferredError, Settlement};
use futures::future::{self, BoxFuture};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

/// A value that becomes available only after an asynchronous resolution step.
///
/// Cloning a `Deferred` is cheap and yields a handle to the same memo cell:
/// once settled, every clone observes the same outcome, and a settled value
/// never reverts to pending.
///
/// Transformations ([`Deferred::map`], [`Deferred::try_map`]) never force
/// resolution. The derived value settles the first time it is observed after
/// its source has settled, and the transformation runs exactly once.
pub struct Deferred<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    memo: OnceLock<Settlement<T>>,
    origin: Origin<T>,
}

enum Origin<T> {
    /// Settled at construction; the memo is always populated.
    Immediate,
    /// Settled by the [`Resolver`] held by the provisioning engine.
    External(watch::Receiver<Option<Settlement<T>>>),
    /// Computed from other deferred values.
    Derived(Box<dyn Derivation<T>>),
}

/// Computation that feeds a derived deferred value.
///
/// `compute` is only called once `is_ready` has returned true, and at most
/// once per derived value (the result lands in the memo cell).
trait Derivation<T>: Send + Sync {
    fn is_ready(&self) -> bool;
    fn compute(&self) -> Settlement<T>;
    fn wait(&self) -> BoxFuture<'_, ()>;
}

struct Mapped<S, T> {
    source: Deferred<S>,
    transform: Box<dyn Fn(S) -> Settlement<T> + Send + Sync>,
}

impl<S, T> Derivation<T> for Mapped<S, T>
where
    S: Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn is_ready(&self) -> bool {
        self.source.peek().is_some()
    }

    fn compute(&self) -> Settlement<T> {
        match self.source.peek() {
            Some(Ok(value)) => panic::catch_unwind(AssertUnwindSafe(|| (self.transform)(value)))
                .unwrap_or_else(|payload| Err(DeferredError::Failed(panic_reason(payload)))),
            Some(Err(e)) => Err(e),
            None => Err(DeferredError::failed("source not settled")),
        }
    }

    fn wait(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.source.settle().await.ok();
        })
    }
}

/// Reason recorded when a transformation panics.
fn panic_reason(payload: Box<dyn Any + Send>) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|m| m.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("transformation panicked: {}", message)
}

struct Joined<T> {
    parts: Vec<Deferred<T>>,
}

impl<T> Derivation<Vec<T>> for Joined<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn is_ready(&self) -> bool {
        let mut all_settled = true;
        for part in &self.parts {
            match part.peek() {
                Some(Err(_)) => return true,
                Some(Ok(_)) => {}
                None => all_settled = false,
            }
        }
        all_settled
    }

    fn compute(&self) -> Settlement<Vec<T>> {
        let outcomes: Vec<_> = self.parts.iter().map(Deferred::peek).collect();
        if let Some(Err(e)) = outcomes.iter().flatten().find(|outcome| outcome.is_err()) {
            return Err(e.clone());
        }
        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| Err(DeferredError::failed("part not settled")))
            })
            .collect()
    }

    fn wait(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            // Stops at the first failure; later parts may stay pending.
            future::try_join_all(self.parts.iter().map(|part| part.settle()))
                .await
                .ok();
        })
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_origin(origin: Origin<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                memo: OnceLock::new(),
                origin,
            }),
        }
    }

    fn settled(outcome: Settlement<T>) -> Self {
        let deferred = Self::from_origin(Origin::Immediate);
        let _ = deferred.inner.memo.set(outcome);
        deferred
    }

    /// A value that is already known.
    pub fn resolved(value: T) -> Self {
        Self::settled(Ok(value))
    }

    /// A value whose resolution has already failed.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::settled(Err(DeferredError::failed(reason)))
    }

    pub fn cancelled() -> Self {
        Self::settled(Err(DeferredError::Cancelled))
    }

    /// A pending value plus the handle that settles it.
    pub fn pending() -> (Self, Resolver<T>) {
        let (tx, rx) = watch::channel(None);
        (
            Self::from_origin(Origin::External(rx)),
            Resolver { tx },
        )
    }

    /// Combine several deferred values into one that resolves to all of their
    /// values in order, or fails with the first failure encountered.
    pub fn all(parts: Vec<Deferred<T>>) -> Deferred<Vec<T>> {
        Deferred::from_origin(Origin::Derived(Box::new(Joined { parts })))
    }

    /// Derive a new deferred value without forcing resolution.
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.try_map(move |value| Ok::<U, std::convert::Infallible>(f(value)))
    }

    /// Like [`Deferred::map`], but the transformation may fail. A failure
    /// settles the derived value as [`DeferredError::Failed`], and so does a
    /// panic inside the transformation.
    pub fn try_map<U, E, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        E: fmt::Display,
        F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    {
        let derivation = Mapped {
            source: self.clone(),
            transform: Box::new(move |value| {
                f(value).map_err(|e| DeferredError::Failed(e.to_string()))
            }),
        };
        Deferred::from_origin(Origin::Derived(Box::new(derivation)))
    }

    /// Non-blocking read. `None` while pending.
    pub fn peek(&self) -> Option<Settlement<T>> {
        if let Some(outcome) = self.inner.memo.get() {
            return Some(outcome.clone());
        }
        match &self.inner.origin {
            Origin::Immediate => None,
            Origin::External(rx) => {
                let current = rx.borrow().clone();
                let outcome = match current {
                    Some(outcome) => outcome,
                    // Closed channel: re-read in case the value landed right before close.
                    None if rx.has_changed().is_err() => rx
                        .borrow()
                        .clone()
                        .unwrap_or_else(|| Err(DeferredError::abandoned())),
                    None => return None,
                };
                Some(self.inner.memo.get_or_init(|| outcome).clone())
            }
            Origin::Derived(derivation) => {
                if !derivation.is_ready() {
                    return None;
                }
                Some(self.inner.memo.get_or_init(|| derivation.compute()).clone())
            }
        }
    }

    /// Wait until the value settles.
    pub async fn settle(&self) -> Settlement<T> {
        if let Some(outcome) = self.peek() {
            return outcome;
        }
        match &self.inner.origin {
            Origin::Immediate => Err(DeferredError::failed("immediate value missing")),
            Origin::External(rx) => {
                let mut rx = rx.clone();
                let waited = rx
                    .wait_for(Option::is_some)
                    .await
                    .map(|current| (*current).clone())
                    .ok()
                    .flatten();
                let outcome = match waited {
                    Some(outcome) => outcome,
                    None => rx
                        .borrow()
                        .clone()
                        .unwrap_or_else(|| Err(DeferredError::abandoned())),
                };
                self.inner.memo.get_or_init(|| outcome).clone()
            }
            Origin::Derived(derivation) => {
                derivation.wait().await;
                self.inner.memo.get_or_init(|| derivation.compute()).clone()
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }

    /// Whether two handles share the same memo cell.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Deferred<T>
where
    T: fmt::Debug + Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peek() {
            None => write!(f, "Deferred(pending)"),
            Some(Ok(value)) => write!(f, "Deferred({:?})", value),
            Some(Err(e)) => write!(f, "Deferred({})", e),
        }
    }
}

/// Write side of a pending [`Deferred`], owned by whoever resolves it.
///
/// Every method consumes the resolver, so a value is settled at most once.
/// Dropping it unsettled fails the deferred value.
pub struct Resolver<T> {
    tx: watch::Sender<Option<Settlement<T>>>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        self.tx.send_replace(Some(Ok(value)));
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.tx.send_replace(Some(Err(DeferredError::failed(reason))));
    }

    pub fn cancel(self) {
        self.tx.send_replace(Some(Err(DeferredError::Cancelled)));
    }
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn resolved_is_immediately_settled() {
        let d = Deferred::resolved(7u32);
        assert_eq!(d.peek(), Some(Ok(7)));
        assert!(d.is_settled());
    }

    #[test]
    fn pending_until_resolver_settles() {
        let (d, resolver) = Deferred::<String>::pending();
        assert_eq!(d.peek(), None);
        resolver.resolve("arn:fn:events-v3".into());
        assert_eq!(d.peek(), Some(Ok("arn:fn:events-v3".to_string())));
    }

    #[test]
    fn map_does_not_force_resolution() {
        let (d, resolver) = Deferred::<u32>::pending();
        let doubled = d.map(|v| v * 2);
        assert!(!doubled.is_settled());
        resolver.resolve(21);
        assert_eq!(doubled.peek(), Some(Ok(42)));
    }

    #[test]
    fn transformation_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let (d, resolver) = Deferred::<u32>::pending();
        let mapped = d.map(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            v + 1
        });
        resolver.resolve(1);
        for _ in 0..5 {
            assert_eq!(mapped.peek(), Some(Ok(2)));
        }
        let clone = mapped.clone();
        assert_eq!(clone.peek(), Some(Ok(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn independent_maps_do_not_interfere() {
        let (d, resolver) = Deferred::<u32>::pending();
        let a = d.map(|v| v + 1);
        let b = d.map(|v| v * 10);
        resolver.resolve(3);
        assert_eq!(b.peek(), Some(Ok(30)));
        assert_eq!(a.peek(), Some(Ok(4)));
        assert_eq!(d.peek(), Some(Ok(3)));
    }

    #[test]
    fn try_map_failure_settles_as_failed() {
        let d = Deferred::resolved("not-a-number".to_string());
        let parsed = d.try_map(|s| s.parse::<u32>());
        match parsed.peek() {
            Some(Err(DeferredError::Failed(_))) => {}
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn failure_propagates_through_chain() {
        let (d, resolver) = Deferred::<u32>::pending();
        let chained = d.map(|v| v + 1).map(|v| v.to_string());
        resolver.fail("resource never created");
        assert_eq!(
            chained.peek(),
            Some(Err(DeferredError::failed("resource never created")))
        );
    }

    #[test]
    fn cancellation_is_distinct_terminal_state() {
        let (d, resolver) = Deferred::<u32>::pending();
        let mapped = d.map(|v| v + 1);
        resolver.cancel();
        assert_eq!(mapped.peek(), Some(Err(DeferredError::Cancelled)));
    }

    #[test]
    fn dropped_resolver_fails_value() {
        let (d, resolver) = Deferred::<u32>::pending();
        drop(resolver);
        assert_eq!(d.peek(), Some(Err(DeferredError::abandoned())));
    }

    #[test]
    fn settled_value_never_reverts() {
        let (d, resolver) = Deferred::<u32>::pending();
        resolver.resolve(5);
        assert_eq!(d.peek(), Some(Ok(5)));
        // The resolver is gone now; the memo still answers with the value.
        assert_eq!(d.peek(), Some(Ok(5)));
    }

    #[test]
    fn all_collects_in_order() {
        let (a, ra) = Deferred::<u32>::pending();
        let b = Deferred::resolved(2);
        let joined = Deferred::all(vec![a, b]);
        assert!(!joined.is_settled());
        ra.resolve(1);
        assert_eq!(joined.peek(), Some(Ok(vec![1, 2])));
    }

    #[test]
    fn all_fails_fast() {
        let (a, _ra) = Deferred::<u32>::pending();
        let b = Deferred::<u32>::failed("boom");
        let joined = Deferred::all(vec![a, b]);
        assert_eq!(joined.peek(), Some(Err(DeferredError::failed("boom"))));
    }

    #[test]
    fn all_reports_failure_behind_pending_part() {
        let (a, ra) = Deferred::<u32>::pending();
        let b = Deferred::<u32>::resolved(2);
        let c = Deferred::<u32>::failed("queue deleted");
        let joined = Deferred::all(vec![a, b, c]);
        assert_eq!(
            joined.peek(),
            Some(Err(DeferredError::failed("queue deleted")))
        );
        ra.resolve(1);
        assert_eq!(
            joined.peek(),
            Some(Err(DeferredError::failed("queue deleted")))
        );
    }

    #[test]
    fn all_reports_first_failure_in_order() {
        let joined = Deferred::all(vec![
            Deferred::<u32>::resolved(1),
            Deferred::failed("first"),
            Deferred::failed("second"),
        ]);
        assert_eq!(joined.peek(), Some(Err(DeferredError::failed("first"))));
    }

    #[tokio::test]
    async fn all_settles_without_waiting_on_pending_parts() {
        let (a, _ra) = Deferred::<u32>::pending();
        let (b, rb) = Deferred::<u32>::pending();
        let joined = Deferred::all(vec![a, b]);
        let handle = tokio::spawn(async move { joined.settle().await });
        tokio::task::yield_now().await;
        rb.fail("stack rolled back");
        assert_eq!(
            handle.await.unwrap(),
            Err(DeferredError::failed("stack rolled back"))
        );
    }

    #[test]
    fn panicking_transformation_settles_as_failed() {
        let d = Deferred::resolved(0u32);
        let divided = d.map(|v| 100 / v);
        match divided.peek() {
            Some(Err(DeferredError::Failed(reason))) => {
                assert!(reason.starts_with("transformation panicked"), "{}", reason)
            }
            other => panic!("expected failure, got {:?}", other),
        }
        // Memoized: the closure is not run again.
        assert!(matches!(divided.peek(), Some(Err(DeferredError::Failed(_)))));
        let downstream = divided.map(|v| v + 1);
        assert!(matches!(downstream.peek(), Some(Err(DeferredError::Failed(_)))));
    }

    #[tokio::test]
    async fn settle_waits_for_resolution() {
        let (d, resolver) = Deferred::<u32>::pending();
        let mapped = d.map(|v| v * 3);
        let handle = tokio::spawn(async move { mapped.settle().await });
        tokio::task::yield_now().await;
        resolver.resolve(4);
        assert_eq!(handle.await.unwrap(), Ok(12));
    }

    #[tokio::test]
    async fn settle_reports_abandoned_resolver() {
        let (d, resolver) = Deferred::<u32>::pending();
        let waiter = d.clone();
        let handle = tokio::spawn(async move { waiter.settle().await });
        tokio::task::yield_now().await;
        drop(resolver);
        assert_eq!(handle.await.unwrap(), Err(DeferredError::abandoned()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_observe_one_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let (d, resolver) = Deferred::<u64>::pending();
        let mapped = d.map(move |v| {
            counter.fetch_add(1, Ordering::SeqCst);
            v * 2
        });

        let readers: Vec<_> = (0..16)
            .map(|_| {
                let m = mapped.clone();
                tokio::spawn(async move { m.settle().await })
            })
            .collect();
        resolver.resolve(50);

        for reader in readers {
            assert_eq!(reader.await.unwrap(), Ok(100));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ptr_eq_tracks_shared_cell() {
        let d = Deferred::resolved(1u8);
        let same = d.clone();
        let other = Deferred::resolved(1u8);
        assert!(Deferred::ptr_eq(&d, &same));
        assert!(!Deferred::ptr_eq(&d, &other));
    }

    #[test]
    fn debug_shows_state() {
        let (d, resolver) = Deferred::<u8>::pending();
        assert_eq!(format!("{:?}", d), "Deferred(pending)");
        resolver.resolve(9);
        assert_eq!(format!("{:?}", d), "Deferred(9)");
    }
}
