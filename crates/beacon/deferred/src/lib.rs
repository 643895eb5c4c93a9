#![deny(unsafe_code)]
//! # beacon-deferred
//!
//! Deferred values for identifiers that only exist once an external
//! provisioning engine has done its work.
//!
//! ```text
//! Resolver ──settles──▶ Deferred<T> ──map──▶ Deferred<U> ──map──▶ ...
//! ```
//!
//! A [`Deferred`] is either pending or settled in one of three terminal
//! states: resolved, failed, or cancelled. Settlement is memoized, shared by
//! every clone, and never reverts. Derived values are lazy: a transformation
//! runs once, the first time the derived value is observed after its source
//! settled.

mod deferred;
mod error;

pub use deferred::{Deferred, Resolver};
pub use error::{DeferredError, Settlement};
