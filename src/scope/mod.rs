//! Per-worker vertex scopes over double-buffered graphs.
//!
//! A *scope* is a bound view of one vertex over a specific pair of graph
//! buffers, handed to a worker for the duration of one vertex-program
//! invocation. The synchronous variant in [`sync`] reads from one buffer and
//! writes to the other, with buffer roles exchanged only at a global barrier;
//! [`factory`] defines the capability contract that keeps this variant
//! pluggable with sibling factories implementing other access policies.

pub mod factory;
pub mod range;
pub mod sync;

pub use factory::{ScopeFactory, VertexScope};
pub use range::ScopeRange;
pub use sync::{ScopeGuard, SyncScope, SyncScopeFactory};
