//! # `superstep` - Synchronization Substrate for Vertex-Centric Engines
//!
//! The two hard concurrency pieces of a synchronous (barrier/BSP-style)
//! parallel graph computation engine, packaged as a library:
//!
//! 1. **Synchronous scope factory** ([`SyncScopeFactory`]): a pool of one
//!    reusable per-worker "scope" — a bound view of a single vertex over a
//!    double-buffered pair of graph instances — plus the atomic-at-barrier
//!    role swap that turns this super-step's writes into the next
//!    super-step's reads with zero copying.
//! 2. **Shared termination detector** ([`SharedTermination`]): a
//!    condition-variable protocol by which N independent worker threads
//!    agree, without a central coordinator polling them, that a shared work
//!    queue is permanently empty and everyone may stop.
//!
//! The graph representation, vertex-program semantics, and the scheduler's
//! queue policy are all external collaborators consumed through narrow
//! traits; see [`Graph`] and [`ScopeFactory`].
//!
//! ## Safety Guarantees
//!
//! - **Pool exclusivity**: each worker's pooled scope is guarded by an atomic
//!   lease flag. Taking a second scope for the same worker id before the
//!   first guard drops is a contract violation and panics instead of
//!   aliasing.
//! - **Protocol ordering by construction**: the sleep protocol's
//!   begin/check/cancel-or-end ordering is encoded in a consuming guard type
//!   ([`SleepCriticalSection`]), so out-of-sequence calls are
//!   unrepresentable rather than undefined.
//! - **Serialized termination decision**: the detector's mutex makes "observe
//!   an empty queue, then decrement the active count" one atomic step from
//!   every other worker's point of view, which is what rules out premature
//!   termination.
//!
//! ## Scope factory example
//!
//! ```rust
//! use std::sync::Arc;
//! use superstep::{Graph, ScopeRange, SyncScopeFactory};
//!
//! struct Mesh {
//!     vertices: usize,
//! }
//!
//! impl Graph for Mesh {
//!     fn num_vertices(&self) -> usize {
//!         self.vertices
//!     }
//! }
//!
//! let factory = SyncScopeFactory::new(
//!     Arc::new(Mesh { vertices: 8 }),
//!     Arc::new(Mesh { vertices: 8 }),
//!     2, // worker count
//! );
//!
//! let scope = factory.get_scope(0, 3, ScopeRange::UseDefault);
//! assert_eq!(scope.vertex(), 3);
//! drop(scope);
//!
//! // At the barrier, once no scope is live:
//! factory.swap_graphs();
//! ```
//!
//! ## Termination protocol example
//!
//! Each worker wraps its "queue looks empty, maybe sleep" decision in the
//! detector's critical section. Here both workers have nothing to do, so the
//! run terminates immediately:
//!
//! ```rust
//! use std::sync::Arc;
//! use superstep::SharedTermination;
//!
//! let term = Arc::new(SharedTermination::new(2));
//!
//! std::thread::scope(|s| {
//!     for worker in 0..2 {
//!         let term = &term;
//!         s.spawn(move || loop {
//!             let cs = term.begin_sleep(worker);
//!             // ... check the real work queue here; it is empty ...
//!             if cs.end() {
//!                 break;
//!             }
//!         });
//!     }
//! });
//!
//! assert_eq!(term.num_active(), 0);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod graph;
pub mod scope;
pub mod termination;

pub use graph::{Graph, VertexId};
pub use scope::{ScopeFactory, ScopeGuard, ScopeRange, SyncScope, SyncScopeFactory, VertexScope};
pub use termination::{SharedTermination, SleepCriticalSection};

/// Identifier of one logical worker thread, in `[0, num_workers)`.
pub type WorkerId = usize;

// Compile-time layout claims for the hot-path types.
const _: () = {
    use core::mem;

    // The inert range parameter must stay a free-to-pass byte.
    assert!(mem::size_of::<ScopeRange>() == 1);
};
