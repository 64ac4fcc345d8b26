//! The capability contract shared by all scope-factory variants.

use crate::graph::{Graph, VertexId};
use crate::scope::range::ScopeRange;
use crate::WorkerId;

/// A scope: one vertex bound over a source/dest/vertex-data graph triple.
///
/// The read/write surface a vertex program actually uses lives on the
/// concrete graph type; this trait only exposes which vertex is bound and
/// which handle currently plays which role.
pub trait VertexScope<G: Graph> {
    /// The vertex this scope is bound to.
    fn vertex(&self) -> VertexId;

    /// The graph buffer vertex programs read this super-step's values from.
    fn source_graph(&self) -> &G;

    /// The graph buffer vertex programs write next super-step's values into.
    fn dest_graph(&self) -> &G;

    /// The graph holding data that is read-only for the whole sweep.
    fn vertex_data_graph(&self) -> &G;
}

/// Hands out per-worker scopes bound to one vertex at a time.
///
/// Implemented by this crate's synchronous variant
/// ([`crate::SyncScopeFactory`]) and by sibling variants with other
/// neighborhood-locking policies elsewhere in the engine. Schedulers consume
/// factories exclusively through this trait.
pub trait ScopeFactory<G: Graph>: Send + Sync {
    /// The scope type handed to workers, borrowing from the factory.
    type Scope<'a>: VertexScope<G>
    where
        Self: 'a;

    /// Binds and returns worker `worker`'s scope to `vertex`.
    ///
    /// `range` is a request for a neighborhood access policy; variants with a
    /// single fixed policy accept and ignore it. Passing a `worker` outside
    /// `[0, num_workers)` is a contract violation and panics.
    fn get_scope(&self, worker: WorkerId, vertex: VertexId, range: ScopeRange) -> Self::Scope<'_>;

    /// Returns a scope to the factory.
    ///
    /// Pool-based variants own their scopes for the factory's lifetime, so
    /// for them this is equivalent to dropping the scope; it exists so that
    /// refcounting variants fit the same contract.
    fn release_scope<'a>(&'a self, scope: Self::Scope<'a>);

    /// Sets the policy used when `get_scope` is passed
    /// [`ScopeRange::UseDefault`]. Inert on single-policy variants.
    fn set_default_scope(&self, range: ScopeRange);

    /// Number of vertices in the underlying graphs.
    fn num_vertices(&self) -> usize;
}
