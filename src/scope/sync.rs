//! The synchronous (barrier-style) scope factory.
//!
//! Synchronous vertex programs read the "current" graph and write results
//! into the "next" graph, so concurrent workers processing different vertices
//! never observe a value another worker is mid-way through writing in the
//! same super-step. Swapping buffer roles at the barrier turns this
//! super-step's writes into next super-step's reads with zero copying and no
//! per-vertex locking.
//!
//! The factory owns one pooled [`SyncScope`] per worker id, allocated once
//! and rebound in place, so handing a worker its view of a vertex is O(1) and
//! allocation-free. The pool performs no locking of its own: it relies on the
//! engine's invariant that each worker id is driven by exactly one thread,
//! and each slot carries an atomic lease flag that turns a violation of that
//! invariant into a panic instead of aliased mutation.

use std::cell::UnsafeCell;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

use crate::graph::{Graph, VertexId};
use crate::scope::factory::{ScopeFactory, VertexScope};
use crate::scope::range::ScopeRange;
use crate::WorkerId;

/// A pooled, rebindable view of one vertex over the current buffer roles.
///
/// Holds handles to the source, dest, and vertex-data graphs as they were
/// assigned when the scope was last bound, plus the bound vertex id. Workers
/// receive these through [`SyncScopeFactory::get_scope`] and never construct
/// them directly.
pub struct SyncScope<G> {
    src: Arc<G>,
    dest: Arc<G>,
    vertex_data: Arc<G>,
    vertex: VertexId,
}

impl<G: Graph> SyncScope<G> {
    fn rebind(&mut self, src: &Arc<G>, dest: &Arc<G>, vertex: VertexId) {
        self.src = Arc::clone(src);
        self.dest = Arc::clone(dest);
        self.vertex = vertex;
    }

    /// The vertex this scope is currently bound to.
    #[inline]
    pub fn vertex(&self) -> VertexId {
        self.vertex
    }

    /// The buffer this super-step reads from.
    #[inline]
    pub fn source_graph(&self) -> &G {
        &self.src
    }

    /// The buffer this super-step writes into.
    #[inline]
    pub fn dest_graph(&self) -> &G {
        &self.dest
    }

    /// Vertex data that stays read-only for the whole sweep.
    #[inline]
    pub fn vertex_data_graph(&self) -> &G {
        &self.vertex_data
    }
}

struct ScopeSlot<G> {
    scope: UnsafeCell<SyncScope<G>>,
    leased: AtomicBool,
}

/// Exclusive handle to a worker's pooled scope, released on drop.
///
/// Derefs to [`SyncScope`]. Holding the guard marks the worker's slot as
/// leased; requesting another scope for the same worker id before this guard
/// drops panics.
pub struct ScopeGuard<'a, G> {
    scope: &'a mut SyncScope<G>,
    leased: &'a AtomicBool,
}

impl<G> Drop for ScopeGuard<'_, G> {
    fn drop(&mut self) {
        self.leased.store(false, Ordering::Release);
    }
}

impl<G> Deref for ScopeGuard<'_, G> {
    type Target = SyncScope<G>;

    #[inline]
    fn deref(&self) -> &SyncScope<G> {
        self.scope
    }
}

impl<G: Graph> VertexScope<G> for ScopeGuard<'_, G> {
    #[inline]
    fn vertex(&self) -> VertexId {
        self.scope.vertex()
    }

    #[inline]
    fn source_graph(&self) -> &G {
        self.scope.source_graph()
    }

    #[inline]
    fn dest_graph(&self) -> &G {
        self.scope.dest_graph()
    }

    #[inline]
    fn vertex_data_graph(&self) -> &G {
        self.scope.vertex_data_graph()
    }
}

/// Scope factory for synchronous engines: double-buffered graphs plus a
/// fixed pool of one reusable scope per worker.
///
/// # Contract
///
/// - Each worker id is driven by exactly one thread at a time. Concurrent
///   `get_scope` calls for *distinct* workers share no mutable state and may
///   run fully in parallel.
/// - [`swap_graphs`](Self::swap_graphs) must only be called at a full
///   barrier, by one thread, while no worker holds a live [`ScopeGuard`].
///   The factory cannot verify quiescence at runtime; debug builds assert
///   that no slot is leased.
pub struct SyncScopeFactory<G> {
    /// The two interchangeable buffers; which one is "source" is decided by
    /// `src_role`, never by moving the handles.
    graphs: [Arc<G>; 2],
    /// Index into `graphs` of the current source buffer (0 or 1).
    src_role: AtomicUsize,
    /// Fixed at construction, invariant under swaps.
    vertex_data: Arc<G>,
    slots: Box<[CachePadded<ScopeSlot<G>>]>,
}

// Safety: the `UnsafeCell` in each slot is only dereferenced while that
// slot's lease flag is held, and the flag is acquired with a swap, so at most
// one thread has a `&mut SyncScope` per slot at any time.
unsafe impl<G: Send + Sync> Sync for SyncScopeFactory<G> {}

impl<G: Graph> SyncScopeFactory<G> {
    /// Creates a factory over the two buffers with `num_workers` pooled
    /// scopes.
    ///
    /// The vertex-data graph is pinned to `dest_graph`'s initial handle and
    /// does not follow subsequent swaps. Panics if `num_workers` is zero.
    pub fn new(src_graph: Arc<G>, dest_graph: Arc<G>, num_workers: usize) -> Self {
        assert!(num_workers > 0, "scope factory needs at least one worker");
        let vertex_data = Arc::clone(&dest_graph);
        let slots = (0..num_workers)
            .map(|_| {
                CachePadded::new(ScopeSlot {
                    scope: UnsafeCell::new(SyncScope {
                        src: Arc::clone(&src_graph),
                        dest: Arc::clone(&dest_graph),
                        vertex_data: Arc::clone(&vertex_data),
                        vertex: 0,
                    }),
                    leased: AtomicBool::new(false),
                })
            })
            .collect();
        Self {
            graphs: [src_graph, dest_graph],
            src_role: AtomicUsize::new(0),
            vertex_data,
            slots,
        }
    }

    /// Number of pooled scopes (= worker count).
    pub fn num_workers(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    fn src_index(&self) -> usize {
        self.src_role.load(Ordering::Acquire)
    }

    /// Binds worker `worker`'s pooled scope to `vertex` over the current
    /// buffer roles and returns it.
    ///
    /// O(1), allocation-free, and touches no other worker's slot. The
    /// `range` is accepted for parity with factory variants that support
    /// multiple access policies; this factory has exactly one.
    ///
    /// # Panics
    ///
    /// If `worker` is out of range, or if the worker's previous scope guard
    /// is still alive. Both are programming-interface misuse, not
    /// recoverable conditions.
    pub fn get_scope(
        &self,
        worker: WorkerId,
        vertex: VertexId,
        range: ScopeRange,
    ) -> ScopeGuard<'_, G> {
        let _ = range;
        assert!(
            worker < self.slots.len(),
            "worker id {worker} out of range (pool has {} slots)",
            self.slots.len()
        );
        let slot = &*self.slots[worker];
        assert!(
            !slot.leased.swap(true, Ordering::Acquire),
            "worker {worker} already holds a live scope"
        );
        let src = self.src_index();
        // Safety: the lease taken above gives this thread exclusive access
        // to the slot until the returned guard drops.
        let scope = unsafe { &mut *slot.scope.get() };
        scope.rebind(&self.graphs[src], &self.graphs[src ^ 1], vertex);
        ScopeGuard {
            scope,
            leased: &slot.leased,
        }
    }

    /// Exchanges the source and dest buffer roles.
    ///
    /// Call at a full barrier, from one thread, with no live scopes; see the
    /// type-level contract. The swap flips a role bit, so graph contents are
    /// never copied.
    pub fn swap_graphs(&self) {
        debug_assert!(
            self.slots
                .iter()
                .all(|slot| !slot.leased.load(Ordering::Acquire)),
            "swap_graphs called while a worker holds a live scope"
        );
        self.src_role.fetch_xor(1, Ordering::AcqRel);
        tracing::trace!("graph buffer roles swapped");
    }

    /// Handle currently playing the source role.
    pub fn src_graph(&self) -> &Arc<G> {
        &self.graphs[self.src_index()]
    }

    /// Handle currently playing the dest role.
    pub fn dest_graph(&self) -> &Arc<G> {
        &self.graphs[self.src_index() ^ 1]
    }

    /// The vertex-data handle; invariant under [`swap_graphs`](Self::swap_graphs).
    pub fn vertex_data_graph(&self) -> &Arc<G> {
        &self.vertex_data
    }

    /// Vertex count, delegated to the vertex-data graph; stable across swaps.
    pub fn num_vertices(&self) -> usize {
        self.vertex_data.num_vertices()
    }

    /// Accepted for parity with multi-policy factories; synchronous scopes
    /// have a single fixed semantics, so this does nothing.
    pub fn set_default_scope(&self, range: ScopeRange) {
        let _ = range;
    }
}

impl<G: Graph> ScopeFactory<G> for SyncScopeFactory<G> {
    type Scope<'a>
        = ScopeGuard<'a, G>
    where
        Self: 'a;

    fn get_scope(&self, worker: WorkerId, vertex: VertexId, range: ScopeRange) -> Self::Scope<'_> {
        SyncScopeFactory::get_scope(self, worker, vertex, range)
    }

    fn release_scope<'a>(&'a self, scope: Self::Scope<'a>) {
        // The pool owns its scopes for the factory's lifetime; dropping the
        // guard clears the lease and that is all releasing means here.
        drop(scope);
    }

    fn set_default_scope(&self, range: ScopeRange) {
        SyncScopeFactory::set_default_scope(self, range);
    }

    fn num_vertices(&self) -> usize {
        SyncScopeFactory::num_vertices(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestGraph {
        n: usize,
    }

    impl Graph for TestGraph {
        fn num_vertices(&self) -> usize {
            self.n
        }
    }

    fn factory(workers: usize) -> SyncScopeFactory<TestGraph> {
        SyncScopeFactory::new(
            Arc::new(TestGraph { n: 16 }),
            Arc::new(TestGraph { n: 16 }),
            workers,
        )
    }

    #[test]
    fn binding_is_deterministic_and_overwrites() {
        let f = factory(2);

        let first = {
            let scope = f.get_scope(0, 5, ScopeRange::UseDefault);
            assert_eq!(scope.vertex(), 5);
            std::ptr::from_ref::<SyncScope<TestGraph>>(&scope)
        };

        let scope = f.get_scope(0, 9, ScopeRange::UseDefault);
        assert_eq!(scope.vertex(), 9, "latest binding wins");
        assert_eq!(
            first,
            std::ptr::from_ref::<SyncScope<TestGraph>>(&scope),
            "same pooled object for the same worker"
        );

        let other = f.get_scope(1, 9, ScopeRange::UseDefault);
        assert_ne!(
            first,
            std::ptr::from_ref::<SyncScope<TestGraph>>(&other),
            "distinct workers get distinct slots"
        );
    }

    #[test]
    fn swap_parity() {
        let f = factory(1);
        let initial_src = Arc::clone(f.src_graph());
        let initial_dest = Arc::clone(f.dest_graph());

        for round in 1..=5 {
            f.swap_graphs();
            if round % 2 == 1 {
                assert!(Arc::ptr_eq(f.src_graph(), &initial_dest));
                assert!(Arc::ptr_eq(f.dest_graph(), &initial_src));
            } else {
                assert!(Arc::ptr_eq(f.src_graph(), &initial_src));
                assert!(Arc::ptr_eq(f.dest_graph(), &initial_dest));
            }
        }
    }

    #[test]
    fn vertex_data_graph_ignores_swaps() {
        let f = factory(1);
        let vdata = Arc::clone(f.vertex_data_graph());
        assert!(Arc::ptr_eq(&vdata, f.dest_graph()), "pinned to initial dest");

        f.swap_graphs();
        f.swap_graphs();
        f.swap_graphs();
        assert!(Arc::ptr_eq(f.vertex_data_graph(), &vdata));
    }

    #[test]
    fn scope_sees_current_roles() {
        let f = factory(1);
        let initial_src = Arc::clone(f.src_graph());
        let initial_dest = Arc::clone(f.dest_graph());

        {
            let scope = f.get_scope(0, 0, ScopeRange::UseDefault);
            assert!(std::ptr::eq(scope.source_graph(), &*initial_src));
            assert!(std::ptr::eq(scope.dest_graph(), &*initial_dest));
        }

        f.swap_graphs();

        let scope = f.get_scope(0, 0, ScopeRange::UseDefault);
        assert!(std::ptr::eq(scope.source_graph(), &*initial_dest));
        assert!(std::ptr::eq(scope.dest_graph(), &*initial_src));
    }

    #[test]
    fn num_vertices_delegates_to_vertex_data() {
        let f = factory(3);
        assert_eq!(f.num_vertices(), 16);
        f.swap_graphs();
        assert_eq!(f.num_vertices(), 16);
    }

    #[test]
    fn set_default_scope_is_inert() {
        let f = factory(1);
        f.set_default_scope(ScopeRange::FullConsistency);
        let scope = f.get_scope(0, 2, ScopeRange::VertexConsistency);
        assert_eq!(scope.vertex(), 2);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_worker_panics() {
        let f = factory(2);
        let _ = f.get_scope(2, 0, ScopeRange::UseDefault);
    }

    #[test]
    #[should_panic(expected = "already holds a live scope")]
    fn double_lease_panics() {
        let f = factory(1);
        let _held = f.get_scope(0, 0, ScopeRange::UseDefault);
        let _ = f.get_scope(0, 1, ScopeRange::UseDefault);
    }

    #[test]
    fn release_makes_slot_reusable() {
        let f = factory(1);
        let scope = f.get_scope(0, 1, ScopeRange::UseDefault);
        ScopeFactory::release_scope(&f, scope);
        let scope = f.get_scope(0, 2, ScopeRange::UseDefault);
        assert_eq!(scope.vertex(), 2);
    }
}
