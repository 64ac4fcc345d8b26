//! The narrow contract this crate requires from its graph collaborator.
//!
//! The engine owns the actual graph representation (CSR, adjacency lists,
//! whatever it likes); the scope factory only needs to count vertices and to
//! swap which of two structurally-identical instances plays the "source" role.
//! Everything else a vertex program reads or writes goes through the concrete
//! graph type, outside this crate's concern.

/// Identifier of a vertex within a graph, stable for the lifetime of a run.
pub type VertexId = u32;

/// Minimal view of a graph instance as seen by the synchronization substrate.
///
/// Implementations must have stable identity: the factory never mutates graph
/// contents, it only changes which of two handles plays which buffer role, so
/// two handles passed to [`crate::SyncScopeFactory::new`] must describe the
/// same vertex/edge topology for the lifetime of the factory.
pub trait Graph: Send + Sync {
    /// Number of vertices in this graph.
    fn num_vertices(&self) -> usize;
}
