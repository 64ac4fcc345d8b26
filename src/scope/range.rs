//! Neighborhood access-range policies for scope factories.

/// How much of a vertex's neighborhood a scope may consistently access.
///
/// Carried across every factory variant so that schedulers can be written
/// against the [`crate::ScopeFactory`] contract without knowing which
/// variant is plugged in. The synchronous factory has a single fixed policy
/// (double-buffered reads are always consistent within a super-step) and
/// accepts these values without acting on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScopeRange {
    /// Defer to the factory's configured default policy.
    #[default]
    UseDefault,
    /// No consistency guarantees beyond the vertex's own data.
    NullConsistency,
    /// The vertex's own data is read/write consistent.
    VertexConsistency,
    /// The vertex and its adjacent edges are consistent.
    EdgeConsistency,
    /// The vertex, its edges, and its neighbors are all consistent.
    FullConsistency,
}
