//! Cooperative termination detection for worker pools.
//!
//! Lets any number of worker threads agree that a shared, dynamically
//! mutated work source is permanently empty, without a central coordinator
//! polling global state. See [`shared`] for the protocol.

pub mod shared;

pub use shared::{SharedTermination, SleepCriticalSection};
