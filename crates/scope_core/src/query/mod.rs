//! Remote-operation tracking primitives shared by all stores.
//!
//! # Responsibility
//! - `QueryState`: lifecycle value of one operation.
//! - `QueryTracker`: runs calls and publishes state transitions.
//! - `MutationGuard`: defers mutations while a governing load is pending.

pub mod guard;
pub mod state;
pub mod tracker;

pub use guard::MutationGuard;
pub use state::{QueryError, QuerySnapshot, QueryState, QueryStatus};
pub use tracker::QueryTracker;
