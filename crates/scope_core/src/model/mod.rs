//! Patient domain model held by stores.
//!
//! # Responsibility
//! - Define the wire-shaped records exchanged with the backend.
//! - Provide shared record handles and collections the reconciler writes.
//!
//! # Invariants
//! - Every field a partial response may omit is an `Option`.
//! - Each entity type enumerates its fields in an explicit merge function.

pub mod activity;
pub mod assessment;
pub mod patient;
pub mod record;
pub mod session;
