//! Core domain state for Scope patient tracking.
//! Stores in this crate are the single writers of patient data held in memory.

pub mod client;
pub mod config;
pub mod logging;
pub mod model;
pub mod query;
pub mod reconcile;
pub mod store;

pub use client::{InMemoryPatientClient, PatientClient, TransportError, TransportResult};
pub use config::{ConfigError, ScopeConfig};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status};
pub use model::activity::{Activity, ActivitySchedule, ValueEntry};
pub use model::assessment::{Assessment, AssessmentDataPoint};
pub use model::patient::{PatientAggregate, PatientProfile};
pub use model::record::{Collection, Entity, Record};
pub use model::session::Session;
pub use query::{MutationGuard, QueryError, QuerySnapshot, QueryState, QueryStatus, QueryTracker};
pub use reconcile::{reconcile, reconcile_nested, Reconciled, ReconciliationGap};
pub use store::{AuthStore, Operation, PatientStore, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
