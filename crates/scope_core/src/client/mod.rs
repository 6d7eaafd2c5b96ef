//! Transport boundary consumed by stores.
//!
//! # Responsibility
//! - Declare the remote calls a patient store needs (`PatientClient`).
//! - Classify transport failures (`TransportError`).
//! - Hold the per-store revision registry used for optimistic concurrency.
//!
//! # Invariants
//! - Clients return the backend's view of the written entity, which may be
//!   partial; stores reconcile it, clients never touch store state.
//! - Client futures are `!Send`: stores run on one cooperative thread.

use crate::model::activity::{Activity, ActivitySchedule, ValueEntry};
use crate::model::assessment::{Assessment, AssessmentDataPoint};
use crate::model::patient::{PatientAggregate, PatientProfile};
use crate::model::record::Entity;
use crate::model::session::Session;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

pub mod memory;
pub mod revisions;

pub use memory::InMemoryPatientClient;
pub use revisions::RevisionRegistry;

pub type TransportResult<T> = Result<T, TransportError>;

/// Failure of one remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connection-level failure before any response.
    Network(String),
    /// Non-success HTTP status.
    Http { status: u16, message: String },
    /// Stale `_rev`: somebody else modified the document first.
    Conflict { id: String, current_rev: u64 },
    /// Target patient or entity does not exist remotely.
    NotFound(String),
    /// No response within the configured deadline (milliseconds).
    Timeout(u64),
}

impl TransportError {
    /// Stable short code for log lines and UI mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Http { .. } => "http",
            Self::Conflict { .. } => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Timeout(_) => "timeout",
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Http { status, message } => write!(f, "request failed ({status}): {message}"),
            Self::Conflict { id, current_rev } => write!(
                f,
                "document `{id}` was modified elsewhere (current revision {current_rev})"
            ),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Timeout(ms) => write!(f, "request timed out after {ms} ms"),
        }
    }
}

impl Error for TransportError {}

/// Remote calls backing one patient store.
#[async_trait(?Send)]
pub trait PatientClient {
    async fn fetch_aggregate(&self, patient_id: &str) -> TransportResult<PatientAggregate>;

    async fn update_profile(
        &self,
        patient_id: &str,
        partial: &PatientProfile,
    ) -> TransportResult<PatientAggregate>;

    async fn update_session(&self, patient_id: &str, partial: &Session)
        -> TransportResult<Session>;

    async fn update_assessment(
        &self,
        patient_id: &str,
        partial: &Assessment,
    ) -> TransportResult<Assessment>;

    async fn update_assessment_record(
        &self,
        patient_id: &str,
        partial: &AssessmentDataPoint,
    ) -> TransportResult<AssessmentDataPoint>;

    async fn update_activity(
        &self,
        patient_id: &str,
        partial: &Activity,
    ) -> TransportResult<Activity>;

    async fn update_activity_schedule(
        &self,
        patient_id: &str,
        partial: &ActivitySchedule,
    ) -> TransportResult<ActivitySchedule>;

    async fn update_value(&self, patient_id: &str, partial: &ValueEntry)
        -> TransportResult<ValueEntry>;
}

pub type ClientFuture<'a, T> = Pin<Box<dyn Future<Output = TransportResult<T>> + 'a>>;

/// Entity with a dedicated update call on `PatientClient`.
pub trait RemoteEntity: Entity {
    fn send<'a, C: PatientClient + ?Sized>(
        client: &'a C,
        patient_id: &'a str,
        partial: &'a Self,
    ) -> ClientFuture<'a, Self>;
}

impl RemoteEntity for Session {
    fn send<'a, C: PatientClient + ?Sized>(
        client: &'a C,
        patient_id: &'a str,
        partial: &'a Self,
    ) -> ClientFuture<'a, Self> {
        client.update_session(patient_id, partial)
    }
}

impl RemoteEntity for Assessment {
    fn send<'a, C: PatientClient + ?Sized>(
        client: &'a C,
        patient_id: &'a str,
        partial: &'a Self,
    ) -> ClientFuture<'a, Self> {
        client.update_assessment(patient_id, partial)
    }
}

impl RemoteEntity for AssessmentDataPoint {
    fn send<'a, C: PatientClient + ?Sized>(
        client: &'a C,
        patient_id: &'a str,
        partial: &'a Self,
    ) -> ClientFuture<'a, Self> {
        client.update_assessment_record(patient_id, partial)
    }
}

impl RemoteEntity for Activity {
    fn send<'a, C: PatientClient + ?Sized>(
        client: &'a C,
        patient_id: &'a str,
        partial: &'a Self,
    ) -> ClientFuture<'a, Self> {
        client.update_activity(patient_id, partial)
    }
}

impl RemoteEntity for ActivitySchedule {
    fn send<'a, C: PatientClient + ?Sized>(
        client: &'a C,
        patient_id: &'a str,
        partial: &'a Self,
    ) -> ClientFuture<'a, Self> {
        client.update_activity_schedule(patient_id, partial)
    }
}

impl RemoteEntity for ValueEntry {
    fn send<'a, C: PatientClient + ?Sized>(
        client: &'a C,
        patient_id: &'a str,
        partial: &'a Self,
    ) -> ClientFuture<'a, Self> {
        client.update_value(patient_id, partial)
    }
}
