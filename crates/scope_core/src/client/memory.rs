//! In-process backend implementing `PatientClient`.
//!
//! # Responsibility
//! - Simulate the patient service: server-assigned identifiers, revision
//!   bumps on every write, stale-revision rejection.
//! - Let hosts and tests script transport failures per call.
//!
//! # Invariants
//! - Every stored document has an identifier and a revision `>= 1`.
//! - A write naming an unknown identifier fails with `NotFound`; it never
//!   creates a document under a caller-chosen identifier.

use crate::client::{PatientClient, TransportError, TransportResult};
use crate::model::activity::{Activity, ActivitySchedule, ValueEntry};
use crate::model::assessment::{Assessment, AssessmentDataPoint};
use crate::model::patient::{PatientAggregate, PatientProfile};
use crate::model::record::{Collection, Entity};
use crate::model::session::Session;
use async_trait::async_trait;
use log::debug;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Remote call names, used for failure scripting and the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientCall {
    FetchAggregate,
    UpdateProfile,
    UpdateSession,
    UpdateAssessment,
    UpdateAssessmentRecord,
    UpdateActivity,
    UpdateActivitySchedule,
    UpdateValue,
}

pub struct InMemoryPatientClient {
    patients: RefCell<HashMap<String, PatientAggregate>>,
    scripted_failures: RefCell<HashMap<ClientCall, VecDeque<TransportError>>>,
    calls: RefCell<Vec<ClientCall>>,
    check_revisions: bool,
}

impl Default for InMemoryPatientClient {
    fn default() -> Self {
        Self {
            patients: RefCell::new(HashMap::new()),
            scripted_failures: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
            check_revisions: true,
        }
    }
}

impl InMemoryPatientClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts writes regardless of the revision they carry.
    pub fn without_revision_checks(mut self) -> Self {
        self.check_revisions = false;
        self
    }

    pub fn with_patient(self, patient_id: impl Into<String>, aggregate: PatientAggregate) -> Self {
        self.insert_patient(patient_id, aggregate);
        self
    }

    /// Stores `aggregate`, assigning identifiers and revisions where missing.
    pub fn insert_patient(&self, patient_id: impl Into<String>, mut aggregate: PatientAggregate) {
        normalize_all(aggregate.sessions.get_or_insert_with(Vec::new));
        normalize_all(aggregate.activities.get_or_insert_with(Vec::new));
        normalize_all(aggregate.activity_schedules.get_or_insert_with(Vec::new));
        normalize_all(aggregate.values.get_or_insert_with(Vec::new));
        let assessments = aggregate.assessments.get_or_insert_with(Vec::new);
        normalize_all(assessments);
        for assessment in assessments.iter_mut() {
            let owner_id = assessment.assessment_id.clone();
            let owner_type = assessment.assessment_type.clone();
            let mut points = assessment.data_mut().values();
            for point in points.iter_mut() {
                normalize(point);
                if point.assessment_id.is_none() {
                    point.assessment_id = owner_id.clone();
                }
                if point.assessment_type.is_none() {
                    point.assessment_type = owner_type.clone();
                }
            }
            *assessment.data_mut() = Collection::from_values(points);
        }
        self.patients.borrow_mut().insert(patient_id.into(), aggregate);
    }

    /// Current backend copy of one patient.
    pub fn patient(&self, patient_id: &str) -> Option<PatientAggregate> {
        self.patients.borrow().get(patient_id).cloned()
    }

    /// Makes the next `call` fail with `error`. Failures queue per call.
    pub fn fail_next(&self, call: ClientCall, error: TransportError) {
        self.scripted_failures
            .borrow_mut()
            .entry(call)
            .or_default()
            .push_back(error);
    }

    /// Calls received so far, in arrival order.
    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self, call: ClientCall) -> usize {
        self.calls.borrow().iter().filter(|seen| **seen == call).count()
    }

    fn begin(&self, call: ClientCall) -> TransportResult<()> {
        self.calls.borrow_mut().push(call);
        let scripted = self
            .scripted_failures
            .borrow_mut()
            .get_mut(&call)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(error) => {
                debug!(
                    "event=scripted_failure module=client call={call:?} code={}",
                    error.code()
                );
                Err(error)
            }
            None => Ok(()),
        }
    }

    fn with_patient_mut<R>(
        &self,
        patient_id: &str,
        write: impl FnOnce(&mut PatientAggregate) -> TransportResult<R>,
    ) -> TransportResult<R> {
        let mut patients = self.patients.borrow_mut();
        let aggregate = patients
            .get_mut(patient_id)
            .ok_or_else(|| TransportError::NotFound(format!("patient {patient_id}")))?;
        write(aggregate)
    }
}

#[async_trait(?Send)]
impl PatientClient for InMemoryPatientClient {
    async fn fetch_aggregate(&self, patient_id: &str) -> TransportResult<PatientAggregate> {
        self.begin(ClientCall::FetchAggregate)?;
        self.patient(patient_id)
            .ok_or_else(|| TransportError::NotFound(format!("patient {patient_id}")))
    }

    async fn update_profile(
        &self,
        patient_id: &str,
        partial: &PatientProfile,
    ) -> TransportResult<PatientAggregate> {
        self.begin(ClientCall::UpdateProfile)?;
        self.with_patient_mut(patient_id, |aggregate| {
            aggregate.profile.merge_from(partial);
            Ok(PatientAggregate::profile_only(aggregate.profile.clone()))
        })
    }

    async fn update_session(
        &self,
        patient_id: &str,
        partial: &Session,
    ) -> TransportResult<Session> {
        self.begin(ClientCall::UpdateSession)?;
        let check = self.check_revisions;
        self.with_patient_mut(patient_id, |aggregate| {
            put(aggregate.sessions.get_or_insert_with(Vec::new), partial, check)
        })
    }

    async fn update_assessment(
        &self,
        patient_id: &str,
        partial: &Assessment,
    ) -> TransportResult<Assessment> {
        self.begin(ClientCall::UpdateAssessment)?;
        let check = self.check_revisions;
        self.with_patient_mut(patient_id, |aggregate| {
            put(aggregate.assessments.get_or_insert_with(Vec::new), partial, check)
        })
    }

    async fn update_assessment_record(
        &self,
        patient_id: &str,
        partial: &AssessmentDataPoint,
    ) -> TransportResult<AssessmentDataPoint> {
        self.begin(ClientCall::UpdateAssessmentRecord)?;
        let check = self.check_revisions;
        self.with_patient_mut(patient_id, |aggregate| {
            let assessment = aggregate
                .assessments
                .get_or_insert_with(Vec::new)
                .iter_mut()
                .find(|assessment| assessment.owns(partial))
                .ok_or_else(|| {
                    TransportError::NotFound(format!(
                        "assessment for {}",
                        partial.assessment_type.as_deref().unwrap_or("untyped data point")
                    ))
                })?;

            let mut incoming = partial.clone();
            if incoming.assessment_id.is_none() {
                incoming.assessment_id = assessment.assessment_id.clone();
            }
            let mut points = assessment.data_mut().values();
            let stored = put(&mut points, &incoming, check)?;
            *assessment.data_mut() = Collection::from_values(points);
            Ok(stored)
        })
    }

    async fn update_activity(
        &self,
        patient_id: &str,
        partial: &Activity,
    ) -> TransportResult<Activity> {
        self.begin(ClientCall::UpdateActivity)?;
        let check = self.check_revisions;
        self.with_patient_mut(patient_id, |aggregate| {
            put(aggregate.activities.get_or_insert_with(Vec::new), partial, check)
        })
    }

    async fn update_activity_schedule(
        &self,
        patient_id: &str,
        partial: &ActivitySchedule,
    ) -> TransportResult<ActivitySchedule> {
        self.begin(ClientCall::UpdateActivitySchedule)?;
        let check = self.check_revisions;
        self.with_patient_mut(patient_id, |aggregate| {
            put(
                aggregate.activity_schedules.get_or_insert_with(Vec::new),
                partial,
                check,
            )
        })
    }

    async fn update_value(
        &self,
        patient_id: &str,
        partial: &ValueEntry,
    ) -> TransportResult<ValueEntry> {
        self.begin(ClientCall::UpdateValue)?;
        let check = self.check_revisions;
        self.with_patient_mut(patient_id, |aggregate| {
            put(aggregate.values.get_or_insert_with(Vec::new), partial, check)
        })
    }
}

/// Server-side write: merge into an existing document or create a new one.
fn put<T: Entity>(documents: &mut Vec<T>, partial: &T, check_revisions: bool) -> TransportResult<T> {
    let Some(id) = partial.id() else {
        let mut created = partial.clone();
        *created.id_slot() = Some(generate_document_id());
        *created.rev_slot() = Some(1);
        documents.push(created.clone());
        return Ok(created);
    };

    let existing = documents
        .iter_mut()
        .find(|document| document.id() == Some(id))
        .ok_or_else(|| TransportError::NotFound(format!("{} {id}", T::KIND)))?;
    let current_rev = existing.rev().unwrap_or(1);
    if check_revisions {
        if let Some(rev) = partial.rev() {
            if rev != current_rev {
                return Err(TransportError::Conflict {
                    id: id.to_string(),
                    current_rev,
                });
            }
        }
    }

    existing.merge_from(partial);
    *existing.rev_slot() = Some(current_rev + 1);
    Ok(existing.clone())
}

fn normalize<T: Entity>(document: &mut T) {
    if document.id().is_none() {
        *document.id_slot() = Some(generate_document_id());
    }
    if document.rev().is_none() {
        *document.rev_slot() = Some(1);
    }
}

fn normalize_all<T: Entity>(documents: &mut [T]) {
    documents.iter_mut().for_each(normalize);
}

/// URL-safe, lowercase identifier in the style of backend set ids.
fn generate_document_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}
