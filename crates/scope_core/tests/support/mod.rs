#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use scope_core::client::memory::ClientCall;
use scope_core::{
    Activity, ActivitySchedule, Assessment, AssessmentDataPoint, Collection,
    InMemoryPatientClient, PatientAggregate, PatientClient, PatientProfile, Session,
    TransportResult, ValueEntry,
};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;

pub const PATIENT_ID: &str = "patient-1";

/// Client whose calls can be held open until the test releases them.
pub struct GatedClient {
    pub backend: InMemoryPatientClient,
    gates: RefCell<HashMap<ClientCall, VecDeque<oneshot::Receiver<()>>>>,
    started: RefCell<Vec<ClientCall>>,
    echo: bool,
}

impl GatedClient {
    pub fn new(backend: InMemoryPatientClient) -> Self {
        Self {
            backend,
            gates: RefCell::new(HashMap::new()),
            started: RefCell::new(Vec::new()),
            echo: false,
        }
    }

    /// Entity updates answer with the submitted partial, unkeyed if it was.
    pub fn echoing(backend: InMemoryPatientClient) -> Self {
        Self {
            echo: true,
            ..Self::new(backend)
        }
    }

    /// Holds the next `call` until the returned sender fires (or drops).
    pub fn hold(&self, call: ClientCall) -> oneshot::Sender<()> {
        let (release, gate) = oneshot::channel();
        self.gates
            .borrow_mut()
            .entry(call)
            .or_default()
            .push_back(gate);
        release
    }

    /// Calls in the order they were initiated, before any gate.
    pub fn started(&self) -> Vec<ClientCall> {
        self.started.borrow().clone()
    }

    async fn pass(&self, call: ClientCall) {
        self.started.borrow_mut().push(call);
        let gate = self
            .gates
            .borrow_mut()
            .get_mut(&call)
            .and_then(VecDeque::pop_front);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }
}

#[async_trait(?Send)]
impl PatientClient for GatedClient {
    async fn fetch_aggregate(&self, patient_id: &str) -> TransportResult<PatientAggregate> {
        self.pass(ClientCall::FetchAggregate).await;
        self.backend.fetch_aggregate(patient_id).await
    }

    async fn update_profile(
        &self,
        patient_id: &str,
        partial: &PatientProfile,
    ) -> TransportResult<PatientAggregate> {
        self.pass(ClientCall::UpdateProfile).await;
        self.backend.update_profile(patient_id, partial).await
    }

    async fn update_session(&self, patient_id: &str, partial: &Session) -> TransportResult<Session> {
        self.pass(ClientCall::UpdateSession).await;
        if self.echo {
            return Ok(partial.clone());
        }
        self.backend.update_session(patient_id, partial).await
    }

    async fn update_assessment(
        &self,
        patient_id: &str,
        partial: &Assessment,
    ) -> TransportResult<Assessment> {
        self.pass(ClientCall::UpdateAssessment).await;
        if self.echo {
            return Ok(partial.clone());
        }
        self.backend.update_assessment(patient_id, partial).await
    }

    async fn update_assessment_record(
        &self,
        patient_id: &str,
        partial: &AssessmentDataPoint,
    ) -> TransportResult<AssessmentDataPoint> {
        self.pass(ClientCall::UpdateAssessmentRecord).await;
        if self.echo {
            return Ok(partial.clone());
        }
        self.backend.update_assessment_record(patient_id, partial).await
    }

    async fn update_activity(&self, patient_id: &str, partial: &Activity) -> TransportResult<Activity> {
        self.pass(ClientCall::UpdateActivity).await;
        if self.echo {
            return Ok(partial.clone());
        }
        self.backend.update_activity(patient_id, partial).await
    }

    async fn update_activity_schedule(
        &self,
        patient_id: &str,
        partial: &ActivitySchedule,
    ) -> TransportResult<ActivitySchedule> {
        self.pass(ClientCall::UpdateActivitySchedule).await;
        if self.echo {
            return Ok(partial.clone());
        }
        self.backend.update_activity_schedule(patient_id, partial).await
    }

    async fn update_value(&self, patient_id: &str, partial: &ValueEntry) -> TransportResult<ValueEntry> {
        self.pass(ClientCall::UpdateValue).await;
        if self.echo {
            return Ok(partial.clone());
        }
        self.backend.update_value(patient_id, partial).await
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Patient with one record in every collection and fixed identifiers.
pub fn seeded_aggregate() -> PatientAggregate {
    let profile = PatientProfile {
        mrn: Some("MRN-0001".to_string()),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        birthdate: Some(date(1990, 6, 15)),
        ..PatientProfile::default()
    };

    let mut phq = Assessment::of_type("phq-9");
    phq.assessment_id = Some("a1".to_string());
    let mut first_score = AssessmentDataPoint::for_type("phq-9");
    first_score.assessment_data_id = Some("d1".to_string());
    first_score.assessment_id = Some("a1".to_string());
    first_score.total_score = Some(12);
    phq.data = Some(Collection::from_values(vec![first_score]));

    let mut gad = Assessment::of_type("gad-7");
    gad.assessment_id = Some("a2".to_string());

    let mut walk = Activity::named("Walk the dog");
    walk.activity_id = Some("act1".to_string());
    walk.value_id = Some("v1".to_string());

    let mut schedule = ActivitySchedule::for_activity("act1");
    schedule.schedule_id = Some("sch1".to_string());
    schedule.date = Some(date(2024, 3, 4));

    let mut value = ValueEntry::named("Health", "life-area-1");
    value.value_id = Some("v1".to_string());

    PatientAggregate {
        profile,
        sessions: Some(vec![Session {
            session_note: Some("intake".to_string()),
            ..Session::with_id("s1")
        }]),
        assessments: Some(vec![phq, gad]),
        activities: Some(vec![walk]),
        activity_schedules: Some(vec![schedule]),
        values: Some(vec![value]),
    }
}

pub fn seeded_backend() -> InMemoryPatientClient {
    InMemoryPatientClient::new().with_patient(PATIENT_ID, seeded_aggregate())
}
