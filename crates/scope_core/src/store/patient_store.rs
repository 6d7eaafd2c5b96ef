//! Patient store: one patient's nested state plus its tracked operations.
//!
//! # Responsibility
//! - Own the profile and every nested collection for one patient.
//! - Route each mutation through the load guard, the transport client and
//!   the tracker for that entity type, then reconcile the response.
//! - Expose read accessors and derived values for views.
//!
//! # Invariants
//! - The store is the only writer of its collections.
//! - A failed call leaves collections untouched; the failure is visible on
//!   that operation's tracker.
//! - A load replaces a nested collection only when the response carries it.
//! - No `RefCell` borrow is held across an `.await`.

use crate::client::{PatientClient, RemoteEntity, RevisionRegistry};
use crate::model::activity::{Activity, ActivitySchedule, ValueEntry};
use crate::model::assessment::{Assessment, AssessmentDataPoint};
use crate::model::patient::{PatientAggregate, PatientProfile};
use crate::model::record::{Collection, Entity, Record};
use crate::model::session::Session;
use crate::query::{MutationGuard, QueryError, QuerySnapshot, QueryStatus, QueryTracker};
use crate::reconcile::{reconcile, reconcile_nested};
use chrono::NaiveDate;
use log::{debug, info};
use std::cell::{Cell, Ref, RefCell};
use std::future::Future;
use std::time::Duration;

pub type StoreResult<T> = Result<T, QueryError>;

/// Tracked operations exposed to the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Full load and profile updates share this tracker.
    LoadPatientData,
    UpdateSession,
    UpdateAssessment,
    UpdateAssessmentRecord,
    UpdateActivity,
    UpdateActivitySchedule,
    UpdateValue,
}

pub struct PatientStore<C> {
    patient_id: String,
    client: C,

    profile: RefCell<PatientProfile>,
    sessions: RefCell<Collection<Session>>,
    assessments: RefCell<Collection<Assessment>>,
    activities: RefCell<Collection<Activity>>,
    activity_schedules: RefCell<Collection<ActivitySchedule>>,
    values: RefCell<Collection<ValueEntry>>,
    revisions: RefCell<RevisionRegistry>,
    fetching: Cell<usize>,

    load_query: QueryTracker<PatientAggregate>,
    session_query: QueryTracker<Session>,
    assessment_query: QueryTracker<Assessment>,
    assessment_record_query: QueryTracker<AssessmentDataPoint>,
    activity_query: QueryTracker<Activity>,
    activity_schedule_query: QueryTracker<ActivitySchedule>,
    value_query: QueryTracker<ValueEntry>,
    guard: MutationGuard<PatientAggregate>,
}

impl<C: PatientClient> PatientStore<C> {
    /// Empty store for `patient_id`; call `load` to populate it.
    pub fn new(patient_id: impl Into<String>, client: C) -> Self {
        let load_query = QueryTracker::new("loadPatientData");
        let guard = MutationGuard::new(&load_query);
        Self {
            patient_id: patient_id.into(),
            client,
            profile: RefCell::new(PatientProfile::default()),
            sessions: RefCell::new(Collection::new()),
            assessments: RefCell::new(Collection::new()),
            activities: RefCell::new(Collection::new()),
            activity_schedules: RefCell::new(Collection::new()),
            values: RefCell::new(Collection::new()),
            revisions: RefCell::new(RevisionRegistry::new()),
            fetching: Cell::new(0),
            load_query,
            session_query: QueryTracker::new("updateSession"),
            assessment_query: QueryTracker::new("updateAssessment"),
            assessment_record_query: QueryTracker::new("updateAssessmentRecord"),
            activity_query: QueryTracker::new("updateActivity"),
            activity_schedule_query: QueryTracker::new("updateActivitySchedule"),
            value_query: QueryTracker::new("updateValue"),
            guard,
        }
    }

    /// Store pre-populated from an aggregate the caller already holds (for
    /// example a registry listing row).
    pub fn from_aggregate(
        patient_id: impl Into<String>,
        client: C,
        aggregate: PatientAggregate,
    ) -> Self {
        let store = Self::new(patient_id, client);
        store.apply_aggregate(&aggregate);
        store
    }

    /// Applies a deadline to every remote call this store makes.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_query = self.load_query.with_timeout(timeout);
        self.session_query = self.session_query.with_timeout(timeout);
        self.assessment_query = self.assessment_query.with_timeout(timeout);
        self.assessment_record_query = self.assessment_record_query.with_timeout(timeout);
        self.activity_query = self.activity_query.with_timeout(timeout);
        self.activity_schedule_query = self.activity_schedule_query.with_timeout(timeout);
        self.value_query = self.value_query.with_timeout(timeout);
        self
    }

    pub fn patient_id(&self) -> &str {
        &self.patient_id
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    // ---- loading ---------------------------------------------------------

    /// Fetches the full aggregate and merges it.
    ///
    /// The load is `Pending` as soon as this returns. While a fetch is
    /// already in flight this waits for it instead of issuing a second
    /// request, and reports that fetch's outcome. Behind a pending profile
    /// update it waits for the update, then fetches.
    pub fn load(&self) -> impl Future<Output = StoreResult<()>> + '_ {
        let joining = self.fetching.get() > 0;
        let started = (!joining && !self.load_query.is_pending()).then(|| self.fetch());
        async move {
            if joining {
                return self.join_fetch().await;
            }
            match started {
                Some(fetch) => fetch.await?,
                None => {
                    self.guard.wait_for_load().await;
                    if self.fetching.get() > 0 {
                        return self.join_fetch().await;
                    }
                    self.fetch().await?
                }
            }
            info!(
                "event=store_load module=store status=ok sessions={} assessments={} activities={}",
                self.sessions.borrow().len(),
                self.assessments.borrow().len(),
                self.activities.borrow().len()
            );
            Ok(())
        }
    }

    /// Sends profile changes; the response is merged like a load.
    pub async fn update_profile(&self, partial: PatientProfile) -> StoreResult<()> {
        self.guard
            .run_after_load(move || async move {
                let client = &self.client;
                let patient_id = self.patient_id.as_str();
                self.load_query
                    .run_and_apply(
                        || client.update_profile(patient_id, &partial),
                        |aggregate| self.apply_aggregate(aggregate),
                    )
                    .await
            })
            .await
    }

    // ---- entity mutations ------------------------------------------------

    pub async fn update_session(&self, partial: Session) -> StoreResult<Record<Session>> {
        self.submit(&self.session_query, &self.sessions, partial).await
    }

    /// Creates a session; the server (or a provisional id) keys it.
    pub async fn add_session(&self, session: Session) -> StoreResult<Record<Session>> {
        self.update_session(without_id(session)).await
    }

    pub async fn update_assessment(&self, partial: Assessment) -> StoreResult<Record<Assessment>> {
        self.submit(&self.assessment_query, &self.assessments, partial)
            .await
    }

    pub async fn add_assessment(&self, assessment: Assessment) -> StoreResult<Record<Assessment>> {
        self.update_assessment(without_id(assessment)).await
    }

    /// Sends one assessment data point and attaches the response to its
    /// assessment.
    ///
    /// Returns `Ok(None)` when the call succeeded but this store holds no
    /// matching assessment; the point is dropped locally and a reload will
    /// bring it in.
    pub async fn update_assessment_record(
        &self,
        partial: AssessmentDataPoint,
    ) -> StoreResult<Option<Record<AssessmentDataPoint>>> {
        self.guard
            .run_after_load(move || async move {
                let mut partial = partial;
                self.revisions.borrow().stamp(&mut partial);
                let client = &self.client;
                let patient_id = self.patient_id.as_str();
                self.assessment_record_query
                    .run_and_apply(
                        || AssessmentDataPoint::send(client, patient_id, &partial),
                        |confirmed| {
                            let outcome =
                                reconcile_nested(&self.assessments.borrow(), confirmed.clone())
                                    .ok()?;
                            self.revisions.borrow_mut().observe(confirmed);
                            Some(outcome.into_record())
                        },
                    )
                    .await
            })
            .await
    }

    pub async fn add_assessment_record(
        &self,
        data: AssessmentDataPoint,
    ) -> StoreResult<Option<Record<AssessmentDataPoint>>> {
        self.update_assessment_record(without_id(data)).await
    }

    pub async fn update_activity(&self, partial: Activity) -> StoreResult<Record<Activity>> {
        self.submit(&self.activity_query, &self.activities, partial)
            .await
    }

    pub async fn add_activity(&self, activity: Activity) -> StoreResult<Record<Activity>> {
        self.update_activity(without_id(activity)).await
    }

    pub async fn update_activity_schedule(
        &self,
        partial: ActivitySchedule,
    ) -> StoreResult<Record<ActivitySchedule>> {
        self.submit(
            &self.activity_schedule_query,
            &self.activity_schedules,
            partial,
        )
        .await
    }

    pub async fn add_activity_schedule(
        &self,
        schedule: ActivitySchedule,
    ) -> StoreResult<Record<ActivitySchedule>> {
        self.update_activity_schedule(without_id(schedule)).await
    }

    pub async fn update_value(&self, partial: ValueEntry) -> StoreResult<Record<ValueEntry>> {
        self.submit(&self.value_query, &self.values, partial).await
    }

    pub async fn add_value(&self, value: ValueEntry) -> StoreResult<Record<ValueEntry>> {
        self.update_value(without_id(value)).await
    }

    // ---- reads -----------------------------------------------------------

    pub fn profile(&self) -> Ref<'_, PatientProfile> {
        self.profile.borrow()
    }

    pub fn sessions(&self) -> Vec<Record<Session>> {
        self.sessions.borrow().records().to_vec()
    }

    pub fn assessments(&self) -> Vec<Record<Assessment>> {
        self.assessments.borrow().records().to_vec()
    }

    pub fn activities(&self) -> Vec<Record<Activity>> {
        self.activities.borrow().records().to_vec()
    }

    pub fn activity_schedules(&self) -> Vec<Record<ActivitySchedule>> {
        self.activity_schedules.borrow().records().to_vec()
    }

    pub fn values(&self) -> Vec<Record<ValueEntry>> {
        self.values.borrow().records().to_vec()
    }

    pub fn get_session_by_id(&self, session_id: &str) -> Option<Record<Session>> {
        self.sessions.borrow().find(session_id).cloned()
    }

    pub fn get_assessment_by_id(&self, assessment_id: &str) -> Option<Record<Assessment>> {
        self.assessments.borrow().find(assessment_id).cloned()
    }

    pub fn get_assessment_by_type(&self, assessment_type: &str) -> Option<Record<Assessment>> {
        self.assessments
            .borrow()
            .iter()
            .find(|assessment| assessment.get().assessment_type.as_deref() == Some(assessment_type))
            .cloned()
    }

    pub fn get_assessment_data_by_id(
        &self,
        assessment_data_id: &str,
    ) -> Option<Record<AssessmentDataPoint>> {
        self.assessments.borrow().iter().find_map(|assessment| {
            assessment
                .get()
                .data
                .as_ref()
                .and_then(|data| data.find(assessment_data_id).cloned())
        })
    }

    pub fn get_activity_by_id(&self, activity_id: &str) -> Option<Record<Activity>> {
        self.activities.borrow().find(activity_id).cloned()
    }

    pub fn get_activity_schedule_by_id(&self, schedule_id: &str) -> Option<Record<ActivitySchedule>> {
        self.activity_schedules.borrow().find(schedule_id).cloned()
    }

    pub fn get_value_by_id(&self, value_id: &str) -> Option<Record<ValueEntry>> {
        self.values.borrow().find(value_id).cloned()
    }

    /// Data points of one assessment, in submission order.
    pub fn assessment_data_for(&self, assessment_id: &str) -> Vec<Record<AssessmentDataPoint>> {
        self.get_assessment_by_id(assessment_id)
            .map(|assessment| assessment.get().data_records())
            .unwrap_or_default()
    }

    pub fn activities_for_value(&self, value_id: &str) -> Vec<Record<Activity>> {
        self.activities
            .borrow()
            .iter()
            .filter(|activity| activity.get().value_id.as_deref() == Some(value_id))
            .cloned()
            .collect()
    }

    pub fn schedules_for_activity(&self, activity_id: &str) -> Vec<Record<ActivitySchedule>> {
        self.activity_schedules
            .borrow()
            .iter()
            .filter(|schedule| schedule.get().activity_id.as_deref() == Some(activity_id))
            .cloned()
            .collect()
    }

    // ---- derived ---------------------------------------------------------

    /// Display name, `"First Last"`.
    pub fn name(&self) -> String {
        self.profile.borrow().display_name()
    }

    /// Whole years since birthdate as of `today`.
    pub fn age(&self, today: NaiveDate) -> Option<u32> {
        self.profile.borrow().age_on(today)
    }

    pub fn is_loading(&self) -> bool {
        self.load_query.is_pending()
    }

    pub fn load_status(&self) -> QueryStatus {
        self.load_query.status()
    }

    pub fn query_snapshot(&self, operation: Operation) -> QuerySnapshot {
        match operation {
            Operation::LoadPatientData => self.load_query.snapshot(),
            Operation::UpdateSession => self.session_query.snapshot(),
            Operation::UpdateAssessment => self.assessment_query.snapshot(),
            Operation::UpdateAssessmentRecord => self.assessment_record_query.snapshot(),
            Operation::UpdateActivity => self.activity_query.snapshot(),
            Operation::UpdateActivitySchedule => self.activity_schedule_query.snapshot(),
            Operation::UpdateValue => self.value_query.snapshot(),
        }
    }

    /// Effects currently queued behind a pending load.
    pub fn deferred_mutations(&self) -> usize {
        self.guard.deferred_count()
    }

    /// Last revision this store saw for one document.
    pub fn known_revision<T: Entity>(&self, id: &str) -> Option<u64> {
        self.revisions.borrow().revision(T::KIND, id)
    }

    // ---- internals -------------------------------------------------------

    fn fetch(&self) -> impl Future<Output = StoreResult<()>> + '_ {
        let slot = FetchSlot::enter(&self.fetching);
        let client = &self.client;
        let patient_id = self.patient_id.as_str();
        let call = self.load_query.run_and_apply(
            move || client.fetch_aggregate(patient_id),
            move |aggregate| self.apply_aggregate(aggregate),
        );
        async move {
            let _slot = slot;
            call.await
        }
    }

    async fn join_fetch(&self) -> StoreResult<()> {
        self.guard.wait_for_load().await;
        match self.load_query.error() {
            Some(error) if self.load_query.status() == QueryStatus::Rejected => Err(error),
            _ => Ok(()),
        }
    }

    async fn submit<T: RemoteEntity>(
        &self,
        tracker: &QueryTracker<T>,
        collection: &RefCell<Collection<T>>,
        partial: T,
    ) -> StoreResult<Record<T>> {
        self.guard
            .run_after_load(move || async move {
                let mut partial = partial;
                self.revisions.borrow().stamp(&mut partial);
                let client = &self.client;
                let patient_id = self.patient_id.as_str();
                tracker
                    .run_and_apply(
                        || T::send(client, patient_id, &partial),
                        |confirmed| {
                            let outcome =
                                reconcile(&mut collection.borrow_mut(), confirmed.clone());
                            self.revisions.borrow_mut().observe(confirmed);
                            debug!(
                                "event=store_reconcile module=store kind={} appended={}",
                                T::KIND,
                                outcome.is_appended()
                            );
                            outcome.into_record()
                        },
                    )
                    .await
            })
            .await
    }

    fn apply_aggregate(&self, aggregate: &PatientAggregate) {
        self.profile.borrow_mut().merge_from(&aggregate.profile);
        replace_if_present(&self.sessions, &aggregate.sessions);
        replace_if_present(&self.assessments, &aggregate.assessments);
        replace_if_present(&self.activities, &aggregate.activities);
        replace_if_present(&self.activity_schedules, &aggregate.activity_schedules);
        replace_if_present(&self.values, &aggregate.values);
        self.revisions.borrow_mut().observe_aggregate(aggregate);
    }
}

/// Counts fetches in flight so concurrent `load` calls share one request.
struct FetchSlot<'a> {
    counter: &'a Cell<usize>,
}

impl<'a> FetchSlot<'a> {
    fn enter(counter: &'a Cell<usize>) -> Self {
        counter.set(counter.get() + 1);
        Self { counter }
    }
}

impl Drop for FetchSlot<'_> {
    fn drop(&mut self) {
        self.counter.set(self.counter.get().saturating_sub(1));
    }
}

fn replace_if_present<T: Clone>(slot: &RefCell<Collection<T>>, incoming: &Option<Vec<T>>) {
    if let Some(values) = incoming {
        *slot.borrow_mut() = Collection::from_values(values.iter().cloned());
    }
}

fn without_id<T: Entity>(mut entity: T) -> T {
    *entity.id_slot() = None;
    *entity.rev_slot() = None;
    entity
}
