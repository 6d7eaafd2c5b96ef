//! Merging server responses into in-memory collections.
//!
//! # Responsibility
//! - Update the matching record in place, or append a new one.
//! - Synthesize provisional identifiers for records the server did not key.
//! - Attach nested assessment data to its owning assessment.
//!
//! # Invariants
//! - An update never replaces a record handle; holders observe new values.
//! - Provisional identifiers never collide with identifiers already present.
//! - No I/O: these functions only touch the collections they are given.

use crate::model::assessment::{Assessment, AssessmentDataPoint};
use crate::model::record::{Collection, Entity, Record};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How an incoming record landed in its collection.
#[derive(Debug, Clone)]
pub enum Reconciled<T> {
    /// Merged into the existing record with the same identifier.
    Updated(Record<T>),
    /// Appended as a new record.
    Appended(Record<T>),
}

impl<T> Reconciled<T> {
    pub fn record(&self) -> &Record<T> {
        match self {
            Self::Updated(record) | Self::Appended(record) => record,
        }
    }

    pub fn into_record(self) -> Record<T> {
        match self {
            Self::Updated(record) | Self::Appended(record) => record,
        }
    }

    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended(_))
    }
}

/// Nested data arrived for a parent this store does not hold.
///
/// Not fatal: the data is dropped and a reload will pick it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationGap {
    pub kind: &'static str,
    pub parent_kind: &'static str,
    /// Parent identifier or type discriminator that had no match.
    pub parent_key: String,
}

impl Display for ReconciliationGap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no {} `{}` to attach {} to",
            self.parent_kind, self.parent_key, self.kind
        )
    }
}

impl Error for ReconciliationGap {}

/// `"{tag}-{n}"` with `n` starting at the collection length and bumped until
/// unused.
pub fn provisional_id<T: Entity>(collection: &Collection<T>, tag: &str) -> String {
    let mut n = collection.len();
    loop {
        let candidate = format!("{tag}-{n}");
        if !collection.contains_id(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Merges `incoming` into `collection` by identifier, or appends it.
///
/// An identifier that matches nothing is kept as-is on the appended record;
/// only records without an identifier get a provisional one.
pub fn reconcile<T: Entity>(collection: &mut Collection<T>, mut incoming: T) -> Reconciled<T> {
    if let Some(id) = incoming.id() {
        if let Some(existing) = collection.find(id) {
            let existing = existing.clone();
            existing.update(|record| record.merge_from(&incoming));
            return Reconciled::Updated(existing);
        }
    } else {
        let tag = incoming.provisional_tag();
        *incoming.id_slot() = Some(provisional_id(collection, &tag));
    }

    let record = Record::new(incoming);
    collection.push(record.clone());
    Reconciled::Appended(record)
}

/// Reconciles one assessment data point into its owning assessment.
///
/// The owner is found by `assessment_id`, falling back to `assessment_type`.
/// When no owner exists the point is dropped and a warning is logged.
pub fn reconcile_nested(
    assessments: &Collection<Assessment>,
    incoming: AssessmentDataPoint,
) -> Result<Reconciled<AssessmentDataPoint>, ReconciliationGap> {
    let owner = assessments
        .iter()
        .find(|assessment| assessment.get().owns(&incoming))
        .cloned();

    let Some(owner) = owner else {
        let gap = ReconciliationGap {
            kind: AssessmentDataPoint::KIND,
            parent_kind: Assessment::KIND,
            parent_key: incoming
                .assessment_id
                .clone()
                .or_else(|| incoming.assessment_type.clone())
                .unwrap_or_default(),
        };
        warn!(
            "event=reconcile_gap module=reconcile status=dropped kind={} parent_kind={}",
            gap.kind, gap.parent_kind
        );
        return Err(gap);
    };

    Ok(owner.update(|assessment| reconcile(assessment.data_mut(), incoming)))
}

#[cfg(test)]
mod tests {
    use super::{provisional_id, reconcile, reconcile_nested};
    use crate::model::assessment::{Assessment, AssessmentDataPoint};
    use crate::model::record::Collection;
    use crate::model::session::Session;

    fn note(id: Option<&str>, text: &str) -> Session {
        Session {
            session_id: id.map(str::to_string),
            session_note: Some(text.to_string()),
            ..Session::default()
        }
    }

    #[test]
    fn matching_identifier_merges_into_existing_record() {
        let mut sessions = Collection::from_values(vec![note(Some("s1"), "a")]);
        let held = sessions.records()[0].clone();

        let outcome = reconcile(&mut sessions, note(Some("s1"), "b"));

        assert!(!outcome.is_appended());
        assert!(outcome.record().ptr_eq(&held));
        assert_eq!(sessions.values(), vec![note(Some("s1"), "b")]);
    }

    #[test]
    fn missing_identifier_gets_first_provisional_id() {
        let mut sessions = Collection::new();
        reconcile(&mut sessions, note(None, "x"));

        assert_eq!(sessions.values(), vec![note(Some("session-0"), "x")]);
    }

    #[test]
    fn reconciling_same_record_twice_is_stable() {
        let mut sessions = Collection::from_values(vec![note(Some("s1"), "a")]);
        reconcile(&mut sessions, note(Some("s1"), "b"));
        let once = sessions.values();
        reconcile(&mut sessions, note(Some("s1"), "b"));

        assert_eq!(sessions.values(), once);
    }

    #[test]
    fn sequential_unkeyed_appends_get_distinct_ids() {
        let mut sessions = Collection::new();
        let ids: Vec<String> = (0..4)
            .map(|_| reconcile(&mut sessions, note(None, "x")).record().id().unwrap())
            .collect();

        assert_eq!(ids, ["session-0", "session-1", "session-2", "session-3"]);
    }

    #[test]
    fn provisional_id_skips_taken_candidates() {
        let collection = Collection::from_values(vec![note(Some("session-1"), "x")]);
        assert_eq!(provisional_id(&collection, "session"), "session-2");
    }

    #[test]
    fn unknown_identifier_is_kept_on_append() {
        let mut sessions = Collection::from_values(vec![note(Some("s1"), "a")]);
        let outcome = reconcile(&mut sessions, note(Some("server-9"), "b"));

        assert!(outcome.is_appended());
        assert_eq!(outcome.record().id().as_deref(), Some("server-9"));
        assert_eq!(sessions.len(), 2);
    }

    #[test]
    fn nested_point_uses_owner_type_for_provisional_id() {
        let mut phq = Assessment::of_type("phq-9");
        phq.assessment_id = Some("a1".to_string());
        let assessments = Collection::from_values(vec![phq]);

        let outcome = reconcile_nested(&assessments, AssessmentDataPoint::for_type("phq-9"))
            .expect("owner exists");
        assert_eq!(outcome.record().id().as_deref(), Some("phq-9-0"));
        assert_eq!(assessments.records()[0].get().data_records().len(), 1);
    }

    #[test]
    fn nested_point_without_owner_is_dropped() {
        let assessments = Collection::from_values(vec![Assessment::of_type("gad-7")]);
        let gap = reconcile_nested(&assessments, AssessmentDataPoint::for_type("phq-9"))
            .expect_err("no phq-9 owner");

        assert_eq!(gap.parent_key, "phq-9");
        assert!(assessments.records()[0].get().data_records().is_empty());
    }
}
