//! Per-store registry of the last revision seen for each document.
//!
//! One registry belongs to one store, so two stores for different patients
//! (or two test stores in one process) never read each other's revisions.

use crate::model::assessment::Assessment;
use crate::model::patient::PatientAggregate;
use crate::model::record::Entity;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct RevisionRegistry {
    revisions: HashMap<(&'static str, String), u64>,
}

impl RevisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn revision(&self, kind: &'static str, id: &str) -> Option<u64> {
        self.revisions.get(&(kind, id.to_string())).copied()
    }

    /// Remembers the revision carried by `record`, if it has both id and rev.
    pub fn observe<T: Entity>(&mut self, record: &T) {
        if let (Some(id), Some(rev)) = (record.id(), record.rev()) {
            self.revisions.insert((T::KIND, id.to_string()), rev);
        }
    }

    /// Records every revision in a loaded aggregate, including nested data
    /// points.
    pub fn observe_aggregate(&mut self, aggregate: &PatientAggregate) {
        for session in aggregate.sessions.iter().flatten() {
            self.observe(session);
        }
        for assessment in aggregate.assessments.iter().flatten() {
            self.observe_assessment(assessment);
        }
        for activity in aggregate.activities.iter().flatten() {
            self.observe(activity);
        }
        for schedule in aggregate.activity_schedules.iter().flatten() {
            self.observe(schedule);
        }
        for value in aggregate.values.iter().flatten() {
            self.observe(value);
        }
    }

    pub fn observe_assessment(&mut self, assessment: &Assessment) {
        self.observe(assessment);
        for point in assessment.data_records() {
            self.observe(&*point.get());
        }
    }

    /// Fills in the known revision on an outgoing partial that names an
    /// existing document but carries no revision of its own.
    pub fn stamp<T: Entity>(&self, partial: &mut T) {
        if partial.rev().is_some() {
            return;
        }
        let known = partial
            .id()
            .and_then(|id| self.revision(T::KIND, id));
        if let Some(rev) = known {
            *partial.rev_slot() = Some(rev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RevisionRegistry;
    use crate::model::record::Entity;
    use crate::model::session::Session;

    #[test]
    fn stamp_uses_last_observed_revision() {
        let mut registry = RevisionRegistry::new();
        let mut confirmed = Session::with_id("s1");
        confirmed.rev = Some(3);
        registry.observe(&confirmed);

        let mut outgoing = Session::with_id("s1");
        registry.stamp(&mut outgoing);
        assert_eq!(outgoing.rev, Some(3));
    }

    #[test]
    fn stamp_leaves_new_and_explicit_revisions_alone() {
        let mut registry = RevisionRegistry::new();
        let mut confirmed = Session::with_id("s1");
        confirmed.rev = Some(3);
        registry.observe(&confirmed);

        let mut fresh = Session::default();
        registry.stamp(&mut fresh);
        assert_eq!(fresh.rev(), None);

        let mut explicit = Session::with_id("s1");
        explicit.rev = Some(1);
        registry.stamp(&mut explicit);
        assert_eq!(explicit.rev, Some(1));
    }

    #[test]
    fn kinds_do_not_collide() {
        let mut registry = RevisionRegistry::new();
        let mut session = Session::with_id("shared");
        session.rev = Some(2);
        registry.observe(&session);

        assert_eq!(registry.revision("session", "shared"), Some(2));
        assert_eq!(registry.revision("activity", "shared"), None);
    }
}
