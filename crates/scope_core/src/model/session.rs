//! Clinician session record.

use crate::model::record::{merge_field, Entity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// "In person at clinic", "Telehealth", ... or free text for "Other".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billable_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_note: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<u64>,
}

impl Session {
    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }
}

impl Entity for Session {
    const KIND: &'static str = "session";

    fn id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn id_slot(&mut self) -> &mut Option<String> {
        &mut self.session_id
    }

    fn rev(&self) -> Option<u64> {
        self.rev
    }

    fn rev_slot(&mut self) -> &mut Option<u64> {
        &mut self.rev
    }

    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.session_id, &incoming.session_id);
        merge_field(&mut self.date, &incoming.date);
        merge_field(&mut self.session_type, &incoming.session_type);
        merge_field(&mut self.billable_minutes, &incoming.billable_minutes);
        merge_field(&mut self.treatment_plan, &incoming.treatment_plan);
        merge_field(&mut self.reference_notes, &incoming.reference_notes);
        merge_field(&mut self.session_note, &incoming.session_note);
        merge_field(&mut self.rev, &incoming.rev);
    }
}
