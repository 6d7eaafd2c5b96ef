//! Behavioral-activation records: activities, their schedules, and the
//! values inventory they are linked to.

use crate::model::record::{merge_field, Entity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life_area_id: Option<String>,
    /// 0..=10 self rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enjoyment: Option<u8>,
    /// 0..=10 self rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<u64>,
}

impl Activity {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl Entity for Activity {
    const KIND: &'static str = "activity";

    fn id(&self) -> Option<&str> {
        self.activity_id.as_deref()
    }

    fn id_slot(&mut self) -> &mut Option<String> {
        &mut self.activity_id
    }

    fn rev(&self) -> Option<u64> {
        self.rev
    }

    fn rev_slot(&mut self) -> &mut Option<u64> {
        &mut self.rev
    }

    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.activity_id, &incoming.activity_id);
        merge_field(&mut self.name, &incoming.name);
        merge_field(&mut self.value_id, &incoming.value_id);
        merge_field(&mut self.life_area_id, &incoming.life_area_id);
        merge_field(&mut self.enjoyment, &incoming.enjoyment);
        merge_field(&mut self.importance, &incoming.importance);
        merge_field(&mut self.is_active, &incoming.is_active);
        merge_field(&mut self.rev, &incoming.rev);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Hour of day, 0..=23.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_repetition: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_days: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_reminder: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time_of_day: Option<u8>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<u64>,
}

impl ActivitySchedule {
    pub fn for_activity(activity_id: impl Into<String>) -> Self {
        Self {
            activity_id: Some(activity_id.into()),
            ..Self::default()
        }
    }
}

impl Entity for ActivitySchedule {
    const KIND: &'static str = "activity-schedule";

    fn id(&self) -> Option<&str> {
        self.schedule_id.as_deref()
    }

    fn id_slot(&mut self) -> &mut Option<String> {
        &mut self.schedule_id
    }

    fn rev(&self) -> Option<u64> {
        self.rev
    }

    fn rev_slot(&mut self) -> &mut Option<u64> {
        &mut self.rev
    }

    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.schedule_id, &incoming.schedule_id);
        merge_field(&mut self.activity_id, &incoming.activity_id);
        merge_field(&mut self.date, &incoming.date);
        merge_field(&mut self.time_of_day, &incoming.time_of_day);
        merge_field(&mut self.has_repetition, &incoming.has_repetition);
        merge_field(&mut self.repeat_days, &incoming.repeat_days);
        merge_field(&mut self.has_reminder, &incoming.has_reminder);
        merge_field(&mut self.reminder_time_of_day, &incoming.reminder_time_of_day);
        merge_field(&mut self.rev, &incoming.rev);
    }
}

/// One entry of the patient's values inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub life_area_id: Option<String>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<u64>,
}

impl ValueEntry {
    pub fn named(name: impl Into<String>, life_area_id: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            life_area_id: Some(life_area_id.into()),
            ..Self::default()
        }
    }
}

impl Entity for ValueEntry {
    const KIND: &'static str = "value";

    fn id(&self) -> Option<&str> {
        self.value_id.as_deref()
    }

    fn id_slot(&mut self) -> &mut Option<String> {
        &mut self.value_id
    }

    fn rev(&self) -> Option<u64> {
        self.rev
    }

    fn rev_slot(&mut self) -> &mut Option<u64> {
        &mut self.rev
    }

    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.value_id, &incoming.value_id);
        merge_field(&mut self.name, &incoming.name);
        merge_field(&mut self.life_area_id, &incoming.life_area_id);
        merge_field(&mut self.rev, &incoming.rev);
    }
}
