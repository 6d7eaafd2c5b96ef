//! Patient root record and the aggregate returned by a full load.
//!
//! # Invariants
//! - Profile merges never clear a field: absent incoming values keep the
//!   existing value.
//! - An aggregate collection that is `None` means "not included in this
//!   response", not "empty".

use crate::model::activity::{Activity, ActivitySchedule, ValueEntry};
use crate::model::assessment::Assessment;
use crate::model::record::merge_field;
use crate::model::session::Session;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatientSex {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreatmentStatus {
    Active,
    #[serde(rename = "Active Distressed")]
    ActiveDistressed,
    Deceased,
    Discharged,
    #[serde(rename = "Followed by Outside MHP ONLY")]
    FollowedByOutsideMhpOnly,
    #[serde(rename = "Followed by Psych ONLY")]
    FollowedByPsychOnly,
    #[serde(rename = "Relapse Prevention")]
    RelapsePrevention,
    Inactive,
    Continued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowupSchedule {
    #[serde(rename = "1-week follow-up")]
    OneWeek,
    #[serde(rename = "2-week follow-up")]
    TwoWeeks,
    #[serde(rename = "4-week follow-up")]
    FourWeeks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscussionFlag {
    None,
    #[serde(rename = "Flag as safety risk")]
    SafetyRisk,
    #[serde(rename = "Flag for discussion")]
    ForDiscussion,
    #[serde(rename = "Flag for discussion & safety risk")]
    ForDiscussionAndSafetyRisk,
}

/// Scalar patient attributes held at the root of a patient store.
///
/// Clinic code, regimen and referral are open vocabularies (they accept
/// "Other"), so they stay strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    #[serde(rename = "MRN", default, skip_serializing_if = "Option::is_none")]
    pub mrn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<PatientSex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_regimen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_diagnosis: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_care_manager: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_status: Option<TreatmentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followup_schedule: Option<FollowupSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discussion_flag: Option<DiscussionFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_plan: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psych_history: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substance_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psych_medications: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psych_diagnosis: Option<String>,
}

impl PatientProfile {
    /// Field-by-field merge; absent incoming values keep the current value.
    pub fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.mrn, &incoming.mrn);
        merge_field(&mut self.first_name, &incoming.first_name);
        merge_field(&mut self.last_name, &incoming.last_name);
        merge_field(&mut self.birthdate, &incoming.birthdate);
        merge_field(&mut self.sex, &incoming.sex);
        merge_field(&mut self.clinic_code, &incoming.clinic_code);
        merge_field(&mut self.treatment_regimen, &incoming.treatment_regimen);
        merge_field(&mut self.medical_diagnosis, &incoming.medical_diagnosis);

        merge_field(&mut self.primary_care_manager, &incoming.primary_care_manager);
        merge_field(&mut self.treatment_status, &incoming.treatment_status);
        merge_field(&mut self.followup_schedule, &incoming.followup_schedule);
        merge_field(&mut self.discussion_flag, &incoming.discussion_flag);
        merge_field(&mut self.referral, &incoming.referral);
        merge_field(&mut self.treatment_plan, &incoming.treatment_plan);

        merge_field(&mut self.psych_history, &incoming.psych_history);
        merge_field(&mut self.substance_use, &incoming.substance_use);
        merge_field(&mut self.psych_medications, &incoming.psych_medications);
        merge_field(&mut self.psych_diagnosis, &incoming.psych_diagnosis);
    }

    /// `"First Last"`, skipping missing parts.
    pub fn display_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Whole years between `birthdate` and `today`.
    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        self.birthdate.and_then(|birthdate| today.years_since(birthdate))
    }
}

/// Full nested patient record as returned by a load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientAggregate {
    #[serde(flatten)]
    pub profile: PatientProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sessions: Option<Vec<Session>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessments: Option<Vec<Assessment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activities: Option<Vec<Activity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_schedules: Option<Vec<ActivitySchedule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<ValueEntry>>,
}

impl PatientAggregate {
    /// Aggregate carrying only root scalars, as returned by a profile update.
    pub fn profile_only(profile: PatientProfile) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }
}
