//! Assessments and their nested data points.
//!
//! # Invariants
//! - A data point belongs to exactly one assessment, found by
//!   `assessment_id` or, when absent, by `assessment_type`.
//! - Provisional identifiers of assessments and data points are prefixed with
//!   the assessment type (e.g. `phq-9-0`) when the type is known.

use crate::model::record::{merge_field, Collection, Entity, Record};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssessmentFrequency {
    Daily,
    #[serde(rename = "Once a week")]
    Weekly,
    #[serde(rename = "Every 2 weeks")]
    Biweekly,
    Monthly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_id: Option<String>,
    /// Instrument key such as `phq-9`, `gad-7` or `mood`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<AssessmentFrequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Collection<AssessmentDataPoint>>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<u64>,
}

impl Assessment {
    pub fn of_type(assessment_type: impl Into<String>) -> Self {
        Self {
            assessment_type: Some(assessment_type.into()),
            ..Self::default()
        }
    }

    /// Handles to the nested data points (empty when none were loaded).
    pub fn data_records(&self) -> Vec<Record<AssessmentDataPoint>> {
        self.data
            .as_ref()
            .map(|data| data.records().to_vec())
            .unwrap_or_default()
    }

    pub(crate) fn data_mut(&mut self) -> &mut Collection<AssessmentDataPoint> {
        self.data.get_or_insert_with(Collection::new)
    }

    /// Whether `point` should attach to this assessment.
    pub fn owns(&self, point: &AssessmentDataPoint) -> bool {
        match (&point.assessment_id, &self.assessment_id) {
            (Some(wanted), Some(own)) => wanted == own,
            (Some(_), None) => false,
            (None, _) => {
                point.assessment_type.is_some() && point.assessment_type == self.assessment_type
            }
        }
    }
}

impl Entity for Assessment {
    const KIND: &'static str = "assessment";

    fn id(&self) -> Option<&str> {
        self.assessment_id.as_deref()
    }

    fn id_slot(&mut self) -> &mut Option<String> {
        &mut self.assessment_id
    }

    fn rev(&self) -> Option<u64> {
        self.rev
    }

    fn rev_slot(&mut self) -> &mut Option<u64> {
        &mut self.rev
    }

    fn provisional_tag(&self) -> String {
        self.assessment_type
            .clone()
            .unwrap_or_else(|| Self::KIND.to_string())
    }

    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.assessment_id, &incoming.assessment_id);
        merge_field(&mut self.assessment_type, &incoming.assessment_type);
        merge_field(&mut self.frequency, &incoming.frequency);
        merge_field(&mut self.day_of_week, &incoming.day_of_week);
        merge_field(&mut self.assigned, &incoming.assigned);
        merge_field(&mut self.assigned_date, &incoming.assigned_date);
        if let Some(data) = &incoming.data {
            self.data_mut().sync_from(data);
        }
        merge_field(&mut self.rev, &incoming.rev);
    }
}

/// One submitted answer set for an assessment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentDataPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_data_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Item key (e.g. `Interest`, `Sleep`) to score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_values: Option<BTreeMap<String, u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<u32>,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<u64>,
}

impl AssessmentDataPoint {
    pub fn for_type(assessment_type: impl Into<String>) -> Self {
        Self {
            assessment_type: Some(assessment_type.into()),
            ..Self::default()
        }
    }

    /// Sum of item scores, used when the backend leaves `total_score` empty.
    pub fn computed_total(&self) -> Option<u32> {
        self.total_score.or_else(|| {
            self.point_values
                .as_ref()
                .map(|values| values.values().sum())
        })
    }
}

impl Entity for AssessmentDataPoint {
    const KIND: &'static str = "assessment-data";

    fn id(&self) -> Option<&str> {
        self.assessment_data_id.as_deref()
    }

    fn id_slot(&mut self) -> &mut Option<String> {
        &mut self.assessment_data_id
    }

    fn rev(&self) -> Option<u64> {
        self.rev
    }

    fn rev_slot(&mut self) -> &mut Option<u64> {
        &mut self.rev
    }

    fn provisional_tag(&self) -> String {
        self.assessment_type
            .clone()
            .unwrap_or_else(|| Self::KIND.to_string())
    }

    fn merge_from(&mut self, incoming: &Self) {
        merge_field(&mut self.assessment_data_id, &incoming.assessment_data_id);
        merge_field(&mut self.assessment_id, &incoming.assessment_id);
        merge_field(&mut self.assessment_type, &incoming.assessment_type);
        merge_field(&mut self.date, &incoming.date);
        merge_field(&mut self.point_values, &incoming.point_values);
        merge_field(&mut self.comment, &incoming.comment);
        merge_field(&mut self.total_score, &incoming.total_score);
        merge_field(&mut self.rev, &incoming.rev);
    }
}
