//! Generation settings, their defaulting rules and the generator wire contract

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::config::defaults::{
    DEFAULT_DAYS_AHEAD, DEFAULT_DIFFICULTY_DISTRIBUTION, DEFAULT_ITEMS_PER_UNIT,
    DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_ITEMS, DEFAULT_TYPE_DISTRIBUTION,
};

use super::Job;

/// Percentage share per item type or difficulty level
pub type Distribution = BTreeMap<String, u32>;

/// Per-job generation options as authored
///
/// Every recognized option is optional; [`GenerationSettings::resolve`] is the
/// single place where fallbacks are applied. Unrecognized keys are kept in
/// `extra` so audit metadata records the settings exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    #[serde(default, alias = "max_items", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u32>,
    #[serde(default, alias = "lookback_days", skip_serializing_if = "Option::is_none")]
    pub lookback_days: Option<u32>,
    #[serde(default, alias = "items_per_unit", skip_serializing_if = "Option::is_none")]
    pub items_per_unit: Option<u32>,
    #[serde(default, alias = "days_ahead", skip_serializing_if = "Option::is_none")]
    pub days_ahead: Option<i64>,
    #[serde(default, alias = "type_distribution", skip_serializing_if = "Option::is_none")]
    pub type_distribution: Option<Distribution>,
    #[serde(
        default,
        alias = "difficulty_distribution",
        skip_serializing_if = "Option::is_none"
    )]
    pub difficulty_distribution: Option<Distribution>,
    #[serde(default, alias = "target_categories", skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Generation options with every fallback applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSettings {
    pub max_items: u32,
    pub lookback_days: u32,
    pub items_per_unit: u32,
    pub target_date: NaiveDate,
    pub type_distribution: Distribution,
    pub difficulty_distribution: Distribution,
    pub categories: Vec<String>,
}

impl GenerationSettings {
    /// Apply defaults relative to `today`
    ///
    /// An absent or empty distribution falls back to the fixed default split.
    pub fn resolve(&self, today: NaiveDate) -> ResolvedSettings {
        let days_ahead = self.days_ahead.unwrap_or(DEFAULT_DAYS_AHEAD);
        let target_date = if days_ahead >= 0 {
            today.checked_add_days(Days::new(days_ahead.unsigned_abs()))
        } else {
            today.checked_sub_days(Days::new(days_ahead.unsigned_abs()))
        }
        .unwrap_or(today);

        ResolvedSettings {
            max_items: self.max_items.unwrap_or(DEFAULT_MAX_ITEMS),
            lookback_days: self.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS),
            items_per_unit: self.items_per_unit.unwrap_or(DEFAULT_ITEMS_PER_UNIT),
            target_date,
            type_distribution: distribution_or_default(
                self.type_distribution.as_ref(),
                DEFAULT_TYPE_DISTRIBUTION,
            ),
            difficulty_distribution: distribution_or_default(
                self.difficulty_distribution.as_ref(),
                DEFAULT_DIFFICULTY_DISTRIBUTION,
            ),
            categories: self.categories.clone().unwrap_or_default(),
        }
    }
}

fn distribution_or_default(value: Option<&Distribution>, fallback: &[(&str, u8)]) -> Distribution {
    match value {
        Some(distribution) if !distribution.is_empty() => distribution.clone(),
        _ => fallback
            .iter()
            .map(|(key, share)| (key.to_string(), u32::from(*share)))
            .collect(),
    }
}

/// Request body sent to the content generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub max_items: u32,
    pub lookback_days: u32,
    pub items_per_unit: u32,
    pub type_distribution: Distribution,
    pub difficulty_distribution: Distribution,
    pub target_date: NaiveDate,
    pub force_generation: bool,
    #[serde(rename = "principalID", alias = "principalId")]
    pub principal_id: String,
    pub categories: Vec<String>,
    #[serde(rename = "jobID", alias = "jobId")]
    pub job_id: Uuid,
    pub worker_id: String,
}

impl GenerationRequest {
    /// Build the request for one scheduled run of `job`
    pub fn for_job(job: &Job, worker_id: &str, today: NaiveDate) -> Self {
        let resolved = job.generation_settings.resolve(today);
        Self {
            max_items: resolved.max_items,
            lookback_days: resolved.lookback_days,
            items_per_unit: resolved.items_per_unit,
            type_distribution: resolved.type_distribution,
            difficulty_distribution: resolved.difficulty_distribution,
            target_date: resolved.target_date,
            // Scheduled runs never override the generator's own freshness checks
            force_generation: false,
            principal_id: job.created_by.clone(),
            categories: resolved.categories,
            job_id: job.id,
            worker_id: worker_id.to_string(),
        }
    }
}

/// Response body returned by the content generator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub success: bool,
    #[serde(default)]
    pub topics_generated: u32,
    #[serde(default)]
    pub questions_generated: u32,
    #[serde(default, alias = "message", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerationResponse {
    /// Total items produced by this run
    pub fn content_generated(&self) -> u32 {
        self.topics_generated.saturating_add(self.questions_generated)
    }
}
