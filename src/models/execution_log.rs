//! Execution log entry types
//!
//! One entry is written per job run: created `running` right before the
//! generator is called, then completed exactly once as `success` or `failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::GenerationSettings;
use crate::errors::StoreError;

/// Error message recorded when a `running` entry is reconciled as abandoned
pub const ABANDONED_MESSAGE: &str = "Execution abandoned: worker stopped before recording an outcome";

/// Status of one job run
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Success,
    Failed,
}

impl ExecutionStatus {
    /// Terminal entries never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Audit context captured when a run starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub worker_id: String,
    pub principal: String,
    pub job_name: String,
    pub settings: GenerationSettings,
    pub triggered_at: DateTime<Utc>,
}

/// A recorded job run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub id: Uuid,
    pub job_id: Uuid,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<u64>,
    pub content_generated: u32,
    pub topics_created: u32,
    pub questions_created: u32,
    pub error_message: Option<String>,
    pub error_details: Option<Value>,
    /// Free-form audit document; the raw generator result is merged in on completion
    pub execution_metadata: Value,
    pub worker_id: String,
}

/// Terminal update applied to a `running` entry
#[derive(Debug, Clone, PartialEq)]
pub struct EntryCompletion {
    pub status: ExecutionStatus,
    pub completed_at: DateTime<Utc>,
    pub execution_time_ms: u64,
    pub content_generated: u32,
    pub topics_created: u32,
    pub questions_created: u32,
    pub error_message: Option<String>,
    pub error_details: Option<Value>,
    pub generator_result: Option<Value>,
}

impl EntryCompletion {
    pub fn success(
        execution_time_ms: u64,
        topics_created: u32,
        questions_created: u32,
        generator_result: Value,
    ) -> Self {
        Self {
            status: ExecutionStatus::Success,
            completed_at: Utc::now(),
            execution_time_ms,
            content_generated: topics_created.saturating_add(questions_created),
            topics_created,
            questions_created,
            error_message: None,
            error_details: None,
            generator_result: Some(generator_result),
        }
    }

    /// Failed runs always record zero produced items
    pub fn failure(
        execution_time_ms: u64,
        error_message: impl Into<String>,
        error_details: Value,
        generator_result: Option<Value>,
    ) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            completed_at: Utc::now(),
            execution_time_ms,
            content_generated: 0,
            topics_created: 0,
            questions_created: 0,
            error_message: Some(error_message.into()),
            error_details: Some(error_details),
            generator_result,
        }
    }
}

impl ExecutionLogEntry {
    /// New `running` entry for `job_id`
    pub fn running(job_id: Uuid, metadata: &ExecutionMetadata) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            job_id,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            execution_time_ms: None,
            content_generated: 0,
            topics_created: 0,
            questions_created: 0,
            error_message: None,
            error_details: None,
            execution_metadata: serde_json::to_value(metadata)?,
            worker_id: metadata.worker_id.clone(),
        })
    }

    /// Apply a terminal update in place; an entry completes exactly once
    pub fn complete(&mut self, completion: &EntryCompletion) -> Result<(), StoreError> {
        if self.status.is_terminal() {
            return Err(StoreError::entry_completed(self.id));
        }
        self.status = completion.status;
        self.completed_at = Some(completion.completed_at);
        self.execution_time_ms = Some(completion.execution_time_ms);
        self.content_generated = completion.content_generated;
        self.topics_created = completion.topics_created;
        self.questions_created = completion.questions_created;
        self.error_message = completion.error_message.clone();
        self.error_details = completion.error_details.clone();
        self.execution_metadata =
            merge_generator_result(self.execution_metadata.take(), completion.generator_result.as_ref());
        Ok(())
    }
}

/// Attach the raw generator result to an audit document
pub fn merge_generator_result(metadata: Value, generator_result: Option<&Value>) -> Value {
    let Some(result) = generator_result else {
        return metadata;
    };
    match metadata {
        Value::Object(mut map) => {
            map.insert("generator_result".to_string(), result.clone());
            Value::Object(map)
        }
        other => serde_json::json!({ "metadata": other, "generator_result": result }),
    }
}
