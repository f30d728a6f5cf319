//! Job executor: runs one job end to end
//!
//! A run writes a `running` log entry, calls the content generator, records a
//! terminal outcome and commits the result to the job store so `next_run_at`
//! advances. The running-set claim is released when the run is over, whatever
//! the exit path.

use chrono::Utc;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::running_jobs::RunningJobGuard;
use super::types::{ExecutionOutcome, ExecutionResult, JobExecutionError};
use crate::errors::GeneratorError;
use crate::models::{
    EntryCompletion, ExecutionMetadata, GenerationRequest, GenerationResponse, Job,
};
use crate::repositories::{ExecutionLogStore, JobStore};
use crate::services::ContentGenerator;
use crate::utils::WorkerId;

/// Service responsible for executing scheduled content-generation jobs
pub struct JobExecutor {
    job_store: Arc<dyn JobStore>,
    log_store: Arc<dyn ExecutionLogStore>,
    generator: Arc<dyn ContentGenerator>,
    worker_id: WorkerId,
}

/// A generator call that did not produce content
struct GenerationFailure {
    message: String,
    details: Value,
    raw_result: Option<Value>,
}

impl JobExecutor {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        log_store: Arc<dyn ExecutionLogStore>,
        generator: Arc<dyn ContentGenerator>,
        worker_id: WorkerId,
    ) -> Self {
        Self {
            job_store,
            log_store,
            generator,
            worker_id,
        }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Execute `job`, consuming its running-set claim
    pub async fn execute(&self, job: Job, guard: RunningJobGuard) -> ExecutionResult {
        let span = info_span!(
            "job",
            job_id = %job.id,
            job_name = %job.name,
            worker_id = %self.worker_id
        );
        // Declared first so it is dropped last
        let _guard = guard;
        self.run(job).instrument(span).await
    }

    async fn run(&self, job: Job) -> ExecutionResult {
        let started = Instant::now();
        let metadata = ExecutionMetadata {
            worker_id: self.worker_id.to_string(),
            principal: job.created_by.clone(),
            job_name: job.name.clone(),
            settings: job.generation_settings.clone(),
            triggered_at: Utc::now(),
        };

        let entry_id = match self.log_store.create_running_entry(job.id, &metadata).await {
            Ok(entry_id) => entry_id,
            Err(e) => {
                error!(
                    "Failed to create execution log entry for job '{}', not running it: {}",
                    job.name, e
                );
                return Err(JobExecutionError::LogCreation {
                    job_id: job.id,
                    source: e,
                });
            }
        };

        let request =
            GenerationRequest::for_job(&job, self.worker_id.as_str(), Utc::now().date_naive());
        info!(
            "Executing job '{}' (target date {}, max items {})",
            job.name, request.target_date, request.max_items
        );

        let generated = self.generator.generate(&request).await;
        let execution_time_ms = elapsed_ms(started);

        match classify(generated) {
            Ok((response, raw_result)) => {
                let completion = EntryCompletion::success(
                    execution_time_ms,
                    response.topics_generated,
                    response.questions_generated,
                    raw_result.clone(),
                );
                self.complete_entry(job.id, entry_id, &completion).await;
                self.commit(job.id, true, &raw_result, completion.content_generated)
                    .await?;

                info!(
                    "Job '{}' completed in {}ms: {} topics, {} questions",
                    job.name,
                    execution_time_ms,
                    completion.topics_created,
                    completion.questions_created
                );
                Ok(ExecutionOutcome {
                    job_id: job.id,
                    success: true,
                    execution_time_ms,
                    content_generated: completion.content_generated,
                    topics_created: completion.topics_created,
                    questions_created: completion.questions_created,
                })
            }
            Err(failure) => {
                warn!(
                    "Content generation failed for job '{}' after {}ms: {}",
                    job.name, execution_time_ms, failure.message
                );
                let completion = EntryCompletion::failure(
                    execution_time_ms,
                    failure.message.clone(),
                    failure.details.clone(),
                    failure.raw_result.clone(),
                );
                self.complete_entry(job.id, entry_id, &completion).await;

                let payload = json!({
                    "success": false,
                    "error": failure.message,
                    "details": failure.details,
                    "generator_result": failure.raw_result,
                });
                self.commit(job.id, false, &payload, 0).await?;

                Err(JobExecutionError::Generation {
                    job_id: job.id,
                    message: failure.message,
                    execution_time_ms,
                })
            }
        }
    }

    /// Record the terminal state; a failure here does not stop the commit
    async fn complete_entry(&self, job_id: Uuid, entry_id: Uuid, completion: &EntryCompletion) {
        if let Err(e) = self.log_store.update_entry(entry_id, completion).await {
            error!(
                "Failed to record {} outcome in execution log entry {} for job {}: {}",
                completion.status, entry_id, job_id, e
            );
        }
    }

    async fn commit(
        &self,
        job_id: Uuid,
        success: bool,
        payload: &Value,
        produced_count: u32,
    ) -> Result<(), JobExecutionError> {
        self.job_store
            .commit_execution(job_id, success, payload, produced_count)
            .await
            .map_err(|e| {
                error!(
                    "Consistency risk: execution of job {} was logged as {} but the job store commit failed, next_run_at was not advanced: {}",
                    job_id,
                    if success { "success" } else { "failed" },
                    e
                );
                JobExecutionError::Commit {
                    job_id,
                    success,
                    source: e,
                }
            })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Split a generator result into a successful response or a failure record
fn classify(
    generated: Result<GenerationResponse, GeneratorError>,
) -> Result<(GenerationResponse, Value), GenerationFailure> {
    match generated {
        Ok(response) => {
            let raw_result = serde_json::to_value(&response).unwrap_or(Value::Null);
            if response.success {
                Ok((response, raw_result))
            } else {
                Err(GenerationFailure {
                    message: response
                        .error
                        .clone()
                        .unwrap_or_else(|| "Generator reported an unsuccessful run".to_string()),
                    details: json!({ "kind": "unsuccessful_response" }),
                    raw_result: Some(raw_result),
                })
            }
        }
        Err(e) => Err(GenerationFailure {
            message: e.to_string(),
            details: json!({
                "kind": "generator_error",
                "status": e.status(),
                "timeout": e.is_timeout(),
            }),
            raw_result: None,
        }),
    }
}
