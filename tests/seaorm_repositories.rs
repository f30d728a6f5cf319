//! SeaORM job store and execution log store against in-memory SQLite

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use job_processor::config::DatabaseConfig;
use job_processor::database::Database;
use job_processor::database::repositories::{
    ExecutionLogSeaOrmRepository, ScheduledJobCreateRequest, ScheduledJobSeaOrmRepository,
};
use job_processor::entities::scheduled_jobs;
use job_processor::errors::StoreError;
use job_processor::job_scheduling::{Processor, TickReport};
use job_processor::models::{
    ABANDONED_MESSAGE, EntryCompletion, ExecutionMetadata, ExecutionStatus, GenerationSettings,
    ScheduleConfig,
};
use job_processor::repositories::{ExecutionLogStore, JobStore};

/// Write a job row directly, bypassing the repository's checks
async fn insert_raw_job(database: &Database, generation_settings: &str, schedule_config: &str) -> Uuid {
    let id = Uuid::new_v4();
    let now = Utc::now();
    scheduled_jobs::ActiveModel {
        id: Set(id.to_string()),
        name: Set("raw".to_string()),
        generation_settings: Set(generation_settings.to_string()),
        schedule_config: Set(schedule_config.to_string()),
        created_by: Set("external".to_string()),
        next_run_at: Set(now - ChronoDuration::minutes(30)),
        is_active: Set(true),
        last_run_at: Set(None),
        last_result: Set(None),
        total_runs: Set(0),
        successful_runs: Set(0),
        failed_runs: Set(0),
        total_items_generated: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*database.connection())
    .await
    .expect("Failed to insert raw job row");
    id
}

async fn create_test_database() -> Database {
    let database = Database::new(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: None,
    })
    .await
    .expect("Failed to connect to in-memory database");
    database.migrate().await.expect("Failed to run migrations");
    database
}

fn create_request(name: &str, minutes_ago: i64, schedule_config: ScheduleConfig) -> ScheduledJobCreateRequest {
    ScheduledJobCreateRequest {
        name: name.to_string(),
        generation_settings: serde_json::from_value(json!({
            "maxItems": 4,
            "categories": ["biology"],
            "legacyFlag": true
        }))
        .unwrap(),
        created_by: "principal-7".to_string(),
        next_run_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
        schedule_config,
    }
}

fn hourly() -> ScheduleConfig {
    ScheduleConfig::Interval {
        every: Duration::from_secs(3600),
    }
}

fn metadata(job_name: &str) -> ExecutionMetadata {
    ExecutionMetadata {
        worker_id: "worker-1-repotests".to_string(),
        principal: "principal-7".to_string(),
        job_name: job_name.to_string(),
        settings: GenerationSettings::default(),
        triggered_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_create_and_find_round_trips_settings() {
    let database = create_test_database().await;
    let repo = ScheduledJobSeaOrmRepository::new(database.connection(), Duration::from_secs(3600));

    let job = repo.create(create_request("biology", 5, hourly())).await.unwrap();
    let record = repo.find_by_id(&job.id).await.unwrap().unwrap();

    assert!(record.is_active);
    assert_eq!(record.total_runs, 0);
    assert_eq!(record.job.name, "biology");
    assert_eq!(record.job.generation_settings.max_items, Some(4));
    assert_eq!(
        record.job.generation_settings.extra["legacyFlag"],
        json!(true)
    );
    assert_eq!(record.job.schedule_config, hourly());

    assert!(repo.find_by_id(&Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_due_jobs_orders_oldest_first() {
    let database = create_test_database().await;
    let repo = ScheduledJobSeaOrmRepository::new(database.connection(), Duration::from_secs(3600));

    let newer = repo.create(create_request("newer", 1, hourly())).await.unwrap();
    let older = repo.create(create_request("older", 30, hourly())).await.unwrap();
    repo.create(create_request("future", -30, hourly())).await.unwrap();

    let due = repo.fetch_due_jobs(Utc::now()).await.unwrap();
    let ids: Vec<Uuid> = due.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![older.id, newer.id]);
}

#[tokio::test]
async fn test_commit_advances_interval_and_counts() {
    let database = create_test_database().await;
    let repo = ScheduledJobSeaOrmRepository::new(database.connection(), Duration::from_secs(3600));
    let job = repo.create(create_request("hourly", 5, hourly())).await.unwrap();

    let before = Utc::now();
    repo.commit_execution(job.id, true, &json!({"success": true}), 7)
        .await
        .unwrap();
    repo.commit_execution(job.id, false, &json!({"success": false}), 0)
        .await
        .unwrap();

    let record = repo.find_by_id(&job.id).await.unwrap().unwrap();
    assert!(record.is_active);
    assert!(record.job.next_run_at >= before + ChronoDuration::minutes(59));
    assert_eq!(record.total_runs, 2);
    assert_eq!(record.successful_runs, 1);
    assert_eq!(record.failed_runs, 1);
    assert_eq!(record.total_items_generated, 7);
    assert_eq!(record.last_result, Some(json!({"success": false})));
    assert!(repo.fetch_due_jobs(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_commit_cron_and_once_schedules() {
    let database = create_test_database().await;
    let repo = ScheduledJobSeaOrmRepository::new(database.connection(), Duration::from_secs(3600));

    let cron = repo
        .create(create_request(
            "daily",
            5,
            ScheduleConfig::Cron {
                expression: "0 0 6 * * * *".to_string(),
            },
        ))
        .await
        .unwrap();
    let once = repo
        .create(create_request("once", 5, ScheduleConfig::Once))
        .await
        .unwrap();

    repo.commit_execution(cron.id, true, &json!({}), 1).await.unwrap();
    repo.commit_execution(once.id, true, &json!({}), 1).await.unwrap();

    let cron_record = repo.find_by_id(&cron.id).await.unwrap().unwrap();
    assert!(cron_record.job.next_run_at > Utc::now());
    assert_eq!(
        cron_record.job.next_run_at.format("%H:%M:%S").to_string(),
        "06:00:00"
    );

    let once_record = repo.find_by_id(&once.id).await.unwrap().unwrap();
    assert!(!once_record.is_active);
    assert!(repo.fetch_due_jobs(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_rejects_uninterpretable_schedules() {
    let database = create_test_database().await;
    let repo = ScheduledJobSeaOrmRepository::new(database.connection(), Duration::from_secs(3600));

    let missing = repo
        .commit_execution(Uuid::new_v4(), true, &json!({}), 0)
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));

    for schedule_config in [
        ScheduleConfig::Cron {
            expression: "every tuesday".to_string(),
        },
        ScheduleConfig::Interval {
            every: Duration::ZERO,
        },
        ScheduleConfig::Interval {
            every: Duration::MAX,
        },
    ] {
        let result = repo.create(create_request("broken", 5, schedule_config)).await;
        assert!(matches!(result, Err(StoreError::InvalidSchedule { .. })));
    }
    assert!(repo.fetch_due_jobs(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_commit_deactivates_job_with_stored_bad_schedule() {
    let database = create_test_database().await;
    let repo = ScheduledJobSeaOrmRepository::new(database.connection(), Duration::from_secs(3600));

    let broken = insert_raw_job(&database, "{}", r#"{"type":"cron","expression":"every tuesday"}"#).await;
    assert_eq!(repo.fetch_due_jobs(Utc::now()).await.unwrap().len(), 1);

    repo.commit_execution(broken, false, &json!({"error": "boom"}), 0)
        .await
        .unwrap();

    let record = repo.find_by_id(&broken).await.unwrap().unwrap();
    assert!(!record.is_active);
    assert_eq!(record.failed_runs, 1);
    assert!(repo.fetch_due_jobs(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_due_jobs_skips_unreadable_rows() {
    let database = create_test_database().await;
    let repo = ScheduledJobSeaOrmRepository::new(database.connection(), Duration::from_secs(3600));

    insert_raw_job(&database, r#"{"maxItems":"10"}"#, r#"{"type":"once"}"#).await;
    let healthy = repo.create(create_request("healthy", 5, hourly())).await.unwrap();

    let due = repo.fetch_due_jobs(Utc::now()).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, healthy.id);
}

#[tokio::test]
async fn test_execution_log_lifecycle() {
    let database = create_test_database().await;
    let logs = ExecutionLogSeaOrmRepository::new(database.connection());
    let job_id = Uuid::new_v4();

    let entry_id = logs
        .create_running_entry(job_id, &metadata("biology"))
        .await
        .unwrap();
    let running = logs.find_by_id(&entry_id).await.unwrap().unwrap();
    assert_eq!(running.status, ExecutionStatus::Running);
    assert_eq!(running.worker_id, "worker-1-repotests");
    assert_eq!(running.execution_metadata["job_name"], json!("biology"));

    let result = json!({"success": true, "topicsGenerated": 1, "questionsGenerated": 5});
    logs.update_entry(entry_id, &EntryCompletion::success(1200, 1, 5, result.clone()))
        .await
        .unwrap();

    let entries = logs.find_by_job(&job_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    let done = &entries[0];
    assert_eq!(done.status, ExecutionStatus::Success);
    assert_eq!(done.content_generated, 6);
    assert_eq!(done.execution_time_ms, Some(1200));
    assert!(done.completed_at.is_some());
    assert_eq!(done.execution_metadata["generator_result"], result);
    assert_eq!(done.execution_metadata["principal"], json!("principal-7"));

    let missing = logs
        .update_entry(Uuid::new_v4(), &EntryCompletion::success(1, 0, 0, json!({})))
        .await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_fail_stale_running_only_touches_running_entries() {
    let database = create_test_database().await;
    let logs = ExecutionLogSeaOrmRepository::new(database.connection());
    let job_id = Uuid::new_v4();

    let abandoned = logs.create_running_entry(job_id, &metadata("a")).await.unwrap();
    let finished = logs.create_running_entry(job_id, &metadata("b")).await.unwrap();
    logs.update_entry(
        finished,
        &EntryCompletion::failure(10, "boom", json!({"kind": "generator_error"}), None),
    )
    .await
    .unwrap();

    // Nothing started before an hour ago
    let none = logs
        .fail_stale_running(Utc::now() - ChronoDuration::hours(1))
        .await
        .unwrap();
    assert_eq!(none, 0);

    let reconciled = logs
        .fail_stale_running(Utc::now() + ChronoDuration::seconds(1))
        .await
        .unwrap();
    assert_eq!(reconciled, 1);

    let abandoned = logs.find_by_id(&abandoned).await.unwrap().unwrap();
    assert_eq!(abandoned.status, ExecutionStatus::Failed);
    assert_eq!(abandoned.error_message.as_deref(), Some(ABANDONED_MESSAGE));
    assert_eq!(abandoned.content_generated, 0);

    let finished = logs.find_by_id(&finished).await.unwrap().unwrap();
    assert_eq!(finished.error_message.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_late_completion_keeps_abandoned_outcome() {
    let database = create_test_database().await;
    let logs = ExecutionLogSeaOrmRepository::new(database.connection());

    let entry_id = logs
        .create_running_entry(Uuid::new_v4(), &metadata("slow"))
        .await
        .unwrap();
    let reconciled = logs
        .fail_stale_running(Utc::now() + ChronoDuration::seconds(1))
        .await
        .unwrap();
    assert_eq!(reconciled, 1);

    let late = logs
        .update_entry(
            entry_id,
            &EntryCompletion::success(5000, 1, 6, json!({"success": true})),
        )
        .await;
    assert!(matches!(late, Err(StoreError::EntryCompleted { .. })));

    let entry = logs.find_by_id(&entry_id).await.unwrap().unwrap();
    assert_eq!(entry.status, ExecutionStatus::Failed);
    assert_eq!(entry.error_message.as_deref(), Some(ABANDONED_MESSAGE));
    assert_eq!(entry.content_generated, 0);

    // Already terminal, so a second sweep leaves it alone
    let again = logs
        .fail_stale_running(Utc::now() + ChronoDuration::seconds(1))
        .await
        .unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn test_purge_old_data_respects_retention() {
    let database = create_test_database().await;
    let jobs = ScheduledJobSeaOrmRepository::new(database.connection(), Duration::ZERO);
    let logs = ExecutionLogSeaOrmRepository::new(database.connection());

    let once = jobs
        .create(create_request("once", 5, ScheduleConfig::Once))
        .await
        .unwrap();
    let recurring = jobs.create(create_request("hourly", 5, hourly())).await.unwrap();
    jobs.commit_execution(once.id, true, &json!({}), 1).await.unwrap();
    jobs.commit_execution(recurring.id, true, &json!({}), 1).await.unwrap();

    let completed = logs.create_running_entry(once.id, &metadata("once")).await.unwrap();
    logs.update_entry(completed, &EntryCompletion::success(5, 1, 0, json!({})))
        .await
        .unwrap();
    let still_running = logs
        .create_running_entry(recurring.id, &metadata("hourly"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = jobs.purge_old_data().await.unwrap();

    assert_eq!(report.execution_logs_deleted, 1);
    assert_eq!(report.inactive_jobs_deleted, 1);
    assert!(logs.find_by_id(&completed).await.unwrap().is_none());
    assert!(logs.find_by_id(&still_running).await.unwrap().is_some());
    assert!(jobs.find_by_id(&once.id).await.unwrap().is_none());
    assert!(jobs.find_by_id(&recurring.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_processor_tick_against_database() {
    let database = create_test_database().await;
    let job_store = Arc::new(ScheduledJobSeaOrmRepository::new(
        database.connection(),
        Duration::from_secs(3600),
    ));
    let log_store = Arc::new(ExecutionLogSeaOrmRepository::new(database.connection()));
    let generator = Arc::new(common::ScriptedGenerator::new(Duration::from_millis(5)));

    let ok = job_store.create(create_request("ok", 10, hourly())).await.unwrap();
    let failing = job_store
        .create(create_request("failing", 5, hourly()))
        .await
        .unwrap();
    generator.script(failing.id, common::Script::Unsuccessful);

    let processor = Processor::new(
        common::config(3),
        job_store.clone(),
        log_store.clone(),
        generator.clone(),
    )
    .unwrap();

    let report = processor.scheduler().tick().await;
    let TickReport::Completed(summary) = report else {
        panic!("expected a completed tick, got {report:?}");
    };
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    let ok_entries = log_store.find_by_job(&ok.id).await.unwrap();
    assert_eq!(ok_entries[0].status, ExecutionStatus::Success);
    assert_eq!(ok_entries[0].content_generated, 7);
    let failing_entries = log_store.find_by_job(&failing.id).await.unwrap();
    assert_eq!(failing_entries[0].status, ExecutionStatus::Failed);
    assert_eq!(failing_entries[0].content_generated, 0);

    let failing_record = job_store.find_by_id(&failing.id).await.unwrap().unwrap();
    assert_eq!(failing_record.failed_runs, 1);
    assert!(failing_record.job.next_run_at > Utc::now());
    assert!(job_store.fetch_due_jobs(Utc::now()).await.unwrap().is_empty());

    assert!(processor.stop().await.graceful);
}

#[tokio::test]
async fn test_stored_bad_schedule_runs_once_then_stops() {
    let database = create_test_database().await;
    let job_store = Arc::new(ScheduledJobSeaOrmRepository::new(
        database.connection(),
        Duration::from_secs(3600),
    ));
    let log_store = Arc::new(ExecutionLogSeaOrmRepository::new(database.connection()));
    let generator = Arc::new(common::ScriptedGenerator::new(Duration::from_millis(5)));

    let broken = insert_raw_job(&database, "{}", r#"{"type":"cron","expression":"every tuesday"}"#).await;

    let processor = Processor::new(
        common::config(3),
        job_store.clone(),
        log_store.clone(),
        generator.clone(),
    )
    .unwrap();

    for _ in 0..4 {
        processor.scheduler().tick().await;
    }

    assert_eq!(generator.calls(), 1);
    assert_eq!(log_store.find_by_job(&broken).await.unwrap().len(), 1);
    let record = job_store.find_by_id(&broken).await.unwrap().unwrap();
    assert!(!record.is_active);
    assert_eq!(record.total_runs, 1);

    assert!(processor.stop().await.graceful);
}
