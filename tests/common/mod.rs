//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use job_processor::config::ProcessorConfig;
use job_processor::errors::{GeneratorError, GeneratorResult};
use job_processor::job_scheduling::Processor;
use job_processor::models::{
    GenerationRequest, GenerationResponse, GenerationSettings, Job, ScheduleConfig,
};
use job_processor::repositories::{InMemoryExecutionLogStore, InMemoryJobStore};
use job_processor::services::ContentGenerator;

/// How the scripted generator answers for one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Succeed { topics: u32, questions: u32 },
    Unsuccessful,
    HttpError(u16),
}

/// Content generator that sleeps, answers from a script and records overlap
pub struct ScriptedGenerator {
    delay: Duration,
    scripts: Mutex<HashMap<Uuid, Script>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    in_flight_jobs: Mutex<HashSet<Uuid>>,
    overlap_detected: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            scripts: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            in_flight_jobs: Mutex::new(HashSet::new()),
            overlap_detected: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self, job_id: Uuid, script: Script) {
        self.scripts.lock().unwrap().insert(job_id, script);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn overlap_detected(&self) -> bool {
        self.overlap_detected.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> GeneratorResult<GenerationResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.in_flight_jobs.lock().unwrap().insert(request.job_id) {
            self.overlap_detected.store(true, Ordering::SeqCst);
        }
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.in_flight_jobs.lock().unwrap().remove(&request.job_id);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(&request.job_id)
            .copied()
            .unwrap_or(Script::Succeed {
                topics: 1,
                questions: 6,
            });
        match script {
            Script::Succeed { topics, questions } => Ok(GenerationResponse {
                success: true,
                topics_generated: topics,
                questions_generated: questions,
                ..GenerationResponse::default()
            }),
            Script::Unsuccessful => Ok(GenerationResponse {
                success: false,
                error: Some("no source material".to_string()),
                ..GenerationResponse::default()
            }),
            Script::HttpError(status) => Err(GeneratorError::Http {
                status,
                body: "generator unavailable".to_string(),
            }),
        }
    }
}

pub fn hourly_job(name: &str, next_run_at: DateTime<Utc>) -> Job {
    Job {
        id: Uuid::new_v4(),
        name: name.to_string(),
        generation_settings: GenerationSettings::default(),
        created_by: "principal-1".to_string(),
        next_run_at,
        schedule_config: ScheduleConfig::Interval {
            every: Duration::from_secs(3600),
        },
    }
}

/// Jobs that became due one minute apart, oldest first
pub fn due_jobs(count: usize) -> Vec<Job> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            hourly_job(
                &format!("job-{i}"),
                now - ChronoDuration::minutes((count - i) as i64),
            )
        })
        .collect()
}

pub struct Harness {
    pub processor: Processor,
    pub job_store: Arc<InMemoryJobStore>,
    pub log_store: Arc<InMemoryExecutionLogStore>,
    pub generator: Arc<ScriptedGenerator>,
}

pub async fn harness(config: ProcessorConfig, jobs: &[Job], delay: Duration) -> Harness {
    let log_store = Arc::new(InMemoryExecutionLogStore::new());
    let job_store = Arc::new(InMemoryJobStore::new().with_log_store(log_store.clone()));
    for job in jobs {
        job_store.insert(job.clone()).await.unwrap();
    }
    let generator = Arc::new(ScriptedGenerator::new(delay));
    let processor = Processor::new(
        config,
        job_store.clone(),
        log_store.clone(),
        generator.clone(),
    )
    .unwrap();

    Harness {
        processor,
        job_store,
        log_store,
        generator,
    }
}

pub fn config(max_concurrent_jobs: usize) -> ProcessorConfig {
    ProcessorConfig {
        max_concurrent_jobs,
        ..ProcessorConfig::default()
    }
}
