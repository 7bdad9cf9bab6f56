//! Test doubles for the controller's collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use buffer_config::error::{BufferError, Result};
use buffer_config::events::{EventBus, GotConfigurationEvent, Subscriber, SubscriberId};
use buffer_config::jobs::{ConfigurationFetcher, Job, JobScheduler};
use buffer_config::models::Configuration;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Scheduler that holds jobs until the test decides to run them
#[derive(Default)]
pub struct RecordingScheduler {
    pending: Mutex<Vec<Box<dyn Job>>>,
    submitted: AtomicUsize,
}

impl RecordingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn pending_names(&self) -> Vec<String> {
        self.pending
            .lock()
            .iter()
            .map(|job| job.name().to_string())
            .collect()
    }

    /// Run every held job to completion, returning each outcome
    pub async fn run_pending(&self) -> Vec<Result<()>> {
        let jobs: Vec<Box<dyn Job>> = std::mem::take(&mut *self.pending.lock());
        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            results.push(job.run().await);
        }
        results
    }
}

impl JobScheduler for RecordingScheduler {
    fn submit(&self, job: Box<dyn Job>) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().push(job);
    }
}

/// Fetcher that hands out a queue of prepared answers, then fails
pub struct ScriptedFetcher {
    answers: Mutex<VecDeque<Result<Configuration>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(answers: Vec<Result<Configuration>>) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn returning(configuration: Configuration) -> Arc<Self> {
        Self::new(vec![Ok(configuration)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigurationFetcher for ScriptedFetcher {
    async fn fetch(&self) -> Result<Configuration> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answers.lock().pop_front();
        answer.unwrap_or_else(|| Err(BufferError::FetchError("no scripted answer".to_string())))
    }
}

/// Subscriber that keeps every configuration event it sees
#[derive(Default)]
pub struct RecordingSubscriber {
    events: Mutex<Vec<GotConfigurationEvent>>,
}

impl RecordingSubscriber {
    /// Create a recorder and register it on `bus`
    pub fn attach(bus: &EventBus) -> Arc<Self> {
        let recorder = Arc::new(Self::default());
        bus.register::<GotConfigurationEvent, _>(SubscriberId::new(), recorder.clone())
            .expect("fresh subscriber id registers");
        recorder
    }

    pub fn events(&self) -> Vec<GotConfigurationEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

impl Subscriber<GotConfigurationEvent> for RecordingSubscriber {
    fn on_event(&self, event: &GotConfigurationEvent) {
        self.events.lock().push(event.clone());
    }

    fn subscriber_name(&self) -> &str {
        "recording_subscriber"
    }
}
