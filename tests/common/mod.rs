//! Shared fixtures for the integration scenarios

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use overseer::llm::{CompletionClient, CompletionError};
use overseer::sources::{
    CiSource, Conclusion, ItemFilter, ItemState, SourceError, WorkItem, WorkItemSource,
    WorkflowJob, WorkflowRun,
};
use overseer::{
    Candidate, Cascade, CompletionCascade, Config, Dispatcher, MemorySink, RecordSink, Services,
};

/// Opt-in log output while debugging a scenario: RUST_LOG=debug cargo test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Completion client that always returns the same canned reply.
pub struct MockCompletion {
    reply: String,
    calls: AtomicUsize,
}

impl MockCompletion {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionClient for MockCompletion {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Completion client whose every call fails.
pub struct FailingCompletion;

#[async_trait]
impl CompletionClient for FailingCompletion {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Provider("service unavailable".into()))
    }
}

/// CI source backed by per-repository fixture data.
#[derive(Default)]
pub struct StaticCiSource {
    runs: HashMap<String, Vec<WorkflowRun>>,
    jobs: HashMap<u64, Vec<WorkflowJob>>,
    failing: HashSet<String>,
}

impl StaticCiSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runs(mut self, repository: &str, runs: Vec<WorkflowRun>) -> Self {
        self.runs.insert(repository.to_string(), runs);
        self
    }

    pub fn with_jobs(mut self, run_id: u64, jobs: Vec<WorkflowJob>) -> Self {
        self.jobs.insert(run_id, jobs);
        self
    }

    pub fn with_failing_repo(mut self, repository: &str) -> Self {
        self.failing.insert(repository.to_string());
        self
    }
}

#[async_trait]
impl CiSource for StaticCiSource {
    async fn fetch_runs(
        &self,
        repository: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowRun>, SourceError> {
        if self.failing.contains(repository) {
            return Err(SourceError::Request(format!("{repository} unreachable")));
        }
        Ok(self
            .runs
            .get(repository)
            .map(|runs| runs.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn fetch_run_jobs(
        &self,
        repository: &str,
        run_id: u64,
    ) -> Result<Vec<WorkflowJob>, SourceError> {
        if self.failing.contains(repository) {
            return Err(SourceError::Request(format!("{repository} unreachable")));
        }
        Ok(self.jobs.get(&run_id).cloned().unwrap_or_default())
    }
}

/// Work-item source backed by per-repository fixture data. Filters by
/// state only; the `since` bound is treated as already applied.
#[derive(Default)]
pub struct StaticItemSource {
    items: HashMap<String, Vec<WorkItem>>,
    failing: HashSet<String>,
    calls: Arc<AtomicUsize>,
}

impl StaticItemSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(mut self, repository: &str, items: Vec<WorkItem>) -> Self {
        self.items.insert(repository.to_string(), items);
        self
    }

    pub fn with_failing_repo(mut self, repository: &str) -> Self {
        self.failing.insert(repository.to_string());
        self
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl WorkItemSource for StaticItemSource {
    async fn fetch_items(
        &self,
        repository: &str,
        filter: &ItemFilter,
    ) -> Result<Vec<WorkItem>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(repository) {
            return Err(SourceError::Request(format!("{repository} unreachable")));
        }
        Ok(self
            .items
            .get(repository)
            .map(|items| {
                items
                    .iter()
                    .filter(|item| filter.state.map_or(true, |s| item.state == s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn run(id: u64, conclusion: Conclusion) -> WorkflowRun {
    WorkflowRun {
        id,
        name: format!("ci-{id}"),
        conclusion,
        branch: "main".to_string(),
        commit_sha: format!("{id:040x}"),
        url: format!("https://ci.example/runs/{id}"),
        repository: String::new(),
    }
}

pub fn item(number: u64, state: ItemState, labels: &[&str]) -> WorkItem {
    WorkItem {
        number,
        title: format!("item {number}"),
        state,
        labels: labels.iter().map(|s| s.to_string()).collect(),
        due_date: None,
        iteration: None,
        url: format!("https://tracker.example/items/{number}"),
    }
}

pub fn completion_cascade(client: Option<Arc<dyn CompletionClient>>) -> Arc<CompletionCascade> {
    let mut cascade = Cascade::new();
    if let Some(client) = client {
        cascade = cascade.candidate(Candidate::always("mock", move || client.clone()));
    }
    Arc::new(cascade)
}

pub fn item_cascade(source: Option<Arc<dyn WorkItemSource>>) -> Arc<Cascade<Arc<dyn WorkItemSource>>> {
    let mut cascade = Cascade::new();
    if let Some(source) = source {
        cascade = cascade.candidate(Candidate::always("static", move || source.clone()));
    }
    Arc::new(cascade)
}

pub fn dispatcher(
    ci: Arc<dyn CiSource>,
    items: Arc<Cascade<Arc<dyn WorkItemSource>>>,
    completions: Arc<CompletionCascade>,
    sink: Arc<dyn RecordSink>,
) -> Dispatcher {
    Dispatcher::new(
        Arc::new(Config::default()),
        Services {
            ci,
            items,
            completions,
            sink,
        },
    )
}

/// Dispatcher with every collaborator at its most minimal: no runs, no
/// items, no completion provider, in-memory sink.
pub fn bare_dispatcher() -> (Dispatcher, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let d = dispatcher(
        Arc::new(StaticCiSource::new()),
        item_cascade(Some(Arc::new(StaticItemSource::new()))),
        completion_cascade(None),
        sink.clone(),
    );
    (d, sink)
}
