//! Decision-record persistence
//!
//! Terminal pipeline steps write one record per completed run. Persistence
//! is best-effort by contract: a failing sink is logged by the caller and
//! never fails the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// One persisted decision record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Agent that produced the record, e.g. "sprint".
    pub agent: String,
    /// Kind of decision, e.g. "sprint_report".
    pub kind: String,
    /// Human-readable summary of what was decided and why.
    pub summary: String,
    /// Outcome tag, e.g. "healthy" or "critical".
    pub outcome: String,
    /// Structured context, typically the full report.
    pub context: Value,
    pub recorded_at: DateTime<Utc>,
}

impl RecordEntry {
    pub fn new(
        agent: impl Into<String>,
        kind: impl Into<String>,
        summary: impl Into<String>,
        outcome: impl Into<String>,
        context: Value,
    ) -> Self {
        Self {
            agent: agent.into(),
            kind: kind.into(),
            summary: summary.into(),
            outcome: outcome.into(),
            context,
            recorded_at: Utc::now(),
        }
    }
}

/// Error types for sink writes
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("write failed: {0}")]
    Write(String),
}

/// Where decision records go.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn record(&self, entry: RecordEntry) -> Result<(), SinkError>;
}

/// Sink that only emits a structured log line. The default when no real
/// store is configured.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl RecordSink for LogSink {
    async fn record(&self, entry: RecordEntry) -> Result<(), SinkError> {
        info!(
            agent = %entry.agent,
            kind = %entry.kind,
            outcome = %entry.outcome,
            summary = %entry.summary,
            "decision recorded"
        );
        Ok(())
    }
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<RecordEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<RecordEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn record(&self, entry: RecordEntry) -> Result<(), SinkError> {
        self.entries.lock().await.push(entry);
        Ok(())
    }
}
