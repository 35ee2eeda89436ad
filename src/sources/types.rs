//! Wire types exposed by the data-source collaborators

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Labels of the form `points:N` / `sp:N` carry story-point estimates.
fn story_point_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?:points|sp):(.+)$").expect("valid regex"))
}

/// Open/closed state of a tracked work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Open,
    Closed,
}

/// A work item from the issue-tracker view, or the richer project-board
/// view when that source is available (only the latter fills `iteration`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub number: u64,
    pub title: String,
    pub state: ItemState,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Milestone / iteration due date, when one is assigned.
    pub due_date: Option<DateTime<Utc>>,
    /// Iteration name, project-board view only.
    pub iteration: Option<String>,
    #[serde(default)]
    pub url: String,
}

impl WorkItem {
    /// Story points from the first `points:N` / `sp:N` label. A label with
    /// a malformed numeric suffix counts as 1; no label at all counts as 0.
    pub fn story_points(&self) -> u32 {
        for label in &self.labels {
            if let Some(caps) = story_point_pattern().captures(&label.to_lowercase()) {
                return caps[1].parse().unwrap_or(1);
            }
        }
        0
    }

    /// Case-insensitive label lookup.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.eq_ignore_ascii_case(name))
    }

    pub fn is_closed(&self) -> bool {
        self.state == ItemState::Closed
    }

    /// Open and past its due date.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_closed() && self.due_date.is_some_and(|due| due < now)
    }
}

/// Filter passed to `WorkItemSource::fetch_items`.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    /// Restrict to one state; `None` fetches everything.
    pub state: Option<ItemState>,
    /// Only items updated at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

impl ItemFilter {
    pub fn open() -> Self {
        Self {
            state: Some(ItemState::Open),
            since: None,
        }
    }

    pub fn closed_since(since: DateTime<Utc>) -> Self {
        Self {
            state: Some(ItemState::Closed),
            since: Some(since),
        }
    }
}

/// Conclusion of a CI run, job, or job step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
    Skipped,
    #[serde(other)]
    Unknown,
}

/// One CI workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: String,
    pub conclusion: Conclusion,
    pub branch: String,
    pub commit_sha: String,
    #[serde(default)]
    pub url: String,
    /// Filled in by the fetching step; sources report runs per repository.
    #[serde(default)]
    pub repository: String,
}

impl WorkflowRun {
    pub fn failed(&self) -> bool {
        self.conclusion == Conclusion::Failure
    }

    /// Abbreviated commit, the way it appears in report text. The hash is
    /// source-supplied, so truncation is by characters, never raw bytes.
    pub fn short_sha(&self) -> &str {
        let end = self
            .commit_sha
            .char_indices()
            .nth(8)
            .map_or(self.commit_sha.len(), |(i, _)| i);
        &self.commit_sha[..end]
    }
}

/// One job inside a workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowJob {
    pub name: String,
    pub conclusion: Conclusion,
    #[serde(default)]
    pub steps: Vec<JobStep>,
}

/// One ordered step inside a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStep {
    pub number: u32,
    pub name: String,
    pub conclusion: Conclusion,
}
