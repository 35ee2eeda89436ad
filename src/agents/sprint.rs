//! Sprint-report agent
//!
//! Graph: fetch open and recently-closed work items (fan-out across
//! repositories, item source chosen by cascade) -> compute sprint metrics
//! -> track vendor-labelled deliverables -> generate recommendations, with
//! an internal branch for blocker-focused queries -> assemble and persist
//! the report.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::agents::{prompts, AgentKind};
use crate::config::Config;
use crate::core::{Cascade, Graph, ResultEnvelope, StageState, Step};
use crate::llm::{extract_json, CompletionCascade};
use crate::persistence::{RecordEntry, RecordSink};
use crate::sources::{with_timeout, ItemFilter, WorkItem, WorkItemSource};

/// Sprint health, classified from completion rate and blocked count.
///
/// Deliberately a separate policy from pipeline health; the thresholds are
/// not meant to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintHealth {
    Healthy,
    AtRisk,
    Critical,
}

impl SprintHealth {
    pub fn classify(completion_rate: f64, blocked: usize) -> Self {
        if completion_rate >= 70.0 && blocked == 0 {
            SprintHealth::Healthy
        } else if completion_rate >= 50.0 || blocked <= 2 {
            SprintHealth::AtRisk
        } else {
            SprintHealth::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SprintHealth::Healthy => "healthy",
            SprintHealth::AtRisk => "at_risk",
            SprintHealth::Critical => "critical",
        }
    }
}

/// What flavor of sprint question came in. Unrecognized values degrade to
/// a plain status query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SprintQueryKind {
    #[default]
    Status,
    Blockers,
    #[serde(other)]
    Other,
}

fn default_true() -> bool {
    true
}

/// Payload projection for sprint events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintQuery {
    #[serde(default)]
    pub query_type: SprintQueryKind,
    /// Repositories to inspect; empty means the configured monitored set.
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default = "default_true")]
    pub include_vendor: bool,
    #[serde(default = "default_true")]
    pub include_recommendations: bool,
}

impl Default for SprintQuery {
    fn default() -> Self {
        Self {
            query_type: SprintQueryKind::Status,
            repositories: Vec::new(),
            include_vendor: true,
            include_recommendations: true,
        }
    }
}

/// Aggregate sprint numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintMetrics {
    pub total_items: usize,
    pub open_items: usize,
    pub closed_items: usize,
    pub blocked_items: usize,
    pub overdue_items: usize,
    pub total_points: u32,
    pub completed_points: u32,
    /// Percentage, by story points when any are assigned, by item count
    /// otherwise.
    pub completion_rate: f64,
    /// Completed story points per day over the sprint window.
    pub velocity_per_day: f64,
    pub health: SprintHealth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverableStatus {
    InProgress,
    Review,
    Blocked,
}

/// One vendor-labelled work item under tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliverable {
    pub number: u64,
    pub title: String,
    pub status: DeliverableStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub overdue: bool,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VendorSummary {
    pub in_progress: usize,
    pub in_review: usize,
    pub blocked: usize,
    pub overdue: usize,
}

/// Externally-delivered work, identified by `<label>-in-progress`,
/// `<label>-review`, and `<label>-blocked` labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorTracking {
    pub label: String,
    pub deliverables: Vec<Deliverable>,
    pub summary: VendorSummary,
}

/// The sprint report returned in the result envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SprintReport {
    pub repositories: Vec<String>,
    pub query_type: SprintQueryKind,
    pub metrics: SprintMetrics,
    pub vendor: Option<VendorTracking>,
    pub recommendations: Vec<String>,
    pub summary: String,
    /// Provider id of the completion backend that wrote the summary, or
    /// "rule_based" when none was used.
    pub analysis_source: String,
    pub generated_at: DateTime<Utc>,
}

pub struct SprintState {
    query: SprintQuery,
    repositories: Vec<String>,
    open_items: Vec<WorkItem>,
    closed_items: Vec<WorkItem>,
    metrics: Option<SprintMetrics>,
    vendor: Option<VendorTracking>,
    recommendations: Option<Vec<String>>,
    report: Option<SprintReport>,
    error: Option<String>,
}

impl SprintState {
    fn new(query: SprintQuery) -> Self {
        Self {
            query,
            repositories: Vec::new(),
            open_items: Vec::new(),
            closed_items: Vec::new(),
            metrics: None,
            vendor: None,
            recommendations: None,
            report: None,
            error: None,
        }
    }
}

#[derive(Default)]
pub struct SprintDelta {
    repositories: Option<Vec<String>>,
    open_items: Option<Vec<WorkItem>>,
    closed_items: Option<Vec<WorkItem>>,
    metrics: Option<SprintMetrics>,
    vendor: Option<VendorTracking>,
    recommendations: Option<Vec<String>>,
    report: Option<SprintReport>,
    error: Option<String>,
}

impl StageState for SprintState {
    type Delta = SprintDelta;

    fn apply(&mut self, delta: SprintDelta) {
        if let Some(repositories) = delta.repositories {
            self.repositories = repositories;
        }
        if let Some(items) = delta.open_items {
            self.open_items = items;
        }
        if let Some(items) = delta.closed_items {
            self.closed_items = items;
        }
        if let Some(metrics) = delta.metrics {
            self.metrics = Some(metrics);
        }
        if let Some(vendor) = delta.vendor {
            self.vendor = Some(vendor);
        }
        if let Some(recommendations) = delta.recommendations {
            self.recommendations = Some(recommendations);
        }
        if let Some(report) = delta.report {
            self.report = Some(report);
        }
        if let Some(error) = delta.error {
            self.error = Some(error);
        }
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Fetch open and recently-closed items for every target repository.
///
/// The item source is cascade-resolved per invocation: the project-board
/// view when configured, the plain issue-tracker view otherwise. No source
/// at all is fatal; so is every repository failing.
struct FetchSprintData {
    items: Arc<Cascade<Arc<dyn WorkItemSource>>>,
    config: Arc<Config>,
}

#[async_trait]
impl Step<SprintState> for FetchSprintData {
    fn name(&self) -> &'static str {
        "fetch_sprint_data"
    }

    async fn run(&self, state: &SprintState) -> SprintDelta {
        let Some(resolved) = self.items.resolve() else {
            return SprintDelta {
                error: Some("no work item source available".to_string()),
                ..Default::default()
            };
        };
        debug!(source = %resolved.id, "fetching sprint data");

        let repos = if state.query.repositories.is_empty() {
            self.config.monitored_repos.clone()
        } else {
            state.query.repositories.clone()
        };

        if repos.is_empty() {
            debug!("no repositories to inspect");
            return SprintDelta {
                repositories: Some(Vec::new()),
                open_items: Some(Vec::new()),
                closed_items: Some(Vec::new()),
                ..Default::default()
            };
        }

        let closed_since = Utc::now() - ChronoDuration::days(self.config.sprint_length_days);

        let mut tasks = JoinSet::new();
        for repo in &repos {
            let source = resolved.resource.clone();
            let repo = repo.clone();
            let secs = self.config.request_timeout_secs;
            tasks.spawn(async move {
                let open = with_timeout(secs, source.fetch_items(&repo, &ItemFilter::open())).await;
                let closed = with_timeout(
                    secs,
                    source.fetch_items(&repo, &ItemFilter::closed_since(closed_since)),
                )
                .await;
                (repo, open.and_then(|o| closed.map(|c| (o, c))))
            });
        }

        let mut by_repo: BTreeMap<String, (Vec<WorkItem>, Vec<WorkItem>)> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((repo, Ok(items))) => {
                    by_repo.insert(repo, items);
                }
                Ok((repo, Err(err))) => {
                    warn!(repository = %repo, error = %err, "item fetch failed, skipping repository");
                }
                Err(err) => {
                    warn!(error = %err, "item fetch task failed");
                }
            }
        }

        if by_repo.is_empty() {
            return SprintDelta {
                error: Some("no sprint data could be fetched".to_string()),
                ..Default::default()
            };
        }

        let repositories = by_repo.keys().cloned().collect();
        let mut open_items = Vec::new();
        let mut closed_items = Vec::new();
        for (open, closed) in by_repo.into_values() {
            open_items.extend(open);
            closed_items.extend(closed);
        }

        SprintDelta {
            repositories: Some(repositories),
            open_items: Some(open_items),
            closed_items: Some(closed_items),
            ..Default::default()
        }
    }
}

/// An item counts as blocked with either the plain `blocked` label or the
/// vendor-specific `<vendor>-blocked` variant.
fn is_blocked(item: &WorkItem, vendor_label: &str) -> bool {
    item.has_label("blocked") || item.has_label(&format!("{vendor_label}-blocked"))
}

/// Pure computation over the fetched items.
struct CalculateMetrics {
    config: Arc<Config>,
}

#[async_trait]
impl Step<SprintState> for CalculateMetrics {
    fn name(&self) -> &'static str {
        "calculate_metrics"
    }

    async fn run(&self, state: &SprintState) -> SprintDelta {
        let now = Utc::now();
        let open = state.open_items.len();
        let closed = state.closed_items.len();
        let total = open + closed;

        let blocked = state
            .open_items
            .iter()
            .filter(|i| is_blocked(i, &self.config.vendor_label))
            .count();
        let overdue = state
            .open_items
            .iter()
            .filter(|i| i.is_overdue(now))
            .count();

        let open_points: u32 = state.open_items.iter().map(WorkItem::story_points).sum();
        let completed_points: u32 = state.closed_items.iter().map(WorkItem::story_points).sum();
        let total_points = open_points + completed_points;

        let completion_rate = if total_points > 0 {
            f64::from(completed_points) / f64::from(total_points) * 100.0
        } else if total > 0 {
            closed as f64 / total as f64 * 100.0
        } else {
            100.0
        };

        let velocity_per_day = if self.config.sprint_length_days > 0 {
            f64::from(completed_points) / self.config.sprint_length_days as f64
        } else {
            0.0
        };

        let metrics = SprintMetrics {
            total_items: total,
            open_items: open,
            closed_items: closed,
            blocked_items: blocked,
            overdue_items: overdue,
            total_points,
            completed_points,
            completion_rate,
            velocity_per_day,
            health: SprintHealth::classify(completion_rate, blocked),
        };

        SprintDelta {
            metrics: Some(metrics),
            ..Default::default()
        }
    }
}

/// Track externally-delivered work via vendor status labels.
struct TrackVendorDeliverables {
    config: Arc<Config>,
}

#[async_trait]
impl Step<SprintState> for TrackVendorDeliverables {
    fn name(&self) -> &'static str {
        "track_vendor_deliverables"
    }

    async fn run(&self, state: &SprintState) -> SprintDelta {
        if !state.query.include_vendor {
            return SprintDelta::default();
        }

        let label = &self.config.vendor_label;
        let blocked_label = format!("{label}-blocked");
        let review_label = format!("{label}-review");
        let in_progress_label = format!("{label}-in-progress");

        let now = Utc::now();
        let mut deliverables = Vec::new();
        let mut summary = VendorSummary::default();

        for item in &state.open_items {
            // Blocked wins over review wins over in-progress when an item
            // somehow carries more than one status label.
            let status = if item.has_label(&blocked_label) {
                DeliverableStatus::Blocked
            } else if item.has_label(&review_label) {
                DeliverableStatus::Review
            } else if item.has_label(&in_progress_label) {
                DeliverableStatus::InProgress
            } else {
                continue;
            };

            let overdue = item.is_overdue(now);
            match status {
                DeliverableStatus::Blocked => summary.blocked += 1,
                DeliverableStatus::Review => summary.in_review += 1,
                DeliverableStatus::InProgress => summary.in_progress += 1,
            }
            if overdue {
                summary.overdue += 1;
            }

            deliverables.push(Deliverable {
                number: item.number,
                title: item.title.clone(),
                status,
                due_date: item.due_date,
                overdue,
                url: item.url.clone(),
            });
        }

        SprintDelta {
            vendor: Some(VendorTracking {
                label: label.clone(),
                deliverables,
                summary,
            }),
            ..Default::default()
        }
    }
}

/// Recommendation generation, with a blocker-focused branch for blocker
/// queries and a health-based default.
struct GenerateRecommendations {
    config: Arc<Config>,
}

impl GenerateRecommendations {
    fn for_blockers(&self, state: &SprintState) -> Vec<String> {
        let blocked: Vec<&WorkItem> = state
            .open_items
            .iter()
            .filter(|i| is_blocked(i, &self.config.vendor_label))
            .collect();

        if blocked.is_empty() {
            return vec!["No blocked items; nothing to unblock".to_string()];
        }

        let mut recs = vec![format!(
            "{} items are blocked; review each blocker in the next standup",
            blocked.len()
        )];
        for item in blocked {
            recs.push(format!("Unblock #{}: {}", item.number, item.title));
        }
        recs
    }

    fn for_health(state: &SprintState) -> Vec<String> {
        let Some(metrics) = &state.metrics else {
            return Vec::new();
        };

        let mut recs = match metrics.health {
            SprintHealth::Healthy => {
                vec!["Sprint is on track; keep the current cadence".to_string()]
            }
            SprintHealth::AtRisk => vec![
                format!(
                    "Completion is at {:.0}%; re-prioritize or descope to protect the sprint goal",
                    metrics.completion_rate
                ),
            ],
            SprintHealth::Critical => vec![
                format!(
                    "Sprint is critical ({:.0}% complete, {} blocked); escalate and descope now",
                    metrics.completion_rate, metrics.blocked_items
                ),
            ],
        };

        if metrics.overdue_items > 0 {
            recs.push(format!(
                "{} open items are past their due date; re-plan or close them",
                metrics.overdue_items
            ));
        }
        if let Some(vendor) = &state.vendor {
            if vendor.summary.overdue > 0 {
                recs.push(format!(
                    "{} vendor deliverables are overdue; chase the vendor for updated dates",
                    vendor.summary.overdue
                ));
            }
        }
        recs
    }
}

#[async_trait]
impl Step<SprintState> for GenerateRecommendations {
    fn name(&self) -> &'static str {
        "generate_recommendations"
    }

    async fn run(&self, state: &SprintState) -> SprintDelta {
        if !state.query.include_recommendations {
            return SprintDelta {
                recommendations: Some(Vec::new()),
                ..Default::default()
            };
        }

        let recommendations = match state.query.query_type {
            SprintQueryKind::Blockers => self.for_blockers(state),
            _ => Self::for_health(state),
        };

        SprintDelta {
            recommendations: Some(recommendations),
            ..Default::default()
        }
    }
}

/// Terminal step: assemble the report, let a completion provider sharpen
/// the summary when one resolves, and persist the result best-effort.
struct GenerateReport {
    completions: Arc<CompletionCascade>,
    sink: Arc<dyn RecordSink>,
    config: Arc<Config>,
}

impl GenerateReport {
    async fn provider_summary(&self, report: &SprintReport) -> Option<(String, String)> {
        let resolved = self.completions.resolve()?;

        let data = json!({
            "metrics": report.metrics,
            "vendor": report.vendor,
            "recommendations": report.recommendations,
        })
        .to_string();

        let prompt = prompts::sprint_analysis(&data);
        let call = resolved.resource.complete(prompts::SPRINT_SYSTEM, &prompt);
        let reply = match timeout(Duration::from_secs(self.config.request_timeout_secs), call).await
        {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                warn!(provider = %resolved.id, error = %err, "completion call failed");
                return None;
            }
            Err(_) => {
                warn!(provider = %resolved.id, "completion call timed out");
                return None;
            }
        };

        match extract_json(&reply) {
            Ok(parsed) => parsed["summary"]
                .as_str()
                .map(|s| (s.to_string(), resolved.id)),
            Err(err) => {
                warn!(provider = %resolved.id, error = %err, "completion reply had no parseable JSON");
                None
            }
        }
    }
}

#[async_trait]
impl Step<SprintState> for GenerateReport {
    fn name(&self) -> &'static str {
        "generate_report"
    }

    async fn run(&self, state: &SprintState) -> SprintDelta {
        if state.error().is_some() {
            debug!("sprint run failed upstream, no report to build");
            return SprintDelta::default();
        }
        let Some(metrics) = state.metrics.clone() else {
            return SprintDelta {
                error: Some("metrics were never computed".to_string()),
                ..Default::default()
            };
        };

        let mut report = SprintReport {
            repositories: state.repositories.clone(),
            query_type: state.query.query_type,
            summary: format!(
                "{} of {} items done ({:.0}%), {} blocked, {} overdue; sprint is {}",
                metrics.closed_items,
                metrics.total_items,
                metrics.completion_rate,
                metrics.blocked_items,
                metrics.overdue_items,
                metrics.health.as_str()
            ),
            metrics,
            vendor: state.vendor.clone(),
            recommendations: state.recommendations.clone().unwrap_or_default(),
            analysis_source: "rule_based".to_string(),
            generated_at: Utc::now(),
        };

        if let Some((summary, provider)) = self.provider_summary(&report).await {
            report.summary = summary;
            report.analysis_source = provider;
        }

        let context = serde_json::to_value(&report).unwrap_or_default();
        let entry = RecordEntry::new(
            AgentKind::Sprint.name(),
            "sprint_report",
            report.summary.clone(),
            report.metrics.health.as_str(),
            context,
        );
        if let Err(err) = self.sink.record(entry).await {
            warn!(error = %err, "failed to persist sprint report");
        }

        SprintDelta {
            report: Some(report),
            ..Default::default()
        }
    }
}

/// The sprint agent: owns the graph, shared across dispatches.
pub struct SprintAgent {
    graph: Graph<SprintState>,
}

impl SprintAgent {
    pub fn new(
        items: Arc<Cascade<Arc<dyn WorkItemSource>>>,
        completions: Arc<CompletionCascade>,
        sink: Arc<dyn RecordSink>,
        config: Arc<Config>,
    ) -> Self {
        let graph = Graph::builder("sprint")
            .step(FetchSprintData {
                items,
                config: config.clone(),
            })
            .step(CalculateMetrics {
                config: config.clone(),
            })
            .step(TrackVendorDeliverables {
                config: config.clone(),
            })
            .step(GenerateRecommendations {
                config: config.clone(),
            })
            .terminal(GenerateReport {
                completions,
                sink,
                config,
            });
        Self { graph }
    }

    pub async fn run(&self, query: SprintQuery) -> ResultEnvelope {
        let agent = AgentKind::Sprint.name();
        let state = self.graph.run(SprintState::new(query)).await;

        if let Some(err) = state.error() {
            return ResultEnvelope::failure(Some(agent.to_string()), err);
        }
        match state.report {
            Some(report) => match serde_json::to_value(&report) {
                Ok(payload) => ResultEnvelope::success(agent, payload),
                Err(err) => ResultEnvelope::failure(
                    Some(agent.to_string()),
                    format!("report serialization failed: {err}"),
                ),
            },
            None => ResultEnvelope::failure(Some(agent.to_string()), "no report produced"),
        }
    }
}
