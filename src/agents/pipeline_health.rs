//! Pipeline-health agent
//!
//! Graph: fetch recent workflow runs (fan-out across repositories) ->
//! pull per-job detail for failing runs -> generate a report, through a
//! completion provider when one resolves and a deterministic rule-based
//! path otherwise -> persist the report.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinSet;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use crate::agents::{prompts, AgentKind};
use crate::config::Config;
use crate::core::{Graph, ResultEnvelope, StageState, Step};
use crate::llm::{extract_json, CompletionCascade};
use crate::persistence::{RecordEntry, RecordSink};
use crate::sources::{with_timeout, CiSource, Conclusion, WorkflowRun};

/// Overall pipeline health, classified from the failed-run count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineHealth {
    Healthy,
    Degraded,
    Critical,
}

impl PipelineHealth {
    /// Fixed thresholds: 0 failures healthy, 1-2 degraded, more critical.
    pub fn classify(failed_runs: usize) -> Self {
        match failed_runs {
            0 => PipelineHealth::Healthy,
            1 | 2 => PipelineHealth::Degraded,
            _ => PipelineHealth::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineHealth::Healthy => "healthy",
            PipelineHealth::Degraded => "degraded",
            PipelineHealth::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl Default for AlertSeverity {
    fn default() -> Self {
        AlertSeverity::Warning
    }
}

/// One actionable finding in a pipeline report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(default)]
    pub repository: String,
}

/// A failing job inside one run, with its failing steps when known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedJob {
    pub name: String,
    pub failed_steps: Vec<String>,
}

/// Per-run detail gathered for a failing workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureDetail {
    pub run_id: u64,
    pub workflow: String,
    pub repository: String,
    pub branch: String,
    pub commit: String,
    pub url: String,
    pub failed_jobs: Vec<FailedJob>,
}

/// The pipeline-health report returned in the result envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub repositories: Vec<String>,
    pub runs_analyzed: usize,
    pub failed_runs: usize,
    pub health: PipelineHealth,
    pub summary: String,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<String>,
    /// Provider id of the completion backend that wrote the analysis, or
    /// "rule_based" when none was used.
    pub analysis_source: String,
    pub generated_at: DateTime<Utc>,
}

/// Payload projection for pipeline-status events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthQuery {
    /// Repositories to inspect; empty means the configured monitored set.
    #[serde(default)]
    pub repositories: Vec<String>,
}

pub struct PipelineHealthState {
    query: HealthQuery,
    repositories: Vec<String>,
    runs: Vec<WorkflowRun>,
    failures: Vec<FailureDetail>,
    report: Option<PipelineReport>,
    error: Option<String>,
}

impl PipelineHealthState {
    fn new(query: HealthQuery) -> Self {
        Self {
            query,
            repositories: Vec::new(),
            runs: Vec::new(),
            failures: Vec::new(),
            report: None,
            error: None,
        }
    }
}

#[derive(Default)]
pub struct PipelineHealthDelta {
    repositories: Option<Vec<String>>,
    runs: Option<Vec<WorkflowRun>>,
    failures: Option<Vec<FailureDetail>>,
    report: Option<PipelineReport>,
    error: Option<String>,
}

impl StageState for PipelineHealthState {
    type Delta = PipelineHealthDelta;

    fn apply(&mut self, delta: PipelineHealthDelta) {
        if let Some(repositories) = delta.repositories {
            self.repositories = repositories;
        }
        if let Some(runs) = delta.runs {
            self.runs = runs;
        }
        if let Some(failures) = delta.failures {
            self.failures = failures;
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

/// Fetch recent runs for every target repository concurrently. One
/// repository failing is logged and skipped; all of them failing is fatal.
struct FetchRuns {
    ci: Arc<dyn CiSource>,
    config: Arc<Config>,
}

#[async_trait]
impl Step<PipelineHealthState> for FetchRuns {
    fn name(&self) -> &'static str {
        "fetch_runs"
    }

    async fn run(&self, state: &PipelineHealthState) -> PipelineHealthDelta {
        let repos = if state.query.repositories.is_empty() {
            self.config.monitored_repos.clone()
        } else {
            state.query.repositories.clone()
        };

        if repos.is_empty() {
            debug!("no repositories to inspect");
            return PipelineHealthDelta {
                repositories: Some(Vec::new()),
                runs: Some(Vec::new()),
                ..Default::default()
            };
        }

        let mut tasks = JoinSet::new();
        for repo in &repos {
            let ci = self.ci.clone();
            let repo = repo.clone();
            let secs = self.config.request_timeout_secs;
            let limit = self.config.run_fetch_limit;
            tasks.spawn(async move {
                let result = with_timeout(secs, ci.fetch_runs(&repo, limit)).await;
                (repo, result)
            });
        }

        // Keyed by repository so the merged run order is deterministic
        // regardless of task completion order.
        let mut by_repo: BTreeMap<String, Vec<WorkflowRun>> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((repo, Ok(mut runs))) => {
                    for run in &mut runs {
                        run.repository = repo.clone();
                    }
                    by_repo.insert(repo, runs);
                }
                Ok((repo, Err(err))) => {
                    warn!(repository = %repo, error = %err, "run fetch failed, skipping repository");
                }
                Err(err) => {
                    warn!(error = %err, "run fetch task failed");
                }
            }
        }

        if by_repo.is_empty() {
            return PipelineHealthDelta {
                error: Some("no pipeline data could be fetched".to_string()),
                ..Default::default()
            };
        }

        let repositories = by_repo.keys().cloned().collect();
        let runs = by_repo.into_values().flatten().collect();
        PipelineHealthDelta {
            repositories: Some(repositories),
            runs: Some(runs),
            ..Default::default()
        }
    }
}

/// Pull per-job detail for the first few failing runs. A failing detail
/// fetch degrades to an empty job list for that run only.
struct AnalyzeFailures {
    ci: Arc<dyn CiSource>,
    config: Arc<Config>,
}

#[async_trait]
impl Step<PipelineHealthState> for AnalyzeFailures {
    fn name(&self) -> &'static str {
        "analyze_failures"
    }

    async fn run(&self, state: &PipelineHealthState) -> PipelineHealthDelta {
        let mut failures = Vec::new();

        let failed_runs = state.runs.iter().filter(|r| r.failed());
        for run in failed_runs.take(self.config.failure_detail_limit) {
            let jobs = with_timeout(
                self.config.request_timeout_secs,
                self.ci.fetch_run_jobs(&run.repository, run.id),
            )
            .await;

            let failed_jobs = match jobs {
                Ok(jobs) => jobs
                    .into_iter()
                    .filter(|job| job.conclusion == Conclusion::Failure)
                    .map(|job| FailedJob {
                        name: job.name,
                        failed_steps: job
                            .steps
                            .into_iter()
                            .filter(|s| s.conclusion == Conclusion::Failure)
                            .map(|s| s.name)
                            .collect(),
                    })
                    .collect(),
                Err(err) => {
                    warn!(
                        repository = %run.repository,
                        run_id = run.id,
                        error = %err,
                        "job detail fetch failed, reporting run without job detail"
                    );
                    Vec::new()
                }
            };

            failures.push(FailureDetail {
                run_id: run.id,
                workflow: run.name.clone(),
                repository: run.repository.clone(),
                branch: run.branch.clone(),
                commit: run.short_sha().to_string(),
                url: run.url.clone(),
                failed_jobs,
            });
        }

        PipelineHealthDelta {
            failures: Some(failures),
            ..Default::default()
        }
    }
}

/// Produce the report. With failures present and a completion provider
/// available the analysis text comes from the provider; any provider or
/// extraction failure falls back to the deterministic rule-based report.
struct GenerateReport {
    completions: Arc<CompletionCascade>,
    config: Arc<Config>,
}

impl GenerateReport {
    fn rule_based(&self, state: &PipelineHealthState, health: PipelineHealth) -> PipelineReport {
        let failed: Vec<&WorkflowRun> = state.runs.iter().filter(|r| r.failed()).collect();

        let alerts = failed
            .iter()
            .map(|run| {
                let jobs: Vec<&str> = state
                    .failures
                    .iter()
                    .find(|f| f.run_id == run.id)
                    .map(|f| f.failed_jobs.iter().map(|j| j.name.as_str()).collect())
                    .unwrap_or_default();
                let message = if jobs.is_empty() {
                    format!(
                        "{} failed on {} ({})",
                        run.name,
                        run.branch,
                        run.short_sha()
                    )
                } else {
                    format!(
                        "{} failed on {} ({}), failing jobs: {}",
                        run.name,
                        run.branch,
                        run.short_sha(),
                        jobs.join(", ")
                    )
                };
                Alert {
                    severity: match health {
                        PipelineHealth::Critical => AlertSeverity::Critical,
                        _ => AlertSeverity::Warning,
                    },
                    message,
                    repository: run.repository.clone(),
                }
            })
            .collect();

        let mut recommendations = vec![
            "Investigate the failing runs listed in the alerts, most recent first".to_string(),
        ];
        if self.completions.is_empty() {
            recommendations.push(
                "Configure a completion provider for deeper failure analysis".to_string(),
            );
        }

        PipelineReport {
            repositories: state.repositories.clone(),
            runs_analyzed: state.runs.len(),
            failed_runs: failed.len(),
            health,
            summary: format!(
                "{} of {} recent runs failed across {} repositories",
                failed.len(),
                state.runs.len(),
                state.repositories.len()
            ),
            alerts,
            recommendations,
            analysis_source: "rule_based".to_string(),
            generated_at: Utc::now(),
        }
    }

    async fn provider_analysis(
        &self,
        state: &PipelineHealthState,
        health: PipelineHealth,
    ) -> Option<PipelineReport> {
        let resolved = self.completions.resolve()?;

        let data = json!({
            "repositories": state.repositories,
            "runs_analyzed": state.runs.len(),
            "failed_runs": state.runs.iter().filter(|r| r.failed()).count(),
            "failures": state.failures,
        })
        .to_string();

        let prompt = prompts::pipeline_analysis(&data);
        let call = resolved.resource.complete(prompts::PIPELINE_SYSTEM, &prompt);
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

        let parsed = match extract_json(&reply) {
            Ok(value) => value,
            Err(err) => {
                warn!(provider = %resolved.id, error = %err, "completion reply had no parseable JSON");
                return None;
            }
        };

        let summary = parsed["summary"]
            .as_str()
            .unwrap_or("analysis summary unavailable")
            .to_string();

        let mut alerts = Vec::new();
        if let Some(raw_alerts) = parsed["alerts"].as_array() {
            for raw in raw_alerts {
                match serde_json::from_value::<Alert>(raw.clone()) {
                    Ok(alert) => alerts.push(alert),
                    Err(err) => warn!(error = %err, "skipping malformed alert in analysis"),
                }
            }
        }

        let recommendations = parsed["recommendations"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Some(PipelineReport {
            repositories: state.repositories.clone(),
            runs_analyzed: state.runs.len(),
            failed_runs: state.runs.iter().filter(|r| r.failed()).count(),
            health,
            summary,
            alerts,
            recommendations,
            analysis_source: resolved.id,
            generated_at: Utc::now(),
        })
    }
}

#[async_trait]
impl Step<PipelineHealthState> for GenerateReport {
    fn name(&self) -> &'static str {
        "generate_report"
    }

    async fn run(&self, state: &PipelineHealthState) -> PipelineHealthDelta {
        let failed = state.runs.iter().filter(|r| r.failed()).count();
        let health = PipelineHealth::classify(failed);

        let report = if failed == 0 {
            PipelineReport {
                repositories: state.repositories.clone(),
                runs_analyzed: state.runs.len(),
                failed_runs: 0,
                health,
                summary: format!(
                    "All {} recent runs across {} repositories succeeded",
                    state.runs.len(),
                    state.repositories.len()
                ),
                alerts: Vec::new(),
                recommendations: Vec::new(),
                analysis_source: "rule_based".to_string(),
                generated_at: Utc::now(),
            }
        } else {
            match self.provider_analysis(state, health).await {
                Some(report) => report,
                None => self.rule_based(state, health),
            }
        };

        PipelineHealthDelta {
            report: Some(report),
            ..Default::default()
        }
    }
}

/// Terminal step: persist the report, best-effort. Runs even after a fatal
/// error so the envelope is always built from a completed pipeline.
struct PersistReport {
    sink: Arc<dyn RecordSink>,
}

#[async_trait]
impl Step<PipelineHealthState> for PersistReport {
    fn name(&self) -> &'static str {
        "persist_report"
    }

    async fn run(&self, state: &PipelineHealthState) -> PipelineHealthDelta {
        let Some(report) = &state.report else {
            debug!("no report to persist");
            return PipelineHealthDelta::default();
        };

        let context = serde_json::to_value(report).unwrap_or_default();
        let entry = RecordEntry::new(
            AgentKind::PipelineHealth.name(),
            "pipeline_report",
            report.summary.clone(),
            report.health.as_str(),
            context,
        );
        if let Err(err) = self.sink.record(entry).await {
            warn!(error = %err, "failed to persist pipeline report");
        }

        PipelineHealthDelta::default()
    }
}

/// The pipeline-health agent: owns the graph, shared across dispatches.
pub struct PipelineHealthAgent {
    graph: Graph<PipelineHealthState>,
}

impl PipelineHealthAgent {
    pub fn new(
        ci: Arc<dyn CiSource>,
        completions: Arc<CompletionCascade>,
        sink: Arc<dyn RecordSink>,
        config: Arc<Config>,
    ) -> Self {
        let graph = Graph::builder("pipeline_health")
            .step(FetchRuns {
                ci: ci.clone(),
                config: config.clone(),
            })
            .step(AnalyzeFailures {
                ci,
                config: config.clone(),
            })
            .step(GenerateReport {
                completions,
                config,
            })
            .terminal(PersistReport { sink });
        Self { graph }
    }

    pub async fn run(&self, query: HealthQuery) -> ResultEnvelope {
        let agent = AgentKind::PipelineHealth.name();
        let state = self.graph.run(PipelineHealthState::new(query)).await;

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_classification_thresholds() {
        assert_eq!(PipelineHealth::classify(0), PipelineHealth::Healthy);
        assert_eq!(PipelineHealth::classify(1), PipelineHealth::Degraded);
        assert_eq!(PipelineHealth::classify(2), PipelineHealth::Degraded);
        assert_eq!(PipelineHealth::classify(3), PipelineHealth::Critical);
        assert_eq!(PipelineHealth::classify(10), PipelineHealth::Critical);
    }

    #[test]
    fn test_alert_deserializes_with_default_severity() {
        let alert: Alert = serde_json::from_str(r#"{"message": "ci broken"}"#).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert_eq!(alert.repository, "");
    }

    #[test]
    fn test_health_query_defaults_to_no_repositories() {
        let query: HealthQuery = serde_json::from_str("{}").unwrap();
        assert!(query.repositories.is_empty());
    }
}
