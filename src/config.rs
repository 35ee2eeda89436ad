//! Runtime configuration
//!
//! Everything has a usable default so the crate runs without any
//! environment at all; `from_env` layers overrides on top.

use std::env;
use tracing::warn;

/// Tunables shared by the dispatcher and both agents.
#[derive(Debug, Clone)]
pub struct Config {
    /// Repositories monitored when an event names none, `owner/name` form.
    pub monitored_repos: Vec<String>,
    /// Label prefix marking externally-delivered work, e.g. "vendor"
    /// matches `vendor-in-progress`, `vendor-review`, `vendor-blocked`.
    pub vendor_label: String,
    /// Sprint window used when computing velocity, in days.
    pub sprint_length_days: i64,
    /// Upper bound on any single external call.
    pub request_timeout_secs: u64,
    /// How many recent workflow runs to pull per repository.
    pub run_fetch_limit: usize,
    /// How many failed runs get per-job detail in a report.
    pub failure_detail_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitored_repos: Vec::new(),
            vendor_label: "vendor".to_string(),
            sprint_length_days: 14,
            request_timeout_secs: 30,
            run_fetch_limit: 20,
            failure_detail_limit: 5,
        }
    }
}

impl Config {
    /// Build a config from environment variables, falling back to defaults
    /// for anything unset. Unparseable numeric values are logged and
    /// ignored rather than treated as fatal.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(repos) = env::var("OVERSEER_REPOS") {
            config.monitored_repos = parse_repo_list(&repos);
        }
        if let Ok(label) = env::var("OVERSEER_VENDOR_LABEL") {
            if !label.trim().is_empty() {
                config.vendor_label = label.trim().to_string();
            }
        }
        if let Ok(days) = env::var("OVERSEER_SPRINT_DAYS") {
            match days.parse() {
                Ok(n) => config.sprint_length_days = n,
                Err(_) => warn!(value = %days, "ignoring unparseable OVERSEER_SPRINT_DAYS"),
            }
        }
        if let Ok(secs) = env::var("OVERSEER_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(n) => config.request_timeout_secs = n,
                Err(_) => warn!(value = %secs, "ignoring unparseable OVERSEER_TIMEOUT_SECS"),
            }
        }

        config
    }
}

/// Split a comma-separated repository list, dropping empty segments.
fn parse_repo_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
