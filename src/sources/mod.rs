//! External data-source seams
//!
//! The agents never talk to a tracker or CI system directly; they go
//! through these traits. Production wires HTTP clients in, tests wire in
//! static fixtures. Every call an implementation makes should be bounded
//! by [`with_timeout`] so one slow backend cannot stall a whole report.

pub mod types;

use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;
use tokio::time::{timeout, Duration};

pub use types::{
    Conclusion, ItemFilter, ItemState, JobStep, WorkItem, WorkflowJob, WorkflowRun,
};

/// Error types for data-source calls
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("timeout after {0} seconds")]
    Timeout(u64),
}

/// Work-item backend: the issue-tracker view, or the project-board view
/// when one is configured.
#[async_trait]
pub trait WorkItemSource: Send + Sync {
    async fn fetch_items(
        &self,
        repository: &str,
        filter: &ItemFilter,
    ) -> Result<Vec<WorkItem>, SourceError>;
}

/// CI backend: recent workflow runs and the jobs inside one run.
#[async_trait]
pub trait CiSource: Send + Sync {
    async fn fetch_runs(
        &self,
        repository: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowRun>, SourceError>;

    async fn fetch_run_jobs(
        &self,
        repository: &str,
        run_id: u64,
    ) -> Result<Vec<WorkflowJob>, SourceError>;
}

/// Bound an external call; elapsed time maps to [`SourceError::Timeout`].
pub async fn with_timeout<T, F>(secs: u64, fut: F) -> Result<T, SourceError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    match timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout(secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passes_fast_results_through() {
        let result = with_timeout(5, async { Ok::<_, SourceError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_maps_elapsed_calls() {
        let result = with_timeout(1, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, SourceError>(42)
        })
        .await;

        assert!(matches!(result, Err(SourceError::Timeout(1))));
    }
}
