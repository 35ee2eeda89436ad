//! Text-completion seam
//!
//! Concrete providers live outside this crate; callers inject
//! implementations as cascade candidates in priority order. Agents must
//! work with zero configured providers (deterministic fallback), exactly
//! one, or several.

pub mod extract;

use crate::core::Cascade;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use extract::{extract_json, ExtractError};

/// Error types for completion calls
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("timeout after {0} seconds")]
    Timeout(u64),
}

/// A text-completion backend: system instructions plus user content in,
/// free-form text out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError>;
}

/// Ordered provider fallback list, first configured provider wins.
pub type CompletionCascade = Cascade<Arc<dyn CompletionClient>>;
