//! Report agents
//!
//! Each agent owns one pipeline graph plus the business rules for its
//! report. Agents are constructed once at startup with their collaborators
//! injected and are safe to share across concurrent dispatches.

pub mod pipeline_health;
pub mod prompts;
pub mod sprint;

use std::fmt;

pub use pipeline_health::{HealthQuery, PipelineHealthAgent, PipelineReport};
pub use sprint::{SprintAgent, SprintQuery, SprintReport};

/// Identity of a registered agent, used in routing decisions and
/// result envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Sprint,
    PipelineHealth,
}

impl AgentKind {
    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::Sprint => "sprint",
            AgentKind::PipelineHealth => "pipeline_health",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
