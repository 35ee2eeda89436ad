//! Overseer routes incoming business events (webhooks, scheduled triggers,
//! direct queries) to fixed, compiled-in report pipelines. Each pipeline
//! pulls data from external services, optionally asks a text-completion
//! provider for analysis, and emits a structured report inside a uniform
//! result envelope.
//!
//! The moving parts:
//!
//! - [`core`]: the graph executor, step/state contracts, the resource
//!   cascade, and the event/envelope types.
//! - [`supervisor`]: the classifier and the top-level dispatcher, itself
//!   built on the same graph machinery.
//! - [`agents`]: the sprint and pipeline-health report pipelines.
//! - [`sources`], [`llm`], [`persistence`]: the seams where external
//!   collaborators plug in.
//!
//! Construct a [`Config`] and a [`supervisor::Services`] bundle at startup,
//! build one [`Dispatcher`], and feed it [`Event`]s.

pub mod agents;
pub mod config;
pub mod core;
pub mod llm;
pub mod persistence;
pub mod sources;
pub mod supervisor;

pub use agents::{AgentKind, PipelineHealthAgent, SprintAgent};
pub use config::Config;
pub use core::{Candidate, Cascade, Event, Graph, Resolved, ResultEnvelope, StageState, Step};
pub use llm::{extract_json, CompletionCascade, CompletionClient, ExtractError};
pub use persistence::{LogSink, MemorySink, RecordEntry, RecordSink};
pub use sources::{CiSource, WorkItemSource};
pub use supervisor::{classify, Dispatcher, RoutingDecision, Services};
