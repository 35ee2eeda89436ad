//! Event classification and dispatch
//!
//! The dispatcher is itself a pipeline: classify the event tag, invoke the
//! selected agent, finalize. Whatever happens inside, the caller gets a
//! well-formed [`ResultEnvelope`], never a raw failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agents::{AgentKind, HealthQuery, PipelineHealthAgent, SprintAgent, SprintQuery};
use crate::config::Config;
use crate::core::{Cascade, Event, Graph, ResultEnvelope, StageState, Step};
use crate::llm::CompletionCascade;
use crate::persistence::RecordSink;
use crate::sources::{CiSource, WorkItemSource};

/// Where an event should go, or why it cannot go anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub target: Option<AgentKind>,
    pub error: Option<String>,
}

/// Map an event-type tag to a target agent. Pure: the table is static and
/// unknown tags yield an absent target, never a failure.
pub fn classify(event_type: &str) -> RoutingDecision {
    let target = match event_type {
        "sprint_status" | "sprint_query" | "sprint_update" => Some(AgentKind::Sprint),
        "pipeline_status" | "devops_status" | "devops_report" => Some(AgentKind::PipelineHealth),
        _ => None,
    };
    match target {
        Some(agent) => RoutingDecision {
            target: Some(agent),
            error: None,
        },
        None => RoutingDecision {
            target: None,
            error: Some(format!(
                "no pipeline registered for event type: {event_type}"
            )),
        },
    }
}

/// The external collaborators every agent draws from.
pub struct Services {
    pub ci: Arc<dyn CiSource>,
    pub items: Arc<Cascade<Arc<dyn WorkItemSource>>>,
    pub completions: Arc<CompletionCascade>,
    pub sink: Arc<dyn RecordSink>,
}

struct SupervisorState {
    event: Event,
    decision: Option<RoutingDecision>,
    envelope: Option<ResultEnvelope>,
    error: Option<String>,
}

impl SupervisorState {
    fn new(event: Event) -> Self {
        Self {
            event,
            decision: None,
            envelope: None,
            error: None,
        }
    }
}

#[derive(Default)]
struct SupervisorDelta {
    decision: Option<RoutingDecision>,
    envelope: Option<ResultEnvelope>,
    error: Option<String>,
}

impl StageState for SupervisorState {
    type Delta = SupervisorDelta;

    fn apply(&mut self, delta: SupervisorDelta) {
        if let Some(decision) = delta.decision {
            self.decision = Some(decision);
        }
        if let Some(envelope) = delta.envelope {
            self.envelope = Some(envelope);
        }
        if let Some(error) = delta.error {
            self.error = Some(error);
        }
    }

    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Classify the event tag. An unroutable event is a reportable outcome,
/// not a pipeline failure, so the error marker stays clear.
struct Classify;

#[async_trait]
impl Step<SupervisorState> for Classify {
    fn name(&self) -> &'static str {
        "classify"
    }

    async fn run(&self, state: &SupervisorState) -> SupervisorDelta {
        let decision = classify(&state.event.event_type);
        debug!(
            event_type = %state.event.event_type,
            target = ?decision.target,
            "classified event"
        );
        SupervisorDelta {
            decision: Some(decision),
            ..Default::default()
        }
    }
}

/// Project the event payload into an agent's query type. A null payload
/// means "all defaults".
fn project<T>(payload: &Value) -> Result<T, serde_json::Error>
where
    T: DeserializeOwned + Default,
{
    if payload.is_null() {
        Ok(T::default())
    } else {
        serde_json::from_value(payload.clone())
    }
}

/// Invoke the agent the classifier picked.
struct Route {
    sprint: Arc<SprintAgent>,
    pipeline_health: Arc<PipelineHealthAgent>,
}

#[async_trait]
impl Step<SupervisorState> for Route {
    fn name(&self) -> &'static str {
        "route"
    }

    async fn run(&self, state: &SupervisorState) -> SupervisorDelta {
        let target = state.decision.as_ref().and_then(|d| d.target);

        let envelope = match target {
            None => {
                warn!(
                    event_type = %state.event.event_type,
                    "no pipeline registered for event"
                );
                ResultEnvelope::unhandled(&state.event.event_type)
            }
            Some(AgentKind::Sprint) => match project::<SprintQuery>(&state.event.payload) {
                Ok(query) => self.sprint.run(query).await,
                Err(err) => ResultEnvelope::failure(
                    Some(AgentKind::Sprint.name().to_string()),
                    format!("sprint failed: {err}"),
                ),
            },
            Some(AgentKind::PipelineHealth) => {
                match project::<HealthQuery>(&state.event.payload) {
                    Ok(query) => self.pipeline_health.run(query).await,
                    Err(err) => ResultEnvelope::failure(
                        Some(AgentKind::PipelineHealth.name().to_string()),
                        format!("pipeline_health failed: {err}"),
                    ),
                }
            }
        };

        SupervisorDelta {
            envelope: Some(envelope),
            ..Default::default()
        }
    }
}

/// Terminal step: guarantee an envelope exists whatever happened upstream.
struct Finalize;

#[async_trait]
impl Step<SupervisorState> for Finalize {
    fn name(&self) -> &'static str {
        "finalize"
    }

    async fn run(&self, state: &SupervisorState) -> SupervisorDelta {
        if state.envelope.is_some() {
            return SupervisorDelta::default();
        }
        let error = state
            .error()
            .unwrap_or("dispatch produced no result")
            .to_string();
        SupervisorDelta {
            envelope: Some(ResultEnvelope::failure(None, error)),
            ..Default::default()
        }
    }
}

/// The single entry point: one dispatcher owns every registered agent and
/// turns inbound events into result envelopes.
pub struct Dispatcher {
    graph: Graph<SupervisorState>,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, services: Services) -> Self {
        let sprint = Arc::new(SprintAgent::new(
            services.items,
            services.completions.clone(),
            services.sink.clone(),
            config.clone(),
        ));
        let pipeline_health = Arc::new(PipelineHealthAgent::new(
            services.ci,
            services.completions,
            services.sink,
            config,
        ));

        let graph = Graph::builder("supervisor")
            .step(Classify)
            .step(Route {
                sprint,
                pipeline_health,
            })
            .terminal(Finalize);
        Self { graph }
    }

    /// Route one event to its pipeline and return the envelope.
    pub async fn dispatch(&self, event: Event) -> ResultEnvelope {
        info!(event_type = %event.event_type, source = %event.source, "dispatching event");
        let mut state = self.graph.run(SupervisorState::new(event)).await;
        match state.envelope.take() {
            Some(envelope) => envelope,
            // Finalize always sets an envelope; this is unreachable in
            // practice but keeps the boundary total.
            None => ResultEnvelope::failure(None, "dispatch produced no result"),
        }
    }
}
