//! Inbound events and the uniform result envelope

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// An incoming business event: a webhook delivery, a scheduled trigger, or
/// a direct query, tagged with the type the classifier routes on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event-type tag, e.g. "pipeline_status" or "sprint_query".
    pub event_type: String,

    /// Where the event came from, e.g. "webhook" or "scheduler".
    #[serde(default)]
    pub source: String,

    /// Raw event data, projected into a pipeline's initial state.
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            source: String::new(),
            payload,
        }
    }
}

/// The uniform shape returned to the caller regardless of which pipeline
/// ran. Callers always receive a well-formed envelope, never a raw error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// The agent that handled the event, absent when none was found.
    pub agent: Option<String>,

    /// Agent-specific report payload.
    #[serde(default)]
    pub payload: Value,

    /// Set when the run could not produce a meaningful result.
    pub error: Option<String>,
}

impl ResultEnvelope {
    pub fn success(agent: impl Into<String>, payload: Value) -> Self {
        Self {
            agent: Some(agent.into()),
            payload,
            error: None,
        }
    }

    pub fn failure(agent: Option<String>, error: impl Into<String>) -> Self {
        Self {
            agent,
            payload: Value::Null,
            error: Some(error.into()),
        }
    }

    /// Envelope for events no registered pipeline handles. Reported, not
    /// fatal: the error field stays empty.
    pub fn unhandled(event_type: &str) -> Self {
        Self {
            agent: None,
            payload: json!({
                "message": format!("event type not handled: {event_type}"),
            }),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
