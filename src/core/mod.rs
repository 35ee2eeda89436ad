//! Core orchestration primitives
//!
//! This module defines the pipeline execution machinery shared by every
//! agent: the typed state/step contracts, the sequential graph executor,
//! the first-available-wins resource cascade, and the event/envelope types
//! exchanged with callers.

pub mod cascade;
pub mod envelope;
pub mod graph;
pub mod step;

pub use cascade::{Candidate, Cascade, Resolved};
pub use envelope::{Event, ResultEnvelope};
pub use graph::{Graph, GraphBuilder};
pub use step::{StageState, Step};
