//! Pipeline graph - a fixed step sequence with a terminal step

use crate::core::step::{StageState, Step};
use tracing::{debug, info};
use uuid::Uuid;

/// A fixed, compiled-in pipeline: ordered steps sharing one state type,
/// plus a designated terminal step.
///
/// Execution is strictly sequential. Once a step sets the error marker,
/// every remaining non-terminal step is skipped (it contributes an empty
/// delta), but the terminal step always runs so a run always produces a
/// result - an early failure changes the terminal step's *output*, never
/// whether it executes.
pub struct Graph<S: StageState> {
    name: &'static str,
    steps: Vec<Box<dyn Step<S>>>,
    terminal: Box<dyn Step<S>>,
}

impl<S: StageState> Graph<S> {
    /// Start building a graph with the given pipeline name.
    pub fn builder(name: &'static str) -> GraphBuilder<S> {
        GraphBuilder {
            name,
            steps: Vec::new(),
        }
    }

    /// The pipeline name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of steps, terminal included.
    pub fn len(&self) -> usize {
        self.steps.len() + 1
    }

    /// Run the pipeline to completion, consuming the initial state.
    pub async fn run(&self, mut state: S) -> S {
        let invocation = Uuid::new_v4();
        info!(pipeline = self.name, %invocation, "starting pipeline run");

        for step in &self.steps {
            if let Some(err) = state.error() {
                debug!(
                    pipeline = self.name,
                    step = step.name(),
                    error = err,
                    "skipping step after upstream failure"
                );
                continue;
            }
            debug!(pipeline = self.name, step = step.name(), "running step");
            let delta = step.run(&state).await;
            state.apply(delta);
        }

        // The terminal step runs unconditionally, error marker or not.
        debug!(
            pipeline = self.name,
            step = self.terminal.name(),
            "running terminal step"
        );
        let delta = self.terminal.run(&state).await;
        state.apply(delta);

        info!(
            pipeline = self.name,
            %invocation,
            error = state.error(),
            "pipeline run finished"
        );
        state
    }
}

/// Builder for [`Graph`]; `terminal` finishes the build.
pub struct GraphBuilder<S: StageState> {
    name: &'static str,
    steps: Vec<Box<dyn Step<S>>>,
}

impl<S: StageState> GraphBuilder<S> {
    /// Append an ordinary (skippable) step.
    pub fn step(mut self, step: impl Step<S> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Set the terminal step and finish the graph.
    pub fn terminal(self, step: impl Step<S> + 'static) -> Graph<S> {
        Graph {
            name: self.name,
            steps: self.steps,
            terminal: Box::new(step),
        }
    }
}
