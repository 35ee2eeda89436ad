//! Step and state contracts for pipeline graphs

use async_trait::async_trait;

/// State threaded through one pipeline run.
///
/// Each pipeline declares a fixed struct with explicitly optional fields and
/// a matching delta type: a partial update whose unset fields leave the
/// accumulated state untouched. Steps never mutate state directly; the
/// executor merges their deltas left-to-right.
pub trait StageState: Send + Sized {
    /// The partial update a step contributes.
    type Delta: Default + Send;

    /// Merge a step's delta into the accumulated state, field by field.
    fn apply(&mut self, delta: Self::Delta);

    /// The fatal error marker, if any earlier step has set one.
    fn error(&self) -> Option<&str>;
}

/// A single unit of work in a pipeline.
///
/// A step may perform external I/O, but must catch collaborator failures
/// locally: either degrade gracefully (skip the failing item, log, continue
/// with the rest) or mark the whole run fatal through the delta's error
/// field. Failures never escape a step as panics.
#[async_trait]
pub trait Step<S: StageState>: Send + Sync {
    /// Step name used in logs.
    fn name(&self) -> &'static str;

    /// Consume the accumulated state, produce a partial update.
    async fn run(&self, state: &S) -> S::Delta;
}
