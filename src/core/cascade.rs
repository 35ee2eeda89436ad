//! Resource cascade - ordered first-available-wins backend selection

use tracing::debug;

/// One interchangeable backend in a cascade: an identity, a cheap
/// side-effect-free availability predicate (typically "is a credential
/// configured"), and a constructor for the resource itself.
pub struct Candidate<T> {
    id: String,
    available: Box<dyn Fn() -> bool + Send + Sync>,
    construct: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> Candidate<T> {
    /// Create a candidate with an explicit availability predicate.
    pub fn new(
        id: impl Into<String>,
        available: impl Fn() -> bool + Send + Sync + 'static,
        construct: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            available: Box::new(available),
            construct: Box::new(construct),
        }
    }

    /// Create a candidate that is always available.
    pub fn always(id: impl Into<String>, construct: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::new(id, || true, construct)
    }

    /// The candidate's identity, used in logs.
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// The resource a cascade resolved, tagged with the winning candidate's id.
pub struct Resolved<T> {
    pub id: String,
    pub resource: T,
}

/// An ordered fallback list of interchangeable backends.
///
/// Ordering is fixed by construction; `resolve` walks it front to back and
/// returns the first candidate whose predicate holds. Predicates are
/// re-evaluated on every call - the chosen resource is never cached, so
/// configuration changes in long-lived processes take effect on the next
/// invocation. No scoring, no network probing.
pub struct Cascade<T> {
    candidates: Vec<Candidate<T>>,
}

impl<T> Cascade<T> {
    pub fn new() -> Self {
        Self {
            candidates: Vec::new(),
        }
    }

    /// Append a candidate; earlier candidates win ties.
    pub fn candidate(mut self, candidate: Candidate<T>) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Return the first available backend, or `None` when none hold.
    ///
    /// `None` is not an error: callers must have a defined behavior for it,
    /// typically a deterministic lower-fidelity fallback.
    pub fn resolve(&self) -> Option<Resolved<T>> {
        for candidate in &self.candidates {
            if (candidate.available)() {
                debug!(candidate = candidate.id.as_str(), "cascade resolved");
                return Some(Resolved {
                    id: candidate.id.clone(),
                    resource: (candidate.construct)(),
                });
            }
        }
        debug!("cascade resolved no candidate");
        None
    }
}

impl<T> Default for Cascade<T> {
    fn default() -> Self {
        Self::new()
    }
}
