//! Registry of the currently exposed file path.

use std::sync::Arc;

use currency_common::PathPolicy;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::state::{ExposedPath, PolicyMode};

/// Result of a conditional registry update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Candidate was valid and different; it is now exposed.
    Applied,
    /// Candidate was valid but already exposed.
    Unchanged,
    /// Candidate failed the path policy; previous value retained.
    Rejected,
}

impl UpdateOutcome {
    /// Check if the exposed path changed.
    pub fn applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied)
    }
}

/// Holds the exposed path behind a reader/writer lock.
///
/// Never stores a path that fails its policy. A failed update leaves the
/// last good value in place.
pub struct ExposedPathRegistry {
    policy: PathPolicy,
    state: RwLock<ExposedPath>,
}

impl ExposedPathRegistry {
    /// Create an empty registry.
    pub fn new(policy: PathPolicy, mode: PolicyMode) -> Self {
        Self {
            policy,
            state: RwLock::new(ExposedPath::empty(mode)),
        }
    }

    /// Get the validation policy.
    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    /// Get a copy of the current path and mode.
    pub fn snapshot(&self) -> ExposedPath {
        self.state.read().clone()
    }

    /// Validate `candidate` and install it if it differs from the current path.
    pub fn try_update(&self, candidate: &str, mode: PolicyMode) -> UpdateOutcome {
        if !self.policy.is_allowed(candidate) {
            warn!(path = candidate, %mode, "Path rejected by policy; keeping previous value");
            return UpdateOutcome::Rejected;
        }

        let mut state = self.state.write();
        state.mode = mode;
        if state.path.as_deref() == Some(candidate) {
            return UpdateOutcome::Unchanged;
        }
        state.path = Some(candidate.to_string());
        drop(state);

        info!(path = candidate, %mode, "Exposed path updated");
        UpdateOutcome::Applied
    }

    /// Drop the current path if it no longer passes the policy.
    ///
    /// Returns true if a path was cleared.
    pub fn clear_if_invalid(&self) -> bool {
        let mut state = self.state.write();
        let invalid = state
            .path
            .as_deref()
            .is_some_and(|path| !self.policy.is_allowed(path));
        if invalid {
            let cleared = state.path.take();
            drop(state);
            warn!(path = ?cleared, "Cleared exposed path rejected by policy");
        }
        invalid
    }
}

/// Shared exposed-path registry.
pub type SharedRegistry = Arc<ExposedPathRegistry>;
