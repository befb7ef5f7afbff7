//! Exposed-path and poller state definitions.

use serde::Serialize;
use std::fmt;

/// Where the exposed path is sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Path comes from the flag resolver.
    Dynamic,
    /// Path is the configured static fallback.
    Static,
}

impl PolicyMode {
    /// Mode for a dynamic-enabled switch value.
    pub fn from_dynamic_enabled(enabled: bool) -> Self {
        if enabled {
            PolicyMode::Dynamic
        } else {
            PolicyMode::Static
        }
    }

    /// Check if the path is flag-driven.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, PolicyMode::Dynamic)
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyMode::Dynamic => write!(f, "dynamic"),
            PolicyMode::Static => write!(f, "static"),
        }
    }
}

/// Point-in-time view of the exposed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposedPath {
    /// Currently exposed absolute path, if any.
    pub path: Option<String>,
    /// Mode that produced `path`.
    pub mode: PolicyMode,
}

impl ExposedPath {
    /// Nothing exposed.
    pub fn empty(mode: PolicyMode) -> Self {
        Self { path: None, mode }
    }

    /// Get the path, treating an empty string as unset.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref().filter(|p| !p.is_empty())
    }
}

/// Config poller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// Created, startup pass not run yet.
    Starting,
    /// Loop is running.
    Running,
    /// Stop requested, current tick finishing.
    Stopping,
    /// Loop has exited.
    Stopped,
}

impl PollerState {
    /// Check if the poller loop is live.
    pub fn is_running(&self) -> bool {
        matches!(self, PollerState::Running)
    }
}
