//! Exposed-path validation.

use serde::{Deserialize, Serialize};

/// Separator every absolute path starts with.
pub const PATH_SEPARATOR: char = '/';

/// Decide whether `path` may legally be exposed.
///
/// With `require_absolute`, empty and relative paths are rejected. A
/// non-empty `allow_prefix` must be a literal prefix of `path`.
pub fn is_allowed(path: &str, require_absolute: bool, allow_prefix: &str) -> bool {
    if require_absolute && !path.starts_with(PATH_SEPARATOR) {
        return false;
    }
    if !allow_prefix.is_empty() && !path.starts_with(allow_prefix) {
        return false;
    }
    true
}

/// Allow-list policy for exposed paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPolicy {
    /// Reject empty and relative paths.
    pub require_absolute: bool,
    /// Literal prefix every path must start with. Empty disables the check.
    pub allow_prefix: String,
}

impl PathPolicy {
    /// Create a policy.
    pub fn new(require_absolute: bool, allow_prefix: impl Into<String>) -> Self {
        Self {
            require_absolute,
            allow_prefix: allow_prefix.into(),
        }
    }

    /// Check a candidate path against this policy.
    pub fn is_allowed(&self, path: &str) -> bool {
        is_allowed(path, self.require_absolute, &self.allow_prefix)
    }
}

impl Default for PathPolicy {
    fn default() -> Self {
        Self::new(true, "/")
    }
}
