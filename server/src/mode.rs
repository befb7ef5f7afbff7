//! Policy mode switch sources.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::parse_bool;
use crate::state::PolicyMode;

/// Environment variable holding the dynamic-mode switch.
pub const USE_FLAGD_VAR: &str = "EXPOSE_USE_FLAGD";

/// Source of the dynamic-mode switch, consulted once per tick.
pub trait ModeSource: Send + Sync {
    /// Check if the exposed path should come from the flag resolver.
    fn dynamic_enabled(&self) -> bool;

    /// Current policy mode.
    fn mode(&self) -> PolicyMode {
        PolicyMode::from_dynamic_enabled(self.dynamic_enabled())
    }
}

/// Re-reads the switch from the process environment on every call.
#[derive(Debug, Clone)]
pub struct EnvModeSource {
    var: String,
    default: bool,
}

impl EnvModeSource {
    /// Read `EXPOSE_USE_FLAGD`, defaulting to dynamic mode.
    pub fn new() -> Self {
        Self::with_var(USE_FLAGD_VAR, true)
    }

    /// Read an arbitrary variable.
    pub fn with_var(var: impl Into<String>, default: bool) -> Self {
        Self {
            var: var.into(),
            default,
        }
    }
}

impl Default for EnvModeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeSource for EnvModeSource {
    fn dynamic_enabled(&self) -> bool {
        std::env::var(&self.var)
            .map(|value| parse_bool(&value))
            .unwrap_or(self.default)
    }
}

/// In-process switch that can be flipped at runtime.
#[derive(Debug, Clone)]
pub struct ModeSwitch {
    dynamic: Arc<AtomicBool>,
}

impl ModeSwitch {
    /// Create a switch in the given state.
    pub fn new(dynamic_enabled: bool) -> Self {
        Self {
            dynamic: Arc::new(AtomicBool::new(dynamic_enabled)),
        }
    }

    /// Flip the switch. Takes effect on the next tick.
    pub fn set_dynamic(&self, enabled: bool) {
        self.dynamic.store(enabled, Ordering::SeqCst);
    }
}

impl ModeSource for ModeSwitch {
    fn dynamic_enabled(&self) -> bool {
        self.dynamic.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_is_shared() {
        let switch = ModeSwitch::new(true);
        let handle = switch.clone();
        assert_eq!(switch.mode(), PolicyMode::Dynamic);

        handle.set_dynamic(false);
        assert_eq!(switch.mode(), PolicyMode::Static);
    }

    #[test]
    fn test_env_source_rereads() {
        let var = "CURRENCY_TEST_MODE_SOURCE_REREAD";
        let source = EnvModeSource::with_var(var, true);

        std::env::remove_var(var);
        assert!(source.dynamic_enabled());

        std::env::set_var(var, "off");
        assert!(!source.dynamic_enabled());

        std::env::set_var(var, "YES");
        assert!(source.dynamic_enabled());

        std::env::remove_var(var);
    }
}
