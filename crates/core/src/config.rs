//! Coalescer configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default cooldown between the last trigger and the fire
pub const DEFAULT_COOLDOWN_MS: u64 = 300;

/// Largest accepted cooldown (one minute)
pub const MAX_COOLDOWN_MS: u64 = 60_000;

/// Which edge of the window runs the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    /// Run once activity stops, with the last call's arguments
    #[default]
    Trailing,
    /// Run on the first call, then swallow calls until the window closes
    Leading,
}

impl std::str::FromStr for Edge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trailing" => Ok(Edge::Trailing),
            "leading" => Ok(Edge::Leading),
            other => Err(format!("unknown edge '{}' (expected trailing or leading)", other)),
        }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Trailing => f.write_str("trailing"),
            Edge::Leading => f.write_str("leading"),
        }
    }
}

/// Debounce configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Cooldown window in milliseconds (default: 300)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Firing policy (default: trailing)
    #[serde(default)]
    pub edge: Edge,
}

impl DebounceConfig {
    pub fn trailing(cooldown: Duration) -> Self {
        Self {
            cooldown_ms: cooldown.as_millis() as u64,
            edge: Edge::Trailing,
        }
    }

    pub fn leading(cooldown: Duration) -> Self {
        Self {
            cooldown_ms: cooldown.as_millis() as u64,
            edge: Edge::Leading,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cooldown_ms > MAX_COOLDOWN_MS {
            return Err(ConfigError::CooldownOutOfRange {
                got: self.cooldown_ms,
                max: MAX_COOLDOWN_MS,
            });
        }
        Ok(())
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            edge: Edge::Trailing,
        }
    }
}

fn default_cooldown_ms() -> u64 {
    DEFAULT_COOLDOWN_MS
}
