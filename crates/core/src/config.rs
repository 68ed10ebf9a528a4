//! Runtime configuration
//!
//! Defaults mirror the classic SXM benchmark driver: Backoff contention
//! management, a two second wake-up for blocked threads, and a backoff
//! exponent capped at one.
//!
//! ```toml
//! manager = "greedy"
//! poll_interval_ms = 250
//! max_backoff_exponent = 3
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default wake-up interval for blocked threads.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default cap on the Backoff strategy's exponent.
pub const DEFAULT_MAX_BACKOFF_EXPONENT: u32 = 1;

/// Largest accepted backoff exponent (sleeps up to ~65 seconds).
pub const MAX_BACKOFF_EXPONENT_LIMIT: u32 = 16;

/// Contention strategy identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerKind {
    /// Always abort the blocker.
    Aggressive,
    /// Always wait for the blocker. Can deadlock.
    Passive,
    /// Randomized exponential backoff, then abort.
    #[default]
    Backoff,
    /// Older transaction wins; younger waits.
    Priority,
    /// Abort waiting or younger blockers, otherwise wait (maximal independent set).
    #[serde(alias = "mis")]
    Greedy,
    /// Abort waiting blockers, otherwise wait.
    Wait,
}

impl ManagerKind {
    /// Every strategy, in declaration order.
    pub const ALL: [ManagerKind; 6] = [
        ManagerKind::Aggressive,
        ManagerKind::Passive,
        ManagerKind::Backoff,
        ManagerKind::Priority,
        ManagerKind::Greedy,
        ManagerKind::Wait,
    ];

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            ManagerKind::Aggressive => "aggressive",
            ManagerKind::Passive => "passive",
            ManagerKind::Backoff => "backoff",
            ManagerKind::Priority => "priority",
            ManagerKind::Greedy => "greedy",
            ManagerKind::Wait => "wait",
        }
    }

    /// Whether new transactions draw from the shared priority clock.
    pub fn uses_priority_clock(self) -> bool {
        matches!(self, ManagerKind::Priority | ManagerKind::Greedy)
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ManagerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        // Accept "BackoffManager" style names as well as bare ones
        let bare = lowered.strip_suffix("manager").unwrap_or(&lowered);
        match bare {
            "aggressive" => Ok(ManagerKind::Aggressive),
            "passive" => Ok(ManagerKind::Passive),
            "backoff" => Ok(ManagerKind::Backoff),
            "priority" => Ok(ManagerKind::Priority),
            "greedy" | "mis" => Ok(ManagerKind::Greedy),
            "wait" => Ok(ManagerKind::Wait),
            _ => Err(ConfigError::UnknownManager(s.to_string())),
        }
    }
}

/// Configuration for one runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StmConfig {
    /// Contention strategy used by every worker of the runtime
    pub manager: ManagerKind,
    /// How often blocked threads wake to check the stop flag
    pub poll_interval_ms: u64,
    /// Cap on the Backoff strategy's exponent
    pub max_backoff_exponent: u32,
}

impl Default for StmConfig {
    fn default() -> Self {
        Self {
            manager: ManagerKind::default(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_backoff_exponent: DEFAULT_MAX_BACKOFF_EXPONENT,
        }
    }
}

impl StmConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: StmConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_backoff_exponent > MAX_BACKOFF_EXPONENT_LIMIT {
            return Err(ConfigError::Invalid {
                field: "max_backoff_exponent",
                reason: format!(
                    "{} exceeds the limit of {}",
                    self.max_backoff_exponent, MAX_BACKOFF_EXPONENT_LIMIT
                ),
            });
        }
        Ok(())
    }

    /// Poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
