//! Engine configuration.

use std::time::Duration;

use kudos_core::{BudgetPolicy, Result};

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to `RocksDB` data directory (default: "/data/kudos").
    pub data_dir: String,

    /// How long an operation waits for entity locks before failing with
    /// `Conflict`, in milliseconds (default: 500).
    pub lock_timeout_ms: u64,

    /// Monthly award limit for budget periods created lazily (default: 10000).
    pub budget_limit: i64,

    /// Whether lazily created budget periods reject awards past the limit
    /// (default: true).
    pub budget_hard: bool,

    /// Percentage of the limit at which awards start raising warnings
    /// (default: 80).
    pub budget_warn_pct: u8,

    /// Largest page returned by history and ticket listings (default: 100).
    pub history_max_page: usize,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("KUDOS_DATA_DIR").unwrap_or_else(|_| defaults.data_dir),
            lock_timeout_ms: env_parse("KUDOS_LOCK_TIMEOUT_MS").unwrap_or(defaults.lock_timeout_ms),
            budget_limit: env_parse("KUDOS_BUDGET_LIMIT").unwrap_or(defaults.budget_limit),
            budget_hard: env_parse("KUDOS_BUDGET_HARD").unwrap_or(defaults.budget_hard),
            budget_warn_pct: env_parse("KUDOS_BUDGET_WARN_PCT").unwrap_or(defaults.budget_warn_pct),
            history_max_page: env_parse("KUDOS_HISTORY_MAX_PAGE")
                .unwrap_or(defaults.history_max_page),
        }
    }

    /// Lock wait bound as a `Duration`.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Policy applied to budget periods created on first use.
    #[must_use]
    pub fn budget_policy(&self) -> BudgetPolicy {
        BudgetPolicy {
            limit: self.budget_limit,
            is_hard: self.budget_hard,
            warn_threshold_pct: self.budget_warn_pct,
        }
    }

    /// Check the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `RewardsError::Configuration` describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.history_max_page == 0 {
            return Err(kudos_core::RewardsError::Configuration(
                "KUDOS_HISTORY_MAX_PAGE must be at least 1".into(),
            ));
        }
        self.budget_policy()
            .validate()
            .map_err(|e| kudos_core::RewardsError::Configuration(e.to_string()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let policy = BudgetPolicy::default();
        Self {
            data_dir: "/data/kudos".into(),
            lock_timeout_ms: 500,
            budget_limit: policy.limit,
            budget_hard: policy.is_hard,
            budget_warn_pct: policy.warn_threshold_pct,
            history_max_page: 100,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
