use crate::error::{PotError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_INITIAL_BALANCE: u64 = 10_000;
pub const DEFAULT_STAKE_INCREMENT: u64 = 1_000;

/// Language for user-facing validation messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Th,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub initial_balance: u64,
    pub stake_increment: u64,
    /// How long the last-winner marker stays up, in milliseconds.
    pub winner_display_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            initial_balance: DEFAULT_INITIAL_BALANCE,
            stake_increment: DEFAULT_STAKE_INCREMENT,
            winner_display_ms: 3_000,
        }
    }
}

impl LedgerConfig {
    pub fn winner_display(&self) -> Duration {
        Duration::from_millis(self.winner_display_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub ledger: LedgerConfig,
    /// Channel pump period, in milliseconds.
    pub poll_interval_ms: u64,
    pub locale: Locale,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            poll_interval_ms: 250,
            locale: Locale::default(),
        }
    }
}

impl TableConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Read a JSON config file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TableConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger.stake_increment == 0 {
            return Err(PotError::config("Stake increment must be greater than 0"));
        }

        if self.ledger.initial_balance % self.ledger.stake_increment != 0 {
            tracing::debug!(
                "Initial balance {} is not a multiple of the stake increment {}",
                self.ledger.initial_balance,
                self.ledger.stake_increment
            );
        }

        if self.poll_interval_ms == 0 {
            return Err(PotError::config("Poll interval must be greater than 0"));
        }

        Ok(())
    }
}
