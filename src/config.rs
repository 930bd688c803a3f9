// 7.0 config.rs: all settlement settings in one place. starting cash, fees, retry budget.
// 7.1 Environment presets pick a whole config at once.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::account::INITIAL_BUYING_POWER;
use crate::types::{FeeRate, Quote};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    // Cash granted at registration and restored on reset
    pub initial_buying_power: Quote,
    // Platform fee charged on both sides of every trade
    pub fee_rate: FeeRate,
    // Extra read-validate-write cycles after a commit conflict
    pub max_commit_retries: u32,
    // Whether orders may carry non-integral share counts
    pub fractional_shares: bool,
    // Default page size for trade history queries
    pub recent_trades_limit: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            initial_buying_power: INITIAL_BUYING_POWER,
            fee_rate: FeeRate::default(), // 2%
            max_commit_retries: 3,
            fractional_shares: true,
            recent_trades_limit: 50,
        }
    }
}

impl SettlementConfig {
    // fee-free variant. same settlement path with f = 0
    pub fn legacy() -> Self {
        Self {
            fee_rate: FeeRate::zero(),
            ..Self::default()
        }
    }

    // whole shares only, smaller bankroll, no retries beyond two
    pub fn tournament() -> Self {
        Self {
            initial_buying_power: Quote::new(dec!(25000)),
            fractional_shares: false,
            max_commit_retries: 2,
            ..Self::default()
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: FeeRate) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn with_initial_buying_power(mut self, amount: Quote) -> Self {
        self.initial_buying_power = amount;
        self
    }

    /// Parse an operator-supplied JSON document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_buying_power.value() <= Decimal::ZERO {
            return Err(ConfigError::InvalidBalance {
                reason: format!("initial buying power must be positive, got {}", self.initial_buying_power),
            });
        }

        // fee rate bounds are enforced by FeeRate itself
        if self.recent_trades_limit == 0 {
            return Err(ConfigError::InvalidLimit {
                reason: "recent trades limit must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid balance config: {reason}")]
    InvalidBalance { reason: String },

    #[error("Invalid limit config: {reason}")]
    InvalidLimit { reason: String },

    #[error("Config parse error: {0}")]
    Parse(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Legacy,
    Tournament,
}

impl Environment {
    pub fn config(&self) -> SettlementConfig {
        match self {
            Environment::Development => SettlementConfig::default(),
            Environment::Legacy => SettlementConfig::legacy(),
            Environment::Tournament => SettlementConfig::tournament(),
        }
    }
}
