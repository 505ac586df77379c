use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-user wallet bounds. Daily limits apply to the local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletLimits {
    pub max_charge: Decimal,
    pub daily_charge_limit: Decimal,
    pub min_withdrawal: Decimal,
    pub max_withdrawal: Decimal,
    pub daily_withdrawal_limit: Decimal,
}

impl Default for WalletLimits {
    fn default() -> Self {
        Self {
            max_charge: dec!(10000),
            daily_charge_limit: dec!(50000),
            min_withdrawal: dec!(10),
            max_withdrawal: dec!(5000),
            daily_withdrawal_limit: dec!(20000),
        }
    }
}

/// Settings of the simulated card gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub card_charge_success_rate: f64,
    pub card_payment_success_rate: f64,
    /// Fixed RNG seed, for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            card_charge_success_rate: 0.95,
            card_payment_success_rate: 0.90,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub wallet: WalletLimits,
    pub gateway: GatewayConfig,
    /// Order statuses in which an order may be paid. Compared case-insensitively.
    pub payable_order_statuses: Vec<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            wallet: WalletLimits::default(),
            gateway: GatewayConfig::default(),
            payable_order_statuses: vec!["PENDING".to_string()],
        }
    }
}

impl LedgerConfig {
    /// Reads a JSON config file. Missing keys keep their defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let limits = &self.wallet;
        let positive = [
            ("max_charge", limits.max_charge),
            ("daily_charge_limit", limits.daily_charge_limit),
            ("min_withdrawal", limits.min_withdrawal),
            ("max_withdrawal", limits.max_withdrawal),
            ("daily_withdrawal_limit", limits.daily_withdrawal_limit),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v <= Decimal::ZERO) {
            return Err(LedgerError::InvalidArgument(format!(
                "wallet.{name} must be positive"
            )));
        }
        if limits.min_withdrawal > limits.max_withdrawal {
            return Err(LedgerError::InvalidArgument(
                "wallet.min_withdrawal exceeds wallet.max_withdrawal".to_string(),
            ));
        }

        let rates = [
            ("card_charge_success_rate", self.gateway.card_charge_success_rate),
            ("card_payment_success_rate", self.gateway.card_payment_success_rate),
        ];
        if let Some((name, _)) = rates.iter().find(|(_, r)| !(0.0..=1.0).contains(r)) {
            return Err(LedgerError::InvalidArgument(format!(
                "gateway.{name} must be within [0, 1]"
            )));
        }

        if self.payable_order_statuses.is_empty() {
            return Err(LedgerError::InvalidArgument(
                "payable_order_statuses must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_payable(&self, order_status: &str) -> bool {
        self.payable_order_statuses
            .iter()
            .any(|s| s.eq_ignore_ascii_case(order_status.trim()))
    }
}
