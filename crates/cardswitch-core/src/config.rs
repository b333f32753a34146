use crate::money::{Currency, Money};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Thresholds for the built-in rules. Loaded once at startup into an
/// immutable struct; there is no runtime reconfiguration.
#[derive(Debug, Clone)]
pub struct RulesConfig {
    pub transaction_limit_default: Decimal,
    pub daily_limit_default: Decimal,
    pub velocity_max_per_minute: u64,
    pub mcc_blocklist: Vec<String>,
}

impl RulesConfig {
    pub fn transaction_limit(&self, currency: Currency) -> Money {
        Money::new(self.transaction_limit_default, currency)
    }

    pub fn daily_limit(&self, currency: Currency) -> Money {
        Money::new(self.daily_limit_default, currency)
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            transaction_limit_default: Decimal::from_str("1000.00").expect("valid default"),
            daily_limit_default: Decimal::from_str("5000.00").expect("valid default"),
            velocity_max_per_minute: 5,
            mcc_blocklist: vec!["7995".to_string(), "6211".to_string()],
        }
    }
}
