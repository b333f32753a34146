use crate::error::CoreError;
use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of supported currency codes. Stablecoin tokens are treated as
/// ordinary currency codes; none of them carry special conversion behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Usdc,
    Usdt,
}

impl Currency {
    /// Minor-unit scale. Every currency enumerated here uses 2 decimal places.
    pub fn minor_unit_scale(&self) -> u32 {
        2
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Usdc => "USDC",
            Currency::Usdt => "USDT",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "USDC" => Ok(Currency::Usdc),
            "USDT" => Ok(Currency::Usdt),
            other => Err(CoreError::invalid_argument(format!(
                "unsupported currency '{other}'"
            ))),
        }
    }
}

/// Immutable decimal amount tied to a currency. Arithmetic between two
/// `Money` values fails with `CoreError::InvalidArgument` unless their
/// currencies match; there is no implicit conversion anywhere in this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Constructs a `Money` value, normalizing `amount` to the currency's
    /// minor-unit scale with half-up rounding.
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        let normalized = amount.round_dp_with_strategy(
            currency.minor_unit_scale(),
            RoundingStrategy::MidpointAwayFromZero,
        );
        Self {
            amount: normalized,
            currency,
        }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn from_str_amount(amount: &str, currency: Currency) -> Result<Self, CoreError> {
        let parsed = Decimal::from_str(amount)
            .map_err(|e| CoreError::invalid_argument(format!("invalid amount '{amount}': {e}")))?;
        Ok(Self::new(parsed, currency))
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    fn check_currency(&self, other: &Money) -> Result<(), CoreError> {
        if self.currency != other.currency {
            return Err(CoreError::invalid_argument(format!(
                "currency mismatch: {} vs {}",
                self.currency, other.currency
            )));
        }
        Ok(())
    }

    pub fn add(&self, other: &Money) -> Result<Money, CoreError> {
        self.check_currency(other)?;
        Ok(Money::new(self.amount + other.amount, self.currency))
    }

    pub fn sub(&self, other: &Money) -> Result<Money, CoreError> {
        self.check_currency(other)?;
        Ok(Money::new(self.amount - other.amount, self.currency))
    }

    /// `true` if `self > other`; fails across currencies rather than
    /// comparing raw numeric magnitude.
    pub fn exceeds(&self, other: &Money) -> Result<bool, CoreError> {
        self.check_currency(other)?;
        Ok(self.amount > other.amount)
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency == other.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_minor_unit_scale() {
        let m = Money::new(Decimal::from_str("10.005").unwrap(), Currency::Usd);
        assert_eq!(m.amount(), Decimal::from_str("10.01").unwrap());
    }

    #[test]
    fn add_requires_matching_currency() {
        let a = Money::from_str_amount("10.00", Currency::Usd).unwrap();
        let b = Money::from_str_amount("5.00", Currency::Eur).unwrap();
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn add_same_currency_sums() {
        let a = Money::from_str_amount("10.00", Currency::Usd).unwrap();
        let b = Money::from_str_amount("5.50", Currency::Usd).unwrap();
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.amount(), Decimal::from_str("15.50").unwrap());
    }

    #[test]
    fn exceeds_compares_same_currency_only() {
        let a = Money::from_str_amount("100.00", Currency::Usd).unwrap();
        let b = Money::from_str_amount("50.00", Currency::Usd).unwrap();
        assert!(a.exceeds(&b).unwrap());
        assert!(!b.exceeds(&a).unwrap());
    }
}
