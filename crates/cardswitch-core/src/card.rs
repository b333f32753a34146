use crate::error::CoreError;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardState {
    Active,
    Frozen,
    Closed,
}

impl CardState {
    pub fn name(self) -> &'static str {
        match self {
            CardState::Active => "ACTIVE",
            CardState::Frozen => "FROZEN",
            CardState::Closed => "CLOSED",
        }
    }
}

/// A payment instrument mapped to exactly one CBS account via a
/// `BankAccountMapping`. A card created by the issuance pipeline starts
/// FROZEN and must be explicitly activated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub card_id: Uuid,
    pub cardholder_name: String,
    pub last4: String,
    pub expiration_date: NaiveDate,
    pub state: CardState,
    pub owner_id: String,
}

impl Card {
    pub fn issue(cardholder_name: impl Into<String>, last4: impl Into<String>, expiration_date: NaiveDate, owner_id: impl Into<String>) -> Self {
        Self {
            card_id: Uuid::new_v4(),
            cardholder_name: cardholder_name.into(),
            last4: last4.into(),
            expiration_date,
            state: CardState::Frozen,
            owner_id: owner_id.into(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().date_naive() > self.expiration_date
    }

    pub fn is_usable(&self) -> bool {
        self.state == CardState::Active && !self.is_expired()
    }

    /// A CLOSED card never transitions; every other move checks the current
    /// state explicitly rather than relying on callers to pre-validate.
    pub fn activate(&mut self) -> Result<(), CoreError> {
        match self.state {
            CardState::Closed => Err(CoreError::invalid_state("card is closed")),
            _ => {
                self.state = CardState::Active;
                Ok(())
            }
        }
    }

    pub fn freeze(&mut self) -> Result<(), CoreError> {
        match self.state {
            CardState::Closed => Err(CoreError::invalid_state("card is closed")),
            _ => {
                self.state = CardState::Frozen;
                Ok(())
            }
        }
    }

    pub fn close(&mut self) -> Result<(), CoreError> {
        if self.state == CardState::Closed {
            return Err(CoreError::invalid_state("card already closed"));
        }
        self.state = CardState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Card {
        Card::issue("Jane Doe", "4242", NaiveDate::from_ymd_opt(2099, 1, 1).unwrap(), "client-1")
    }

    #[test]
    fn issued_card_starts_frozen() {
        let card = sample();
        assert_eq!(card.state, CardState::Frozen);
        assert!(!card.is_usable());
    }

    #[test]
    fn activation_makes_card_usable() {
        let mut card = sample();
        card.activate().unwrap();
        assert!(card.is_usable());
    }

    #[test]
    fn closed_card_never_transitions() {
        let mut card = sample();
        card.close().unwrap();
        assert!(card.activate().is_err());
        assert!(card.freeze().is_err());
        assert!(card.close().is_err());
    }

    #[test]
    fn expired_card_is_not_usable() {
        let mut card = Card::issue("Jane Doe", "4242", NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), "client-1");
        card.activate().unwrap();
        assert!(card.is_expired());
        assert!(!card.is_usable());
    }
}
