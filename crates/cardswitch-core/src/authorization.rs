use crate::error::CoreError;
use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthorizationStatus {
    Approved,
    Declined,
    Cleared,
    Released,
    Reversed,
}

impl AuthorizationStatus {
    pub fn name(self) -> &'static str {
        match self {
            AuthorizationStatus::Approved => "APPROVED",
            AuthorizationStatus::Declined => "DECLINED",
            AuthorizationStatus::Cleared => "CLEARED",
            AuthorizationStatus::Released => "RELEASED",
            AuthorizationStatus::Reversed => "REVERSED",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MerchantMetadata {
    pub name: String,
    pub mcc: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// Request into the authorization pipeline. `authorization_id` is assigned
/// internally before persistence; callers never choose it.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub card_id: Uuid,
    pub amount: Money,
    pub merchant: MerchantMetadata,
    pub idempotency_key: String,
}

/// Durable authorization record. Once in a terminal status for its phase
/// (CLEARED, RELEASED, REVERSED, DECLINED) the record is not mutated except
/// to advance to a later phase, enforced here via explicit, checked
/// transition methods rather than a public status setter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorization {
    pub authorization_id: Uuid,
    pub card_id: Uuid,
    pub account_ref: String,
    pub amount: Money,
    pub cleared_amount: Option<Money>,
    pub status: AuthorizationStatus,
    pub merchant: MerchantMetadata,
    pub decline_reason: Option<String>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Authorization {
    pub fn approved(
        card_id: Uuid,
        account_ref: impl Into<String>,
        amount: Money,
        merchant: MerchantMetadata,
        idempotency_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            authorization_id: Uuid::new_v4(),
            card_id,
            account_ref: account_ref.into(),
            amount,
            cleared_amount: None,
            status: AuthorizationStatus::Approved,
            merchant,
            decline_reason: None,
            idempotency_key: idempotency_key.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn declined(
        card_id: Uuid,
        account_ref: impl Into<String>,
        amount: Money,
        merchant: MerchantMetadata,
        idempotency_key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            authorization_id: Uuid::new_v4(),
            card_id,
            account_ref: account_ref.into(),
            amount,
            cleared_amount: None,
            status: AuthorizationStatus::Declined,
            merchant,
            decline_reason: Some(reason.into()),
            idempotency_key: idempotency_key.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// CLEARED requires a prior APPROVED; `clearing_amount` must not exceed
    /// the original hold amount (checked by the caller before invoking the
    /// CBS commit, not re-checked here).
    pub fn mark_cleared(&mut self, clearing_amount: Money) -> Result<(), CoreError> {
        if self.status != AuthorizationStatus::Approved {
            return Err(CoreError::invalid_state(format!(
                "cannot clear authorization in status {}",
                self.status.name()
            )));
        }
        self.status = AuthorizationStatus::Cleared;
        self.cleared_amount = Some(clearing_amount);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// RELEASED requires APPROVED and no CLEARED. Unlike clear/reverse this
    /// transition is tolerant: callers treat a non-APPROVED release request
    /// as a no-op rather than calling this method at all.
    pub fn mark_released(&mut self) -> Result<(), CoreError> {
        if self.status != AuthorizationStatus::Approved {
            return Err(CoreError::invalid_state(format!(
                "cannot release authorization in status {}",
                self.status.name()
            )));
        }
        self.status = AuthorizationStatus::Released;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// REVERSED requires a prior CLEARED. Partial vs full reversal amount is
    /// not represented in the status: the terminal status is REVERSED
    /// either way.
    pub fn mark_reversed(&mut self) -> Result<(), CoreError> {
        if self.status != AuthorizationStatus::Cleared {
            return Err(CoreError::invalid_state(format!(
                "cannot reverse authorization in status {}",
                self.status.name()
            )));
        }
        self.status = AuthorizationStatus::Reversed;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    fn approved() -> Authorization {
        Authorization::approved(
            Uuid::new_v4(),
            "acc-1",
            Money::from_str_amount("100.00", Currency::Usd).unwrap(),
            MerchantMetadata::default(),
            "key-1",
        )
    }

    #[test]
    fn clear_requires_approved() {
        let mut auth = approved();
        auth.mark_released().unwrap();
        let err = auth.mark_cleared(Money::from_str_amount("10.00", Currency::Usd).unwrap());
        assert!(err.is_err());
    }

    #[test]
    fn reverse_requires_cleared() {
        let mut auth = approved();
        assert!(auth.mark_reversed().is_err());
        auth.mark_cleared(Money::from_str_amount("50.00", Currency::Usd).unwrap())
            .unwrap();
        assert!(auth.mark_reversed().is_ok());
        assert_eq!(auth.status, AuthorizationStatus::Reversed);
    }

    #[test]
    fn release_requires_approved_and_blocks_after_clear() {
        let mut auth = approved();
        auth.mark_cleared(Money::from_str_amount("50.00", Currency::Usd).unwrap())
            .unwrap();
        assert!(auth.mark_released().is_err());
    }
}
