use crate::error::{AdapterError, StoreError};
use crate::money::Money;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HoldStatus {
    Active,
    Committed,
    Released,
}

/// Owned by the adapter, not by the core. Created when a hold is first
/// placed; transitions ACTIVE -> {COMMITTED, RELEASED} monotonically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldRecord {
    pub authorization_id: Uuid,
    pub account_ref: String,
    pub journal_entry_id: String,
    pub amount: Money,
    pub status: HoldStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HoldRecord {
    pub fn new(authorization_id: Uuid, account_ref: impl Into<String>, journal_entry_id: impl Into<String>, amount: Money) -> Self {
        let now = Utc::now();
        Self {
            authorization_id,
            account_ref: account_ref.into(),
            journal_entry_id: journal_entry_id.into(),
            amount,
            status: HoldStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[async_trait]
pub trait HoldStore: Send + Sync {
    async fn save(&self, hold: HoldRecord) -> Result<HoldRecord, StoreError>;
    async fn update(&self, hold: HoldRecord) -> Result<HoldRecord, StoreError>;
    async fn find_by_authorization_id(&self, authorization_id: Uuid) -> Result<Option<HoldRecord>, StoreError>;
}

/// Vendor-neutral contract against a core banking system. All calls are
/// idempotent on `reference_id`: implementations must consult their own
/// hold-record lookup before performing any CBS-side effect.
#[async_trait]
pub trait BankAccountAdapter: Send + Sync {
    async fn get_available_balance(&self, account_ref: &str) -> Result<Money, AdapterError>;

    /// Reserves `amount` against `account_ref`. A second call with the same
    /// `reference_id` returns success without placing a second hold.
    async fn place_hold(
        &self,
        account_ref: &str,
        amount: Money,
        reference_id: Uuid,
    ) -> Result<(), AdapterError>;

    /// Finalizes the debit tied to a previously placed hold. `amount` must
    /// not exceed the original hold amount; partial clearing is permitted.
    /// Idempotent: repeated calls after COMMITTED are no-ops.
    async fn commit_debit(
        &self,
        account_ref: &str,
        amount: Money,
        reference_id: Uuid,
    ) -> Result<(), AdapterError>;

    /// Cancels the hold without debiting. Safe to call even if no hold
    /// exists; idempotent.
    async fn release_hold(
        &self,
        account_ref: &str,
        amount: Money,
        reference_id: Uuid,
    ) -> Result<(), AdapterError>;

    fn adapter_name(&self) -> &'static str;

    async fn is_healthy(&self) -> bool;
}
