use crate::money::Money;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerTransactionType {
    AuthHold,
    AuthRelease,
    ClearingCommit,
    Reversal,
    Deposit,
    Withdrawal,
}

/// Append-only record of a coordination event. Not a source of truth for
/// balances — the CBS owns those — this is the audit trail of what the core
/// asked the CBS to do and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: Uuid,
    pub account_ref: String,
    pub entry_type: EntryType,
    pub amount: Money,
    pub transaction_type: LedgerTransactionType,
    pub authorization_id: Option<Uuid>,
    pub card_id: Option<Uuid>,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        account_ref: impl Into<String>,
        entry_type: EntryType,
        amount: Money,
        transaction_type: LedgerTransactionType,
        authorization_id: Option<Uuid>,
        card_id: Option<Uuid>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: Uuid::new_v4(),
            account_ref: account_ref.into(),
            entry_type,
            amount,
            transaction_type,
            authorization_id,
            card_id,
            idempotency_key: idempotency_key.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LedgerEntryFilter {
    pub authorization_id: Option<Uuid>,
    pub card_id: Option<Uuid>,
    pub transaction_type: Option<LedgerTransactionType>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Append-only ledger store. `idempotencyKey` is unique: callers use
/// `exists_for_key` as the decision-cache check before doing any work that
/// would append a second entry under the same key.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerEntry, crate::error::StoreError>;
    async fn exists_for_key(&self, idempotency_key: &str) -> Result<bool, crate::error::StoreError>;
    async fn list(&self, filter: LedgerEntryFilter) -> Result<Vec<LedgerEntry>, crate::error::StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Currency;

    #[test]
    fn entry_carries_idempotency_key() {
        let entry = LedgerEntry::new(
            "acc-1",
            EntryType::Debit,
            Money::from_str_amount("10.00", Currency::Usd).unwrap(),
            LedgerTransactionType::AuthHold,
            None,
            None,
            "key-1",
        );
        assert_eq!(entry.idempotency_key, "key-1");
        assert_eq!(entry.entry_type, EntryType::Debit);
    }
}
