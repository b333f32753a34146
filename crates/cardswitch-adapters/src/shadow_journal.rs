//! Reference `BankAccountAdapter` implementation. Simulates a core banking
//! system as an in-process double-entry journal: every account has a
//! balance, every hold posts a DEBIT against the account and a CREDIT
//! against a dedicated `auth-holds` liability account, and committing or
//! releasing a hold posts the reversing entry. This is a test/reference
//! adapter, not a connector to any named vendor core.

use async_trait::async_trait;
use cardswitch_core::{AdapterError, BankAccountAdapter, HoldRecord, HoldStatus, HoldStore, Money};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const HOLDS_GL_ACCOUNT: &str = "auth-holds-gl";

#[derive(Debug, Clone)]
struct JournalPosting {
    account_ref: String,
    amount: Money,
    debit: bool,
}

/// Double-entry CBS simulator. Not thread-contended in any meaningful way:
/// the mutex only ever guards plain map writes, never an await point.
pub struct ShadowJournalAdapter {
    balances: Mutex<HashMap<String, Money>>,
    postings: Mutex<Vec<JournalPosting>>,
    holds: Arc<dyn HoldStore>,
}

impl ShadowJournalAdapter {
    pub fn new(holds: Arc<dyn HoldStore>) -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            postings: Mutex::new(Vec::new()),
            holds,
        }
    }

    /// Seeds an account's balance for tests and local bootstrapping; the
    /// real CBS this stands in for owns this state externally.
    pub fn seed_balance(&self, account_ref: &str, balance: Money) {
        let mut balances = self.balances.lock().expect("journal lock poisoned");
        balances.insert(account_ref.to_string(), balance);
    }

    fn post(&self, account_ref: &str, amount: Money, debit: bool) -> Result<(), AdapterError> {
        let mut balances = self.balances.lock().expect("journal lock poisoned");
        let current = balances
            .get(account_ref)
            .copied()
            .unwrap_or_else(|| Money::zero(amount.currency()));

        let updated = if debit {
            current.sub(&amount)
        } else {
            current.add(&amount)
        }
        .map_err(|e| AdapterError::BankCoreError {
            account_ref: account_ref.to_string(),
            op: "post".to_string(),
            cause: e.to_string(),
        })?;

        balances.insert(account_ref.to_string(), updated);
        drop(balances);

        self.postings
            .lock()
            .expect("journal lock poisoned")
            .push(JournalPosting {
                account_ref: account_ref.to_string(),
                amount,
                debit,
            });
        Ok(())
    }
}

#[async_trait]
impl BankAccountAdapter for ShadowJournalAdapter {
    async fn get_available_balance(&self, account_ref: &str) -> Result<Money, AdapterError> {
        let balances = self.balances.lock().expect("journal lock poisoned");
        balances.get(account_ref).copied().ok_or_else(|| AdapterError::BankCoreError {
            account_ref: account_ref.to_string(),
            op: "get_available_balance".to_string(),
            cause: "account not found".to_string(),
        })
    }

    /// Posts DEBIT savings / CREDIT holds-GL and records a `HoldRecord`. A
    /// repeat call for the same `reference_id` is a no-op: the hold lookup
    /// is the only idempotency check this adapter performs.
    async fn place_hold(
        &self,
        account_ref: &str,
        amount: Money,
        reference_id: Uuid,
    ) -> Result<(), AdapterError> {
        if self
            .holds
            .find_by_authorization_id(reference_id)
            .await
            .map_err(|e| AdapterError::BankCoreError {
                account_ref: account_ref.to_string(),
                op: "place_hold".to_string(),
                cause: e.to_string(),
            })?
            .is_some()
        {
            return Ok(());
        }

        let available = self.get_available_balance(account_ref).await?;
        if amount.exceeds(&available).unwrap_or(true) {
            return Err(AdapterError::InsufficientFunds {
                account_ref: account_ref.to_string(),
                required: amount.to_string(),
                available: available.to_string(),
            });
        }

        self.post(account_ref, amount, true)?;
        self.post(HOLDS_GL_ACCOUNT, amount, false)?;

        let journal_entry_id = format!("hold-{reference_id}");
        self.holds
            .save(HoldRecord::new(reference_id, account_ref, journal_entry_id, amount))
            .await
            .map_err(|e| AdapterError::BankCoreError {
                account_ref: account_ref.to_string(),
                op: "place_hold".to_string(),
                cause: e.to_string(),
            })?;
        Ok(())
    }

    /// Closes out the holds-GL liability for the full hold amount. If
    /// `amount` is less than the original hold (partial clearing), the
    /// difference is credited back to the account since only `amount` was
    /// actually owed. Idempotent: a hold already COMMITTED is left
    /// untouched.
    async fn commit_debit(
        &self,
        account_ref: &str,
        amount: Money,
        reference_id: Uuid,
    ) -> Result<(), AdapterError> {
        let Some(mut hold) = self
            .holds
            .find_by_authorization_id(reference_id)
            .await
            .map_err(|e| AdapterError::BankCoreError {
                account_ref: account_ref.to_string(),
                op: "commit_debit".to_string(),
                cause: e.to_string(),
            })?
        else {
            return Err(AdapterError::BankCoreError {
                account_ref: account_ref.to_string(),
                op: "commit_debit".to_string(),
                cause: "no hold found for reference_id".to_string(),
            });
        };

        if hold.status != HoldStatus::Active {
            return Ok(());
        }

        if amount.exceeds(&hold.amount).unwrap_or(true) {
            return Err(AdapterError::BankCoreError {
                account_ref: account_ref.to_string(),
                op: "commit_debit".to_string(),
                cause: "clearing amount exceeds hold amount".to_string(),
            });
        }

        self.post(HOLDS_GL_ACCOUNT, hold.amount, true)?;
        if let Ok(refund) = hold.amount.sub(&amount) {
            if !refund.is_zero() {
                self.post(account_ref, refund, false)?;
            }
        }

        hold.status = HoldStatus::Committed;
        hold.updated_at = chrono::Utc::now();
        self.holds
            .update(hold)
            .await
            .map_err(|e| AdapterError::BankCoreError {
                account_ref: account_ref.to_string(),
                op: "commit_debit".to_string(),
                cause: e.to_string(),
            })?;
        Ok(())
    }

    /// Posts only the reversing journal (DEBIT holds-GL / CREDIT savings for
    /// the original hold amount) and marks the hold RELEASED. Safe to call
    /// with no matching hold: treated as already released.
    async fn release_hold(
        &self,
        account_ref: &str,
        _amount: Money,
        reference_id: Uuid,
    ) -> Result<(), AdapterError> {
        let Some(mut hold) = self
            .holds
            .find_by_authorization_id(reference_id)
            .await
            .map_err(|e| AdapterError::BankCoreError {
                account_ref: account_ref.to_string(),
                op: "release_hold".to_string(),
                cause: e.to_string(),
            })?
        else {
            return Ok(());
        };

        if hold.status != HoldStatus::Active {
            return Ok(());
        }

        self.post(HOLDS_GL_ACCOUNT, hold.amount, true)?;
        self.post(account_ref, hold.amount, false)?;
        hold.status = HoldStatus::Released;
        hold.updated_at = chrono::Utc::now();
        self.holds
            .update(hold)
            .await
            .map_err(|e| AdapterError::BankCoreError {
                account_ref: account_ref.to_string(),
                op: "release_hold".to_string(),
                cause: e.to_string(),
            })?;
        Ok(())
    }

    fn adapter_name(&self) -> &'static str {
        "shadow-journal"
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryHoldStore;
    use cardswitch_core::Currency;

    fn noop_hold_store() -> Arc<InMemoryHoldStore> {
        Arc::new(InMemoryHoldStore::new())
    }

    #[tokio::test]
    async fn place_hold_then_release_restores_balance() {
        let adapter = ShadowJournalAdapter::new(noop_hold_store());
        adapter.seed_balance("acc-1", Money::from_str_amount("100.00", Currency::Usd).unwrap());

        let reference_id = Uuid::new_v4();
        let amount = Money::from_str_amount("30.00", Currency::Usd).unwrap();
        adapter.place_hold("acc-1", amount, reference_id).await.unwrap();
        assert_eq!(
            adapter.get_available_balance("acc-1").await.unwrap(),
            Money::from_str_amount("70.00", Currency::Usd).unwrap()
        );

        adapter.release_hold("acc-1", amount, reference_id).await.unwrap();
        assert_eq!(
            adapter.get_available_balance("acc-1").await.unwrap(),
            Money::from_str_amount("100.00", Currency::Usd).unwrap()
        );
    }

    #[tokio::test]
    async fn place_hold_then_commit_leaves_balance_reduced_by_amount() {
        let adapter = ShadowJournalAdapter::new(noop_hold_store());
        adapter.seed_balance("acc-1", Money::from_str_amount("100.00", Currency::Usd).unwrap());

        let reference_id = Uuid::new_v4();
        let amount = Money::from_str_amount("40.00", Currency::Usd).unwrap();
        adapter.place_hold("acc-1", amount, reference_id).await.unwrap();
        adapter.commit_debit("acc-1", amount, reference_id).await.unwrap();

        assert_eq!(
            adapter.get_available_balance("acc-1").await.unwrap(),
            Money::from_str_amount("60.00", Currency::Usd).unwrap()
        );
    }

    #[tokio::test]
    async fn commit_debit_rejects_amount_exceeding_hold() {
        let adapter = ShadowJournalAdapter::new(noop_hold_store());
        adapter.seed_balance("acc-1", Money::from_str_amount("100.00", Currency::Usd).unwrap());

        let reference_id = Uuid::new_v4();
        let hold_amount = Money::from_str_amount("40.00", Currency::Usd).unwrap();
        adapter.place_hold("acc-1", hold_amount, reference_id).await.unwrap();

        let over_commit = Money::from_str_amount("40.01", Currency::Usd).unwrap();
        let result = adapter.commit_debit("acc-1", over_commit, reference_id).await;
        assert!(matches!(result, Err(AdapterError::BankCoreError { .. })));

        // Balance is unaffected: the over-commit was rejected before any posting.
        assert_eq!(
            adapter.get_available_balance("acc-1").await.unwrap(),
            Money::from_str_amount("60.00", Currency::Usd).unwrap()
        );
    }

    #[tokio::test]
    async fn place_hold_rejects_when_amount_exceeds_balance() {
        let adapter = ShadowJournalAdapter::new(noop_hold_store());
        adapter.seed_balance("acc-1", Money::from_str_amount("10.00", Currency::Usd).unwrap());

        let amount = Money::from_str_amount("20.00", Currency::Usd).unwrap();
        let result = adapter.place_hold("acc-1", amount, Uuid::new_v4()).await;
        assert!(matches!(result, Err(AdapterError::InsufficientFunds { .. })));
    }

    #[tokio::test]
    async fn place_hold_is_idempotent_on_reference_id() {
        let adapter = ShadowJournalAdapter::new(noop_hold_store());
        adapter.seed_balance("acc-1", Money::from_str_amount("100.00", Currency::Usd).unwrap());

        let reference_id = Uuid::new_v4();
        let amount = Money::from_str_amount("30.00", Currency::Usd).unwrap();
        adapter.place_hold("acc-1", amount, reference_id).await.unwrap();
        adapter.place_hold("acc-1", amount, reference_id).await.unwrap();

        assert_eq!(
            adapter.get_available_balance("acc-1").await.unwrap(),
            Money::from_str_amount("70.00", Currency::Usd).unwrap()
        );
    }
}
