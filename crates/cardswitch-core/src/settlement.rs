use crate::adapter::BankAccountAdapter;
use crate::authorization::AuthorizationStatus;
use crate::error::CoreError;
use crate::ledger::{EntryType, LedgerEntry, LedgerTransactionType};
use crate::money::Money;
use crate::store::{AuthorizationStore, PipelineUnitOfWork};
use crate::LedgerStore;
use std::sync::Arc;
use uuid::Uuid;

/// Coordinates clear / release / reverse transitions against a prior
/// authorization. Every operation is gated by the same decision-cache
/// discipline as the authorization pipeline: a ledger entry already present
/// under `idempotency_key` means the operation is a no-op.
pub struct SettlementPipeline {
    authorizations: Arc<dyn AuthorizationStore>,
    ledger: Arc<dyn LedgerStore>,
    unit_of_work: Arc<dyn PipelineUnitOfWork>,
    adapter: Arc<dyn BankAccountAdapter>,
}

impl SettlementPipeline {
    pub fn new(
        authorizations: Arc<dyn AuthorizationStore>,
        ledger: Arc<dyn LedgerStore>,
        unit_of_work: Arc<dyn PipelineUnitOfWork>,
        adapter: Arc<dyn BankAccountAdapter>,
    ) -> Self {
        Self {
            authorizations,
            ledger,
            unit_of_work,
            adapter,
        }
    }

    pub async fn clear(
        &self,
        authorization_id: Uuid,
        clearing_amount: Money,
        idempotency_key: &str,
    ) -> Result<(), CoreError> {
        if self.ledger.exists_for_key(idempotency_key).await? {
            return Ok(());
        }

        let mut authorization = self
            .authorizations
            .find_by_id(authorization_id)
            .await?
            .ok_or_else(|| CoreError::not_found("authorization not found"))?;

        if authorization.status != AuthorizationStatus::Approved {
            return Err(CoreError::invalid_state(format!(
                "cannot clear authorization in status {}",
                authorization.status.name()
            )));
        }

        if clearing_amount.exceeds(&authorization.amount).unwrap_or(true) {
            return Err(CoreError::invalid_argument(
                "clearing amount exceeds authorization amount",
            ));
        }

        self.adapter
            .commit_debit(&authorization.account_ref, clearing_amount, authorization_id)
            .await
            .map_err(CoreError::from)?;

        let ledger_entry = LedgerEntry::new(
            authorization.account_ref.clone(),
            EntryType::Debit,
            clearing_amount,
            LedgerTransactionType::ClearingCommit,
            Some(authorization_id),
            Some(authorization.card_id),
            idempotency_key,
        );

        authorization.mark_cleared(clearing_amount)?;
        self.unit_of_work.record_settlement(authorization, ledger_entry).await?;
        tracing::info!(authorization_id = %authorization_id, "authorization cleared");
        Ok(())
    }

    pub async fn release(&self, authorization_id: Uuid, idempotency_key: &str) -> Result<(), CoreError> {
        if self.ledger.exists_for_key(idempotency_key).await? {
            return Ok(());
        }

        let mut authorization = self
            .authorizations
            .find_by_id(authorization_id)
            .await?
            .ok_or_else(|| CoreError::not_found("authorization not found"))?;

        if authorization.status != AuthorizationStatus::Approved {
            // Not APPROVED: treat as an idempotent no-op rather than an error.
            return Ok(());
        }

        if let Err(err) = self
            .adapter
            .release_hold(&authorization.account_ref, authorization.amount, authorization_id)
            .await
        {
            // Release is best-effort at the CBS: the hold is either already
            // gone or will need reconciliation, but local state still
            // advances. This is the documented RELEASED-vs-CBS-failure gap.
            tracing::error!(
                authorization_id = %authorization_id,
                error = %err,
                "CBS release_hold failed; local state still advancing to RELEASED, manual reconciliation required"
            );
        }

        let ledger_entry = LedgerEntry::new(
            authorization.account_ref.clone(),
            EntryType::Credit,
            authorization.amount,
            LedgerTransactionType::AuthRelease,
            Some(authorization_id),
            Some(authorization.card_id),
            idempotency_key,
        );

        authorization.mark_released()?;
        self.unit_of_work.record_settlement(authorization, ledger_entry).await?;
        tracing::info!(authorization_id = %authorization_id, "authorization released");
        Ok(())
    }

    pub async fn reverse(
        &self,
        authorization_id: Uuid,
        reversal_amount: Money,
        idempotency_key: &str,
    ) -> Result<(), CoreError> {
        if self.ledger.exists_for_key(idempotency_key).await? {
            return Ok(());
        }

        let mut authorization = self
            .authorizations
            .find_by_id(authorization_id)
            .await?
            .ok_or_else(|| CoreError::not_found("authorization not found"))?;

        if authorization.status != AuthorizationStatus::Cleared {
            return Err(CoreError::invalid_state(format!(
                "cannot reverse authorization in status {}",
                authorization.status.name()
            )));
        }

        let cleared_amount = authorization
            .cleared_amount
            .ok_or_else(|| CoreError::invalid_state("cleared authorization missing cleared amount"))?;

        if reversal_amount.exceeds(&cleared_amount).unwrap_or(true) {
            return Err(CoreError::invalid_argument(
                "reversal amount exceeds cleared amount",
            ));
        }

        // Delegated to the CBS's own refund mechanism in a production
        // adapter; the reference adapter models it as a ledger-only event.
        let ledger_entry = LedgerEntry::new(
            authorization.account_ref.clone(),
            EntryType::Credit,
            reversal_amount,
            LedgerTransactionType::Reversal,
            Some(authorization_id),
            Some(authorization.card_id),
            idempotency_key,
        );

        // Partial vs full reversal amount is not represented in status:
        // REVERSED is terminal regardless, per the acknowledged simplification.
        authorization.mark_reversed()?;
        self.unit_of_work.record_settlement(authorization, ledger_entry).await?;
        tracing::info!(authorization_id = %authorization_id, "authorization reversed");
        Ok(())
    }
}
