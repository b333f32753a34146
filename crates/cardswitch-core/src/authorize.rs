use crate::adapter::BankAccountAdapter;
use crate::authorization::{Authorization, AuthorizationRequest, AuthorizationStatus};
use crate::error::{AdapterError, CoreError};
use crate::ledger::{EntryType, LedgerEntry, LedgerTransactionType};
use crate::rules::{RuleResult, RulesEngine};
use crate::store::{AuthorizationStore, CardStore, MappingStore, PipelineUnitOfWork};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationOutcome {
    pub authorization_id: Uuid,
    pub status: AuthorizationStatus,
    pub decline_reason: Option<String>,
}

impl From<&Authorization> for AuthorizationOutcome {
    fn from(auth: &Authorization) -> Self {
        Self {
            authorization_id: auth.authorization_id,
            status: auth.status,
            decline_reason: auth.decline_reason.clone(),
        }
    }
}

/// Coordinates card validation, rules evaluation, CBS hold placement, and
/// durable persistence for a single authorization request. See the module
/// docs on `cardswitch-core` for the ten-step algorithm this implements.
pub struct AuthorizationPipeline {
    cards: Arc<dyn CardStore>,
    mappings: Arc<dyn MappingStore>,
    authorizations: Arc<dyn AuthorizationStore>,
    unit_of_work: Arc<dyn PipelineUnitOfWork>,
    rules: RulesEngine,
    adapter: Arc<dyn BankAccountAdapter>,
}

impl AuthorizationPipeline {
    pub fn new(
        cards: Arc<dyn CardStore>,
        mappings: Arc<dyn MappingStore>,
        authorizations: Arc<dyn AuthorizationStore>,
        unit_of_work: Arc<dyn PipelineUnitOfWork>,
        rules: RulesEngine,
        adapter: Arc<dyn BankAccountAdapter>,
    ) -> Self {
        Self {
            cards,
            mappings,
            authorizations,
            unit_of_work,
            rules,
            adapter,
        }
    }

    pub async fn authorize(
        &self,
        request: AuthorizationRequest,
    ) -> Result<AuthorizationOutcome, CoreError> {
        // Step 1: shape-check the idempotency key.
        if request.idempotency_key.trim().is_empty() {
            return Err(CoreError::invalid_argument("idempotency key must not be empty"));
        }

        // Step 2: decision cache. A duplicate request always returns the
        // original decision, doing no other work.
        if let Some(existing) = self
            .authorizations
            .find_by_idempotency_key(&request.idempotency_key)
            .await?
        {
            return Ok(AuthorizationOutcome::from(&existing));
        }

        // Step 3: resolve the card.
        let card = match self.cards.find_by_id(request.card_id).await? {
            Some(card) => card,
            None => return self.decline(&request, "Card not found").await,
        };

        // Step 4: validate card state.
        if !card.is_usable() {
            let reason = if card.is_expired() {
                "Card expired"
            } else {
                "Card not active"
            };
            return self.decline(&request, reason).await;
        }

        // Step 5: resolve the bank account mapping.
        let mapping = match self.mappings.find_by_card_id(card.card_id).await? {
            Some(mapping) => mapping,
            None => return self.decline(&request, "no bank account linked").await,
        };

        // Step 6: rules engine. Any decline is persisted and returned.
        if let RuleResult::Decline(reason) = self.rules.evaluate(&request).await? {
            return self.decline(&request, reason).await;
        }

        // Step 7: place the CBS hold.
        let authorization_id = Uuid::new_v4();
        if let Err(err) = self
            .adapter
            .place_hold(&mapping.bank_account_ref, request.amount, authorization_id)
            .await
        {
            let reason = match err {
                AdapterError::InsufficientFunds { .. } => "Insufficient funds".to_string(),
                AdapterError::BankCoreError { cause, .. } => format!("Bank declined: {cause}"),
            };
            tracing::warn!(authorization_id = %authorization_id, reason = %reason, "hold placement failed");
            return self.decline(&request, reason).await;
        }

        // Steps 8-9: persist APPROVED and append the AUTH_HOLD ledger entry.
        // If persistence fails after the hold succeeded, compensate with a
        // release so the design never leaks a hold.
        let authorization = Authorization::approved(
            card.card_id,
            mapping.bank_account_ref.clone(),
            request.amount,
            request.merchant.clone(),
            request.idempotency_key.clone(),
        );
        let mut authorization = authorization;
        authorization.authorization_id = authorization_id;

        match self.persist_approved(&authorization).await {
            Ok(()) => {
                tracing::info!(authorization_id = %authorization_id, "authorization approved");
                Ok(AuthorizationOutcome::from(&authorization))
            }
            Err(err) => {
                tracing::error!(authorization_id = %authorization_id, error = %err, "failed to persist approved authorization, compensating");
                if let Err(release_err) = self
                    .adapter
                    .release_hold(&mapping.bank_account_ref, request.amount, authorization_id)
                    .await
                {
                    tracing::error!(
                        authorization_id = %authorization_id,
                        error = %release_err,
                        "compensating release failed; hold requires manual reconciliation"
                    );
                }
                Err(err)
            }
        }
    }

    async fn persist_approved(&self, authorization: &Authorization) -> Result<(), CoreError> {
        let ledger_entry = LedgerEntry::new(
            authorization.account_ref.clone(),
            EntryType::Debit,
            authorization.amount,
            LedgerTransactionType::AuthHold,
            Some(authorization.authorization_id),
            Some(authorization.card_id),
            authorization.idempotency_key.clone(),
        );
        self.unit_of_work
            .record_authorization(authorization.clone(), Some(ledger_entry))
            .await?;
        Ok(())
    }

    async fn decline(
        &self,
        request: &AuthorizationRequest,
        reason: impl Into<String>,
    ) -> Result<AuthorizationOutcome, CoreError> {
        let reason = reason.into();
        let declined = Authorization::declined(
            request.card_id,
            "",
            request.amount,
            request.merchant.clone(),
            request.idempotency_key.clone(),
            reason,
        );
        self.unit_of_work.record_authorization(declined.clone(), None).await?;
        tracing::info!(
            authorization_id = %declined.authorization_id,
            reason = ?declined.decline_reason,
            "authorization declined"
        );
        Ok(AuthorizationOutcome::from(&declined))
    }
}
