use crate::authorization::{AuthorizationRequest, AuthorizationStatus, MerchantMetadata};
use crate::authorize::{AuthorizationOutcome, AuthorizationPipeline};
use crate::error::CoreError;
use crate::money::Money;
use crate::settlement::SettlementPipeline;
use crate::store::{ProcessorMappingStore, ProcessorTransactionMapping};
use std::sync::Arc;
use uuid::Uuid;

/// Processor-native authorization event. `card_token` is the processor's
/// reference to the card; in this reference implementation it is the
/// card's internal id rendered as a string, since card tokenization is out
/// of scope for the core.
#[derive(Debug, Clone)]
pub struct ProcessorAuthorizationEvent {
    pub processor_transaction_id: String,
    pub card_token: String,
    pub amount: Money,
    pub merchant: MerchantMetadata,
    pub idempotency_key: String,
}

#[derive(Debug, Clone)]
pub struct ProcessorClearingEvent {
    pub processor_transaction_id: String,
    pub amount: Money,
    pub idempotency_key: String,
}

#[derive(Debug, Clone)]
pub struct ProcessorReversalEvent {
    pub processor_transaction_id: String,
    pub amount: Money,
    pub idempotency_key: String,
}

/// Translates processor-native events to internal pipeline calls and back.
/// Contains no policy or balance logic: its forbidden zone is business
/// decisions, which belong entirely to the pipelines it wraps.
pub struct InboundProcessorAdapter {
    processor_name: String,
    authorize: Arc<AuthorizationPipeline>,
    settle: Arc<SettlementPipeline>,
    mappings: Arc<dyn ProcessorMappingStore>,
}

impl InboundProcessorAdapter {
    pub fn new(
        processor_name: impl Into<String>,
        authorize: Arc<AuthorizationPipeline>,
        settle: Arc<SettlementPipeline>,
        mappings: Arc<dyn ProcessorMappingStore>,
    ) -> Self {
        Self {
            processor_name: processor_name.into(),
            authorize,
            settle,
            mappings,
        }
    }

    pub fn processor_name(&self) -> &str {
        &self.processor_name
    }

    /// An authorization webhook with an unknown card token yields a
    /// synthetic DECLINED rather than an error: the processor must not see
    /// a 5xx for a known, unavoidable decline.
    pub async fn handle_authorize(
        &self,
        event: ProcessorAuthorizationEvent,
    ) -> Result<AuthorizationOutcome, CoreError> {
        let card_id = match Uuid::parse_str(&event.card_token) {
            Ok(id) => id,
            Err(_) => {
                return Ok(AuthorizationOutcome {
                    authorization_id: Uuid::new_v4(),
                    status: AuthorizationStatus::Declined,
                    decline_reason: Some("Card not found".to_string()),
                })
            }
        };

        let request = AuthorizationRequest {
            card_id,
            amount: event.amount,
            merchant: event.merchant,
            idempotency_key: event.idempotency_key,
        };

        let outcome = match self.authorize.authorize(request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(error = %err, "authorization pipeline error; declining webhook request");
                return Ok(AuthorizationOutcome {
                    authorization_id: Uuid::new_v4(),
                    status: AuthorizationStatus::Declined,
                    decline_reason: Some(err.to_string()),
                });
            }
        };

        if outcome.status == AuthorizationStatus::Approved {
            self.mappings
                .save(ProcessorTransactionMapping::new(
                    self.processor_name.clone(),
                    event.processor_transaction_id,
                    outcome.authorization_id,
                    event.card_token,
                ))
                .await?;
        }

        Ok(outcome)
    }

    /// Clearing/reversal with an unknown transaction id is a hard error so
    /// the processor retries and an operator can reconcile.
    pub async fn handle_clear(&self, event: ProcessorClearingEvent) -> Result<(), CoreError> {
        let mapping = self
            .mappings
            .find_by_processor_transaction_id(&event.processor_transaction_id)
            .await?
            .ok_or_else(|| {
                CoreError::UnknownTransaction(event.processor_transaction_id.clone())
            })?;

        self.settle
            .clear(mapping.authorization_id, event.amount, &event.idempotency_key)
            .await
    }

    pub async fn handle_reverse(&self, event: ProcessorReversalEvent) -> Result<(), CoreError> {
        let mapping = self
            .mappings
            .find_by_processor_transaction_id(&event.processor_transaction_id)
            .await?
            .ok_or_else(|| {
                CoreError::UnknownTransaction(event.processor_transaction_id.clone())
            })?;

        self.settle
            .reverse(mapping.authorization_id, event.amount, &event.idempotency_key)
            .await
    }
}
