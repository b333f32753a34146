use crate::authorization::Authorization;
use crate::card::Card;
use crate::error::StoreError;
use crate::ledger::LedgerEntry;
use crate::mapping::BankAccountMapping;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait CardStore: Send + Sync {
    async fn save(&self, card: Card) -> Result<Card, StoreError>;
    async fn find_by_id(&self, card_id: Uuid) -> Result<Option<Card>, StoreError>;
}

#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn save(&self, mapping: BankAccountMapping) -> Result<BankAccountMapping, StoreError>;
    async fn find_by_card_id(&self, card_id: Uuid) -> Result<Option<BankAccountMapping>, StoreError>;
}

/// Authorization records, indexed by id and by idempotency key. The
/// idempotency-key lookup is the decision cache the authorization pipeline
/// consults before doing any other work.
#[async_trait]
pub trait AuthorizationStore: Send + Sync {
    async fn save(&self, authorization: Authorization) -> Result<Authorization, StoreError>;
    async fn update(&self, authorization: Authorization) -> Result<Authorization, StoreError>;
    async fn find_by_id(&self, authorization_id: Uuid) -> Result<Option<Authorization>, StoreError>;
    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Authorization>, StoreError>;

    /// Sum of APPROVED authorizations for `card_id` created at or after
    /// `since` (inclusive), used by the daily-spend-limit rule.
    async fn sum_approved_since(
        &self,
        card_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<rust_decimal::Decimal, StoreError>;

    /// Count of authorizations for `card_id` created at or after `since`
    /// (inclusive), used by the velocity rule.
    async fn count_since(&self, card_id: Uuid, since: DateTime<Utc>) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone)]
pub struct ProcessorTransactionMapping {
    pub id: Uuid,
    pub processor_name: String,
    pub processor_transaction_id: String,
    pub authorization_id: Uuid,
    pub card_token: String,
    pub created_at: DateTime<Utc>,
}

impl ProcessorTransactionMapping {
    pub fn new(
        processor_name: impl Into<String>,
        processor_transaction_id: impl Into<String>,
        authorization_id: Uuid,
        card_token: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            processor_name: processor_name.into(),
            processor_transaction_id: processor_transaction_id.into(),
            authorization_id,
            card_token: card_token.into(),
            created_at: Utc::now(),
        }
    }
}

/// Spans an entire pipeline write step in a single atomic unit: the
/// authorization row and its ledger entry either both land or neither does.
/// Every authorization-pipeline and settlement-pipeline write goes through
/// this trait rather than calling `AuthorizationStore`/`LedgerStore`
/// directly, so a mid-step failure (e.g. a ledger append failing after the
/// authorization save already succeeded) can never leave an orphaned
/// authorization row with no ledger counterpart for a retried request to
/// pick up as an authoritative decision.
#[async_trait]
pub trait PipelineUnitOfWork: Send + Sync {
    /// Persists an authorization decision: an APPROVED row plus its
    /// AUTH_HOLD ledger entry, or a DECLINED row with no ledger entry
    /// (`ledger_entry: None`).
    async fn record_authorization(
        &self,
        authorization: Authorization,
        ledger_entry: Option<LedgerEntry>,
    ) -> Result<Authorization, StoreError>;

    /// Persists a settlement transition: the authorization's updated status
    /// plus the clearing/release/reversal ledger entry it produced.
    async fn record_settlement(
        &self,
        authorization: Authorization,
        ledger_entry: LedgerEntry,
    ) -> Result<Authorization, StoreError>;
}

#[async_trait]
pub trait ProcessorMappingStore: Send + Sync {
    async fn save(
        &self,
        mapping: ProcessorTransactionMapping,
    ) -> Result<ProcessorTransactionMapping, StoreError>;

    async fn find_by_processor_transaction_id(
        &self,
        processor_transaction_id: &str,
    ) -> Result<Option<ProcessorTransactionMapping>, StoreError>;
}
