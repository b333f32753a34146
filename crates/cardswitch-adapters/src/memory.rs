//! Process-local store implementations backed by `tokio::sync::Mutex`-guarded
//! maps. Used for local development and the test suite; every store trait
//! from `cardswitch_core::store` has a Postgres-backed counterpart in
//! `postgres.rs` selected by the same configuration switch.

use async_trait::async_trait;
use cardswitch_core::{
    Authorization, BankAccountMapping, Card, HoldRecord, HoldStore, LedgerEntry,
    LedgerEntryFilter, LedgerStore, PipelineUnitOfWork, ProcessorMappingStore,
    ProcessorTransactionMapping, StoreError,
};
use cardswitch_core::{AuthorizationStore, CardStore, MappingStore};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryCardStore {
    cards: Mutex<HashMap<Uuid, Card>>,
}

impl InMemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CardStore for InMemoryCardStore {
    async fn save(&self, card: Card) -> Result<Card, StoreError> {
        let mut cards = self.cards.lock().expect("card store lock poisoned");
        cards.insert(card.card_id, card.clone());
        Ok(card)
    }

    async fn find_by_id(&self, card_id: Uuid) -> Result<Option<Card>, StoreError> {
        let cards = self.cards.lock().expect("card store lock poisoned");
        Ok(cards.get(&card_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryMappingStore {
    by_card: Mutex<HashMap<Uuid, BankAccountMapping>>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MappingStore for InMemoryMappingStore {
    async fn save(&self, mapping: BankAccountMapping) -> Result<BankAccountMapping, StoreError> {
        let mut by_card = self.by_card.lock().expect("mapping store lock poisoned");
        if by_card.contains_key(&mapping.card_id) {
            return Err(StoreError::UniqueViolation("card_id".to_string()));
        }
        by_card.insert(mapping.card_id, mapping.clone());
        Ok(mapping)
    }

    async fn find_by_card_id(&self, card_id: Uuid) -> Result<Option<BankAccountMapping>, StoreError> {
        let by_card = self.by_card.lock().expect("mapping store lock poisoned");
        Ok(by_card.get(&card_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryAuthorizationStore {
    by_id: Mutex<HashMap<Uuid, Authorization>>,
    by_idempotency_key: Mutex<HashMap<String, Uuid>>,
}

impl InMemoryAuthorizationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthorizationStore for InMemoryAuthorizationStore {
    async fn save(&self, authorization: Authorization) -> Result<Authorization, StoreError> {
        let mut by_idempotency_key = self
            .by_idempotency_key
            .lock()
            .expect("authorization store lock poisoned");
        if by_idempotency_key.contains_key(&authorization.idempotency_key) {
            return Err(StoreError::UniqueViolation("idempotency_key".to_string()));
        }
        by_idempotency_key.insert(authorization.idempotency_key.clone(), authorization.authorization_id);
        drop(by_idempotency_key);

        let mut by_id = self.by_id.lock().expect("authorization store lock poisoned");
        by_id.insert(authorization.authorization_id, authorization.clone());
        Ok(authorization)
    }

    async fn update(&self, authorization: Authorization) -> Result<Authorization, StoreError> {
        let mut by_id = self.by_id.lock().expect("authorization store lock poisoned");
        if !by_id.contains_key(&authorization.authorization_id) {
            return Err(StoreError::NotFound);
        }
        by_id.insert(authorization.authorization_id, authorization.clone());
        Ok(authorization)
    }

    async fn find_by_id(&self, authorization_id: Uuid) -> Result<Option<Authorization>, StoreError> {
        let by_id = self.by_id.lock().expect("authorization store lock poisoned");
        Ok(by_id.get(&authorization_id).cloned())
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Authorization>, StoreError> {
        let by_idempotency_key = self
            .by_idempotency_key
            .lock()
            .expect("authorization store lock poisoned");
        let Some(id) = by_idempotency_key.get(key).copied() else {
            return Ok(None);
        };
        drop(by_idempotency_key);
        self.find_by_id(id).await
    }

    async fn sum_approved_since(&self, card_id: Uuid, since: DateTime<Utc>) -> Result<Decimal, StoreError> {
        let by_id = self.by_id.lock().expect("authorization store lock poisoned");
        let total = by_id
            .values()
            .filter(|auth| {
                auth.card_id == card_id
                    && auth.status == cardswitch_core::AuthorizationStatus::Approved
                    && auth.created_at >= since
            })
            .fold(Decimal::ZERO, |acc, auth| acc + auth.amount.amount());
        Ok(total)
    }

    async fn count_since(&self, card_id: Uuid, since: DateTime<Utc>) -> Result<u64, StoreError> {
        let by_id = self.by_id.lock().expect("authorization store lock poisoned");
        let count = by_id
            .values()
            .filter(|auth| auth.card_id == card_id && auth.created_at >= since)
            .count();
        Ok(count as u64)
    }
}

impl InMemoryAuthorizationStore {
    /// Rolls back a `save` that a sibling write in the same pipeline step
    /// failed to complete. Not part of `AuthorizationStore`: only
    /// `InMemoryPipelineStore` calls this, and only as compensation.
    pub(crate) fn remove(&self, authorization_id: Uuid, idempotency_key: &str) {
        self.by_id
            .lock()
            .expect("authorization store lock poisoned")
            .remove(&authorization_id);
        self.by_idempotency_key
            .lock()
            .expect("authorization store lock poisoned")
            .remove(idempotency_key);
    }
}

#[derive(Default)]
pub struct InMemoryLedgerStore {
    entries: Mutex<Vec<LedgerEntry>>,
    keys: Mutex<std::collections::HashSet<String>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError> {
        let mut keys = self.keys.lock().expect("ledger store lock poisoned");
        if !keys.insert(entry.idempotency_key.clone()) {
            return Err(StoreError::UniqueViolation("idempotency_key".to_string()));
        }
        drop(keys);

        let mut entries = self.entries.lock().expect("ledger store lock poisoned");
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn exists_for_key(&self, idempotency_key: &str) -> Result<bool, StoreError> {
        let keys = self.keys.lock().expect("ledger store lock poisoned");
        Ok(keys.contains(idempotency_key))
    }

    async fn list(&self, filter: LedgerEntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        let entries = self.entries.lock().expect("ledger store lock poisoned");
        let mut filtered: Vec<LedgerEntry> = entries
            .iter()
            .filter(|e| {
                filter.authorization_id.map_or(true, |id| e.authorization_id == Some(id))
                    && filter.card_id.map_or(true, |id| e.card_id == Some(id))
                    && filter
                        .transaction_type
                        .map_or(true, |t| e.transaction_type == t)
            })
            .cloned()
            .collect();

        let offset = filter.offset.unwrap_or(0) as usize;
        filtered = filtered.into_iter().skip(offset).collect();
        if let Some(limit) = filter.limit {
            filtered.truncate(limit as usize);
        }
        Ok(filtered)
    }
}

impl InMemoryLedgerStore {
    /// Rolls back an `append` whose sibling authorization write failed.
    /// Not part of `LedgerStore`: only `InMemoryPipelineStore` calls this.
    pub(crate) fn remove_by_key(&self, idempotency_key: &str) {
        self.keys
            .lock()
            .expect("ledger store lock poisoned")
            .remove(idempotency_key);
        self.entries
            .lock()
            .expect("ledger store lock poisoned")
            .retain(|e| e.idempotency_key != idempotency_key);
    }
}

/// In-memory unit of work spanning an `InMemoryAuthorizationStore` write and
/// its `InMemoryLedgerStore` counterpart. A private lock serializes the two
/// writes against concurrent pipeline steps, and a failed second write rolls
/// back the first, so the two stores never observe a half-done step.
pub struct InMemoryPipelineStore {
    authorizations: Arc<InMemoryAuthorizationStore>,
    ledger: Arc<InMemoryLedgerStore>,
    lock: Mutex<()>,
}

impl InMemoryPipelineStore {
    pub fn new(authorizations: Arc<InMemoryAuthorizationStore>, ledger: Arc<InMemoryLedgerStore>) -> Self {
        Self {
            authorizations,
            ledger,
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl PipelineUnitOfWork for InMemoryPipelineStore {
    async fn record_authorization(
        &self,
        authorization: Authorization,
        ledger_entry: Option<LedgerEntry>,
    ) -> Result<Authorization, StoreError> {
        let _guard = self.lock.lock().expect("pipeline unit of work lock poisoned");

        let saved = self.authorizations.save(authorization).await?;

        if let Some(entry) = ledger_entry {
            if let Err(err) = self.ledger.append(entry).await {
                self.authorizations.remove(saved.authorization_id, &saved.idempotency_key);
                return Err(err);
            }
        }

        Ok(saved)
    }

    async fn record_settlement(
        &self,
        authorization: Authorization,
        ledger_entry: LedgerEntry,
    ) -> Result<Authorization, StoreError> {
        let _guard = self.lock.lock().expect("pipeline unit of work lock poisoned");

        let idempotency_key = ledger_entry.idempotency_key.clone();
        self.ledger.append(ledger_entry).await?;

        match self.authorizations.update(authorization).await {
            Ok(updated) => Ok(updated),
            Err(err) => {
                self.ledger.remove_by_key(&idempotency_key);
                Err(err)
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryHoldStore {
    holds: Mutex<HashMap<Uuid, HoldRecord>>,
}

impl InMemoryHoldStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HoldStore for InMemoryHoldStore {
    async fn save(&self, hold: HoldRecord) -> Result<HoldRecord, StoreError> {
        let mut holds = self.holds.lock().expect("hold store lock poisoned");
        if holds.contains_key(&hold.authorization_id) {
            return Err(StoreError::UniqueViolation("authorization_id".to_string()));
        }
        holds.insert(hold.authorization_id, hold.clone());
        Ok(hold)
    }

    async fn update(&self, hold: HoldRecord) -> Result<HoldRecord, StoreError> {
        let mut holds = self.holds.lock().expect("hold store lock poisoned");
        if !holds.contains_key(&hold.authorization_id) {
            return Err(StoreError::NotFound);
        }
        holds.insert(hold.authorization_id, hold.clone());
        Ok(hold)
    }

    async fn find_by_authorization_id(&self, authorization_id: Uuid) -> Result<Option<HoldRecord>, StoreError> {
        let holds = self.holds.lock().expect("hold store lock poisoned");
        Ok(holds.get(&authorization_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryProcessorMappingStore {
    by_processor_transaction_id: Mutex<HashMap<String, ProcessorTransactionMapping>>,
}

impl InMemoryProcessorMappingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessorMappingStore for InMemoryProcessorMappingStore {
    async fn save(
        &self,
        mapping: ProcessorTransactionMapping,
    ) -> Result<ProcessorTransactionMapping, StoreError> {
        let mut by_id = self
            .by_processor_transaction_id
            .lock()
            .expect("processor mapping store lock poisoned");
        if by_id.contains_key(&mapping.processor_transaction_id) {
            return Err(StoreError::UniqueViolation("processor_transaction_id".to_string()));
        }
        by_id.insert(mapping.processor_transaction_id.clone(), mapping.clone());
        Ok(mapping)
    }

    async fn find_by_processor_transaction_id(
        &self,
        processor_transaction_id: &str,
    ) -> Result<Option<ProcessorTransactionMapping>, StoreError> {
        let by_id = self
            .by_processor_transaction_id
            .lock()
            .expect("processor mapping store lock poisoned");
        Ok(by_id.get(processor_transaction_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardswitch_core::{Currency, Money};

    #[tokio::test]
    async fn ledger_append_rejects_duplicate_idempotency_key() {
        let store = InMemoryLedgerStore::new();
        let entry = LedgerEntry::new(
            "acc-1",
            cardswitch_core::EntryType::Debit,
            Money::from_str_amount("10.00", Currency::Usd).unwrap(),
            cardswitch_core::LedgerTransactionType::AuthHold,
            None,
            None,
            "dup-key",
        );
        store.append(entry.clone()).await.unwrap();
        let second = LedgerEntry::new(
            "acc-1",
            cardswitch_core::EntryType::Debit,
            Money::from_str_amount("10.00", Currency::Usd).unwrap(),
            cardswitch_core::LedgerTransactionType::AuthHold,
            None,
            None,
            "dup-key",
        );
        assert!(store.append(second).await.is_err());
    }

    #[tokio::test]
    async fn pipeline_store_rolls_back_authorization_when_ledger_append_fails() {
        let authorizations = Arc::new(InMemoryAuthorizationStore::new());
        let ledger = Arc::new(InMemoryLedgerStore::new());
        let pipeline = InMemoryPipelineStore::new(authorizations.clone(), ledger.clone());

        // A ledger entry already occupies "dup-key", so the unit of work's
        // ledger append step will fail after its authorization save step
        // already succeeded.
        ledger
            .append(LedgerEntry::new(
                "acc-1",
                cardswitch_core::EntryType::Debit,
                Money::from_str_amount("10.00", Currency::Usd).unwrap(),
                cardswitch_core::LedgerTransactionType::AuthHold,
                None,
                None,
                "dup-key",
            ))
            .await
            .unwrap();

        let authorization = Authorization::approved(
            Uuid::new_v4(),
            "acc-1",
            Money::from_str_amount("10.00", Currency::Usd).unwrap(),
            cardswitch_core::MerchantMetadata::default(),
            "dup-key",
        );
        let authorization_id = authorization.authorization_id;
        let conflicting_entry = LedgerEntry::new(
            "acc-1",
            cardswitch_core::EntryType::Debit,
            Money::from_str_amount("10.00", Currency::Usd).unwrap(),
            cardswitch_core::LedgerTransactionType::AuthHold,
            Some(authorization_id),
            None,
            "dup-key",
        );

        let result = pipeline
            .record_authorization(authorization, Some(conflicting_entry))
            .await;
        assert!(result.is_err());

        // No orphaned APPROVED row left behind for a retried request to pick
        // up as an authoritative decision despite the ledger write failing.
        assert!(authorizations.find_by_id(authorization_id).await.unwrap().is_none());
        assert!(authorizations.find_by_idempotency_key("dup-key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn authorization_store_enforces_unique_idempotency_key() {
        let store = InMemoryAuthorizationStore::new();
        let auth = Authorization::approved(
            Uuid::new_v4(),
            "acc-1",
            Money::from_str_amount("10.00", Currency::Usd).unwrap(),
            cardswitch_core::MerchantMetadata::default(),
            "k1",
        );
        store.save(auth.clone()).await.unwrap();

        let dup = Authorization::approved(
            Uuid::new_v4(),
            "acc-1",
            Money::from_str_amount("10.00", Currency::Usd).unwrap(),
            cardswitch_core::MerchantMetadata::default(),
            "k1",
        );
        assert!(store.save(dup).await.is_err());
    }
}
