//! Postgres-backed store implementations. Schema is created idempotently on
//! `ensure_schema` via `CREATE TABLE IF NOT EXISTS` / `CREATE INDEX IF NOT
//! EXISTS`, matching the unique indices the core requires for correctness.

use async_trait::async_trait;
use cardswitch_core::{
    Authorization, AuthorizationStatus, AuthorizationStore, BankAccountMapping, Card, CardState,
    CardStore, Currency, EntryType, HoldRecord, HoldStatus, HoldStore, LedgerEntry,
    LedgerEntryFilter, LedgerStore, LedgerTransactionType, MappingStore, MerchantMetadata, Money,
    PipelineUnitOfWork, ProcessorMappingStore, ProcessorTransactionMapping, StoreError,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                card_id UUID PRIMARY KEY,
                cardholder_name TEXT NOT NULL,
                last4 TEXT NOT NULL,
                expiration_date DATE NOT NULL,
                state TEXT NOT NULL,
                owner_id TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bank_account_mappings (
                id UUID PRIMARY KEY,
                card_id UUID NOT NULL,
                bank_client_ref TEXT NOT NULL,
                bank_account_ref TEXT NOT NULL,
                bank_core_type TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                created_by TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_bank_account_mappings_card_id ON bank_account_mappings (card_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS authorizations (
                authorization_id UUID PRIMARY KEY,
                card_id UUID NOT NULL,
                account_ref TEXT NOT NULL,
                amount NUMERIC NOT NULL,
                currency TEXT NOT NULL,
                cleared_amount NUMERIC,
                status TEXT NOT NULL,
                merchant_name TEXT NOT NULL,
                merchant_mcc TEXT,
                merchant_city TEXT,
                merchant_country TEXT,
                decline_reason TEXT,
                idempotency_key TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_authorizations_idempotency_key ON authorizations (idempotency_key)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_authorizations_card_id ON authorizations (card_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ledger_entries (
                transaction_id UUID PRIMARY KEY,
                account_ref TEXT NOT NULL,
                entry_type TEXT NOT NULL,
                amount NUMERIC NOT NULL,
                currency TEXT NOT NULL,
                transaction_type TEXT NOT NULL,
                authorization_id UUID,
                card_id UUID,
                idempotency_key TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_ledger_entries_idempotency_key ON ledger_entries (idempotency_key)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_holds (
                authorization_id UUID PRIMARY KEY,
                account_ref TEXT NOT NULL,
                journal_entry_id TEXT NOT NULL,
                amount NUMERIC NOT NULL,
                currency TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processor_transaction_mapping (
                id UUID PRIMARY KEY,
                processor_name TEXT NOT NULL,
                processor_transaction_id TEXT NOT NULL,
                authorization_id UUID NOT NULL,
                card_token TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_processor_transaction_mapping_ptid ON processor_transaction_mapping (processor_transaction_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }

    fn map_unique_violation(err: sqlx::Error, field: &str) -> StoreError {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(field.to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

fn state_to_str(state: CardState) -> &'static str {
    match state {
        CardState::Active => "ACTIVE",
        CardState::Frozen => "FROZEN",
        CardState::Closed => "CLOSED",
    }
}

fn parse_state(s: &str) -> Result<CardState, StoreError> {
    match s {
        "ACTIVE" => Ok(CardState::Active),
        "FROZEN" => Ok(CardState::Frozen),
        "CLOSED" => Ok(CardState::Closed),
        other => Err(StoreError::Backend(format!("unknown card state '{other}'"))),
    }
}

fn status_to_str(status: AuthorizationStatus) -> &'static str {
    match status {
        AuthorizationStatus::Approved => "APPROVED",
        AuthorizationStatus::Declined => "DECLINED",
        AuthorizationStatus::Cleared => "CLEARED",
        AuthorizationStatus::Released => "RELEASED",
        AuthorizationStatus::Reversed => "REVERSED",
    }
}

fn parse_status(s: &str) -> Result<AuthorizationStatus, StoreError> {
    match s {
        "APPROVED" => Ok(AuthorizationStatus::Approved),
        "DECLINED" => Ok(AuthorizationStatus::Declined),
        "CLEARED" => Ok(AuthorizationStatus::Cleared),
        "RELEASED" => Ok(AuthorizationStatus::Released),
        "REVERSED" => Ok(AuthorizationStatus::Reversed),
        other => Err(StoreError::Backend(format!("unknown authorization status '{other}'"))),
    }
}

fn currency_of(s: &str) -> Result<Currency, StoreError> {
    Currency::from_str(s).map_err(|e| StoreError::Backend(e.to_string()))
}

#[async_trait]
impl CardStore for PostgresStore {
    async fn save(&self, card: Card) -> Result<Card, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO cards (card_id, cardholder_name, last4, expiration_date, state, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (card_id) DO UPDATE SET
                cardholder_name = EXCLUDED.cardholder_name,
                last4 = EXCLUDED.last4,
                expiration_date = EXCLUDED.expiration_date,
                state = EXCLUDED.state,
                owner_id = EXCLUDED.owner_id
            "#,
        )
        .bind(card.card_id)
        .bind(&card.cardholder_name)
        .bind(&card.last4)
        .bind(card.expiration_date)
        .bind(state_to_str(card.state))
        .bind(&card.owner_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(card)
    }

    async fn find_by_id(&self, card_id: Uuid) -> Result<Option<Card>, StoreError> {
        let row = sqlx::query(
            "SELECT card_id, cardholder_name, last4, expiration_date, state, owner_id FROM cards WHERE card_id = $1",
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        let state: String = row.try_get("state").map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Some(Card {
            card_id: row.try_get("card_id").map_err(|e| StoreError::Backend(e.to_string()))?,
            cardholder_name: row.try_get("cardholder_name").map_err(|e| StoreError::Backend(e.to_string()))?,
            last4: row.try_get("last4").map_err(|e| StoreError::Backend(e.to_string()))?,
            expiration_date: row.try_get::<NaiveDate, _>("expiration_date").map_err(|e| StoreError::Backend(e.to_string()))?,
            state: parse_state(&state)?,
            owner_id: row.try_get("owner_id").map_err(|e| StoreError::Backend(e.to_string()))?,
        }))
    }
}

#[async_trait]
impl MappingStore for PostgresStore {
    async fn save(&self, mapping: BankAccountMapping) -> Result<BankAccountMapping, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bank_account_mappings (id, card_id, bank_client_ref, bank_account_ref, bank_core_type, created_at, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(mapping.id)
        .bind(mapping.card_id)
        .bind(&mapping.bank_client_ref)
        .bind(&mapping.bank_account_ref)
        .bind(&mapping.bank_core_type)
        .bind(mapping.created_at)
        .bind(&mapping.created_by)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_unique_violation(e, "card_id"))?;
        Ok(mapping)
    }

    async fn find_by_card_id(&self, card_id: Uuid) -> Result<Option<BankAccountMapping>, StoreError> {
        let row = sqlx::query(
            "SELECT id, card_id, bank_client_ref, bank_account_ref, bank_core_type, created_at, created_by FROM bank_account_mappings WHERE card_id = $1",
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(BankAccountMapping {
            id: row.try_get("id").map_err(|e| StoreError::Backend(e.to_string()))?,
            card_id: row.try_get("card_id").map_err(|e| StoreError::Backend(e.to_string()))?,
            bank_client_ref: row.try_get("bank_client_ref").map_err(|e| StoreError::Backend(e.to_string()))?,
            bank_account_ref: row.try_get("bank_account_ref").map_err(|e| StoreError::Backend(e.to_string()))?,
            bank_core_type: row.try_get("bank_core_type").map_err(|e| StoreError::Backend(e.to_string()))?,
            created_at: row.try_get("created_at").map_err(|e| StoreError::Backend(e.to_string()))?,
            created_by: row.try_get("created_by").map_err(|e| StoreError::Backend(e.to_string()))?,
        }))
    }
}

fn authorization_from_row(row: &sqlx::postgres::PgRow) -> Result<Authorization, StoreError> {
    let currency = currency_of(&row.try_get::<String, _>("currency").map_err(|e| StoreError::Backend(e.to_string()))?)?;
    let amount = Money::new(row.try_get::<Decimal, _>("amount").map_err(|e| StoreError::Backend(e.to_string()))?, currency);
    let cleared_amount: Option<Decimal> = row.try_get("cleared_amount").map_err(|e| StoreError::Backend(e.to_string()))?;
    let status: String = row.try_get("status").map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(Authorization {
        authorization_id: row.try_get("authorization_id").map_err(|e| StoreError::Backend(e.to_string()))?,
        card_id: row.try_get("card_id").map_err(|e| StoreError::Backend(e.to_string()))?,
        account_ref: row.try_get("account_ref").map_err(|e| StoreError::Backend(e.to_string()))?,
        amount,
        cleared_amount: cleared_amount.map(|d| Money::new(d, currency)),
        status: parse_status(&status)?,
        merchant: MerchantMetadata {
            name: row.try_get("merchant_name").map_err(|e| StoreError::Backend(e.to_string()))?,
            mcc: row.try_get("merchant_mcc").map_err(|e| StoreError::Backend(e.to_string()))?,
            city: row.try_get("merchant_city").map_err(|e| StoreError::Backend(e.to_string()))?,
            country: row.try_get("merchant_country").map_err(|e| StoreError::Backend(e.to_string()))?,
        },
        decline_reason: row.try_get("decline_reason").map_err(|e| StoreError::Backend(e.to_string()))?,
        idempotency_key: row.try_get("idempotency_key").map_err(|e| StoreError::Backend(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        updated_at: row.try_get("updated_at").map_err(|e| StoreError::Backend(e.to_string()))?,
    })
}

#[async_trait]
impl AuthorizationStore for PostgresStore {
    async fn save(&self, authorization: Authorization) -> Result<Authorization, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO authorizations
                (authorization_id, card_id, account_ref, amount, currency, cleared_amount, status,
                 merchant_name, merchant_mcc, merchant_city, merchant_country, decline_reason,
                 idempotency_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(authorization.authorization_id)
        .bind(authorization.card_id)
        .bind(&authorization.account_ref)
        .bind(authorization.amount.amount())
        .bind(authorization.amount.currency().code())
        .bind(authorization.cleared_amount.map(|m| m.amount()))
        .bind(status_to_str(authorization.status))
        .bind(&authorization.merchant.name)
        .bind(&authorization.merchant.mcc)
        .bind(&authorization.merchant.city)
        .bind(&authorization.merchant.country)
        .bind(&authorization.decline_reason)
        .bind(&authorization.idempotency_key)
        .bind(authorization.created_at)
        .bind(authorization.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_unique_violation(e, "idempotency_key"))?;
        Ok(authorization)
    }

    async fn update(&self, authorization: Authorization) -> Result<Authorization, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE authorizations SET
                cleared_amount = $1, status = $2, decline_reason = $3, updated_at = $4
            WHERE authorization_id = $5
            "#,
        )
        .bind(authorization.cleared_amount.map(|m| m.amount()))
        .bind(status_to_str(authorization.status))
        .bind(&authorization.decline_reason)
        .bind(authorization.updated_at)
        .bind(authorization.authorization_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(authorization)
    }

    async fn find_by_id(&self, authorization_id: Uuid) -> Result<Option<Authorization>, StoreError> {
        let row = sqlx::query("SELECT * FROM authorizations WHERE authorization_id = $1")
            .bind(authorization_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.as_ref().map(authorization_from_row).transpose()
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Authorization>, StoreError> {
        let row = sqlx::query("SELECT * FROM authorizations WHERE idempotency_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.as_ref().map(authorization_from_row).transpose()
    }

    async fn sum_approved_since(&self, card_id: Uuid, since: DateTime<Utc>) -> Result<Decimal, StoreError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS total FROM authorizations WHERE card_id = $1 AND status = 'APPROVED' AND created_at >= $2",
        )
        .bind(card_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.try_get("total").map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn count_since(&self, card_id: Uuid, since: DateTime<Utc>) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total FROM authorizations WHERE card_id = $1 AND created_at >= $2",
        )
        .bind(card_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        let total: i64 = row.try_get("total").map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(total as u64)
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    async fn append(&self, entry: LedgerEntry) -> Result<LedgerEntry, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (transaction_id, account_ref, entry_type, amount, currency, transaction_type,
                 authorization_id, card_id, idempotency_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.transaction_id)
        .bind(&entry.account_ref)
        .bind(match entry.entry_type {
            EntryType::Debit => "DEBIT",
            EntryType::Credit => "CREDIT",
        })
        .bind(entry.amount.amount())
        .bind(entry.amount.currency().code())
        .bind(transaction_type_to_str(entry.transaction_type))
        .bind(entry.authorization_id)
        .bind(entry.card_id)
        .bind(&entry.idempotency_key)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_unique_violation(e, "idempotency_key"))?;
        Ok(entry)
    }

    async fn exists_for_key(&self, idempotency_key: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM ledger_entries WHERE idempotency_key = $1")
            .bind(idempotency_key)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let total: i64 = row.try_get("total").map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(total > 0)
    }

    async fn list(&self, filter: LedgerEntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut sql = "SELECT * FROM ledger_entries WHERE 1=1".to_string();
        let mut next_param = 1;
        if filter.authorization_id.is_some() {
            sql.push_str(&format!(" AND authorization_id = ${next_param}"));
            next_param += 1;
        }
        if filter.card_id.is_some() {
            sql.push_str(&format!(" AND card_id = ${next_param}"));
            next_param += 1;
        }
        if filter.transaction_type.is_some() {
            sql.push_str(&format!(" AND transaction_type = ${next_param}"));
            next_param += 1;
        }
        sql.push_str(" ORDER BY created_at ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = filter.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        let mut query = sqlx::query(&sql);
        if let Some(authorization_id) = filter.authorization_id {
            query = query.bind(authorization_id);
        }
        if let Some(card_id) = filter.card_id {
            query = query.bind(card_id);
        }
        if let Some(transaction_type) = filter.transaction_type {
            query = query.bind(transaction_type_to_str(transaction_type));
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.iter().map(ledger_entry_from_row).collect()
    }
}

#[async_trait]
impl PipelineUnitOfWork for PostgresStore {
    async fn record_authorization(
        &self,
        authorization: Authorization,
        ledger_entry: Option<LedgerEntry>,
    ) -> Result<Authorization, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO authorizations
                (authorization_id, card_id, account_ref, amount, currency, cleared_amount, status,
                 merchant_name, merchant_mcc, merchant_city, merchant_country, decline_reason,
                 idempotency_key, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(authorization.authorization_id)
        .bind(authorization.card_id)
        .bind(&authorization.account_ref)
        .bind(authorization.amount.amount())
        .bind(authorization.amount.currency().code())
        .bind(authorization.cleared_amount.map(|m| m.amount()))
        .bind(status_to_str(authorization.status))
        .bind(&authorization.merchant.name)
        .bind(&authorization.merchant.mcc)
        .bind(&authorization.merchant.city)
        .bind(&authorization.merchant.country)
        .bind(&authorization.decline_reason)
        .bind(&authorization.idempotency_key)
        .bind(authorization.created_at)
        .bind(authorization.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::map_unique_violation(e, "idempotency_key"))?;

        if let Some(entry) = ledger_entry {
            insert_ledger_entry_tx(&mut tx, &entry).await?;
        }

        tx.commit().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(authorization)
    }

    async fn record_settlement(
        &self,
        authorization: Authorization,
        ledger_entry: LedgerEntry,
    ) -> Result<Authorization, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| StoreError::Backend(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE authorizations SET
                cleared_amount = $1, status = $2, decline_reason = $3, updated_at = $4
            WHERE authorization_id = $5
            "#,
        )
        .bind(authorization.cleared_amount.map(|m| m.amount()))
        .bind(status_to_str(authorization.status))
        .bind(&authorization.decline_reason)
        .bind(authorization.updated_at)
        .bind(authorization.authorization_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        insert_ledger_entry_tx(&mut tx, &ledger_entry).await?;

        tx.commit().await.map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(authorization)
    }
}

async fn insert_ledger_entry_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    entry: &LedgerEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entries
            (transaction_id, account_ref, entry_type, amount, currency, transaction_type,
             authorization_id, card_id, idempotency_key, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(entry.transaction_id)
    .bind(&entry.account_ref)
    .bind(match entry.entry_type {
        EntryType::Debit => "DEBIT",
        EntryType::Credit => "CREDIT",
    })
    .bind(entry.amount.amount())
    .bind(entry.amount.currency().code())
    .bind(transaction_type_to_str(entry.transaction_type))
    .bind(entry.authorization_id)
    .bind(entry.card_id)
    .bind(&entry.idempotency_key)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| PostgresStore::map_unique_violation(e, "idempotency_key"))?;
    Ok(())
}

fn transaction_type_to_str(t: LedgerTransactionType) -> &'static str {
    match t {
        LedgerTransactionType::AuthHold => "AUTH_HOLD",
        LedgerTransactionType::AuthRelease => "AUTH_RELEASE",
        LedgerTransactionType::ClearingCommit => "CLEARING_COMMIT",
        LedgerTransactionType::Reversal => "REVERSAL",
        LedgerTransactionType::Deposit => "DEPOSIT",
        LedgerTransactionType::Withdrawal => "WITHDRAWAL",
    }
}

fn parse_transaction_type(s: &str) -> Result<LedgerTransactionType, StoreError> {
    match s {
        "AUTH_HOLD" => Ok(LedgerTransactionType::AuthHold),
        "AUTH_RELEASE" => Ok(LedgerTransactionType::AuthRelease),
        "CLEARING_COMMIT" => Ok(LedgerTransactionType::ClearingCommit),
        "REVERSAL" => Ok(LedgerTransactionType::Reversal),
        "DEPOSIT" => Ok(LedgerTransactionType::Deposit),
        "WITHDRAWAL" => Ok(LedgerTransactionType::Withdrawal),
        other => Err(StoreError::Backend(format!("unknown transaction type '{other}'"))),
    }
}

fn ledger_entry_from_row(row: &sqlx::postgres::PgRow) -> Result<LedgerEntry, StoreError> {
    let currency = currency_of(&row.try_get::<String, _>("currency").map_err(|e| StoreError::Backend(e.to_string()))?)?;
    let amount = Money::new(row.try_get::<Decimal, _>("amount").map_err(|e| StoreError::Backend(e.to_string()))?, currency);
    let entry_type: String = row.try_get("entry_type").map_err(|e| StoreError::Backend(e.to_string()))?;
    let transaction_type: String = row.try_get("transaction_type").map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(LedgerEntry {
        transaction_id: row.try_get("transaction_id").map_err(|e| StoreError::Backend(e.to_string()))?,
        account_ref: row.try_get("account_ref").map_err(|e| StoreError::Backend(e.to_string()))?,
        entry_type: match entry_type.as_str() {
            "DEBIT" => EntryType::Debit,
            "CREDIT" => EntryType::Credit,
            other => return Err(StoreError::Backend(format!("unknown entry type '{other}'"))),
        },
        amount,
        transaction_type: parse_transaction_type(&transaction_type)?,
        authorization_id: row.try_get("authorization_id").map_err(|e| StoreError::Backend(e.to_string()))?,
        card_id: row.try_get("card_id").map_err(|e| StoreError::Backend(e.to_string()))?,
        idempotency_key: row.try_get("idempotency_key").map_err(|e| StoreError::Backend(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| StoreError::Backend(e.to_string()))?,
    })
}

#[async_trait]
impl HoldStore for PostgresStore {
    async fn save(&self, hold: HoldRecord) -> Result<HoldRecord, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO auth_holds (authorization_id, account_ref, journal_entry_id, amount, currency, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(hold.authorization_id)
        .bind(&hold.account_ref)
        .bind(&hold.journal_entry_id)
        .bind(hold.amount.amount())
        .bind(hold.amount.currency().code())
        .bind(hold_status_to_str(hold.status))
        .bind(hold.created_at)
        .bind(hold.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_unique_violation(e, "authorization_id"))?;
        Ok(hold)
    }

    async fn update(&self, hold: HoldRecord) -> Result<HoldRecord, StoreError> {
        let result = sqlx::query("UPDATE auth_holds SET status = $1, updated_at = $2 WHERE authorization_id = $3")
            .bind(hold_status_to_str(hold.status))
            .bind(hold.updated_at)
            .bind(hold.authorization_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(hold)
    }

    async fn find_by_authorization_id(&self, authorization_id: Uuid) -> Result<Option<HoldRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM auth_holds WHERE authorization_id = $1")
            .bind(authorization_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        let currency = currency_of(&row.try_get::<String, _>("currency").map_err(|e| StoreError::Backend(e.to_string()))?)?;
        let status: String = row.try_get("status").map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Some(HoldRecord {
            authorization_id: row.try_get("authorization_id").map_err(|e| StoreError::Backend(e.to_string()))?,
            account_ref: row.try_get("account_ref").map_err(|e| StoreError::Backend(e.to_string()))?,
            journal_entry_id: row.try_get("journal_entry_id").map_err(|e| StoreError::Backend(e.to_string()))?,
            amount: Money::new(row.try_get::<Decimal, _>("amount").map_err(|e| StoreError::Backend(e.to_string()))?, currency),
            status: parse_hold_status(&status)?,
            created_at: row.try_get("created_at").map_err(|e| StoreError::Backend(e.to_string()))?,
            updated_at: row.try_get("updated_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        }))
    }
}

fn hold_status_to_str(status: HoldStatus) -> &'static str {
    match status {
        HoldStatus::Active => "ACTIVE",
        HoldStatus::Committed => "COMMITTED",
        HoldStatus::Released => "RELEASED",
    }
}

fn parse_hold_status(s: &str) -> Result<HoldStatus, StoreError> {
    match s {
        "ACTIVE" => Ok(HoldStatus::Active),
        "COMMITTED" => Ok(HoldStatus::Committed),
        "RELEASED" => Ok(HoldStatus::Released),
        other => Err(StoreError::Backend(format!("unknown hold status '{other}'"))),
    }
}

#[async_trait]
impl ProcessorMappingStore for PostgresStore {
    async fn save(
        &self,
        mapping: ProcessorTransactionMapping,
    ) -> Result<ProcessorTransactionMapping, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO processor_transaction_mapping (id, processor_name, processor_transaction_id, authorization_id, card_token, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(mapping.id)
        .bind(&mapping.processor_name)
        .bind(&mapping.processor_transaction_id)
        .bind(mapping.authorization_id)
        .bind(&mapping.card_token)
        .bind(mapping.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_unique_violation(e, "processor_transaction_id"))?;
        Ok(mapping)
    }

    async fn find_by_processor_transaction_id(
        &self,
        processor_transaction_id: &str,
    ) -> Result<Option<ProcessorTransactionMapping>, StoreError> {
        let row = sqlx::query("SELECT * FROM processor_transaction_mapping WHERE processor_transaction_id = $1")
            .bind(processor_transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(ProcessorTransactionMapping {
            id: row.try_get("id").map_err(|e| StoreError::Backend(e.to_string()))?,
            processor_name: row.try_get("processor_name").map_err(|e| StoreError::Backend(e.to_string()))?,
            processor_transaction_id: row.try_get("processor_transaction_id").map_err(|e| StoreError::Backend(e.to_string()))?,
            authorization_id: row.try_get("authorization_id").map_err(|e| StoreError::Backend(e.to_string()))?,
            card_token: row.try_get("card_token").map_err(|e| StoreError::Backend(e.to_string()))?,
            created_at: row.try_get("created_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        }))
    }
}
