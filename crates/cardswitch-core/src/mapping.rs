use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable link from a card to exactly one CBS account. Many cards may
/// map to the same account; a card maps to exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountMapping {
    pub id: Uuid,
    pub card_id: Uuid,
    pub bank_client_ref: String,
    pub bank_account_ref: String,
    pub bank_core_type: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl BankAccountMapping {
    pub fn new(
        card_id: Uuid,
        bank_client_ref: impl Into<String>,
        bank_account_ref: impl Into<String>,
        bank_core_type: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            card_id,
            bank_client_ref: bank_client_ref.into(),
            bank_account_ref: bank_account_ref.into(),
            bank_core_type: bank_core_type.into(),
            created_at: Utc::now(),
            created_by: created_by.into(),
        }
    }
}
