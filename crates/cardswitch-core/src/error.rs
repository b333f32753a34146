use thiserror::Error;

/// Errors raised by the authorization and settlement pipelines.
///
/// `InsufficientFunds` and `DeclinedByPolicy` are converted to a DECLINED
/// authorization rather than surfaced to the caller; the rest propagate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("insufficient funds: account {account_ref} required {required} available {available}")]
    InsufficientFunds {
        account_ref: String,
        required: String,
        available: String,
    },

    #[error("bank core error during {op} on {account_ref}: {cause}")]
    BankCoreError {
        account_ref: String,
        op: String,
        cause: String,
    },

    #[error("declined by policy: {0}")]
    DeclinedByPolicy(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("unknown transaction: {0}")]
    UnknownTransaction(String),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_state(what: impl Into<String>) -> Self {
        Self::InvalidState(what.into())
    }

    pub fn invalid_argument(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }
}

/// Errors raised by a `BankAccountAdapter` implementation.
#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    #[error("insufficient funds: account {account_ref} required {required} available {available}")]
    InsufficientFunds {
        account_ref: String,
        required: String,
        available: String,
    },

    #[error("bank core error during {op} on {account_ref}: {cause}")]
    BankCoreError {
        account_ref: String,
        op: String,
        cause: String,
    },
}

impl From<AdapterError> for CoreError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::InsufficientFunds {
                account_ref,
                required,
                available,
            } => CoreError::InsufficientFunds {
                account_ref,
                required,
                available,
            },
            AdapterError::BankCoreError {
                account_ref,
                op,
                cause,
            } => CoreError::BankCoreError {
                account_ref,
                op,
                cause,
            },
        }
    }
}

/// Errors raised by a persistence store implementation, independent of the
/// relational backend (in-memory or Postgres).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("unique constraint violated on {0}")]
    UniqueViolation(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => CoreError::NotFound("record not found".to_string()),
            StoreError::UniqueViolation(field) => {
                CoreError::Conflict(format!("duplicate value for {field}"))
            }
            StoreError::Backend(cause) => CoreError::Store(cause),
        }
    }
}
