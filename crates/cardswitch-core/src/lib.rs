//! Card orchestration core.
//!
//! Sits between a card network/processor and an external core banking
//! system (CBS) that owns client accounts and balances. Runs policy checks
//! against incoming authorization events and coordinates a two-phase
//! authorization-hold / clearing protocol against the CBS. The CBS is
//! always the authoritative ledger for money; this crate never mirrors
//! balances.

#![deny(unsafe_code)]

pub mod adapter;
pub mod authorization;
pub mod authorize;
pub mod card;
pub mod config;
pub mod error;
pub mod ledger;
pub mod mapping;
pub mod money;
pub mod processor;
pub mod rules;
pub mod settlement;
pub mod store;

pub use adapter::{BankAccountAdapter, HoldRecord, HoldStatus, HoldStore};
pub use authorization::{Authorization, AuthorizationRequest, AuthorizationStatus, MerchantMetadata};
pub use authorize::{AuthorizationOutcome, AuthorizationPipeline};
pub use card::{Card, CardState};
pub use config::RulesConfig;
pub use error::{AdapterError, CoreError, StoreError};
pub use ledger::{EntryType, LedgerEntry, LedgerEntryFilter, LedgerStore, LedgerTransactionType};
pub use mapping::BankAccountMapping;
pub use money::{Currency, Money};
pub use processor::{
    InboundProcessorAdapter, ProcessorAuthorizationEvent, ProcessorClearingEvent,
    ProcessorReversalEvent,
};
pub use rules::{
    DailySpendLimitRule, MccBlockingRule, Rule, RuleResult, RulesEngine, TransactionLimitRule,
    VelocityRule,
};
pub use settlement::SettlementPipeline;
pub use store::{
    AuthorizationStore, CardStore, MappingStore, PipelineUnitOfWork, ProcessorMappingStore,
    ProcessorTransactionMapping,
};
