//! Store and core-banking adapter implementations for the card orchestration
//! core: a process-local in-memory backend for tests and local development,
//! a Postgres-backed backend for production, and the shadow-journal
//! reference `BankAccountAdapter`.

#![deny(unsafe_code)]

pub mod memory;
pub mod postgres;
pub mod shadow_journal;

pub use memory::{
    InMemoryAuthorizationStore, InMemoryCardStore, InMemoryHoldStore, InMemoryLedgerStore,
    InMemoryMappingStore, InMemoryPipelineStore, InMemoryProcessorMappingStore,
};
pub use postgres::PostgresStore;
pub use shadow_journal::ShadowJournalAdapter;
