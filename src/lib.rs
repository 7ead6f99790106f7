//! Accounts with dated balances, stored in memory, SQLite or PostgreSQL.
//!
//! The storage contract and the domain types live in `moneystore-core`; this
//! crate wires the backends to a config file and copies data between them.

pub mod config;
pub mod error;
pub mod migrate;
pub mod store;
pub mod telemetry;

pub use error::Error;
pub use migrate::{migrate, AccountMigration, MigrationReport};
pub use moneystore_core::{
    json, Account, AccountId, Balance, BalanceId, CurrencyCode, Money, Storage, StorageError, StoredAccount,
    StoredBalance,
};
pub use moneystore_memory::InMemoryStorage;
pub use moneystore_postgres::PostgresStorage;
pub use moneystore_sqlite::SqliteStorage;
pub use store::open_store;
