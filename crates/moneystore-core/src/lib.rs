//! Core types and traits for moneystore storage backends.
//!
//! This crate provides the account and balance models, the validation rules
//! every store applies before a mutation, and the `Storage` trait that the
//! backend crates implement.

pub mod columns;
pub mod json;
pub mod models;
pub mod storage;
pub mod validation;

#[cfg(feature = "testing")]
pub mod conformance;

// Re-export key types at crate root for convenience
pub use models::{Account, Balance, CurrencyCode, DateOutOfRange, FieldError, Money, TimeRange};
pub use models::stored::{
    deletion_timestamp, AccountId, AccountState, BalanceId, StoredAccount, StoredBalance, UNASSIGNED_ID,
};
pub use storage::{Storage, StorageError};
