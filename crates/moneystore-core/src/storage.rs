use time::Date;

use crate::models::{
    stored::{AccountId, BalanceId, StoredAccount, StoredBalance},
    Account, Balance, DateOutOfRange, FieldError,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
    #[error("storage is closed")]
    Closed,
    #[error("account not found: {0}")]
    AccountNotFound(AccountId),
    #[error("account {0} in store is different to account in runtime")]
    AccountDifferentInStoreAndRuntime(AccountId),
    #[error("account is deleted: {0}")]
    AccountDeleted(AccountId),
    #[error("invalid field: {0}")]
    InvalidField(#[from] FieldError),
    #[error("{0}")]
    DateOutOfAccountTimeRange(#[from] DateOutOfRange),
    #[error("invalid balance (id: {balance_id}) for account (id: {account_id})")]
    InvalidAccountBalance {
        account_id: AccountId,
        balance_id: BalanceId,
    },
    #[error("update of account {account_id} would leave balance {balance_id} ({date}) outside its time range")]
    UpdateInvalidatesBalance {
        account_id: AccountId,
        balance_id: BalanceId,
        date: Date,
    },
    #[error("balance {balance_id} not found for account {account_id}")]
    BalanceNotFound {
        account_id: AccountId,
        balance_id: BalanceId,
    },
    #[error("no balances exist")]
    NoBalances,
}

/// A store for accounts and their balances.
///
/// Every mutating operation validates the in-memory account against the
/// persisted row first and performs the check and the write atomically.
pub trait Storage: Send + Sync {
    fn available(&self) -> bool;
    fn close(&self) -> Result<(), StorageError>;

    fn insert_account(&self, account: &Account) -> Result<StoredAccount, StorageError>;
    /// Fetches an account by id, including soft deleted ones.
    fn select_account(&self, id: AccountId) -> Result<StoredAccount, StorageError>;
    /// All accounts that are not deleted, by ascending id.
    fn select_accounts(&self) -> Result<Vec<StoredAccount>, StorageError>;
    /// Accounts that are neither deleted nor closed, by ascending id.
    fn select_open_accounts(&self) -> Result<Vec<StoredAccount>, StorageError>;
    fn validate_account(&self, account: &StoredAccount) -> Result<(), StorageError>;
    fn update_account(&self, original: &StoredAccount, changes: &Account) -> Result<StoredAccount, StorageError>;
    fn delete_account(&self, account: &mut StoredAccount) -> Result<(), StorageError>;

    fn insert_balance(&self, account: &StoredAccount, balance: &Balance) -> Result<StoredBalance, StorageError>;
    /// Balances of an account ordered by date, then id.
    fn select_account_balances(&self, account: &StoredAccount) -> Result<Vec<StoredBalance>, StorageError>;
    fn select_balance(&self, account: &StoredAccount, id: BalanceId) -> Result<StoredBalance, StorageError>;
    fn validate_balance(&self, account: &StoredAccount, balance: &StoredBalance) -> Result<(), StorageError>;
    fn update_balance(
        &self,
        account: &StoredAccount,
        original: &StoredBalance,
        changes: &Balance,
    ) -> Result<StoredBalance, StorageError>;
    /// Latest balance dated on or before `date`, ties going to the highest id.
    fn balance_at_date(&self, account: &StoredAccount, date: Date) -> Result<StoredBalance, StorageError>;
}
