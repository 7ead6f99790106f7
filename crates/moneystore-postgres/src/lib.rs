//! PostgreSQL storage backend for moneystore.
//!
//! Mutations lock the account row with `SELECT ... FOR UPDATE` inside a
//! transaction before validating it, so a concurrent delete or update of the
//! same account waits instead of racing the check.

use std::{
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use postgres::{Client, NoTls, Transaction};
use time::Date;

use moneystore_core::{
    columns::{date_to_str, id_from_sql, id_to_sql, timestamp_to_secs},
    deletion_timestamp, validation, Account, AccountId, Balance, BalanceId, Storage, StorageError,
    StoredAccount, StoredBalance,
};

pub mod connection;
pub mod provision;
mod queries;
mod rows;

pub use connection::{load_connection_string, ConnectionError, ConnectionParams};
pub use provision::{create_database, drop_database, ProvisionError};

use rows::{insert_returning_id, pg_err, query_account, query_accounts, query_balance, query_balances};

const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct PostgresStorage {
    client: Mutex<Option<Client>>,
}

impl PostgresStorage {
    pub fn new(connection_string: &str) -> Result<Self, StorageError> {
        let client = Client::connect(connection_string, NoTls)
            .map_err(|e| StorageError::Other(format!("PostgreSQL connection failed: {}", e)))?;

        let storage = Self {
            client: Mutex::new(Some(client)),
        };
        storage.init_schema()?;
        tracing::debug!("PostgreSQL storage opened");
        Ok(storage)
    }

    pub fn from_params(params: &ConnectionParams) -> Result<Self, StorageError> {
        Self::new(&params.to_connection_string())
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.with_client(|client| client.batch_execute(queries::SCHEMA).map_err(pg_err))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Client>>, StorageError> {
        self.client
            .lock()
            .map_err(|_| StorageError::Other("PostgreSQL client lock poisoned".to_string()))
    }

    fn with_client<T>(&self, f: impl FnOnce(&mut Client) -> Result<T, StorageError>) -> Result<T, StorageError> {
        let mut guard = self.lock()?;
        let client = guard.as_mut().ok_or(StorageError::Closed)?;
        f(client)
    }

    /// Runs `f` in a transaction that is committed only when `f` succeeds.
    fn in_transaction<T>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        self.with_client(|client| {
            let mut tx = client.transaction().map_err(pg_err)?;
            match f(&mut tx) {
                Ok(value) => {
                    tx.commit().map_err(pg_err)?;
                    Ok(value)
                }
                Err(e) => {
                    tracing::debug!(error = %e, "PostgreSQL transaction rolled back");
                    Err(e)
                }
            }
        })
    }
}

fn lock_and_check_account(tx: &mut Transaction<'_>, account: &StoredAccount) -> Result<(), StorageError> {
    let persisted = query_account(tx, queries::SELECT_ACCOUNT_FOR_UPDATE, &[&id_to_sql(account.id)?])?;
    validation::check_account(account, persisted.as_ref())
}

impl Storage for PostgresStorage {
    fn available(&self) -> bool {
        self.with_client(|client| client.is_valid(AVAILABILITY_TIMEOUT).map_err(pg_err))
            .is_ok()
    }

    fn close(&self) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if let Some(client) = guard.take() {
            client.close().map_err(pg_err)?;
            tracing::debug!("PostgreSQL storage closed");
        }
        Ok(())
    }

    fn insert_account(&self, account: &Account) -> Result<StoredAccount, StorageError> {
        account.validate()?;
        self.with_client(|client| {
            let id = insert_returning_id(
                client,
                queries::INSERT_ACCOUNT,
                &[
                    &account.name,
                    &date_to_str(account.opened),
                    &account.closed.map(date_to_str),
                    &account.currency.as_str(),
                ],
            )?;
            tracing::debug!(account_id = id, "Account inserted");
            Ok(StoredAccount::new(id_from_sql(id)?, account.clone()))
        })
    }

    fn select_account(&self, id: AccountId) -> Result<StoredAccount, StorageError> {
        self.with_client(|client| {
            query_account(client, queries::SELECT_ACCOUNT, &[&id_to_sql(id)?])?
                .ok_or(StorageError::AccountNotFound(id))
        })
    }

    fn select_accounts(&self) -> Result<Vec<StoredAccount>, StorageError> {
        self.with_client(|client| query_accounts(client, queries::SELECT_ACCOUNTS, &[]))
    }

    fn select_open_accounts(&self) -> Result<Vec<StoredAccount>, StorageError> {
        self.with_client(|client| query_accounts(client, queries::SELECT_OPEN_ACCOUNTS, &[]))
    }

    fn validate_account(&self, account: &StoredAccount) -> Result<(), StorageError> {
        self.with_client(|client| {
            let persisted = query_account(client, queries::SELECT_ACCOUNT, &[&id_to_sql(account.id)?])?;
            validation::check_account(account, persisted.as_ref())
        })
    }

    fn update_account(&self, original: &StoredAccount, changes: &Account) -> Result<StoredAccount, StorageError> {
        self.in_transaction(|tx| {
            lock_and_check_account(tx, original)?;
            changes.validate()?;
            let balances = query_balances(tx, queries::SELECT_BALANCES, &[&id_to_sql(original.id)?])?;
            validation::check_update_keeps_balances(original.id, changes, &balances)?;

            tx.execute(
                queries::UPDATE_ACCOUNT,
                &[
                    &changes.name,
                    &date_to_str(changes.opened),
                    &changes.closed.map(date_to_str),
                    &changes.currency.as_str(),
                    &id_to_sql(original.id)?,
                ],
            )
            .map_err(pg_err)?;
            tracing::debug!(account_id = original.id, "Account updated");
            Ok(StoredAccount::new(original.id, changes.clone()))
        })
    }

    fn delete_account(&self, account: &mut StoredAccount) -> Result<(), StorageError> {
        let at = deletion_timestamp();
        self.in_transaction(|tx| {
            lock_and_check_account(tx, account)?;
            tx.execute(
                queries::DELETE_ACCOUNT,
                &[&timestamp_to_secs(at), &id_to_sql(account.id)?],
            )
            .map_err(pg_err)?;
            Ok(())
        })?;
        account.mark_deleted(at);
        tracing::debug!(account_id = account.id, "Account soft deleted");
        Ok(())
    }

    fn insert_balance(&self, account: &StoredAccount, balance: &Balance) -> Result<StoredBalance, StorageError> {
        self.in_transaction(|tx| {
            lock_and_check_account(tx, account)?;
            validation::check_balance_range(account, balance)?;

            let id = insert_returning_id(
                tx,
                queries::INSERT_BALANCE,
                &[
                    &id_to_sql(account.id)?,
                    &date_to_str(balance.date),
                    &balance.money.amount(),
                    &balance.money.currency().as_str(),
                ],
            )?;
            tracing::debug!(account_id = account.id, balance_id = id, "Balance inserted");
            Ok(StoredBalance::new(id_from_sql(id)?, *balance))
        })
    }

    fn select_account_balances(&self, account: &StoredAccount) -> Result<Vec<StoredBalance>, StorageError> {
        self.with_client(|client| query_balances(client, queries::SELECT_BALANCES, &[&id_to_sql(account.id)?]))
    }

    fn select_balance(&self, account: &StoredAccount, id: BalanceId) -> Result<StoredBalance, StorageError> {
        self.with_client(|client| {
            query_balance(
                client,
                queries::SELECT_BALANCE,
                &[&id_to_sql(account.id)?, &id_to_sql(id)?],
            )?
            .ok_or(StorageError::BalanceNotFound {
                account_id: account.id,
                balance_id: id,
            })
        })
    }

    fn validate_balance(&self, account: &StoredAccount, balance: &StoredBalance) -> Result<(), StorageError> {
        self.with_client(|client| {
            let owned = query_balances(client, queries::SELECT_BALANCES, &[&id_to_sql(account.id)?])?;
            validation::check_balance(account, balance, &owned)
        })
    }

    fn update_balance(
        &self,
        account: &StoredAccount,
        original: &StoredBalance,
        changes: &Balance,
    ) -> Result<StoredBalance, StorageError> {
        self.in_transaction(|tx| {
            lock_and_check_account(tx, account)?;
            let owned = query_balances(tx, queries::SELECT_BALANCES, &[&id_to_sql(account.id)?])?;
            validation::check_stored_balance(account, original, &owned)?;
            validation::check_balance_range(account, changes)?;

            let changed = tx
                .execute(
                    queries::UPDATE_BALANCE,
                    &[
                        &date_to_str(changes.date),
                        &changes.money.amount(),
                        &changes.money.currency().as_str(),
                        &id_to_sql(original.id)?,
                        &id_to_sql(account.id)?,
                    ],
                )
                .map_err(pg_err)?;
            if changed != 1 {
                return Err(StorageError::BalanceNotFound {
                    account_id: account.id,
                    balance_id: original.id,
                });
            }
            tracing::debug!(account_id = account.id, balance_id = original.id, "Balance updated");
            Ok(StoredBalance::new(original.id, *changes))
        })
    }

    fn balance_at_date(&self, account: &StoredAccount, date: Date) -> Result<StoredBalance, StorageError> {
        self.with_client(|client| {
            query_balance(
                client,
                queries::BALANCE_AT_DATE,
                &[&id_to_sql(account.id)?, &date_to_str(date)],
            )?
            .ok_or(StorageError::NoBalances)
        })
    }
}
