//! SQLite storage backend for moneystore.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use time::Date;

use moneystore_core::{
    columns::{date_to_str, id_to_sql, timestamp_to_secs},
    deletion_timestamp, validation, Account, AccountId, Balance, BalanceId, Storage, StorageError,
    StoredAccount, StoredBalance,
};

mod queries;
mod rows;

use rows::{query_account, query_accounts, query_balance, query_balances, sql_err};

pub struct SqliteStorage {
    conn: Mutex<Option<Connection>>,
}

impl SqliteStorage {
    pub fn new(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(sql_err)?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(sql_err)?;
        conn.execute_batch(queries::SCHEMA).map_err(sql_err)?;
        tracing::debug!(path, "SQLite storage opened");

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Other("SQLite connection lock poisoned".to_string()))
    }

    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T, StorageError>) -> Result<T, StorageError> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or(StorageError::Closed)?;
        f(conn)
    }

    /// Runs `f` in an immediate transaction so the checks it makes still hold
    /// when it writes. Any error rolls the transaction back.
    fn in_transaction<T>(&self, f: impl FnOnce(&Transaction) -> Result<T, StorageError>) -> Result<T, StorageError> {
        self.with_connection(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(sql_err)?;
            match f(&tx) {
                Ok(value) => {
                    tx.commit().map_err(sql_err)?;
                    Ok(value)
                }
                Err(e) => {
                    tracing::debug!(error = %e, "SQLite transaction rolled back");
                    Err(e)
                }
            }
        })
    }
}

fn check_account(conn: &Connection, account: &StoredAccount) -> Result<(), StorageError> {
    let persisted = query_account(conn, queries::SELECT_ACCOUNT, params![id_to_sql(account.id)?])?;
    validation::check_account(account, persisted.as_ref())
}

fn account_balances(conn: &Connection, account_id: AccountId) -> Result<Vec<StoredBalance>, StorageError> {
    query_balances(conn, queries::SELECT_BALANCES, params![id_to_sql(account_id)?])
}

impl Storage for SqliteStorage {
    fn available(&self) -> bool {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(sql_err)
        })
        .is_ok()
    }

    fn close(&self) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| sql_err(e))?;
            tracing::debug!("SQLite storage closed");
        }
        Ok(())
    }

    fn insert_account(&self, account: &Account) -> Result<StoredAccount, StorageError> {
        account.validate()?;
        self.with_connection(|conn| {
            conn.execute(
                queries::INSERT_ACCOUNT,
                params![
                    account.name,
                    date_to_str(account.opened),
                    account.closed.map(date_to_str),
                    account.currency.as_str(),
                ],
            )
            .map_err(sql_err)?;
            let id = conn.last_insert_rowid();
            tracing::debug!(account_id = id, "Account inserted");
            Ok(StoredAccount::new(moneystore_core::columns::id_from_sql(id)?, account.clone()))
        })
    }

    fn select_account(&self, id: AccountId) -> Result<StoredAccount, StorageError> {
        self.with_connection(|conn| {
            query_account(conn, queries::SELECT_ACCOUNT, params![id_to_sql(id)?])?
                .ok_or(StorageError::AccountNotFound(id))
        })
    }

    fn select_accounts(&self) -> Result<Vec<StoredAccount>, StorageError> {
        self.with_connection(|conn| query_accounts(conn, queries::SELECT_ACCOUNTS, []))
    }

    fn select_open_accounts(&self) -> Result<Vec<StoredAccount>, StorageError> {
        self.with_connection(|conn| query_accounts(conn, queries::SELECT_OPEN_ACCOUNTS, []))
    }

    fn validate_account(&self, account: &StoredAccount) -> Result<(), StorageError> {
        self.with_connection(|conn| check_account(conn, account))
    }

    fn update_account(&self, original: &StoredAccount, changes: &Account) -> Result<StoredAccount, StorageError> {
        self.in_transaction(|tx| {
            check_account(tx, original)?;
            changes.validate()?;
            validation::check_update_keeps_balances(original.id, changes, &account_balances(tx, original.id)?)?;

            tx.execute(
                queries::UPDATE_ACCOUNT,
                params![
                    changes.name,
                    date_to_str(changes.opened),
                    changes.closed.map(date_to_str),
                    changes.currency.as_str(),
                    id_to_sql(original.id)?,
                ],
            )
            .map_err(sql_err)?;
            tracing::debug!(account_id = original.id, "Account updated");
            Ok(StoredAccount::new(original.id, changes.clone()))
        })
    }

    fn delete_account(&self, account: &mut StoredAccount) -> Result<(), StorageError> {
        let at = deletion_timestamp();
        self.in_transaction(|tx| {
            check_account(tx, account)?;
            tx.execute(
                queries::DELETE_ACCOUNT,
                params![timestamp_to_secs(at), id_to_sql(account.id)?],
            )
            .map_err(sql_err)?;
            Ok(())
        })?;
        account.mark_deleted(at);
        tracing::debug!(account_id = account.id, "Account soft deleted");
        Ok(())
    }

    fn insert_balance(&self, account: &StoredAccount, balance: &Balance) -> Result<StoredBalance, StorageError> {
        self.in_transaction(|tx| {
            check_account(tx, account)?;
            validation::check_balance_range(account, balance)?;

            tx.execute(
                queries::INSERT_BALANCE,
                params![
                    id_to_sql(account.id)?,
                    date_to_str(balance.date),
                    balance.money.amount(),
                    balance.money.currency().as_str(),
                ],
            )
            .map_err(sql_err)?;
            let id = tx.last_insert_rowid();
            tracing::debug!(account_id = account.id, balance_id = id, "Balance inserted");
            Ok(StoredBalance::new(moneystore_core::columns::id_from_sql(id)?, *balance))
        })
    }

    fn select_account_balances(&self, account: &StoredAccount) -> Result<Vec<StoredBalance>, StorageError> {
        self.with_connection(|conn| account_balances(conn, account.id))
    }

    fn select_balance(&self, account: &StoredAccount, id: BalanceId) -> Result<StoredBalance, StorageError> {
        self.with_connection(|conn| {
            query_balance(conn, queries::SELECT_BALANCE, params![id_to_sql(account.id)?, id_to_sql(id)?])?
                .ok_or(StorageError::BalanceNotFound {
                    account_id: account.id,
                    balance_id: id,
                })
        })
    }

    fn validate_balance(&self, account: &StoredAccount, balance: &StoredBalance) -> Result<(), StorageError> {
        self.with_connection(|conn| validation::check_balance(account, balance, &account_balances(conn, account.id)?))
    }

    fn update_balance(
        &self,
        account: &StoredAccount,
        original: &StoredBalance,
        changes: &Balance,
    ) -> Result<StoredBalance, StorageError> {
        self.in_transaction(|tx| {
            check_account(tx, account)?;
            validation::check_stored_balance(account, original, &account_balances(tx, account.id)?)?;
            validation::check_balance_range(account, changes)?;

            let changed = tx
                .execute(
                    queries::UPDATE_BALANCE,
                    params![
                        date_to_str(changes.date),
                        changes.money.amount(),
                        changes.money.currency().as_str(),
                        id_to_sql(original.id)?,
                        id_to_sql(account.id)?,
                    ],
                )
                .map_err(sql_err)?;
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
        self.with_connection(|conn| {
            query_balance(conn, queries::BALANCE_AT_DATE, params![id_to_sql(account.id)?, date_to_str(date)])?
                .ok_or(StorageError::NoBalances)
        })
    }
}
