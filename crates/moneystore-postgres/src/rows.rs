use postgres::{types::ToSql, GenericClient, Row};

use moneystore_core::{
    columns::{AccountRow, BalanceRow},
    StorageError, StoredAccount, StoredBalance,
};

pub(crate) fn pg_err(e: postgres::Error) -> StorageError {
    StorageError::Other(e.to_string())
}

fn account_row(row: &Row) -> Result<AccountRow, postgres::Error> {
    Ok(AccountRow {
        id: row.try_get(0)?,
        name: row.try_get(1)?,
        date_opened: row.try_get(2)?,
        date_closed: row.try_get(3)?,
        deleted_at: row.try_get(4)?,
        currency: row.try_get(5)?,
    })
}

fn balance_row(row: &Row) -> Result<BalanceRow, postgres::Error> {
    Ok(BalanceRow {
        id: row.try_get(0)?,
        date: row.try_get(1)?,
        balance: row.try_get(2)?,
        currency: row.try_get(3)?,
    })
}

pub(crate) fn query_account<C: GenericClient>(
    client: &mut C,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Option<StoredAccount>, StorageError> {
    client
        .query_opt(sql, params)
        .map_err(pg_err)?
        .map(|row| account_row(&row).map_err(pg_err)?.into_stored())
        .transpose()
}

pub(crate) fn query_accounts<C: GenericClient>(
    client: &mut C,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Vec<StoredAccount>, StorageError> {
    client
        .query(sql, params)
        .map_err(pg_err)?
        .iter()
        .map(|row| account_row(row).map_err(pg_err)?.into_stored())
        .collect()
}

pub(crate) fn query_balance<C: GenericClient>(
    client: &mut C,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Option<StoredBalance>, StorageError> {
    client
        .query_opt(sql, params)
        .map_err(pg_err)?
        .map(|row| balance_row(&row).map_err(pg_err)?.into_stored())
        .transpose()
}

pub(crate) fn query_balances<C: GenericClient>(
    client: &mut C,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<Vec<StoredBalance>, StorageError> {
    client
        .query(sql, params)
        .map_err(pg_err)?
        .iter()
        .map(|row| balance_row(row).map_err(pg_err)?.into_stored())
        .collect()
}

/// Runs an `INSERT ... RETURNING id` statement.
pub(crate) fn insert_returning_id<C: GenericClient>(
    client: &mut C,
    sql: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<i64, StorageError> {
    let row = client.query_one(sql, params).map_err(pg_err)?;
    row.try_get(0).map_err(pg_err)
}
