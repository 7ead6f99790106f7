use rusqlite::{Connection, OptionalExtension, Params, Row};

use moneystore_core::{
    columns::{AccountRow, BalanceRow},
    StorageError, StoredAccount, StoredBalance,
};

pub(crate) fn sql_err(e: rusqlite::Error) -> StorageError {
    StorageError::Other(e.to_string())
}

fn account_row(row: &Row) -> rusqlite::Result<AccountRow> {
    Ok(AccountRow {
        id: row.get(0)?,
        name: row.get(1)?,
        date_opened: row.get(2)?,
        date_closed: row.get(3)?,
        deleted_at: row.get(4)?,
        currency: row.get(5)?,
    })
}

fn balance_row(row: &Row) -> rusqlite::Result<BalanceRow> {
    Ok(BalanceRow {
        id: row.get(0)?,
        date: row.get(1)?,
        balance: row.get(2)?,
        currency: row.get(3)?,
    })
}

pub(crate) fn query_account<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Option<StoredAccount>, StorageError> {
    conn.query_row(sql, params, account_row)
        .optional()
        .map_err(sql_err)?
        .map(AccountRow::into_stored)
        .transpose()
}

pub(crate) fn query_accounts<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<StoredAccount>, StorageError> {
    let mut stmt = conn.prepare(sql).map_err(sql_err)?;
    let rows = stmt.query_map(params, account_row).map_err(sql_err)?;
    let accounts = rows
        .map(|row| row.map_err(sql_err)?.into_stored())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(accounts)
}

pub(crate) fn query_balance<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Option<StoredBalance>, StorageError> {
    conn.query_row(sql, params, balance_row)
        .optional()
        .map_err(sql_err)?
        .map(BalanceRow::into_stored)
        .transpose()
}

pub(crate) fn query_balances<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<StoredBalance>, StorageError> {
    let mut stmt = conn.prepare(sql).map_err(sql_err)?;
    let rows = stmt.query_map(params, balance_row).map_err(sql_err)?;
    let balances = rows
        .map(|row| row.map_err(sql_err)?.into_stored())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(balances)
}
