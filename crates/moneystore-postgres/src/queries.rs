//! Statements used by the PostgreSQL backend. Every value is bound as a parameter.

pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS accounts (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        date_opened TEXT NOT NULL,
        date_closed TEXT,
        deleted_at BIGINT,
        currency TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS balances (
        id BIGSERIAL PRIMARY KEY,
        account_id BIGINT NOT NULL REFERENCES accounts(id),
        date TEXT NOT NULL,
        balance BIGINT NOT NULL,
        currency TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_pg_balances_account_date
        ON balances(account_id, date, id);
";

pub const SELECT_ACCOUNT: &str =
    "SELECT id, name, date_opened, date_closed, deleted_at, currency FROM accounts WHERE id = $1";

/// Same row as [`SELECT_ACCOUNT`], locked until the surrounding transaction ends.
pub const SELECT_ACCOUNT_FOR_UPDATE: &str =
    "SELECT id, name, date_opened, date_closed, deleted_at, currency FROM accounts WHERE id = $1 FOR UPDATE";

pub const SELECT_ACCOUNTS: &str = "SELECT id, name, date_opened, date_closed, deleted_at, currency
     FROM accounts WHERE deleted_at IS NULL ORDER BY id ASC";

pub const SELECT_OPEN_ACCOUNTS: &str = "SELECT id, name, date_opened, date_closed, deleted_at, currency
     FROM accounts WHERE deleted_at IS NULL AND date_closed IS NULL ORDER BY id ASC";

pub const INSERT_ACCOUNT: &str =
    "INSERT INTO accounts (name, date_opened, date_closed, currency) VALUES ($1, $2, $3, $4) RETURNING id";

pub const UPDATE_ACCOUNT: &str =
    "UPDATE accounts SET name = $1, date_opened = $2, date_closed = $3, currency = $4 WHERE id = $5";

pub const DELETE_ACCOUNT: &str = "UPDATE accounts SET deleted_at = $1 WHERE id = $2";

pub const SELECT_BALANCES: &str = "SELECT id, date, balance, currency
     FROM balances WHERE account_id = $1 ORDER BY date ASC, id ASC";

pub const SELECT_BALANCE: &str =
    "SELECT id, date, balance, currency FROM balances WHERE account_id = $1 AND id = $2";

pub const INSERT_BALANCE: &str =
    "INSERT INTO balances (account_id, date, balance, currency) VALUES ($1, $2, $3, $4) RETURNING id";

pub const UPDATE_BALANCE: &str =
    "UPDATE balances SET date = $1, balance = $2, currency = $3 WHERE id = $4 AND account_id = $5";

pub const BALANCE_AT_DATE: &str = "SELECT id, date, balance, currency
     FROM balances WHERE account_id = $1 AND date <= $2
     ORDER BY date DESC, id DESC LIMIT 1";
