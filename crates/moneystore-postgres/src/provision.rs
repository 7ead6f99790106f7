//! Creating and dropping whole databases.
//!
//! Database and role names cannot be bound as statement parameters, so they
//! are checked and quoted here before being spliced into the statement.

use postgres::{Client, NoTls};
use thiserror::Error;

/// Identifiers longer than this are silently truncated by PostgreSQL.
pub const MAX_IDENTIFIER_LEN: usize = 63;

const CONNECTION_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("database name must not be blank")]
    BlankName,
    #[error("database owner must not be blank")]
    BlankOwner,
    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] postgres::Error),
}

/// Double quotes `ident` for use as an SQL identifier. Surrounding
/// whitespace is dropped and embedded quotes are doubled.
pub fn quote_identifier(ident: &str) -> Result<String, ProvisionError> {
    let ident = ident.trim();
    if ident.contains('\0') || ident.len() > MAX_IDENTIFIER_LEN {
        return Err(ProvisionError::InvalidIdentifier(ident.to_string()));
    }
    Ok(format!("\"{}\"", ident.replace('"', "\"\"")))
}

pub fn create_database_statement(name: &str, owner: &str) -> Result<String, ProvisionError> {
    if name.trim().is_empty() {
        return Err(ProvisionError::BlankName);
    }
    if owner.trim().is_empty() {
        return Err(ProvisionError::BlankOwner);
    }
    Ok(format!(
        "CREATE DATABASE {} WITH OWNER = {} ENCODING = 'UTF8' CONNECTION LIMIT = {}",
        quote_identifier(name)?,
        quote_identifier(owner)?,
        CONNECTION_LIMIT
    ))
}

pub fn drop_database_statement(name: &str) -> Result<String, ProvisionError> {
    if name.trim().is_empty() {
        return Err(ProvisionError::BlankName);
    }
    Ok(format!("DROP DATABASE {}", quote_identifier(name)?))
}

/// Creates database `name` owned by role `owner`, connecting with an
/// administrative `connection_string`. Arguments are checked before connecting.
pub fn create_database(connection_string: &str, name: &str, owner: &str) -> Result<(), ProvisionError> {
    let statement = create_database_statement(name, owner)?;
    run(connection_string, &statement)?;
    tracing::info!(database = name.trim(), owner = owner.trim(), "Database created");
    Ok(())
}

pub fn drop_database(connection_string: &str, name: &str) -> Result<(), ProvisionError> {
    let statement = drop_database_statement(name)?;
    run(connection_string, &statement)?;
    tracing::info!(database = name.trim(), "Database dropped");
    Ok(())
}

// CREATE/DROP DATABASE refuse to run inside a transaction block, so this
// uses a plain simple-query round trip.
fn run(connection_string: &str, statement: &str) -> Result<(), ProvisionError> {
    let mut client = Client::connect(connection_string, NoTls)?;
    client.batch_execute(statement)?;
    client.close()?;
    Ok(())
}
