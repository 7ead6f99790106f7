use moneystore_core::Storage;
use moneystore_memory::InMemoryStorage;
use moneystore_postgres::{load_connection_string, ConnectionParams, PostgresStorage};
use moneystore_sqlite::SqliteStorage;

use crate::{
    config::{PostgresConfig, StoreConfig},
    error::Error,
};

/// Opens the backend a [`StoreConfig`] describes.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn Storage>, Error> {
    let store: Box<dyn Storage> = match config {
        StoreConfig::Memory => Box::new(InMemoryStorage::new()),
        StoreConfig::Sqlite { path } => Box::new(SqliteStorage::new(path)?),
        StoreConfig::Postgres(pg) => Box::new(PostgresStorage::new(&postgres_connection_string(pg)?)?),
    };
    tracing::info!(backend = backend_name(config), "Store opened");
    Ok(store)
}

fn postgres_connection_string(config: &PostgresConfig) -> Result<String, Error> {
    match &config.connection_string_file {
        Some(path) => Ok(load_connection_string(path)?),
        None => Ok(ConnectionParams::new(&config.host, &config.user, &config.dbname, &config.sslmode)
            .to_connection_string()),
    }
}

pub fn backend_name(config: &StoreConfig) -> &'static str {
    match config {
        StoreConfig::Memory => "memory",
        StoreConfig::Sqlite { .. } => "sqlite",
        StoreConfig::Postgres(_) => "postgres",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_memory_and_sqlite() {
        let memory = open_store(&StoreConfig::Memory).unwrap();
        assert!(memory.available());

        let sqlite = open_store(&StoreConfig::Sqlite { path: ":memory:".to_string() }).unwrap();
        assert!(sqlite.available());
        assert!(sqlite.select_accounts().unwrap().is_empty());
    }

    #[test]
    fn test_postgres_connection_string_from_params() {
        let config = PostgresConfig {
            host: "localhost".into(),
            dbname: "money".into(),
            ..Default::default()
        };
        assert_eq!(postgres_connection_string(&config).unwrap(), "host=localhost dbname=money");
    }

    #[test]
    fn test_postgres_connection_string_file_wins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  host=db user=app  ").unwrap();
        let config = PostgresConfig {
            host: "ignored".into(),
            connection_string_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(postgres_connection_string(&config).unwrap(), "host=db user=app");
    }

    #[test]
    fn test_oversized_connection_string_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'x'; 300]).unwrap();
        file.flush().unwrap();
        let config = PostgresConfig {
            connection_string_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            open_store(&StoreConfig::Postgres(config)),
            Err(Error::Connection(_))
        ));
    }
}
