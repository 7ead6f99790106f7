use std::{fs::File, io::Read, path::Path};

use thiserror::Error;

/// Largest connection string file that will be read, in bytes.
pub const MAX_CONNECTION_STRING_LEN: u64 = 200;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("no connection string file location given")]
    NoLocation,
    #[error("connection string file ({path}) is too large. Max: {max}, Length: {len}")]
    TooLarge { path: String, max: u64, len: u64 },
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

/// Key/value parameters for a libpq style connection string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub user: String,
    pub dbname: String,
    pub sslmode: String,
}

impl ConnectionParams {
    pub fn new(host: &str, user: &str, dbname: &str, sslmode: &str) -> Self {
        Self {
            host: host.to_string(),
            user: user.to_string(),
            dbname: dbname.to_string(),
            sslmode: sslmode.to_string(),
        }
    }

    /// Renders `key=value` pairs separated by single spaces, skipping empty values.
    pub fn to_connection_string(&self) -> String {
        [
            ("host", &self.host),
            ("user", &self.user),
            ("dbname", &self.dbname),
            ("sslmode", &self.sslmode),
        ]
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Reads a connection string from a small file, trimming surrounding whitespace.
pub fn load_connection_string(location: impl AsRef<Path>) -> Result<String, ConnectionError> {
    let location = location.as_ref();
    if location.as_os_str().is_empty() {
        return Err(ConnectionError::NoLocation);
    }
    let mut file = File::open(location)?;
    let len = file.metadata()?.len();
    if len > MAX_CONNECTION_STRING_LEN {
        return Err(ConnectionError::TooLarge {
            path: location.display().to_string(),
            max: MAX_CONNECTION_STRING_LEN,
            len,
        });
    }
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, io::Write};

    #[test]
    fn connection_string_has_every_pair() {
        let cs = ConnectionParams::new("localhost", "user", "dbname", "disable").to_connection_string();
        let mut expected: HashMap<&str, &str> =
            [("host", "localhost"), ("user", "user"), ("dbname", "dbname"), ("sslmode", "disable")]
                .into_iter()
                .collect();
        let pairs: Vec<&str> = cs.split(' ').collect();
        assert_eq!(pairs.len(), expected.len());
        for pair in pairs {
            let (k, v) = pair.split_once('=').unwrap();
            assert_eq!(expected.remove(k), Some(v));
        }
        assert!(expected.is_empty());
    }

    #[test]
    fn empty_values_are_skipped() {
        let cs = ConnectionParams::new("localhost", "", "money", "").to_connection_string();
        assert_eq!(cs, "host=localhost dbname=money");
        assert_eq!(ConnectionParams::default().to_connection_string(), "");
    }

    #[test]
    fn loads_small_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host=localhost dbname=money").unwrap();
        assert_eq!(load_connection_string(file.path()).unwrap(), "host=localhost dbname=money");
    }

    #[test]
    fn rejects_large_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'a'; 201]).unwrap();
        file.flush().unwrap();
        match load_connection_string(file.path()) {
            Err(ConnectionError::TooLarge { max, len, .. }) => {
                assert_eq!(max, 200);
                assert_eq!(len, 201);
            }
            other => panic!("expected TooLarge, got {:?}", other),
        }

        let mut exact = tempfile::NamedTempFile::new().unwrap();
        exact.write_all(&[b'a'; 200]).unwrap();
        exact.flush().unwrap();
        assert_eq!(load_connection_string(exact.path()).unwrap().len(), 200);
    }

    #[test]
    fn rejects_missing_location() {
        assert!(matches!(load_connection_string(""), Err(ConnectionError::NoLocation)));
        assert!(matches!(
            load_connection_string("/definitely/not/here/moneystore.conn"),
            Err(ConnectionError::IOError(_))
        ));
    }
}
