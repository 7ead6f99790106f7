use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "moneystore", about = "Copy accounts and balances between moneystore backends")]
pub struct CliArgs {
    /// Path to config file
    #[arg(short, long, default_value = "moneystore.toml")]
    pub config: String,

    /// Log level (overrides config file)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Print the migration report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub source: StoreConfig,

    #[serde(default)]
    pub target: StoreConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

/// Which backend a store lives in, tagged by `backend = "..."` in the file.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    #[default]
    Memory,
    Sqlite {
        path: String,
    },
    Postgres(PostgresConfig),
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct PostgresConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub dbname: String,
    #[serde(default)]
    pub sslmode: String,

    /// File holding a full connection string. Takes precedence over the
    /// individual parameters when set.
    #[serde(default)]
    pub connection_string_file: Option<PathBuf>,
}

fn default_logging() -> LoggingConfig {
    LoggingConfig {
        level: default_log_level(),
        json: false,
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: default_logging(),
            source: StoreConfig::default(),
            target: StoreConfig::default(),
        }
    }
}

impl Config {
    /// Reads the config file named on the command line, falling back to the
    /// defaults when it does not exist. CLI flags override file values.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(&cli.config)?;

        if let Some(ref level) = cli.log_level {
            config.logging.level = level.clone();
        }

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file not found, using defaults");
                Ok(Config::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}
