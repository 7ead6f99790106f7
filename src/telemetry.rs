use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

static TRACING_INIT: Once = Once::new();

/// Installs the global tracing subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(logging: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
        let builder = fmt().with_env_filter(filter);
        let result = if logging.json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        if let Err(e) = result {
            eprintln!("Warning: tracing subscriber already installed: {}", e);
        }
    });
}
