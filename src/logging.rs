//! Tracing subscriber setup, selectable between a human-readable pretty
//! format and structured JSON.

use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::TracingFormat;
use crate::config::Config;

pub fn setup_logging(_config: &Config, format: TracingFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "warn,advisor=info,advisor::scraper=info,advisor::llm=debug,advisor::schedule=debug",
        )
    });

    match format {
        TracingFormat::Pretty => {
            fmt()
                .with_env_filter(filter)
                .with_target(true)
                .pretty()
                .init();
        }
        TracingFormat::Json => {
            fmt().with_env_filter(filter).json().init();
        }
    }
}
