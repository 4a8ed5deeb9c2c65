//! Command-line argument parsing.

use clap::{Parser, ValueEnum};

#[cfg(debug_assertions)]
const DEFAULT_TRACING_FORMAT: TracingFormat = TracingFormat::Pretty;
#[cfg(not(debug_assertions))]
const DEFAULT_TRACING_FORMAT: TracingFormat = TracingFormat::Json;

fn default_tracing_format() -> TracingFormat {
    DEFAULT_TRACING_FORMAT
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceName {
    Web,
    Scraper,
}

impl ServiceName {
    pub fn all() -> &'static [ServiceName] {
        &[ServiceName::Web, ServiceName::Scraper]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceName::Web => "web",
            ServiceName::Scraper => "scraper",
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    #[arg(long, value_enum, default_value_t = default_tracing_format())]
    pub tracing: TracingFormat,

    #[arg(long, value_enum, default_values_t = ServiceName::all().to_vec())]
    pub services: Vec<ServiceName>,
}
