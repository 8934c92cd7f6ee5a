//! Diagnostics setup for the harness side.

use crate::VeneerError;
use crate::VeneerResult;
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Logging configuration applied once at attach time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default level (trace, debug, info, warn, error).
    pub level: String,
    pub json_format: bool,
    /// Per-target overrides, e.g. `vn_write = "debug"`.
    pub module_levels: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_levels = BTreeMap::new();
        module_levels.insert("vn_url".to_owned(), "info".to_owned());
        module_levels.insert("vn_write".to_owned(), "info".to_owned());

        Self {
            level: "warn".to_owned(),
            json_format: false,
            module_levels,
        }
    }
}

impl LoggingConfig {
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![self.level.clone()];
        directives.extend(
            self.module_levels
                .iter()
                .map(|(module, level)| format!("{module}={level}")),
        );
        directives.join(",")
    }
}

/// Installs the global `tracing` subscriber.
pub fn init_logging(config: &LoggingConfig) -> VeneerResult<()> {
    let filter = EnvFilter::try_new(config.filter_directives()).map_err(|error| {
        VeneerError::new(
            "config.logging_filter_invalid",
            format!("invalid log filter `{}`: {error}", config.filter_directives()),
        )
    })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    result.map_err(|error| {
        VeneerError::new(
            "config.logging_already_initialized",
            format!("global subscriber already installed: {error}"),
        )
    })
}
