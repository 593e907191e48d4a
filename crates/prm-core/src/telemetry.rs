//! Tracing setup for the `prm` binary.
//!
//! Results go to stdout, so every log line goes to stderr. The filter comes
//! from `PRM_LOG`, then `RUST_LOG`, then the level picked on the command
//! line. Without an explicit filter the SurrealDB engine is held at `warn`;
//! its per-query debug output would drown the request events.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "PRM_LOG";

const QUIET_TARGETS: [&str; 2] = ["surrealdb", "surrealdb_core"];

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let installed = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
    };
    installed.is_ok()
}

fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let quiet = QUIET_TARGETS.map(|target| format!("{target}=warn"));
    format!("{level},{}", quiet.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_quiet_the_storage_engine() {
        assert_eq!(
            default_directives(Level::DEBUG),
            "debug,surrealdb=warn,surrealdb_core=warn"
        );
    }

    #[test]
    fn default_directives_parse() {
        let filter = EnvFilter::try_new(default_directives(Level::INFO));
        assert!(filter.is_ok());
    }
}
