//! Logging setup and span helpers.
//!
//! Events go to stderr so command output on stdout stays machine-readable.

use std::sync::Once;

use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

const DEFAULT_FILTER: &str = "warn,zoo=info";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event, for log shipping.
    Json,
    #[default]
    Pretty,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Initialize the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` takes precedence over `filter`, which takes precedence over
/// `warn,zoo=info`.
pub fn init_logging(format: LogFormat, filter: Option<&str>) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(filter.unwrap_or(DEFAULT_FILTER)))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        // A subscriber may already be installed (e.g. by a test harness).
        let _ = match format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init(),
        };
    });
}

/// Span wrapping one audit batch of a repository.
#[must_use]
pub fn audit_span(repo_id: i64, owner: &str, name: &str) -> Span {
    tracing::info_span!("audit", repo_id, owner, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty, None);
        init_logging(LogFormat::Json, Some("zoo=debug"));
    }

    #[test]
    fn test_audit_span() {
        let span = audit_span(1, "platform", "billing");
        let _guard = span.enter();
        tracing::info!("inside audit span");
    }

    #[test]
    fn test_log_format_serde() {
        let format: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, LogFormat::Json);
        assert_eq!(LogFormat::default().to_string(), "pretty");
    }
}
