//! Logging setup.
//!
//! Logs go to **stderr** through a `tracing` subscriber: the host talks to
//! the provider process over stdout, which must stay clean.
//!
//! The filter is taken from the first of these that is set:
//!
//! - `BYTEBASE_LOG`: a full `tracing` filter, e.g. `terraform_provider_bytebase::client=debug`
//! - `RUST_LOG`: same syntax, for hosts that already export it
//! - `TF_LOG`: the host's level (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`),
//!   applied to this crate only
//!
//! Otherwise [`DEFAULT_DIRECTIVE`] applies: provider events at `info`,
//! dependencies such as the HTTP stack at `warn`.
//!
//! ```bash
//! # Every API call with its latency, plus per-page list timings
//! BYTEBASE_LOG=terraform_provider_bytebase::client=debug terraform apply
//! ```

use std::env;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Provider-specific filter variable.
pub const LOG_ENV: &str = "BYTEBASE_LOG";

/// Target prefix of every event this crate emits.
pub const CRATE_TARGET: &str = "terraform_provider_bytebase";

/// Target of per-request API client events.
pub const CLIENT_TARGET: &str = "terraform_provider_bytebase::client";

/// Filter used when no variable is set.
pub const DEFAULT_DIRECTIVE: &str = "warn,terraform_provider_bytebase=info";

/// Map a `TF_LOG` level onto a directive scoped to this crate.
fn tf_log_directive(level: &str) -> Option<String> {
    let level = match level.trim().to_ascii_lowercase().as_str() {
        "trace" | "json" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => return None,
    };
    Some(format!("warn,{}={}", CRATE_TARGET, level))
}

/// Pick the filter directive from the given variable values.
fn select_directive(
    bytebase_log: Option<String>,
    rust_log: Option<String>,
    tf_log: Option<String>,
    default_directive: &str,
) -> String {
    let set = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    set(bytebase_log)
        .or_else(|| set(rust_log))
        .or_else(|| set(tf_log).as_deref().and_then(tf_log_directive))
        .unwrap_or_else(|| default_directive.to_string())
}

fn env_filter(default_directive: &str) -> EnvFilter {
    let directive = select_directive(
        env::var(LOG_ENV).ok(),
        env::var(EnvFilter::DEFAULT_ENV).ok(),
        env::var("TF_LOG").ok(),
        default_directive,
    );
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(default_directive))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the provider's logging subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_DIRECTIVE);
}

/// Initialize logging with another fallback directive, used when none of
/// the variables is set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_directive: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_DIRECTIVE))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so directive
    // selection is tested on plain values.

    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_directive_precedence() {
        let client = format!("{}=debug", CLIENT_TARGET);
        assert_eq!(
            select_directive(some(&client), some("trace"), some("ERROR"), DEFAULT_DIRECTIVE),
            client
        );
        assert_eq!(select_directive(None, some("trace"), some("ERROR"), DEFAULT_DIRECTIVE), "trace");
        assert_eq!(
            select_directive(some(" "), None, some("ERROR"), DEFAULT_DIRECTIVE),
            "warn,terraform_provider_bytebase=error"
        );
        assert_eq!(select_directive(None, None, None, DEFAULT_DIRECTIVE), DEFAULT_DIRECTIVE);
    }

    #[test]
    fn test_tf_log_levels() {
        assert_eq!(tf_log_directive("DEBUG").unwrap(), "warn,terraform_provider_bytebase=debug");
        assert_eq!(tf_log_directive("json").unwrap(), "warn,terraform_provider_bytebase=trace");
        assert!(tf_log_directive("OFF").is_none());
        assert_eq!(select_directive(None, None, some("OFF"), "error"), "error");
    }

    #[test]
    fn test_directives_parse() {
        assert!(EnvFilter::try_new(DEFAULT_DIRECTIVE).is_ok());
        assert!(EnvFilter::try_new(format!("warn,{}=debug", CLIENT_TARGET)).is_ok());
        assert!(EnvFilter::try_new(tf_log_directive("trace").unwrap()).is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
