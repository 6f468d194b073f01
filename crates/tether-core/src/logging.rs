#![forbid(unsafe_code)]

//! Logging helpers.
//!
//! Library code logs through `tracing` directly. With `tracing-json` a
//! subscriber can be installed; its filter reads `TETHER_LOG` first, then
//! `RUST_LOG`, defaulting to `info`.

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "TETHER_LOG";

/// Resolve the filter directive from an environment lookup.
#[must_use]
pub fn filter_directive<F>(get_env: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    get_env(LOG_ENV)
        .or_else(|| get_env("RUST_LOG"))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

/// Install a global JSON subscriber. Returns `false` if one was already set.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging() -> bool {
    use tracing_subscriber::EnvFilter;

    let directive = filter_directive(|key| std::env::var(key).ok());
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new(directive))
        .try_init()
        .is_ok()
}

/// Install a compact subscriber that writes through the test harness.
#[cfg(feature = "tracing-json")]
pub fn init_test_logging() -> bool {
    use tracing_subscriber::EnvFilter;

    let directive = filter_directive(|key| std::env::var(key).ok());
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new(directive))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tether_log_wins() {
        let d = filter_directive(|k| match k {
            "TETHER_LOG" => Some("tether_runtime=trace".into()),
            "RUST_LOG" => Some("warn".into()),
            _ => None,
        });
        assert_eq!(d, "tether_runtime=trace");
    }

    #[test]
    fn falls_back_to_info() {
        assert_eq!(filter_directive(|_| None), "info");
        assert_eq!(filter_directive(|_| Some("  ".into())), "info");
    }
}
