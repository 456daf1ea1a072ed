//! Logging setup, lifecycle events and the `MINTBOARD_*` env readers shared by every config.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DASHBOARD_ROUTES: &str = "/schedule,/schedule/snapshot,/schedule/select,/schedule/refresh,/schedule/notification,/search/snapshot,/search/query,/search/page,/search/viewport";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Subscriber settings read from `MINTBOARD_LOG_LEVEL`, `MINTBOARD_LOG_FORMAT` and
/// `MINTBOARD_LOG_TARGET`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Reads `key` and parses it; unset, unreadable or rejected values yield `None`.
pub(crate) fn env_override<T>(key: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
    env::var(key).ok().and_then(|raw| parse(raw.trim()))
}

pub(crate) fn non_blank(raw: &str) -> Option<String> {
    (!raw.is_empty()).then(|| raw.to_string())
}

/// Millisecond settings must be positive integers.
pub(crate) fn positive_millis(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().filter(|ms| *ms > 0)
}

pub fn logging_config_from_env() -> LoggingConfig {
    let defaults = LoggingConfig::default();
    LoggingConfig {
        level: env_override("MINTBOARD_LOG_LEVEL", non_blank).unwrap_or(defaults.level),
        format: env_override("MINTBOARD_LOG_FORMAT", parse_log_format).unwrap_or(defaults.format),
        include_target: env_override("MINTBOARD_LOG_TARGET", parse_switch)
            .unwrap_or(defaults.include_target),
    }
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let env_filter =
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(config.include_target);

    match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.with_ansi(false).json().finish())?
        }
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
    }

    Ok(())
}

pub fn log_app_start(config: &LoggingConfig) {
    info!(
        component = "dashboard_server",
        event = "app.start",
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        log_format = ?config.format
    );
}

pub fn log_app_bind(bound_addr: SocketAddr) {
    info!(
        component = "dashboard_server",
        event = "app.bind",
        bind_addr = %bound_addr,
        routes = DASHBOARD_ROUTES
    );
}

/// Records which backend the pages talk to and how often the schedule recomputes countdowns.
pub fn log_backend_selected(base_url: &str, timeout_ms: u64, tick_interval_ms: u64) {
    info!(
        component = "dashboard_server",
        event = "backend.selected",
        base_url,
        timeout_ms,
        tick_interval_ms
    );
}

fn parse_log_format(raw: &str) -> Option<LogFormat> {
    if raw.eq_ignore_ascii_case("json") {
        Some(LogFormat::Json)
    } else if raw.eq_ignore_ascii_case("pretty") {
        Some(LogFormat::Pretty)
    } else {
        None
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Mutex, OnceLock, PoisonError};

    /// Sets (or clears) env vars for the duration of `f`, serialized across tests.
    pub(crate) fn with_env_vars<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let _guard = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let previous: Vec<(&str, Option<String>)> = vars
            .iter()
            .map(|(key, value)| {
                let saved = env::var(key).ok();
                match value {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
                (*key, saved)
            })
            .collect();

        let output = f();

        for (key, saved) in previous {
            match saved {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
        output
    }

    #[test]
    fn logging_defaults_when_env_missing() {
        let cfg = with_env_vars(
            &[
                ("MINTBOARD_LOG_LEVEL", None),
                ("MINTBOARD_LOG_FORMAT", None),
                ("MINTBOARD_LOG_TARGET", None),
            ],
            logging_config_from_env,
        );

        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn logging_reads_directives_format_and_target() {
        let cfg = with_env_vars(
            &[
                ("MINTBOARD_LOG_LEVEL", Some(" mintboard=debug,axum=warn ")),
                ("MINTBOARD_LOG_FORMAT", Some("JSON")),
                ("MINTBOARD_LOG_TARGET", Some("off")),
            ],
            logging_config_from_env,
        );

        assert_eq!(cfg.level, "mintboard=debug,axum=warn");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(!cfg.include_target);
    }

    #[test]
    fn rejected_values_keep_defaults() {
        let cfg = with_env_vars(
            &[
                ("MINTBOARD_LOG_LEVEL", Some("   ")),
                ("MINTBOARD_LOG_FORMAT", Some("yaml")),
                ("MINTBOARD_LOG_TARGET", Some("maybe")),
            ],
            logging_config_from_env,
        );

        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn positive_millis_rejects_zero_and_garbage() {
        assert_eq!(positive_millis("2500"), Some(2_500));
        assert_eq!(positive_millis("0"), None);
        assert_eq!(positive_millis("-5"), None);
        assert_eq!(positive_millis("1s"), None);
    }
}
