//! Logging setup for batch runs.

use std::str::FromStr;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

use crate::config::{non_empty_var, ConfigError, DataSourceConfig};

const FALLBACK_DIRECTIVE: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(ConfigError::Invalid(format!("unknown log format '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: FALLBACK_DIRECTIVE.to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("global subscriber already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

pub fn logging_config_from_env() -> LoggingConfig {
    let mut config = LoggingConfig::default();

    if let Some(level) = non_empty_var("TXFEAT_LOG_LEVEL") {
        config.level = level;
    }
    if let Some(format) = non_empty_var("TXFEAT_LOG_FORMAT").and_then(|raw| raw.parse().ok()) {
        config.format = format;
    }
    if let Some(flag) = non_empty_var("TXFEAT_LOG_TARGET").and_then(|raw| parse_flag(&raw)) {
        config.include_target = flag;
    }

    config
}

pub fn filter_directive(config: &LoggingConfig) -> &str {
    match EnvFilter::try_new(&config.level) {
        Ok(_) => &config.level,
        Err(_) => FALLBACK_DIRECTIVE,
    }
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter_directive(config)))
        .with_target(config.include_target)
        .with_ansi(config.format == LogFormat::Pretty);

    match config.format {
        LogFormat::Json => builder.json().finish().try_init()?,
        LogFormat::Pretty => builder.pretty().finish().try_init()?,
    }
    Ok(())
}

pub fn log_run_start(logging: &LoggingConfig, data: &DataSourceConfig) {
    info!(
        component = "pipeline",
        event = "run.start",
        log_level = filter_directive(logging),
        log_format = ?logging.format,
        transactions_path = %data.transactions_path.display(),
        targets_path = %data.targets_path.display(),
        output_dir = %data.output_dir.display()
    );
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env_lock;
    use std::env;

    const VARS: [&str; 3] = ["TXFEAT_LOG_LEVEL", "TXFEAT_LOG_FORMAT", "TXFEAT_LOG_TARGET"];

    fn config_with(values: [Option<&str>; 3]) -> LoggingConfig {
        let _guard = env_lock().lock().expect("env lock should not be poisoned");
        for (key, value) in VARS.iter().zip(values) {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
        let cfg = logging_config_from_env();
        for key in VARS {
            env::remove_var(key);
        }
        cfg
    }

    #[test]
    fn env_overrides_and_fallbacks() {
        assert_eq!(config_with([None, None, None]), LoggingConfig::default());

        let cfg = config_with([Some("txfeat=debug"), Some(" JSON "), Some("off")]);
        assert_eq!(cfg.level, "txfeat=debug");
        assert_eq!(cfg.format, LogFormat::Json);
        assert!(!cfg.include_target);

        let cfg = config_with([Some("   "), Some("yaml"), Some("maybe")]);
        assert_eq!(cfg, LoggingConfig::default());
    }

    #[test]
    fn unparsable_level_falls_back_to_info() {
        let cfg = LoggingConfig {
            level: "txfeat=loud".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(filter_directive(&cfg), "info");

        let cfg = LoggingConfig {
            level: "txfeat=debug,warn".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(filter_directive(&cfg), "txfeat=debug,warn");
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
