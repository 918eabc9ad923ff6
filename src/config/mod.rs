//! Configuration module - environment variable parsing

use std::env;
use std::str::FromStr;

use crate::game::ControllerTuning;

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Bot configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Text or JSON log lines on stderr
    pub log_format: LogFormat,
    /// Fixed RNG seed for reproducible games
    pub seed: Option<u64>,
    /// Decision loop constants
    pub tuning: ControllerTuning,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from any name -> value lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ControllerTuning::default();

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Text)?,
            seed: parse_optional(&lookup, "BOT_SEED")?,
            tuning: ControllerTuning {
                allowable_boundary_distance: parse_or(
                    &lookup,
                    "BOT_BOUNDARY_DISTANCE",
                    defaults.allowable_boundary_distance,
                )?,
                evasion_ticks: parse_or(&lookup, "BOT_EVASION_TICKS", defaults.evasion_ticks)?,
                random_move_ticks: parse_or(
                    &lookup,
                    "BOT_RANDOM_MOVE_TICKS",
                    defaults.random_move_ticks,
                )?,
                evasion_random_reset: parse_or(
                    &lookup,
                    "BOT_EVASION_RANDOM_RESET",
                    defaults.evasion_random_reset,
                )?,
                random_margin: parse_or(&lookup, "BOT_RANDOM_MARGIN", defaults.random_margin)?,
            },
        })
    }
}

fn parse_optional<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(None),
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    Ok(parse_optional(lookup, name)?.unwrap_or(default))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for environment variable {name}")]
    Invalid { name: &'static str, value: String },
}
