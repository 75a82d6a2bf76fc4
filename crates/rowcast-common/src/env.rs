//! Typed environment variable lookups
//!
//! Every rowcast setting comes from the process environment (optionally seeded
//! from a `.env` file). Blank values are treated the same as unset ones, so
//! `KAFKA_TOPIC=` in a `.env` file does not silently produce an empty topic.

use std::str::FromStr;
use thiserror::Error;

/// Failure to read a setting from the environment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("{0} must be set")]
    Missing(String),

    #[error("{name}={value:?} is invalid: {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Value of `name`, trimmed, or `None` when unset or blank
pub fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Value of `name`, failing with [`EnvError::Missing`] when unset or blank
pub fn required(name: &str) -> Result<String, EnvError> {
    var(name).ok_or_else(|| EnvError::Missing(name.to_string()))
}

/// Parse `name` into `T`, falling back to `default` when unset
pub fn parse_or<T>(name: &str, default: T) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| EnvError::Invalid {
            name: name.to_string(),
            reason: e.to_string(),
            value,
        }),
    }
}

/// Parse a boolean flag; accepts `true/false`, `1/0`, `yes/no`, `on/off`
pub fn flag_or(name: &str, default: bool) -> Result<bool, EnvError> {
    let Some(value) = var(name) else {
        return Ok(default);
    };

    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(EnvError::Invalid {
            name: name.to_string(),
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}
