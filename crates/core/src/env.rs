//! Startup configuration helpers.
//!
//! Configuration is read once at boot, so a malformed value panics with the
//! variable name instead of being threaded back as an error.

use std::fmt::Display;
use std::str::FromStr;

/// Parse `key` from the environment, falling back to `default` when unset.
///
/// # Panics
///
/// Panics if the variable is set but does not parse as `T`.
pub fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_var(key, &raw),
        Err(_) => default,
    }
}

/// Read a required, non-empty variable.
///
/// # Panics
///
/// Panics if the variable is unset or empty.
pub fn env_required(key: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => panic!("{key} must be set to a non-empty value"),
    }
}

/// Comma-separated list; blank entries are dropped.
pub fn env_list(key: &str, default: &str) -> Vec<String> {
    split_list(&std::env::var(key).unwrap_or_else(|_| default.to_string()))
}

fn parse_var<T>(key: &str, raw: &str) -> T
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .unwrap_or_else(|e| panic!("{key}={raw:?} is invalid: {e}"))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
