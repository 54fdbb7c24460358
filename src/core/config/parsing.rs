use std::env;

use super::types::{ConfigError, MarkingMode};

pub(super) fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub(super) fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u32(field: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_usize_in(
    field: &'static str,
    value: String,
    range: std::ops::RangeInclusive<usize>,
) -> Result<usize, ConfigError> {
    match value.parse::<usize>() {
        Ok(parsed) if range.contains(&parsed) => Ok(parsed),
        _ => Err(ConfigError::InvalidValue { field, value }),
    }
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

pub(super) fn parse_mode(value: Option<String>) -> Result<MarkingMode, ConfigError> {
    match value.as_deref().map(|item| item.to_lowercase()) {
        None => Ok(MarkingMode::Synchronized),
        Some(ref val) if val == "synchronized" || val == "sync" => Ok(MarkingMode::Synchronized),
        Some(ref val) if val == "unsynchronized" || val == "unsync" => {
            Ok(MarkingMode::Unsynchronized)
        }
        Some(val) => Err(ConfigError::InvalidMode(val)),
    }
}
