use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn to_json<T: Serialize + ?Sized>(value: &T, field: &str) -> Result<String> {
    serde_json::to_string(value).with_context(|| format!("failed to serialize {field}"))
}

pub fn from_json<T: DeserializeOwned>(value: &str, field: &str) -> Result<T> {
    serde_json::from_str(value).with_context(|| format!("failed to parse {field}"))
}

/// Like `from_json`, but NULL or empty columns decode to `T::default()`.
pub fn from_optional_json<T: DeserializeOwned + Default>(
    value: Option<String>,
    field: &str,
) -> Result<T> {
    match value {
        Some(raw) if !raw.trim().is_empty() => from_json(&raw, field),
        _ => Ok(T::default()),
    }
}
