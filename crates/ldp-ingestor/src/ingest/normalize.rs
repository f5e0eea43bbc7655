//! Log record normalization
//!
//! Maps a raw, loosely-typed log record into the canonical [`NewLogRecord`]
//! shape: defaults are filled for missing fields, the full raw value is
//! preserved verbatim, and records without a usable timestamp are rejected.
//! Rejection is per-record; the caller decides whether to skip or abort.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use super::models::NewLogRecord;

/// Why a raw record was rejected
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record is missing the mandatory timestamp field")]
    MissingTimestamp,

    #[error("record timestamp is not a valid RFC 3339 value: {0}")]
    InvalidTimestamp(String),
}

/// Normalize one raw log record
pub fn normalize(raw: &Value) -> Result<NewLogRecord, NormalizeError> {
    let obj = raw.as_object().ok_or(NormalizeError::NotAnObject)?;

    let timestamp = match obj.get("timestamp") {
        None | Some(Value::Null) => return Err(NormalizeError::MissingTimestamp),
        Some(Value::String(s)) if s.is_empty() => return Err(NormalizeError::MissingTimestamp),
        Some(Value::String(s)) => parse_timestamp(s)?,
        Some(other) => return Err(NormalizeError::InvalidTimestamp(other.to_string())),
    };

    let req = obj.get("req").and_then(Value::as_object);
    let req_field = |name: &str| req.and_then(|r| r.get(name));

    let id = match req_field("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => format!("log-{}", Uuid::new_v4()),
    };

    Ok(NewLogRecord {
        id,
        timestamp,
        level: match obj.get("level") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "0".to_string(),
        },
        method: string_or(req_field("method"), "UNKNOWN"),
        url: string_or(req_field("url"), "UNKNOWN"),
        query: match req_field("query") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        },
        headers: req_field("headers")
            .filter(|v| v.is_object())
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default())),
        context: string_or(obj.get("context"), "UNKNOWN"),
        message: string_or(obj.get("message"), ""),
        auth_user_id: obj.get("authUserId").and_then(Value::as_i64),
        remote_address: string_or(req_field("remoteAddress"), "UNKNOWN"),
        remote_port: req_field("remotePort")
            .and_then(Value::as_i64)
            .unwrap_or(0) as i32,
        processing_time_ms: obj.get("processingTimeMs").and_then(Value::as_i64),
        params: req_field("params").filter(|v| v.is_object()).cloned(),
        raw_data: raw.clone(),
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, NormalizeError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| NormalizeError::InvalidTimestamp(s.to_string()))
}

fn string_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}
