//! Field-by-field parsing of loosely typed write payloads.
//!
//! Write requests arrive as JSON objects whose fields are all optional. A
//! field that is missing or `null` is "not provided"; a field with a value of
//! the wrong shape is a validation error naming the field.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::errors::{Error, Result};

/// Raw write payload.
pub type Fields = Map<String, Value>;

fn provided<'a>(fields: &'a Fields, name: &str) -> Option<&'a Value> {
    fields.get(name).filter(|v| !v.is_null())
}

fn invalid(name: &str, expected: &str) -> Error {
    Error::validation_field(format!("field '{name}' must be {expected}"), name)
}

/// Strings are taken as-is; numbers and booleans are accepted in their textual form.
pub fn string_field(fields: &Fields, name: &str) -> Result<Option<String>> {
    match provided(fields, name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(invalid(name, "a string")),
    }
}

pub fn bool_field(fields: &Fields, name: &str) -> Result<Option<bool>> {
    match provided(fields, name) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(invalid(name, "a boolean")),
        },
        Some(Value::Number(n)) => match n.as_u64() {
            Some(1) => Ok(Some(true)),
            Some(0) => Ok(Some(false)),
            _ => Err(invalid(name, "a boolean")),
        },
        Some(_) => Err(invalid(name, "a boolean")),
    }
}

/// A TCP port given as a number or a numeric string.
pub fn port_field(fields: &Fields, name: &str) -> Result<Option<u16>> {
    let port = match provided(fields, name) {
        None => return Ok(None),
        Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Some(Value::String(s)) => s.trim().parse::<u16>().ok(),
        Some(_) => None,
    };

    port.map(Some).ok_or_else(|| invalid(name, "a port number between 0 and 65535"))
}

/// Whole seconds as a number or numeric string, or a humantime string such as `"1h"`.
pub fn duration_field(fields: &Fields, name: &str) -> Result<Option<Duration>> {
    match provided(fields, name) {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|secs| Some(Duration::from_secs(secs)))
            .ok_or_else(|| invalid(name, "a non-negative number of seconds")),
        Some(Value::String(s)) => parse_duration(s)
            .map(Some)
            .ok_or_else(|| invalid(name, "a duration such as 300, \"300\" or \"5m\"")),
        Some(_) => Err(invalid(name, "a duration")),
    }
}

fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).ok()
}
