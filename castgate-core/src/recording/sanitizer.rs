use serde_json::Value;
use std::collections::HashMap;

/// Headers that contain security-sensitive values and must be redacted.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "api_key",
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
];

/// JSON keys whose values are redacted wherever they appear.
pub const SENSITIVE_KEYS: &[&str] = &[
    "api_key",
    "messageBytes",
    "password",
    "secret",
    "signature",
    "token",
];

const REDACTED: &str = "[REDACTED]";

pub struct Sanitizer;

impl Sanitizer {
    pub fn is_sensitive_header(header_name: &str) -> bool {
        let lower = header_name.to_lowercase();
        SENSITIVE_HEADERS.contains(&lower.as_str())
    }

    pub fn sanitize_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(key, value)| {
                let value = if Self::is_sensitive_header(key) {
                    REDACTED.to_string()
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }

    /// Headers from an `http::HeaderMap`, sanitized. Non-UTF-8 values are dropped.
    pub fn sanitize_header_map(headers: &http::HeaderMap) -> HashMap<String, String> {
        let plain: HashMap<String, String> = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        Self::sanitize_headers(&plain)
    }

    pub fn sanitize_json(value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, val)| {
                        let val = if SENSITIVE_KEYS.contains(&key.as_str()) {
                            Value::String(REDACTED.to_string())
                        } else {
                            Self::sanitize_json(val)
                        };
                        (key.clone(), val)
                    })
                    .collect(),
            ),
            Value::Array(arr) => Value::Array(arr.iter().map(Self::sanitize_json).collect()),
            _ => value.clone(),
        }
    }
}
