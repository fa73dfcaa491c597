// src/deutils.rs
use serde::{Deserialize, Deserializer};
use serde_json::Value;

// LMS is loose with types: numbers arrive as JSON numbers or as strings
// depending on server version and field, so accept both.

fn lenient_f64(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

pub fn deserialize_numeric_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let v = Value::deserialize(deserializer)?;
    v.as_i64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| D::Error::custom("non-integer"))
}

/// Optional seconds (int, float or string); missing/null/garbage is `None`.
pub fn deserialize_opt_seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(v.as_ref().and_then(lenient_f64).filter(|s| s.is_finite() && *s >= 0.0))
}

/// Optional string that may be sent as a number (coverid, for one).
pub fn deserialize_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[inline]
pub fn seconds_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}

/// Converts milliseconds into "HH:MM:SS", or "MM:SS" when hours is zero.
pub fn ms_to_hms(ms: u64) -> String {
    let total = ms / 1000;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
