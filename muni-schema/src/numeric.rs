//! Numeric field contract.
//!
//! The backend serialises decimals as strings, integers as numbers, and
//! leaves unset columns as `null`. A numeric field accepts all three:
//!
//! | wire value          | parsed as |
//! |---------------------|-----------|
//! | number              | itself    |
//! | numeric string      | parsed    |
//! | `""`, `null`, absent| `0`       |
//! | anything else       | error     |
//!
//! Non-finite results are rejected so downstream arithmetic never sees NaN.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    coerce(value.as_ref())
        .map(|v| v.unwrap_or(0.0))
        .map_err(D::Error::custom)
}

pub fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    coerce(value.as_ref()).map_err(D::Error::custom)
}

pub fn coerce(value: Option<&Value>) -> Result<Option<f64>, String> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| format!("number {n} is out of range"))?,
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| format!("invalid numeric string '{s}'"))?
        }
        Some(other) => return Err(format!("expected a number, got {other}")),
    };

    if parsed.is_finite() {
        Ok(Some(parsed))
    } else {
        Err(format!("non-finite value {parsed}"))
    }
}
