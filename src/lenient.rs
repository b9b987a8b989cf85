//! Forgiving field readers for stored documents
//!
//! Older documents hold numbers as strings, emptied inputs as `null`, and
//! now and then values that cannot be read at all. None of these may stop a
//! strategy from loading: unreadable values read as absent so the caller's
//! default applies, with a warning when a value was actually present.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

fn raw<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.filter(|v| !v.is_null()))
}

fn is_blank(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.trim().is_empty())
}

/// Whole non-negative number, given as a number or a numeric string
pub(crate) fn count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = raw(deserializer)? else {
        return Ok(None);
    };
    let parsed = match &value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    if parsed.is_none() && !is_blank(&value) {
        warn!("Stored value {} is not a whole number, using the default", value);
    }
    Ok(parsed)
}

/// Any finite number, given as a number or a numeric string
pub(crate) fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = raw(deserializer)? else {
        return Ok(None);
    };
    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite());
    if parsed.is_none() && !is_blank(&value) {
        warn!("Stored value {} is not a number, using the default", value);
    }
    Ok(parsed)
}

/// Text, with numbers and other scalars kept in their JSON spelling
pub(crate) fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(raw(deserializer)?.map(|value| match value {
        Value::String(s) => s,
        other => other.to_string(),
    }))
}

pub(crate) fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_text(deserializer)?.unwrap_or_default())
}

/// A named choice (indicator, operator, unit, ...); unknown names read as
/// absent
pub(crate) fn choice<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(value) = raw(deserializer)? else {
        return Ok(None);
    };
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!("Stored value {} not recognised ({}), using the default", value, e);
            Ok(None)
        }
    }
}
