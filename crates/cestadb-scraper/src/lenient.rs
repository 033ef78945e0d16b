//! Field deserializers for retailer payloads that send the same field as a
//! number in one response and a string in the next.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts a string or a number and yields its string form.
///
/// `null`, blank strings, and any other JSON type become `None`.
pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accepts a number or a numeric string (`"1.25"`, `"1,25"`) as `f64`.
///
/// Anything unparseable or non-finite becomes `None` rather than failing
/// the whole payload.
pub(crate) fn opt_f64_lenient<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|v| v.is_finite()))
}
