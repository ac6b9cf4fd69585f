//! Lenient deserializers for server records.
//!
//! The backend is loose about numbers: `"quantity": "3"`, `"price": 1550`
//! and `"price": "1550"` all show up in the same list. These helpers accept
//! a JSON number or a numeric string and reject everything else.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::money::Money;

fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.round() as i64)
            })
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

pub fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_i64(&value)
        .ok_or_else(|| D::Error::custom(format!("expected an integer, got {value}")))
}

/// Like [`lenient_i64`] but `null`, `""` and a missing field map to `None`.
///
/// Use with `#[serde(default)]`.
pub fn lenient_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        other => value_to_i64(other)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected an integer, got {other}"))),
    }
}

/// Like [`lenient_opt_i64`] but keeps fractions (`12.5`, `"12.5"`).
pub fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parsed = match &value {
        Value::Null => return Ok(None),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("expected a number, got {value}")))
}

/// Cents from a number or numeric string. Server records are already in
/// cents, so no dollar detection happens here.
pub fn lenient_money<'de, D>(deserializer: D) -> Result<Money, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_i64(deserializer).map(Money::from_cents)
}

pub fn lenient_opt_money<'de, D>(deserializer: D) -> Result<Option<Money>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_opt_i64(deserializer).map(|v| v.map(Money::from_cents))
}

/// Parses a string field through `FromStr`; unknown or missing values
/// become `None` instead of failing the whole record.
pub fn lenient_opt_parse<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

/// `null` becomes the type's default instead of an error.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Line {
        #[serde(deserialize_with = "lenient_i64")]
        quantity: i64,
        #[serde(deserialize_with = "lenient_money")]
        price: Money,
        #[serde(default, deserialize_with = "lenient_opt_i64")]
        section_id: Option<i64>,
        #[serde(default, deserialize_with = "null_as_default")]
        name: String,
    }

    #[test]
    fn test_accepts_numeric_strings() {
        let line: Line =
            serde_json::from_str(r#"{"quantity":"3","price":"1550","name":null}"#).unwrap();
        assert_eq!(line.quantity, 3);
        assert_eq!(line.price.cents(), 1550);
        assert_eq!(line.section_id, None);
        assert_eq!(line.name, "");
    }

    #[test]
    fn test_accepts_plain_numbers() {
        let line: Line =
            serde_json::from_str(r#"{"quantity":2,"price":500,"section_id":"4"}"#).unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.section_id, Some(4));
    }

    #[derive(Deserialize)]
    struct OrderDiscount {
        #[serde(default, deserialize_with = "lenient_opt_f64")]
        discount: Option<f64>,
    }

    #[test]
    fn test_fractional_percent_kept() {
        let parsed: OrderDiscount = serde_json::from_str(r#"{"discount":12.5}"#).unwrap();
        assert_eq!(parsed.discount, Some(12.5));
        let parsed: OrderDiscount = serde_json::from_str(r#"{"discount":"7.25"}"#).unwrap();
        assert_eq!(parsed.discount, Some(7.25));
        let parsed: OrderDiscount = serde_json::from_str(r#"{"discount":null}"#).unwrap();
        assert_eq!(parsed.discount, None);
    }

    #[test]
    fn test_rejects_garbage() {
        let result: Result<Line, _> = serde_json::from_str(r#"{"quantity":"three","price":1}"#);
        assert!(result.is_err());
    }
}
