//! # Price Boundary
//!
//! The ONE place where untyped amounts are turned into [`Money`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Price Boundary                                   │
//! │                                                                         │
//! │  JSON value ──► PriceInput ──┬──► to_cents     (integers are cents)     │
//! │                              ├──► ensure_cents (small ints are dollars) │
//! │                              ├──► to_dollars                            │
//! │                              └──► format       ("$1,234.56")            │
//! │                                                                         │
//! │  Rules                                                                  │
//! │  ─────                                                                  │
//! │  Integer n, n < 10^8   → n cents                                        │
//! │  Integer n, n ≥ 10^8   → n × 100 (dollar integer safeguard)             │
//! │  Float (has a '.')     → dollars, × 100, rounded                        │
//! │  Text                  → strip "$ , €" etc, parse, × 100, rounded       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dollar detection is a heuristic
//! [`is_in_dollars`] treats `0 < n < 100` integers as dollars. A 50 cent
//! item and a 50 dollar item look the same as a bare `50`. Callers that know
//! their unit should build `Money` directly and skip this module.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// Integers at or above this magnitude are assumed to be whole dollars.
pub const DOLLAR_INTEGER_THRESHOLD: i64 = 100_000_000;

// =============================================================================
// Price Input
// =============================================================================

/// An amount whose unit is not known yet.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceInput {
    /// A JSON integer (`1550`).
    Integer(i64),
    /// A JSON number written with a decimal point (`15.5`).
    Float(f64),
    /// A string (`"$15.50"`, `"1,550"`).
    Text(String),
}

impl PriceInput {
    /// Builds an input from an untyped JSON value.
    ///
    /// Returns `None` for null, booleans, arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(PriceInput::Integer(i))
                } else {
                    n.as_f64().map(PriceInput::Float)
                }
            }
            Value::String(s) => Some(PriceInput::Text(s.clone())),
            _ => None,
        }
    }
}

impl From<i64> for PriceInput {
    fn from(value: i64) -> Self {
        PriceInput::Integer(value)
    }
}

impl From<f64> for PriceInput {
    fn from(value: f64) -> Self {
        PriceInput::Float(value)
    }
}

impl From<&str> for PriceInput {
    fn from(value: &str) -> Self {
        PriceInput::Text(value.to_string())
    }
}

impl From<Money> for PriceInput {
    fn from(value: Money) -> Self {
        PriceInput::Integer(value.cents())
    }
}

impl<'de> Deserialize<'de> for PriceInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        PriceInput::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("expected a price, got {value}")))
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn invalid(input: &PriceInput) -> CoreError {
    CoreError::InvalidAmount(format!("{input:?}"))
}

/// Strips currency symbols, separators and whitespace, then parses.
fn parse_text(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn dollars_to_cents(dollars: f64, input: &PriceInput) -> CoreResult<Money> {
    if !dollars.is_finite() {
        return Err(invalid(input));
    }
    let cents = (dollars * 100.0).round();
    if cents.abs() >= i64::MAX as f64 {
        return Err(invalid(input));
    }
    Ok(Money::from_cents(cents as i64))
}

/// Converts an amount to cents.
///
/// ```rust
/// use corepos_core::price::{to_cents, PriceInput};
///
/// assert_eq!(to_cents(&PriceInput::Integer(1550)).unwrap().cents(), 1550);
/// assert_eq!(to_cents(&PriceInput::Float(15.5)).unwrap().cents(), 1550);
/// assert_eq!(to_cents(&"$1,550.00".into()).unwrap().cents(), 155_000);
/// assert!(to_cents(&"abc".into()).is_err());
/// ```
pub fn to_cents(input: &PriceInput) -> CoreResult<Money> {
    match input {
        PriceInput::Integer(n) if n.unsigned_abs() < DOLLAR_INTEGER_THRESHOLD as u64 => {
            Ok(Money::from_cents(*n))
        }
        PriceInput::Integer(n) => n
            .checked_mul(100)
            .map(Money::from_cents)
            .ok_or_else(|| invalid(input)),
        PriceInput::Float(f) => dollars_to_cents(*f, input),
        PriceInput::Text(s) => {
            let dollars = parse_text(s).ok_or_else(|| invalid(input))?;
            dollars_to_cents(dollars, input)
        }
    }
}

/// Converts cents to a 2-decimal dollar amount.
///
/// Inputs are cents whatever their shape: `"1550"` and `1550` both give
/// `15.5`. Fractional cents are rounded first.
pub fn to_dollars(cents: &PriceInput) -> CoreResult<f64> {
    let cents = match cents {
        PriceInput::Integer(n) => *n as f64,
        PriceInput::Float(f) if f.is_finite() => f.round(),
        PriceInput::Float(_) => return Err(invalid(cents)),
        PriceInput::Text(s) => parse_text(s).ok_or_else(|| invalid(cents))?.round(),
    };
    Ok(cents / 100.0)
}

/// Heuristic dollar detection.
///
/// Any non-integer is dollars, any text is dollars, and integers with
/// `0 < n < 100` are dollars. Everything else is cents.
pub fn is_in_dollars(input: &PriceInput) -> bool {
    match input {
        PriceInput::Integer(n) => *n > 0 && *n < 100,
        PriceInput::Float(_) | PriceInput::Text(_) => true,
    }
}

/// Converts to cents using [`is_in_dollars`] to decide the unit.
///
/// This is the converter for catalog prices entering the cart. Unlike
/// [`to_cents`], a bare `5` is read as $5.00.
pub fn ensure_cents(input: &PriceInput) -> CoreResult<Money> {
    if !is_in_dollars(input) {
        return to_cents(input);
    }
    match input {
        PriceInput::Integer(n) => Ok(Money::from_cents(n * 100)),
        PriceInput::Float(f) => dollars_to_cents(*f, input),
        PriceInput::Text(s) => {
            let dollars = parse_text(s).ok_or_else(|| invalid(input))?;
            dollars_to_cents(dollars, input)
        }
    }
}

/// Alias of [`ensure_cents`] kept for call sites that normalize item
/// prices. Both names share one implementation.
#[inline]
pub fn normalize_price(input: &PriceInput) -> CoreResult<Money> {
    ensure_cents(input)
}

// =============================================================================
// Formatting
// =============================================================================

fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency.to_ascii_uppercase().as_str() {
        "USD" | "CAD" | "AUD" | "MXN" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "INR" => Some("₹"),
        _ => None,
    }
}

fn group_thousands(whole: u64) -> String {
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Formats a [`Money`] value with a currency symbol and thousands separators.
pub fn format_money(amount: Money, currency: &str) -> String {
    let cents = amount.cents();
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let body = format!("{}.{:02}", group_thousands(abs / 100), abs % 100);
    match currency_symbol(currency) {
        Some(symbol) => format!("{sign}{symbol}{body}"),
        None => format!("{sign}{} {body}", currency.to_ascii_uppercase()),
    }
}

/// Normalizes an amount through [`to_cents`] and formats it.
///
/// ```rust
/// use corepos_core::price::{format, PriceInput};
///
/// assert_eq!(format(&PriceInput::Integer(123_456), "USD").unwrap(), "$1,234.56");
/// assert_eq!(format(&PriceInput::Float(15.5), "EUR").unwrap(), "€15.50");
/// ```
pub fn format(amount: &PriceInput, currency: &str) -> CoreResult<String> {
    Ok(format_money(to_cents(amount)?, currency))
}

// =============================================================================
// Unit Tests
// =============================================================================
