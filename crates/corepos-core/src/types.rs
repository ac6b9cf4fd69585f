//! # Domain Types
//!
//! Small value types shared by the cart, the invoice payload builder and the
//! section projection.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    TaxRate      │   │   OrderType     │   │   PaidStatus    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  ppm (u32)      │   │  DINE_IN        │   │  PAID           │       │
//! │  │  80000 = 8%     │   │  TO_GO          │   │  UNPAID         │       │
//! │  └─────────────────┘   │  DELIVERY       │   └─────────────────┘       │
//! │                        │  PICKUP         │                              │
//! │  ┌─────────────────┐   └─────────────────┘   ┌─────────────────┐       │
//! │  │    Discount     │                         │   PosStatus     │       │
//! │  │  ─────────────  │   ┌─────────────────┐   │  ─────────────  │       │
//! │  │  Fixed(Money)   │   │  SectionType    │   │  PENDING ...    │       │
//! │  │  Percentage(bp) │   │  kitchen / bar  │   │  COMPLETED      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate in parts per million of the taxable amount.
///
/// ## Why PPM and not basis points?
/// Basis points cannot represent rates such as 8.875% (887.5 bps).
/// 1 ppm = 0.0001%, so 8.875% = 88_750 ppm exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// One hundred percent.
    pub const FULL: TaxRate = TaxRate(1_000_000);

    #[inline]
    pub const fn from_ppm(ppm: u32) -> Self {
        TaxRate(ppm)
    }

    /// Creates a tax rate from basis points (825 = 8.25%).
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps * 100)
    }

    /// Creates a tax rate from a percentage (8.25 = 8.25%).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 10_000.0).round().max(0.0) as u32)
    }

    /// Creates a tax rate from a decimal fraction (0.08 = 8%).
    ///
    /// This is the representation the front end keeps in `taxRate`.
    pub fn from_fraction(fraction: f64) -> Self {
        TaxRate((fraction * 1_000_000.0).round().max(0.0) as u32)
    }

    #[inline]
    pub const fn ppm(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a decimal fraction (display and snapshots only).
    #[inline]
    pub fn fraction(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Returns the rate as a percentage (display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Discount
// =============================================================================

/// Wire discriminator for discounts: `"fixed"` or `"%"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum DiscountType {
    #[default]
    #[serde(rename = "fixed")]
    Fixed,
    #[serde(rename = "%", alias = "percentage")]
    Percentage,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Fixed => "fixed",
            DiscountType::Percentage => "%",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" | "" => Ok(DiscountType::Fixed),
            "%" | "percentage" | "percent" => Ok(DiscountType::Percentage),
            _ => Err(ValidationError::NotAllowed {
                field: "discount_type".to_string(),
                allowed: vec!["fixed".to_string(), "%".to_string()],
            }),
        }
    }
}

/// An order-level discount.
///
/// Percentages are kept in basis points (1000 = 10%) so that 12.5% stays
/// exact without floating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    Fixed(Money),
    Percentage(u32),
}

impl Discount {
    pub const fn none() -> Self {
        Discount::Fixed(Money::zero())
    }

    /// Builds a discount from its wire parts.
    ///
    /// `value` is cents for [`DiscountType::Fixed`] and percent (12.5) for
    /// [`DiscountType::Percentage`]. Non-finite or negative values become 0.
    pub fn from_parts(discount_type: DiscountType, value: f64) -> Self {
        let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
        match discount_type {
            DiscountType::Fixed => Discount::Fixed(Money::from_cents(value.round() as i64)),
            DiscountType::Percentage => Discount::Percentage((value * 100.0).round() as u32),
        }
    }

    pub fn discount_type(&self) -> DiscountType {
        match self {
            Discount::Fixed(_) => DiscountType::Fixed,
            Discount::Percentage(_) => DiscountType::Percentage,
        }
    }

    /// Value as the front end shows it: cents for fixed, percent for `%`.
    pub fn display_value(&self) -> f64 {
        match self {
            Discount::Fixed(amount) => amount.cents() as f64,
            Discount::Percentage(bps) => *bps as f64 / 100.0,
        }
    }

    /// Number sent as `discount` on invoice payloads: cents for fixed,
    /// percent for `%`. 12.5% goes out as `12.5`, 10% as `10`.
    pub fn wire_value(&self) -> serde_json::Number {
        match self {
            Discount::Fixed(amount) => amount.cents().into(),
            Discount::Percentage(bps) if bps % 100 == 0 => (bps / 100).into(),
            Discount::Percentage(bps) => serde_json::Number::from_f64(*bps as f64 / 100.0)
                .unwrap_or_else(|| (bps / 100).into()),
        }
    }

    /// Computes the discount amount against a subtotal.
    pub fn amount_for(&self, subtotal: Money) -> Money {
        match self {
            Discount::Fixed(amount) => *amount,
            Discount::Percentage(bps) => subtotal.percentage_of(*bps),
        }
    }

    pub fn is_none(&self) -> bool {
        match self {
            Discount::Fixed(amount) => amount.is_zero(),
            Discount::Percentage(bps) => *bps == 0,
        }
    }
}

impl Default for Discount {
    fn default() -> Self {
        Discount::none()
    }
}

// =============================================================================
// Order Type
// =============================================================================

/// How the order leaves the counter.
///
/// Parsing is lenient about separators: `"DINE IN"`, `"dine-in"` and
/// `"DINE_IN"` are the same value. Serialization is always SCREAMING_SNAKE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    #[default]
    DineIn,
    ToGo,
    Delivery,
    Pickup,
}

impl OrderType {
    pub const ALL: [OrderType; 4] = [
        OrderType::DineIn,
        OrderType::ToGo,
        OrderType::Delivery,
        OrderType::Pickup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::DineIn => "DINE_IN",
            OrderType::ToGo => "TO_GO",
            OrderType::Delivery => "DELIVERY",
            OrderType::Pickup => "PICKUP",
        }
    }

    /// Only dine-in orders carry table selections.
    pub fn uses_tables(&self) -> bool {
        matches!(self, OrderType::DineIn)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_uppercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "DINE_IN" | "DINEIN" => Ok(OrderType::DineIn),
            "TO_GO" | "TOGO" | "TAKEAWAY" | "TAKE_AWAY" => Ok(OrderType::ToGo),
            "DELIVERY" => Ok(OrderType::Delivery),
            "PICKUP" | "PICK_UP" => Ok(OrderType::Pickup),
            _ => Err(ValidationError::NotAllowed {
                field: "type".to_string(),
                allowed: OrderType::ALL.iter().map(|t| t.to_string()).collect(),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for OrderType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Paid Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaidStatus {
    Paid,
    #[default]
    Unpaid,
}

impl PaidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaidStatus::Paid => "PAID",
            PaidStatus::Unpaid => "UNPAID",
        }
    }
}

impl fmt::Display for PaidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaidStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PAID" => Ok(PaidStatus::Paid),
            "UNPAID" => Ok(PaidStatus::Unpaid),
            _ => Err(ValidationError::NotAllowed {
                field: "paid_status".to_string(),
                allowed: vec!["PAID".to_string(), "UNPAID".to_string()],
            }),
        }
    }
}

// =============================================================================
// POS Status
// =============================================================================

/// Kitchen/bar workflow status of an order or a single line.
///
/// Independent from [`PaidStatus`]: an order can be paid and still cooking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PosStatus {
    #[default]
    Pending,
    InProgress,
    Ready,
    Completed,
    Cancelled,
    /// Any status this build does not know about.
    #[serde(other)]
    Unknown,
}

impl PosStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PosStatus::Pending => "PENDING",
            PosStatus::InProgress => "IN_PROGRESS",
            PosStatus::Ready => "READY",
            PosStatus::Completed => "COMPLETED",
            PosStatus::Cancelled => "CANCELLED",
            PosStatus::Unknown => "UNKNOWN",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PosStatus::Completed)
    }
}

impl fmt::Display for PosStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Section Type
// =============================================================================

/// Routing destination for an order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Kitchen,
    Bar,
    #[default]
    #[serde(other)]
    Other,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::Kitchen => "kitchen",
            SectionType::Bar => "bar",
            SectionType::Other => "other",
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kitchen" => Ok(SectionType::Kitchen),
            "bar" => Ok(SectionType::Bar),
            "other" => Ok(SectionType::Other),
            _ => Err(ValidationError::NotAllowed {
                field: "section_type".to_string(),
                allowed: vec!["kitchen".into(), "bar".into(), "other".into()],
            }),
        }
    }
}

// =============================================================================
// Selected Table
// =============================================================================

/// A dine-in table attached to the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SelectedTable {
    #[serde(deserialize_with = "crate::serde_helpers::lenient_i64")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Guests seated at the table.
    #[serde(default = "default_table_quantity", deserialize_with = "crate::serde_helpers::lenient_i64")]
    pub quantity: i64,
}

fn default_table_quantity() -> i64 {
    1
}

// =============================================================================
// Unit Tests
// =============================================================================
