//! # Tax Calculation
//!
//! One calculator for both the live cart totals and the invoice payload.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Tax Calculation                                   │
//! │                                                                         │
//! │  taxable = max(subtotal − discount, 0)                                  │
//! │                                                                         │
//! │  TaxPolicy::Flat(8%)         → [ 8% × taxable ]                         │
//! │                                                                         │
//! │  TaxPolicy::PerType([..])    → simple types:   rate × taxable           │
//! │                                compound types: rate × (taxable +        │
//! │                                                 Σ simple amounts)       │
//! │                                                                         │
//! │  Each entry is rounded to the cent on its own; total = Σ entries.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The cart getters and `invoice::build_invoice_payload` both call
//! [`TaxCalculator::breakdown`], so the amount shown on screen is the amount
//! sent to the backend.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

use crate::money::Money;
use crate::types::TaxRate;

// =============================================================================
// Tax Types
// =============================================================================

/// A configured tax type (e.g. "State 6%", "City 2.875%").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxType {
    #[serde(alias = "id", deserialize_with = "crate::serde_helpers::lenient_i64")]
    pub tax_type_id: i64,
    #[serde(default)]
    pub name: String,
    /// Percentage on the wire (`8.875`), ppm in memory.
    #[serde(rename = "percent", with = "percent")]
    #[ts(type = "number")]
    pub rate: TaxRate,
    /// Applies on top of the non-compound taxes.
    #[serde(default)]
    pub compound_tax: bool,
}

mod percent {
    use super::*;

    pub fn serialize<S>(rate: &TaxRate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(rate.percentage())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<TaxRate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let pct = match &value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
            _ => None,
        }
        .filter(|p| p.is_finite() && *p >= 0.0)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid tax percent: {value}")))?;
        Ok(TaxRate::from_percentage(pct))
    }
}

/// How tax is applied to a cart.
#[derive(Debug, Clone, PartialEq)]
pub enum TaxPolicy {
    /// One rate over the whole taxable amount.
    Flat(TaxRate),
    /// A list of configured tax types.
    PerType(Vec<TaxType>),
}

impl Default for TaxPolicy {
    fn default() -> Self {
        TaxPolicy::Flat(TaxRate::zero())
    }
}

impl TaxPolicy {
    /// Effective simple rate, for snapshots that carry a single `taxRate`.
    ///
    /// Compound types are folded in approximately; exact amounts always
    /// come from [`TaxCalculator::breakdown`].
    pub fn effective_rate(&self) -> TaxRate {
        match self {
            TaxPolicy::Flat(rate) => *rate,
            TaxPolicy::PerType(types) => {
                TaxRate::from_ppm(types.iter().map(|t| t.rate.ppm()).sum())
            }
        }
    }
}

// =============================================================================
// Breakdown
// =============================================================================

/// One computed tax amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxLine {
    /// `None` for a flat cart-level rate.
    pub tax_type_id: Option<i64>,
    pub name: String,
    #[serde(rename = "percent", with = "percent")]
    #[ts(type = "number")]
    pub rate: TaxRate,
    pub amount: Money,
    pub compound_tax: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaxBreakdown {
    pub entries: Vec<TaxLine>,
    pub total: Money,
}

/// Computes tax amounts for a policy.
#[derive(Debug, Clone, Copy)]
pub struct TaxCalculator<'a> {
    policy: &'a TaxPolicy,
}

impl<'a> TaxCalculator<'a> {
    pub fn new(policy: &'a TaxPolicy) -> Self {
        Self { policy }
    }

    /// Breaks the tax on `taxable` down per rate.
    ///
    /// Negative taxable amounts are treated as zero.
    pub fn breakdown(&self, taxable: Money) -> TaxBreakdown {
        let taxable = taxable.clamp_non_negative();

        let entries = match self.policy {
            TaxPolicy::Flat(rate) => vec![TaxLine {
                tax_type_id: None,
                name: "Tax".to_string(),
                rate: *rate,
                amount: taxable.calculate_tax(*rate),
                compound_tax: false,
            }],
            TaxPolicy::PerType(types) => {
                let simple_total: Money = types
                    .iter()
                    .filter(|t| !t.compound_tax)
                    .map(|t| taxable.calculate_tax(t.rate))
                    .sum();
                let compound_base = taxable + simple_total;

                types
                    .iter()
                    .map(|t| {
                        let base = if t.compound_tax { compound_base } else { taxable };
                        TaxLine {
                            tax_type_id: Some(t.tax_type_id),
                            name: t.name.clone(),
                            rate: t.rate,
                            amount: base.calculate_tax(t.rate),
                            compound_tax: t.compound_tax,
                        }
                    })
                    .collect()
            }
        };

        let total = entries.iter().map(|e| e.amount).sum();
        TaxBreakdown { entries, total }
    }

    pub fn total(&self, taxable: Money) -> Money {
        self.breakdown(taxable).total
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tax_type(id: i64, pct: f64, compound: bool) -> TaxType {
        TaxType {
            tax_type_id: id,
            name: format!("Tax {id}"),
            rate: TaxRate::from_percentage(pct),
            compound_tax: compound,
        }
    }

    #[test]
    fn test_flat_rate() {
        let policy = TaxPolicy::Flat(TaxRate::from_bps(800));
        let breakdown = TaxCalculator::new(&policy).breakdown(Money::from_cents(900));
        assert_eq!(breakdown.total.cents(), 72);
        assert_eq!(breakdown.entries.len(), 1);
        assert_eq!(breakdown.entries[0].tax_type_id, None);
    }

    #[test]
    fn test_per_type_rounds_each_entry() {
        // 5% of 333 = 16.65 → 17 ; 3% of 333 = 9.99 → 10
        let policy = TaxPolicy::PerType(vec![tax_type(1, 5.0, false), tax_type(2, 3.0, false)]);
        let breakdown = TaxCalculator::new(&policy).breakdown(Money::from_cents(333));
        let amounts: Vec<i64> = breakdown.entries.iter().map(|e| e.amount.cents()).collect();
        assert_eq!(amounts, vec![17, 10]);
        assert_eq!(breakdown.total.cents(), 27);
    }

    #[test]
    fn test_compound_applies_on_simple_taxes() {
        // 10% of 1000 = 100 ; compound 10% of (1000 + 100) = 110
        let policy = TaxPolicy::PerType(vec![tax_type(1, 10.0, false), tax_type(2, 10.0, true)]);
        let breakdown = TaxCalculator::new(&policy).breakdown(Money::from_cents(1000));
        assert_eq!(breakdown.entries[1].amount.cents(), 110);
        assert_eq!(breakdown.total.cents(), 210);
    }

    #[test]
    fn test_negative_taxable_is_zero() {
        let policy = TaxPolicy::Flat(TaxRate::from_bps(800));
        assert_eq!(TaxCalculator::new(&policy).total(Money::from_cents(-500)), Money::zero());
    }

    #[test]
    fn test_tax_type_wire_shape() {
        let parsed: TaxType = serde_json::from_str(
            r#"{"id":"3","name":"City","percent":"8.875","compound_tax":false}"#,
        )
        .unwrap();
        assert_eq!(parsed.tax_type_id, 3);
        assert_eq!(parsed.rate.ppm(), 88_750);

        let json = serde_json::to_value(&parsed).unwrap();
        assert_eq!(json["percent"], serde_json::json!(8.875));
    }
}
