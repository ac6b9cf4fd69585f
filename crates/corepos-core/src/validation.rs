//! Field checks shared by the cart and the hold-invoice validator.
//!
//! Cart actions check quantities, discounts and rates as they are applied.
//! `invoice::validate_hold_invoice` reuses the price and enum checks on a
//! whole payload before it is sent. The backend still has the last word.

use crate::error::ValidationError;
use crate::types::{OrderType, PaidStatus, TaxRate};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

pub type ValidationResult<T> = Result<T, ValidationError>;

fn out_of_range(field: &str, min: i64, max: i64) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min,
        max,
    }
}

fn non_blank<'a>(field: &str, raw: &'a str) -> ValidationResult<&'a str> {
    if raw.trim().is_empty() {
        Err(ValidationError::required(field))
    } else {
        Ok(raw)
    }
}

/// 1 to [`MAX_ITEM_QUANTITY`] units on a line.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    match qty {
        q if q <= 0 => Err(ValidationError::must_be_positive("quantity")),
        q if q > MAX_ITEM_QUANTITY => Err(out_of_range("quantity", 1, MAX_ITEM_QUANTITY)),
        _ => Ok(()),
    }
}

/// Cart prices may be zero for comped items.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(out_of_range("price", 0, i64::MAX));
    }
    Ok(())
}

/// Hold-invoice lines must carry a real price.
pub fn validate_item_price(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::must_be_positive("items.price"));
    }
    Ok(())
}

pub fn validate_tax_rate(rate: TaxRate) -> ValidationResult<()> {
    if rate > TaxRate::FULL {
        return Err(out_of_range("tax_rate", 0, TaxRate::FULL.ppm() as i64));
    }
    Ok(())
}

/// Percentage discounts are basis points, 10000 being the whole line.
pub fn validate_percentage_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(out_of_range("discount", 0, 10_000));
    }
    Ok(())
}

pub fn validate_fixed_discount(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(out_of_range("discount", 0, i64::MAX));
    }
    Ok(())
}

/// Called with the line count before a new line is pushed.
pub fn validate_cart_size(current_lines: usize) -> ValidationResult<()> {
    if current_lines >= MAX_CART_ITEMS {
        return Err(out_of_range("cart items", 0, MAX_CART_ITEMS as i64));
    }
    Ok(())
}

/// Accepts the wire spellings, `"DINE IN"` included.
pub fn validate_order_type(raw: &str) -> ValidationResult<OrderType> {
    non_blank("type", raw)?.parse()
}

/// Only PAID and UNPAID exist on a hold invoice.
pub fn validate_paid_status(raw: &str) -> ValidationResult<PaidStatus> {
    non_blank("paid_status", raw)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_bounds() {
        for ok in [1, 12, MAX_ITEM_QUANTITY] {
            assert!(validate_quantity(ok).is_ok(), "{ok}");
        }
        assert!(matches!(
            validate_quantity(0),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_quantity(MAX_ITEM_QUANTITY + 1),
            Err(ValidationError::OutOfRange { max, .. }) if max == MAX_ITEM_QUANTITY
        ));
    }

    #[test]
    fn test_comped_line_allowed_in_cart_but_not_on_hold() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-450).is_err());
        assert!(validate_item_price(0).is_err());
        assert!(validate_item_price(450).is_ok());
    }

    #[test]
    fn test_rate_and_discount_ceilings() {
        assert!(validate_tax_rate(TaxRate::from_bps(800)).is_ok());
        assert!(validate_tax_rate(TaxRate::from_ppm(1_000_001)).is_err());
        assert!(validate_percentage_bps(10_000).is_ok());
        assert!(validate_percentage_bps(10_001).is_err());
        assert!(validate_fixed_discount(-1).is_err());
    }

    #[test]
    fn test_full_cart_rejects_another_line() {
        assert!(validate_cart_size(MAX_CART_ITEMS - 1).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS).is_err());
    }

    #[test]
    fn test_wire_enums() {
        assert_eq!(validate_order_type("DINE IN").unwrap(), OrderType::DineIn);
        assert!(matches!(
            validate_order_type("  "),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_order_type("CATERING").is_err());

        assert_eq!(validate_paid_status("PAID").unwrap(), PaidStatus::Paid);
        assert!(validate_paid_status("REFUNDED").is_err());
    }
}
