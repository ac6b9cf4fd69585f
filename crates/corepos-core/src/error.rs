//! Errors from cart editing, pricing and payload checks.
//!
//! [`ValidationError`] is about a single bad input; [`CoreError`] is about
//! the cart or payload as a whole and wraps the former. The client crate
//! maps both to `VALIDATION_ERROR`. All of them are raised before any
//! request is built.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// `"abc"`, `"$"`, NaN and friends.
    #[error("not a price: {0}")]
    InvalidAmount(String),

    #[error("no cart line for product {item_id}")]
    ItemNotFound { item_id: i64 },

    #[error("no cart line with line id {0}")]
    LineNotFound(String),

    #[error("line {index} does not exist; the cart has {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Guards edits made against a stale view of the cart.
    #[error("line {index} is product {actual}, expected product {expected}")]
    LineMismatch {
        index: usize,
        expected: i64,
        actual: i64,
    },

    /// Both halves of a split keep at least one unit, so splitting 3 off
    /// a line of 3 is rejected.
    #[error("cannot split {requested} off a line of {available}")]
    InvalidSplit { requested: i64, available: i64 },

    #[error("cart is full ({max} lines)")]
    CartTooLarge { max: usize },

    #[error("quantity {requested} is over the per-line limit of {max}")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error("cart has no lines")]
    EmptyCart,

    /// The company types invoice numbers by hand; conversion cannot
    /// reserve one.
    #[error("Invoice numbers are not auto-generated; manual numbering is not supported")]
    ManualNumberingUnsupported,

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One field failed a check. `field` uses payload names (`items.price`).
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    #[error("{field} is malformed: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// A total sent by the caller differs from the one recomputed here.
    #[error("{field} is {declared} but the lines add up to {computed}")]
    Mismatch {
        field: String,
        declared: i64,
        computed: i64,
    },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_message_names_both_quantities() {
        let err = CoreError::InvalidSplit {
            requested: 3,
            available: 3,
        };
        assert_eq!(err.to_string(), "cannot split 3 off a line of 3");
    }

    #[test]
    fn test_subtotal_mismatch_message() {
        let err = ValidationError::Mismatch {
            field: "sub_total".to_string(),
            declared: 1000,
            computed: 999,
        };
        assert_eq!(err.to_string(), "sub_total is 1000 but the lines add up to 999");
    }

    #[test]
    fn test_field_error_passes_through_core_error() {
        let core_err: CoreError = ValidationError::must_be_positive("items.price").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "items.price must be greater than zero");
    }
}
