//! Integer-cent money.
//!
//! Everything priced inside the engine (unit prices, discounts, taxes,
//! totals) is a [`Money`]. Untyped wire and UI numbers come in through
//! `price::to_cents` and go back out through `price::format`:
//!
//! ```text
//!   15.5 │ "15.50" │ "$1,550"  ──to_cents──►  Money(1550)  ──format──►  "$15.50"
//! ```
//!
//! ```rust
//! use corepos_core::money::Money;
//!
//! let latte = Money::from_cents(450);
//! assert_eq!((latte * 2i64).to_string(), "$9.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// Cents. Serialized as a bare integer (`"price": 1550`), which is what the
/// invoice endpoints expect.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Discounts larger than the subtotal bottom out at zero taxable.
    #[inline]
    pub const fn clamp_non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Tax on this amount, half away from zero, computed in integer ppm.
    ///
    /// ```rust
    /// use corepos_core::money::Money;
    /// use corepos_core::types::TaxRate;
    ///
    /// // 8.875% of $10.00 is 88.75 cents
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_ppm(88_750));
    /// assert_eq!(tax.cents(), 89);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money(scale_rounded(self.0, rate.ppm() as i128, 1_000_000))
    }

    /// The `part / whole` share of this amount, truncated toward zero.
    /// Callers hand the remainder to the other share.
    pub fn share(&self, part: i64, whole: i64) -> Money {
        if whole == 0 {
            return Money(0);
        }
        Money((self.0 as i128 * part as i128 / whole as i128) as i64)
    }

    /// `bps` basis points of this amount (1000 = 10%), nearest cent.
    pub fn percentage_of(&self, bps: u32) -> Money {
        Money(scale_rounded(self.0, bps as i128, 10_000))
    }
}

/// `amount * numerator / denominator`, rounded half away from zero.
///
/// i128 keeps large carts from overflowing the intermediate product.
fn scale_rounded(amount: i64, numerator: i128, denominator: i128) -> i64 {
    let product = amount as i128 * numerator;
    let half = denominator / 2;
    let rounded = if product >= 0 {
        (product + half) / denominator
    } else {
        (product - half) / denominator
    };
    rounded as i64
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

macro_rules! money_op {
    ($trait:ident, $method:ident, $assign:ident, $assign_method:ident, $op:tt) => {
        impl $trait for Money {
            type Output = Money;

            #[inline]
            fn $method(self, rhs: Money) -> Money {
                Money(self.0 $op rhs.0)
            }
        }

        impl $assign for Money {
            #[inline]
            fn $assign_method(&mut self, rhs: Money) {
                *self = *self $op rhs;
            }
        }
    };
}

money_op!(Add, add, AddAssign, add_assign, +);
money_op!(Sub, sub, SubAssign, sub_assign, -);

impl Neg for Money {
    type Output = Money;

    #[inline]
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

/// Line total: unit price times quantity. Saturates at the i64 bounds.
impl Mul<i64> for Money {
    type Output = Money;

    #[inline]
    fn mul(self, qty: i64) -> Money {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}
