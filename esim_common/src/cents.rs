use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "USD";

//--------------------------------------       Cents         ---------------------------------------------------------
/// A monetary amount in the minor unit of its currency (cents for USD/EUR).
///
/// Provider prices and customer prices are always stored in minor units so that margin arithmetic never accumulates
/// floating point error in the database.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Cents(i64);

op!(binary Cents, Add, add);
op!(binary Cents, Sub, sub);
op!(inplace Cents, SubAssign, sub_assign);
op!(unary Cents, Neg, neg);

impl Mul<i64> for Cents {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<f64> for Cents {
    type Error = CentsConversionError;

    /// Converts a major-unit amount (e.g. `4.5` dollars) into cents, rounding half away from zero.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(CentsConversionError(format!("{value} is not a finite amount")));
        }
        let cents = (value * 100.0).round();
        if cents > i64::MAX as f64 || cents < i64::MIN as f64 {
            return Err(CentsConversionError(format!("{value} is out of range")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(cents as i64))
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Applies a percentage markup, rounding to the nearest cent. A margin of `15.0` turns 1000 into 1150.
    pub fn with_margin(&self, margin_percent: f64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let marked_up = (self.0 as f64 * (1.0 + margin_percent / 100.0)).round() as i64;
        Self(marked_up)
    }
}
