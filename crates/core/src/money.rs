use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Signed amount in the statement currency, held as a binary double.
///
/// Sums are plain left-to-right float additions, so totals carry the same
/// cumulative rounding as the downstream consumers of the aggregates expect
/// (`-0.1 + -0.2` is `-0.30000000000000004`, not `-0.3`).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(f64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid amount '{0}'")]
pub struct ParseMoneyError(pub String);

impl Money {
    pub fn new(value: f64) -> Self {
        Money(value)
    }

    pub fn from_cents(cents: i64) -> Self {
        Money(cents as f64 / 100.0)
    }

    pub fn zero() -> Self {
        Money(0.0)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }

    /// Strictly below zero. A zero amount counts as income everywhere.
    pub fn is_negative(self) -> bool {
        self.0 < 0.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0.0
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Accepts plain decimal notation only. The text is validated as a decimal
/// first so `NaN`, `inf` and exponents are rejected, then read as the
/// nearest double.
impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseMoneyError(s.trim().to_string());
        let decimal = Decimal::from_str(s.trim()).map_err(|_| invalid())?;
        decimal.to_string().parse::<f64>().map(Money).map_err(|_| invalid())
    }
}

impl From<f64> for Money {
    fn from(value: f64) -> Self {
        Money(value)
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
