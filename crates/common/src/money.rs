//! Money held as integer cents.
//!
//! On the wire money is a plain decimal number (`12.5`). Conversion into
//! cents rounds half away from zero, and that is the only rounding rule
//! used anywhere in the order core.

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// Largest magnitude, in cents, that a decimal amount converts exactly.
const MAX_DECIMAL_CENTS: f64 = 9_007_199_254_740_992.0;

/// A monetary amount in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates a money amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a money amount from a decimal value, rounding to the nearest
    /// cent with ties away from zero.
    ///
    /// The scaled value is first snapped to four decimal places so binary
    /// artifacts such as `1.005 * 100 == 100.49999999999999` round as written.
    pub fn from_decimal(value: f64) -> Self {
        let scaled = value * 100.0;
        let snapped = if (scaled * 10_000.0).abs() < MAX_DECIMAL_CENTS {
            (scaled * 10_000.0).round() / 10_000.0
        } else {
            scaled
        };
        Self {
            cents: snapped.round() as i64,
        }
    }

    /// Like [`Money::from_decimal`], but `None` for non-finite values and
    /// for amounts too large to hold exactly in cents.
    pub fn try_from_decimal(value: f64) -> Option<Self> {
        if !value.is_finite() || (value * 100.0).abs() > MAX_DECIMAL_CENTS {
            return None;
        }
        Some(Self::from_decimal(value))
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the amount as a decimal value with two fractional digits.
    pub fn to_decimal(&self) -> f64 {
        self.cents as f64 / 100.0
    }

    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents.checked_mul(i64::from(quantity)).map(Money::from_cents)
    }

    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    pub fn checked_sub(&self, other: Money) -> Option<Money> {
        self.cents.checked_sub(other.cents).map(Money::from_cents)
    }

    pub fn saturating_add(&self, other: Money) -> Money {
        Money::from_cents(self.cents.saturating_add(other.cents))
    }

    /// Absolute distance between two amounts, in cents.
    pub fn abs_diff(&self, other: Money) -> u64 {
        self.cents.abs_diff(other.cents)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.cents -= rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_decimal())
    }
}

struct MoneyVisitor;

impl Visitor<'_> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a finite decimal amount")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() {
            return Err(E::custom("amount must be finite"));
        }
        Money::try_from_decimal(v).ok_or_else(|| E::custom("amount out of range"))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(100)
            .map(Money::from_cents)
            .ok_or_else(|| E::custom("amount out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        i64::try_from(v)
            .map_err(|_| E::custom("amount out of range"))
            .and_then(|v| self.visit_i64(v))
    }

    // Form-encoded clients send amounts as strings.
    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        let parsed: f64 = v
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("invalid amount: {v:?}")))?;
        self.visit_f64(parsed)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}
