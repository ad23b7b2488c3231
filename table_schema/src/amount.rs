use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Fixed-point chip amount with 6 decimal places of precision.
///
/// The server sends amounts either as JSON numbers or as decimal strings
/// (`"5.00"`). Both normalise to the same raw value, so equality and
/// ordering are always numeric.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(pub i64);

/// Error returned when a decimal string cannot be read as an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("amount is empty")]
    Empty,
    #[error("`{0}` is not a decimal amount")]
    Invalid(String),
    #[error("`{0}` exceeds the amount range")]
    Overflow(String),
}

impl Amount {
    pub const SCALE: i64 = 1_000_000;
    const FRACTION_DIGITS: usize = 6;

    pub fn from_i64(value: i64) -> Self {
        Self(value.saturating_mul(Self::SCALE))
    }

    pub fn checked_from_i64(value: i64) -> Option<Self> {
        value.checked_mul(Self::SCALE).map(Self)
    }

    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let raw = (value * Self::SCALE as f64).round();
        if raw >= i64::MAX as f64 || raw < i64::MIN as f64 {
            return None;
        }
        Some(Self(raw as i64))
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub fn zero() -> Self {
        Self(0)
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    pub fn from_raw(value: i64) -> Self {
        Self(value)
    }

    pub fn is_whole(self) -> bool {
        self.0 % Self::SCALE == 0
    }

    /// Integer part, truncated toward zero.
    pub fn whole(self) -> i64 {
        self.0 / Self::SCALE
    }

    /// Moves `progress` of the way from `self` to `end`.
    ///
    /// `progress == 0.0` returns `self` and `progress == 1.0` returns `end`
    /// bit-exactly; intermediate values round to the nearest raw unit.
    pub fn lerp(self, end: Self, progress: f64) -> Self {
        if progress <= 0.0 {
            return self;
        }
        if progress >= 1.0 {
            return end;
        }
        let span = (end.0 as i128 - self.0 as i128) as f64;
        let offset = (span * progress).round() as i128;
        let raw = (self.0 as i128 + offset).clamp(i64::MIN as i128, i64::MAX as i128);
        Self(raw as i64)
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.is_empty() {
            return Err(AmountParseError::Empty);
        }
        let invalid = || AmountParseError::Invalid(text.to_string());
        let overflow = || AmountParseError::Overflow(text.to_string());

        let (negative, unsigned) = match text.as_bytes()[0] {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let mut raw: i128 = 0;
        for digit in whole.bytes() {
            raw = raw * 10 + i128::from(digit - b'0');
            if raw > i64::MAX as i128 {
                return Err(overflow());
            }
        }
        raw *= Self::SCALE as i128;

        let mut place = Self::SCALE as i128 / 10;
        let mut digits = fraction.bytes();
        for digit in digits.by_ref().take(Self::FRACTION_DIGITS) {
            raw += i128::from(digit - b'0') * place;
            place /= 10;
        }
        if matches!(digits.next(), Some(next) if next >= b'5') {
            raw += 1;
        }
        if negative {
            raw = -raw;
        }
        i64::try_from(raw).map(Self).map_err(|_| overflow())
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0.saturating_neg())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = (self.0 as i128).unsigned_abs();
        let scale = Self::SCALE as u128;
        let whole = magnitude / scale;
        let fraction = magnitude % scale;
        if fraction == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let digits = format!("{fraction:06}");
            write!(f, "{sign}{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({self})")
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number or a decimal string")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Amount, E> {
                Amount::checked_from_i64(value)
                    .ok_or_else(|| E::custom(AmountParseError::Overflow(value.to_string())))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Amount, E> {
                i64::try_from(value)
                    .ok()
                    .and_then(Amount::checked_from_i64)
                    .ok_or_else(|| E::custom(AmountParseError::Overflow(value.to_string())))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Amount, E> {
                Amount::from_f64(value)
                    .ok_or_else(|| E::custom(AmountParseError::Overflow(value.to_string())))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Amount, E> {
                value.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}
