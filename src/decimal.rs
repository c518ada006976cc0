use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::error::Error;

/// An exact decimal number as written in MSD timing lists (`"120.000"`).
///
/// The value is held as an exact fraction together with the number of
/// fractional digits it was written with, so unmodified values print back
/// exactly as they were read. Equality and ordering ignore the digit count.
#[derive(Clone)]
pub struct Decimal {
    value: BigRational,
    scale: u32,
}

impl Decimal {
    pub fn new(value: BigRational, scale: u32) -> Self {
        Self { value, scale }
    }

    pub fn from_int(value: i64) -> Self {
        Self::new(BigRational::from_integer(BigInt::from(value)), 0)
    }

    /// Three fractional digits, the way StepMania writes timing values.
    pub fn from_f64(value: f64) -> Self {
        let value = BigRational::from_float(value).unwrap_or_else(BigRational::zero);
        Self::new(value, 3)
    }

    pub fn value(&self) -> &BigRational {
        &self.value
    }

    pub fn into_value(self) -> BigRational {
        self.value
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn to_f64(&self) -> f64 {
        self.value.to_f64().unwrap_or(0.0)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.value.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_negative()
    }

    /// Nearest integer, ties to even.
    pub fn round_half_even(&self) -> BigInt {
        let floor = self.value.floor();
        let frac = &self.value - &floor;
        let floor = floor.to_integer();
        match frac.cmp(&BigRational::new(BigInt::from(1), BigInt::from(2))) {
            Ordering::Less => floor,
            Ordering::Greater => floor + BigInt::from(1),
            Ordering::Equal if (&floor % BigInt::from(2)).is_zero() => floor,
            Ordering::Equal => floor + BigInt::from(1),
        }
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Decimal {}

impl Hash for Decimal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Self::from_int(value)
    }
}

impl FromStr for Decimal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || Error::format(format!("invalid decimal value {trimmed:?}"));

        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };
        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let digits = format!("{int_part}{frac_part}");
        let mut numer: BigInt = if digits.is_empty() {
            BigInt::zero()
        } else {
            digits.parse().map_err(|_| invalid())?
        };
        if negative {
            numer = -numer;
        }
        let scale = u32::try_from(frac_part.len()).map_err(|_| invalid())?;
        let denom = BigInt::from(10u32).pow(scale);
        Ok(Self::new(BigRational::new(numer, denom), scale))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let factor = BigRational::from_integer(BigInt::from(10u32).pow(self.scale));
        let scaled = (&self.value * factor).round().to_integer();
        let negative = scaled.is_negative();
        let digits = scaled.abs().to_string();
        let scale = self.scale as usize;

        if negative {
            f.write_str("-")?;
        }
        if scale == 0 {
            return f.write_str(&digits);
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{int_part}.{frac_part}")
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({self})")
    }
}

impl serde::Serialize for Decimal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
