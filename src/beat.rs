use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use num_bigint::BigInt;
use num_rational::{BigRational, Ratio};
use num_traits::{CheckedAdd, CheckedSub, Signed, ToPrimitive, Zero};

use crate::decimal::Decimal;
use crate::error::Error;

pub const BEATS_PER_MEASURE: i64 = 4;
pub const ROWS_PER_BEAT: i64 = 48;
pub const ROWS_PER_MEASURE: i64 = ROWS_PER_BEAT * BEATS_PER_MEASURE;

/// An exact position on the musical timeline, measured in beats.
///
/// Beats built from an explicit fraction keep that fraction; beats built from
/// floats or decimal text are rounded to the nearest tick (1/48 of a beat,
/// one row of a 192nd-note measure). Equality and ordering are exact; use
/// [`Beat::same_tick`] to compare at tick resolution.
///
/// Operators panic on `i64` overflow, like the integer operators they wrap.
/// The `checked_*` methods return `None` instead.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Beat(Ratio<i64>);

impl Beat {
    /// Exact fraction `numer / denom`. Panics if `denom` is zero.
    pub fn new(numer: i64, denom: i64) -> Self {
        Self(Ratio::new(numer, denom))
    }

    pub fn from_int(beat: i64) -> Self {
        Self(Ratio::from_integer(beat))
    }

    pub fn zero() -> Self {
        Self(Ratio::zero())
    }

    /// One tick, 1/48 of a beat.
    pub fn tick() -> Self {
        Self::new(1, ROWS_PER_BEAT)
    }

    pub fn from_row(row: i64) -> Self {
        Self::new(row, ROWS_PER_BEAT)
    }

    #[inline(always)]
    pub fn from_f64(beat: f64) -> Self {
        if !beat.is_finite() {
            return Self::zero();
        }
        Self::from_row((beat * ROWS_PER_BEAT as f64).round() as i64)
    }

    /// Rounds an arbitrary-precision value to the nearest tick, or `None` when
    /// that row does not fit in an `i64`.
    pub fn checked_from_big(value: &BigRational) -> Option<Self> {
        let rows = (value * BigRational::from_integer(BigInt::from(ROWS_PER_BEAT))).round();
        rows.to_integer().to_i64().map(Self::from_row)
    }

    /// Like [`Beat::checked_from_big`], saturating at the `i64` row range.
    pub fn from_big_rounded(value: &BigRational) -> Self {
        Self::checked_from_big(value).unwrap_or_else(|| {
            Self::from_row(if value.is_negative() { i64::MIN } else { i64::MAX })
        })
    }

    pub fn numer(&self) -> i64 {
        *self.0.numer()
    }

    pub fn denom(&self) -> i64 {
        *self.0.denom()
    }

    pub fn round_to_tick(self) -> Self {
        Self::from_big_rounded(&self.to_big())
    }

    pub fn is_on_tick(&self) -> bool {
        ROWS_PER_BEAT % self.denom() == 0
    }

    pub fn same_tick(&self, other: &Self) -> bool {
        self.round_to_tick() == other.round_to_tick()
    }

    /// The nearest row index at 48 rows per beat.
    pub fn row(&self) -> i64 {
        let tick = self.round_to_tick();
        tick.numer() * (ROWS_PER_BEAT / tick.denom())
    }

    /// Zero-based measure index (4 beats per measure), flooring.
    pub fn measure(&self) -> i64 {
        (self.0 / Ratio::from_integer(BEATS_PER_MEASURE)).floor().to_integer()
    }

    /// Position within the measure, in `[0, 4)`.
    pub fn beat_in_measure(&self) -> Self {
        Self(self.0 - Ratio::from_integer(self.measure() * BEATS_PER_MEASURE))
    }

    pub fn to_f64(&self) -> f64 {
        self.numer() as f64 / self.denom() as f64
    }

    pub fn to_big(&self) -> BigRational {
        BigRational::new(BigInt::from(self.numer()), BigInt::from(self.denom()))
    }

    pub fn is_negative(&self) -> bool {
        self.numer() < 0
    }

    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        self.0.checked_add(&other.0).map(Self)
    }

    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        self.0.checked_sub(&other.0).map(Self)
    }
}

impl From<i64> for Beat {
    fn from(beat: i64) -> Self {
        Self::from_int(beat)
    }
}

impl Add for Beat {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        match self.checked_add(&rhs) {
            Some(sum) => sum,
            None => panic!("beat addition overflowed: {self:?} + {rhs:?}"),
        }
    }
}

impl Sub for Beat {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        match self.checked_sub(&rhs) {
            Some(diff) => diff,
            None => panic!("beat subtraction overflowed: {self:?} - {rhs:?}"),
        }
    }
}

impl Neg for Beat {
    type Output = Self;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl PartialEq<i64> for Beat {
    fn eq(&self, other: &i64) -> bool {
        self.0 == Ratio::from_integer(*other)
    }
}

impl PartialOrd<i64> for Beat {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        Some(self.0.cmp(&Ratio::from_integer(*other)))
    }
}

/// Parses MSD decimal text (`"1.500"`), rounding to the nearest tick.
impl FromStr for Beat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal: Decimal = s.parse()?;
        Self::checked_from_big(decimal.value())
            .ok_or_else(|| Error::format(format!("beat {} is out of range", s.trim())))
    }
}

/// MSD representation: three decimal places.
impl fmt::Display for Beat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.to_f64())
    }
}

impl fmt::Debug for Beat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_on_tick() {
            let text = format!("{self}");
            let text = text.trim_end_matches('0').trim_end_matches('.');
            write!(f, "Beat({text})")
        } else {
            write!(f, "Beat({}/{})", self.numer(), self.denom())
        }
    }
}

impl serde::Serialize for Beat {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_construction_rounds_to_tick() {
        assert_eq!(Beat::from_f64(0.5), Beat::new(1, 2));
        assert_eq!(Beat::from_f64(1.0 / 3.0), Beat::new(1, 3));
        assert_eq!(Beat::from_f64(0.001), Beat::zero());
        assert_eq!(Beat::from_f64(0.011), Beat::tick());
    }

    #[test]
    fn explicit_fraction_is_preserved() {
        let beat = Beat::new(1, 7);
        assert!(!beat.is_on_tick());
        assert_eq!(beat.denom(), 7);
        assert_eq!(beat.round_to_tick(), Beat::new(7, 48));
        assert!(beat.same_tick(&Beat::new(7, 48)));
        assert_ne!(beat, Beat::new(7, 48));
    }

    #[test]
    fn parses_and_formats_msd_text() {
        let beat: Beat = "2.500".parse().unwrap();
        assert_eq!(beat, Beat::new(5, 2));
        assert_eq!(beat.to_string(), "2.500");
        assert_eq!(Beat::from_int(-1).to_string(), "-1.000");
        assert_eq!("0.3333".parse::<Beat>().unwrap(), Beat::new(1, 3));
        assert!("beat".parse::<Beat>().is_err());
    }

    #[test]
    fn rejects_beats_past_the_row_range() {
        let err = "999999999999999999999.000".parse::<Beat>().unwrap_err();
        assert!(matches!(err, Error::Format { .. }), "{err}");
        assert!("-999999999999999999999.000".parse::<Beat>().is_err());
        let far: Beat = "100000000000000000.000".parse().unwrap();
        assert_eq!(far, Beat::from_int(100_000_000_000_000_000));
    }

    #[test]
    fn debug_output() {
        assert_eq!(format!("{:?}", Beat::new(3, 2)), "Beat(1.5)");
        assert_eq!(format!("{:?}", Beat::from_int(4)), "Beat(4)");
        assert_eq!(format!("{:?}", Beat::new(1, 7)), "Beat(1/7)");
    }

    #[test]
    fn measure_helpers() {
        assert_eq!(Beat::new(9, 2).measure(), 1);
        assert_eq!(Beat::new(9, 2).beat_in_measure(), Beat::new(1, 2));
        assert_eq!(Beat::from_int(-1).measure(), -1);
        assert_eq!(Beat::new(3, 2).row(), 72);
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let huge = Beat::from_int(i64::MAX);
        assert!(huge.checked_add(&Beat::from_int(1)).is_none());
        assert_eq!(Beat::from_int(1) + Beat::new(1, 2), Beat::new(3, 2));
        assert_eq!(Beat::from_int(1) - Beat::from_int(2), Beat::from_int(-1));
    }
}
