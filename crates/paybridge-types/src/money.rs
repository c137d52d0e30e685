//! Exact decimal money type
//!
//! `Money` wraps [`rust_decimal::Decimal`] (sign, 96-bit mantissa and scale) so
//! monetary amounts never pass through binary floating point. Every operation
//! returns a new value; operands are never mutated.
//!
//! # Example
//!
//! ```
//! use paybridge_types::Money;
//!
//! let total = Money::parse("100.50")?
//!     .add(&Money::parse("200.25")?)?
//!     .add(&Money::parse("300.75")?)?;
//! assert_eq!(total, Money::parse("601.50")?);
//! assert_eq!(total.to_string(), "601.5");
//! assert_eq!(total.to_fixed(2), "601.50");
//! # Ok::<(), paybridge_types::MoneyError>(())
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Largest number of fractional digits a `Money` can carry
pub const MAX_SCALE: u32 = 28;

/// Errors produced by money parsing and arithmetic
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    /// Input is not a decimal numeral
    #[error("invalid decimal format: {input:?}")]
    Format { input: String },

    /// Division by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Overflow, invalid scale or invalid increment
    #[error("arithmetic error: {0}")]
    Arithmetic(String),
}

/// Result type for money operations
pub type MoneyResult<T> = Result<T, MoneyError>;

/// Immutable exact decimal amount
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    /// Zero
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Parse a decimal numeral: optional sign, digits, optional single point
    pub fn parse(input: &str) -> MoneyResult<Self> {
        if !is_decimal_numeral(input) {
            return Err(MoneyError::Format {
                input: input.to_string(),
            });
        }

        Decimal::from_str_exact(&expand_bare_point(input))
            .map(Self)
            .map_err(|_| MoneyError::Format {
                input: input.to_string(),
            })
    }

    /// Build from any supported input
    ///
    /// This is the constructor API boundaries should use so that strings,
    /// integers and floats all go through the same validation.
    pub fn from_value(value: impl IntoMoney) -> MoneyResult<Self> {
        value.into_money()
    }

    /// Build from a float via its shortest decimal representation
    ///
    /// `0.1_f64` becomes exactly `0.1`, not `0.1000000000000000055511151231257827`.
    pub fn from_f64(value: f64) -> MoneyResult<Self> {
        if !value.is_finite() {
            return Err(MoneyError::Format {
                input: value.to_string(),
            });
        }

        // f64's Display never uses exponent notation
        let repr = value.to_string();
        Decimal::from_str(&repr)
            .map(Self)
            .map_err(|_| MoneyError::Format { input: repr })
    }

    /// Wrap an existing decimal
    pub const fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    /// Underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Number of fractional digits as stored (not normalized)
    pub fn scale(&self) -> u32 {
        self.0.scale()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }

    pub fn is_positive(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_positive()
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }

    pub fn add(&self, other: &Money) -> MoneyResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| MoneyError::Arithmetic(format!("overflow adding {} and {}", self, other)))
    }

    pub fn subtract(&self, other: &Money) -> MoneyResult<Money> {
        self.0.checked_sub(other.0).map(Self).ok_or_else(|| {
            MoneyError::Arithmetic(format!("overflow subtracting {} from {}", other, self))
        })
    }

    pub fn multiply(&self, other: &Money) -> MoneyResult<Money> {
        self.0.checked_mul(other.0).map(Self).ok_or_else(|| {
            MoneyError::Arithmetic(format!("overflow multiplying {} by {}", self, other))
        })
    }

    /// Divide, rounding the quotient to `scale` fractional digits
    ///
    /// Rounding is half away from zero.
    pub fn divide(&self, other: &Money, scale: u32) -> MoneyResult<Money> {
        if other.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        check_scale(scale)?;

        let quotient = self.0.checked_div(other.0).ok_or_else(|| {
            MoneyError::Arithmetic(format!("overflow dividing {} by {}", self, other))
        })?;

        Ok(Self(
            quotient.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero),
        ))
    }

    /// Tri-state numeric comparison
    pub fn compare(&self, other: &Money) -> Ordering {
        self.0.cmp(&other.0)
    }

    /// Round to `scale` fractional digits, half away from zero
    pub fn round(&self, scale: u32) -> MoneyResult<Money> {
        check_scale(scale)?;
        Ok(Self(
            self.0
                .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero),
        ))
    }

    /// Round to the nearest multiple of `increment`, half away from zero
    ///
    /// `Money::parse("10.37")?.round_to_increment(&Money::parse("0.05")?)` is `10.35`.
    pub fn round_to_increment(&self, increment: &Money) -> MoneyResult<Money> {
        if !increment.is_positive() {
            return Err(MoneyError::Arithmetic(format!(
                "rounding increment must be positive, got {}",
                increment
            )));
        }

        let steps = self
            .0
            .checked_div(increment.0)
            .ok_or_else(|| MoneyError::Arithmetic(format!("overflow rounding {}", self)))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        steps
            .checked_mul(increment.0)
            .map(Self)
            .ok_or_else(|| MoneyError::Arithmetic(format!("overflow rounding {}", self)))
    }

    /// Format with exactly `scale` fractional digits, half away from zero
    pub fn to_fixed(&self, scale: u32) -> String {
        let scale = scale.min(MAX_SCALE);
        let mut rounded = self
            .0
            .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(scale);
        if rounded.is_zero() {
            rounded.set_sign_positive(true);
        }
        rounded.to_string()
    }
}

fn check_scale(scale: u32) -> MoneyResult<()> {
    if scale > MAX_SCALE {
        return Err(MoneyError::Arithmetic(format!(
            "scale {} exceeds maximum of {}",
            scale, MAX_SCALE
        )));
    }
    Ok(())
}

/// Optional sign, digits, at most one decimal point, at least one digit
fn is_decimal_numeral(input: &str) -> bool {
    let unsigned = input
        .strip_prefix('-')
        .or_else(|| input.strip_prefix('+'))
        .unwrap_or(input);

    let mut digits = 0usize;
    let mut points = 0usize;
    for c in unsigned.chars() {
        match c {
            '0'..='9' => digits += 1,
            '.' => points += 1,
            _ => return false,
        }
    }

    digits > 0 && points <= 1
}

/// `".5"` → `"0.5"`, `"5."` → `"5"`, `"+5"` → `"5"`
fn expand_bare_point(input: &str) -> String {
    let (sign, unsigned) = match input.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", input.strip_prefix('+').unwrap_or(input)),
    };
    let unsigned = unsigned.strip_suffix('.').unwrap_or(unsigned);
    if unsigned.starts_with('.') {
        format!("{}0{}", sign, unsigned)
    } else {
        format!("{}{}", sign, unsigned)
    }
}

impl fmt::Display for Money {
    /// Canonical form: no trailing fractional zeros, no negative zero
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.normalize(), f)
    }
}

impl fmt::Debug for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Money({})", self)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

/// Conversion into `Money` used by [`Money::from_value`]
pub trait IntoMoney {
    fn into_money(self) -> MoneyResult<Money>;
}

impl IntoMoney for Money {
    fn into_money(self) -> MoneyResult<Money> {
        Ok(self)
    }
}

impl IntoMoney for &Money {
    fn into_money(self) -> MoneyResult<Money> {
        Ok(*self)
    }
}

impl IntoMoney for Decimal {
    fn into_money(self) -> MoneyResult<Money> {
        Ok(Money(self))
    }
}

impl IntoMoney for &str {
    fn into_money(self) -> MoneyResult<Money> {
        Money::parse(self)
    }
}

impl IntoMoney for String {
    fn into_money(self) -> MoneyResult<Money> {
        Money::parse(&self)
    }
}

impl IntoMoney for &String {
    fn into_money(self) -> MoneyResult<Money> {
        Money::parse(self)
    }
}

impl IntoMoney for f64 {
    fn into_money(self) -> MoneyResult<Money> {
        Money::from_f64(self)
    }
}

macro_rules! impl_into_money_for_int {
    ($($t:ty),*) => {
        $(
            impl IntoMoney for $t {
                fn into_money(self) -> MoneyResult<Money> {
                    Ok(Money(Decimal::from(self)))
                }
            }
        )*
    };
}

impl_into_money_for_int!(i32, i64, u32, u64);

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

struct MoneyVisitor;

impl<'de> de::Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Ok(Money(Decimal::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        Ok(Money(Decimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        Money::from_f64(v).map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn m(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    #[test]
    fn test_sum_is_exact() {
        let total = m("100.50").add(&m("200.25")).unwrap().add(&m("300.75")).unwrap();
        assert_eq!(total, m("601.50"));
    }

    #[test]
    fn test_float_classic_case() {
        let sum = Money::from_f64(0.1).unwrap().add(&Money::from_f64(0.2).unwrap()).unwrap();
        assert_eq!(sum, m("0.3"));
    }

    #[test]
    fn test_parse_accepts_numerals() {
        for input in ["0", "10", "-3.5", "+7", ".5", "5.", "0001.2300"] {
            assert!(Money::parse(input).is_ok(), "{input} should parse");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "-", ".", "1.2.3", "1e5", " 1", "1_000", "abc", "--1", "1,5"] {
            assert!(
                matches!(Money::parse(input), Err(MoneyError::Format { .. })),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_canonical_round_trip() {
        for input in ["0001.2300", "-0.000", "42", "-17.250", "0.0000001", "79228162514264337593543950335"] {
            let first = m(input);
            let printed = first.to_string();
            let reparsed = m(&printed);
            assert_eq!(first, reparsed);
            assert_eq!(printed, reparsed.to_string());
        }
        assert_eq!(m("0001.2300").to_string(), "1.23");
        assert_eq!(m("-0.000").to_string(), "0");
    }

    #[test]
    fn test_equality_ignores_trailing_zeros() {
        assert_eq!(m("1.50"), m("1.5"));
        assert_eq!(m("1.50").compare(&m("1.5")), Ordering::Equal);
        assert_eq!(m("2").compare(&m("10")), Ordering::Less);
        assert_eq!(m("-1").compare(&m("-2")), Ordering::Greater);
    }

    #[test]
    fn test_operations_do_not_mutate() {
        let a = m("10.00");
        let b = m("3");
        let _ = a.subtract(&b).unwrap();
        let _ = a.multiply(&b).unwrap();
        assert_eq!(a, m("10"));
        assert_eq!(b, m("3"));
    }

    #[test]
    fn test_divide() {
        assert_eq!(m("10").divide(&m("3"), 2).unwrap(), m("3.33"));
        assert_eq!(m("2").divide(&m("3"), 2).unwrap(), m("0.67"));
        assert_eq!(m("-2").divide(&m("3"), 2).unwrap(), m("-0.67"));
        assert_eq!(m("1").divide(&m("0"), 2), Err(MoneyError::DivisionByZero));
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        assert_eq!(m("2.345").round(2).unwrap(), m("2.35"));
        assert_eq!(m("-2.345").round(2).unwrap(), m("-2.35"));
        assert_eq!(m("2.5").to_fixed(0), "3");
        assert_eq!(m("-2.5").to_fixed(0), "-3");
        assert_eq!(m("1.005").to_fixed(2), "1.01");
        assert_eq!(m("7").to_fixed(2), "7.00");
        assert_eq!(m("-0.001").to_fixed(2), "0.00");
    }

    #[test]
    fn test_round_to_increment() {
        let nickel = m("0.05");
        assert_eq!(m("10.37").round_to_increment(&nickel).unwrap(), m("10.35"));
        assert_eq!(m("10.375").round_to_increment(&nickel).unwrap(), m("10.4"));
        assert_eq!(m("-10.375").round_to_increment(&nickel).unwrap(), m("-10.4"));
        assert!(m("1").round_to_increment(&Money::ZERO).is_err());
    }

    #[test]
    fn test_from_value() {
        assert_eq!(Money::from_value("12.30").unwrap(), m("12.3"));
        assert_eq!(Money::from_value(12_i64).unwrap(), m("12"));
        assert_eq!(Money::from_value(12.3_f64).unwrap(), m("12.3"));
        assert_eq!(Money::from_value(dec!(12.30)).unwrap(), m("12.3"));
        assert!(Money::from_value(f64::NAN).is_err());
        assert!(Money::from_value("12,30").is_err());
    }

    #[test]
    fn test_overflow_is_error() {
        let max = Money::from_decimal(Decimal::MAX);
        assert!(matches!(max.add(&m("1")), Err(MoneyError::Arithmetic(_))));
        assert!(matches!(max.multiply(&m("2")), Err(MoneyError::Arithmetic(_))));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&m("10.50")).unwrap();
        assert_eq!(json, r#""10.5""#);

        let from_str: Money = serde_json::from_str(r#""0.30""#).unwrap();
        let from_num: Money = serde_json::from_str("0.3").unwrap();
        let from_int: Money = serde_json::from_str("7").unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(from_int, m("7"));
        assert!(serde_json::from_str::<Money>(r#""ten""#).is_err());
    }

    #[test]
    fn test_sign_helpers() {
        assert!(m("-1").is_negative());
        assert!(!m("-0").is_negative());
        assert!(m("0.01").is_positive());
        assert_eq!(m("-4.2").abs(), m("4.2"));
        assert_eq!(m("4.2").negate(), m("-4.2"));
    }
}
