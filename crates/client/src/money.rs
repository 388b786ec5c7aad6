//! Fixed-point money and VAT rates.
//!
//! Amounts are integer minor units (pence). Never float. The remote API
//! speaks JSON decimal numbers, so (de)serialization converts at the edge:
//! numbers are formatted to 2 decimal places then parsed with integer math,
//! strings are parsed directly.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Currency this integration books everything in.
pub const CURRENCY: &str = "GBP";

/// A monetary amount in minor units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Decimal value for the wire.
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_hundredths(self.0))
    }
}

impl FromStr for Money {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hundredths(s).map(Money)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(HundredthsVisitor).map(Money)
    }
}

/// A VAT rate in basis points (20% = 2000).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VatRate(i64);

impl VatRate {
    pub const STANDARD: VatRate = VatRate(2000);

    pub const fn from_basis_points(bp: i64) -> Self {
        VatRate(bp)
    }

    /// Rounded to the nearest basis point.
    pub fn from_percent(percent: f64) -> Self {
        VatRate((percent * 100.0).round() as i64)
    }

    pub const fn basis_points(self) -> i64 {
        self.0
    }

    pub fn as_percent(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// `round(amount × rate / 100, 2)`, half-up. Saturates at the i64 range.
    pub fn apply(self, amount: Money) -> Money {
        Money(round_div(amount.minor().saturating_mul(self.0), 10_000))
    }
}

impl Default for VatRate {
    fn default() -> Self {
        VatRate::STANDARD
    }
}

impl fmt::Display for VatRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", format_hundredths(self.0))
    }
}

impl Serialize for VatRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_percent())
    }
}

impl<'de> Deserialize<'de> for VatRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(HundredthsVisitor).map(VatRate)
    }
}

/// Integer division rounded half away from zero.
pub fn round_div(numerator: i64, denominator: i64) -> i64 {
    debug_assert!(denominator > 0);
    let half = denominator / 2;
    if numerator >= 0 {
        numerator.saturating_add(half) / denominator
    } else {
        -(numerator.saturating_neg().saturating_add(half) / denominator)
    }
}

/// Parse a decimal string to hundredths.
/// Handles "1234.56", "1234.5", "1234", "-1234.56". One leading minus at most.
pub fn parse_hundredths(s: &str) -> Result<i64, String> {
    let text = s.trim();
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, frac) = match unsigned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (unsigned, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(format!("bad amount {:?}", text));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("bad amount {:?}", text));
    }
    let w: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|e| format!("bad amount {:?}: {}", text, e))?
    };
    let c: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|e| format!("bad fraction: {}", e))? * 10,
        2 => frac.parse().map_err(|e| format!("bad fraction: {}", e))?,
        _ => return Err(format!("too many decimal places: {}", text)),
    };
    let value = w
        .checked_mul(100)
        .and_then(|v| v.checked_add(c))
        .ok_or_else(|| format!("amount overflow: {}", text))?;
    Ok(if negative { -value } else { value })
}

fn format_hundredths(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

struct HundredthsVisitor;

impl<'de> Visitor<'de> for HundredthsVisitor {
    type Value = i64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal number or numeric string with at most 2 decimal places")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
        v.checked_mul(100).ok_or_else(|| E::custom("amount overflow"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
        i64::try_from(v)
            .ok()
            .and_then(|v| v.checked_mul(100))
            .ok_or_else(|| E::custom("amount overflow"))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
        if !v.is_finite() {
            return Err(E::custom("amount is not finite"));
        }
        parse_hundredths(&format!("{:.2}", v)).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
        parse_hundredths(v).map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hundredths() {
        assert_eq!(parse_hundredths("1080.47").unwrap(), 108047);
        assert_eq!(parse_hundredths("0.01").unwrap(), 1);
        assert_eq!(parse_hundredths("100").unwrap(), 10000);
        assert_eq!(parse_hundredths("-500.25").unwrap(), -50025);
        assert_eq!(parse_hundredths("10.5").unwrap(), 1050);
        assert_eq!(parse_hundredths(".5").unwrap(), 50);
        assert_eq!(parse_hundredths("  42  ").unwrap(), 4200);
        assert!(parse_hundredths("10.123").is_err());
        assert!(parse_hundredths("abc").is_err());
        assert!(parse_hundredths("1.-5").is_err());
        assert!(parse_hundredths("1.+5").is_err());
        assert!(parse_hundredths("--5").is_err());
        assert!(parse_hundredths("+5").is_err());
        assert!(parse_hundredths("-").is_err());
        assert!(parse_hundredths(".").is_err());
        assert!(parse_hundredths("").is_err());
        assert!(parse_hundredths("92233720368547758.08").is_err());
    }

    #[test]
    fn test_malformed_wire_string_rejected() {
        assert!(serde_json::from_str::<Money>("\"1.-5\"").is_err());
        assert!("1.+5".parse::<Money>().is_err());
        assert_eq!("-5".parse::<Money>().unwrap(), Money::from_minor(-500));
    }

    #[test]
    fn test_extreme_amounts_saturate() {
        let max = Money::from_minor(i64::MAX);
        assert_eq!(max + Money::from_minor(1), max);
        assert_eq!(Money::from_minor(i64::MIN) - Money::from_minor(1), Money::from_minor(i64::MIN));
        assert_eq!(VatRate::STANDARD.apply(max), Money::from_minor(i64::MAX / 10_000));
        assert_eq!(VatRate::STANDARD.apply(Money::from_minor(i64::MIN)).minor(), -(i64::MAX / 10_000));
    }

    #[test]
    fn test_round_div_half_up() {
        assert_eq!(round_div(5, 10), 1);
        assert_eq!(round_div(4, 10), 0);
        assert_eq!(round_div(-5, 10), -1);
        assert_eq!(round_div(-4, 10), 0);
        assert_eq!(round_div(15_000, 10_000), 2);
    }

    #[test]
    fn test_vat_rate_apply() {
        assert_eq!(VatRate::STANDARD.apply(Money::from_minor(10000)), Money::from_minor(2000));
        // 12.34 × 20% = 2.468 → 2.47
        assert_eq!(VatRate::STANDARD.apply(Money::from_minor(1234)), Money::from_minor(247));
        // 0.25 × 20% = 0.05 exactly
        assert_eq!(VatRate::STANDARD.apply(Money::from_minor(25)), Money::from_minor(5));
        // 0.01 × 17.5% = 0.00175 → 0.00
        assert_eq!(VatRate::from_percent(17.5).apply(Money::from_minor(1)), Money::ZERO);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_minor(108047).to_string(), "1080.47");
        assert_eq!(Money::from_minor(5).to_string(), "0.05");
        assert_eq!(Money::from_minor(-50025).to_string(), "-500.25");
        assert_eq!(VatRate::from_percent(17.5).to_string(), "17.50%");
    }

    #[test]
    fn test_money_serde_number() {
        let m: Money = serde_json::from_str("99.99").unwrap();
        assert_eq!(m.minor(), 9999);
        let m: Money = serde_json::from_str("100").unwrap();
        assert_eq!(m.minor(), 10000);
        let m: Money = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(m.minor(), 1250);
        assert_eq!(serde_json::to_value(Money::from_minor(1250)).unwrap(), serde_json::json!(12.5));
    }

    #[test]
    fn test_money_sum() {
        let items = [Money::from_minor(100), Money::from_minor(250)];
        let total: Money = items.iter().sum();
        assert_eq!(total, Money::from_minor(350));
    }

    #[test]
    fn test_vat_rate_serde() {
        let r: VatRate = serde_json::from_str("20").unwrap();
        assert_eq!(r, VatRate::STANDARD);
        assert_eq!(serde_json::to_value(VatRate::from_percent(17.5)).unwrap(), serde_json::json!(17.5));
    }
}
