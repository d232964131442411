//! # Fixed-Precision Money
//!
//! All monetary values in the pipeline are integer paise (1/100 rupee).
//! Conversion from input floats happens exactly once, at the ingestion
//! boundary, rounding half-away-from-zero to 2 decimal places. Everything
//! downstream is integer arithmetic, so totals never drift no matter how
//! many rows a run aggregates.
//!
//! ## Determinism
//!
//! Given identical inputs, every arithmetic path here produces identical
//! output. Tax splits and pivot totals rely on this for audit
//! reproducibility.

use serde::{Deserialize, Serialize};

/// A monetary amount in integer paise.
///
/// Serializes as the raw paise integer. Use [`Money::to_string`] (via
/// `Display`) for the canonical `"1234.56"` form written to CSV and
/// voucher files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Money(i64);

impl Money {
    /// The zero amount.
    pub const ZERO: Money = Money(0);

    /// Construct from raw paise.
    pub const fn from_paise(paise: i64) -> Self {
        Self(paise)
    }

    /// Construct from a rupee float, rounding half-away-from-zero to paise.
    ///
    /// This is the single sanctioned float-to-money conversion. `f64::round`
    /// rounds half-away-from-zero, matching the accounting convention.
    pub fn from_rupees(rupees: f64) -> Self {
        if rupees.is_finite() {
            Self((rupees * 100.0).round() as i64)
        } else {
            tracing::warn!(value = rupees, "non-finite amount coerced to 0");
            Self(0)
        }
    }

    /// Raw paise value.
    pub const fn paise(self) -> i64 {
        self.0
    }

    /// Rupee value as `f64`. Presentation only — never feed back into
    /// arithmetic.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Whether the amount is exactly zero.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Whether the amount is strictly positive.
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Whether the amount is strictly negative.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Absolute value.
    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Multiply by a basis-point rate, rounding half-away-from-zero.
    ///
    /// `Money::from_paise(100_000).times_bps(1800)` is 18% of 1000.00,
    /// i.e. 180.00.
    pub fn times_bps(self, bps: i64) -> Self {
        Self(div_round_half_away(self.0.saturating_mul(bps), 10_000))
    }

    /// Multiply by a `numerator/denominator` ratio, rounding
    /// half-away-from-zero. A zero denominator yields zero.
    pub fn times_ratio(self, numerator: i64, denominator: i64) -> Self {
        if denominator == 0 {
            return Self(0);
        }
        Self(div_round_half_away(
            self.0.saturating_mul(numerator),
            denominator,
        ))
    }

    /// Whether two amounts agree within the given paise tolerance.
    pub fn within(self, other: Money, tolerance_paise: i64) -> bool {
        (self.0 - other.0).abs() <= tolerance_paise
    }

    /// Parse a decimal string (`"1234.56"`, `"1234"`, `"-12.5"`) into money.
    ///
    /// Fractional digits beyond two are truncated; one fractional digit is
    /// scaled (`"4.5"` is 4.50). Returns `None` for unparseable input.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        if let Some(dot) = s.find('.') {
            let int_part = &s[..dot];
            let frac_str = &s[dot + 1..];
            let negative = s.starts_with('-');
            let integer: i64 = if int_part == "-" || int_part.is_empty() {
                0
            } else {
                int_part.parse().ok()?
            };
            let frac: i64 = match frac_str.len() {
                0 => 0,
                1 => frac_str.parse::<i64>().ok()? * 10,
                _ => frac_str[..2].parse::<i64>().ok()?,
            };
            let sign = if negative { -1 } else { 1 };
            integer
                .abs()
                .checked_mul(100)
                .and_then(|v| v.checked_add(frac))
                .map(|v| Self(sign * v))
        } else {
            s.parse::<i64>().ok().and_then(|v| v.checked_mul(100)).map(Self)
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl std::ops::Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

/// Integer division rounding half-away-from-zero.
fn div_round_half_away(numerator: i64, denominator: i64) -> i64 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rupees_rounds_half_away() {
        assert_eq!(Money::from_rupees(10.005).paise(), 1001);
        assert_eq!(Money::from_rupees(-10.005).paise(), -1001);
        assert_eq!(Money::from_rupees(1000.0).paise(), 100_000);
    }

    #[test]
    fn parse_whole_and_decimal() {
        assert_eq!(Money::parse("1000"), Some(Money::from_paise(100_000)));
        assert_eq!(Money::parse("1234.56"), Some(Money::from_paise(123_456)));
        assert_eq!(Money::parse("4.5"), Some(Money::from_paise(450)));
        assert_eq!(Money::parse("-12.50"), Some(Money::from_paise(-1250)));
        assert_eq!(Money::parse("0.01"), Some(Money::from_paise(1)));
        assert_eq!(Money::parse(""), None);
        assert_eq!(Money::parse("abc"), None);
    }

    #[test]
    fn display_roundtrip() {
        assert_eq!(Money::from_paise(123_456).to_string(), "1234.56");
        assert_eq!(Money::from_paise(-1250).to_string(), "-12.50");
        assert_eq!(Money::ZERO.to_string(), "0.00");
        assert_eq!(Money::from_paise(1).to_string(), "0.01");
    }

    #[test]
    fn times_bps_half_away() {
        // 1000.00 at 18% = 180.00
        assert_eq!(
            Money::from_paise(100_000).times_bps(1800),
            Money::from_paise(18_000)
        );
        // 1059.00 at 18% = 190.62
        assert_eq!(
            Money::from_paise(105_900).times_bps(1800),
            Money::from_paise(19_062)
        );
        // 0.03 at 5% = 0.0015 -> 0.00 (rounds to nearest paisa)
        assert_eq!(Money::from_paise(3).times_bps(500), Money::ZERO);
        // negative amounts round away from zero
        assert_eq!(
            Money::from_paise(-100_000).times_bps(1800),
            Money::from_paise(-18_000)
        );
    }

    #[test]
    fn times_ratio_return_adjustment() {
        // 400.00 scaled by 3/4 = 300.00
        assert_eq!(
            Money::from_paise(40_000).times_ratio(3, 4),
            Money::from_paise(30_000)
        );
        assert_eq!(Money::from_paise(40_000).times_ratio(1, 0), Money::ZERO);
    }

    #[test]
    fn sum_and_within() {
        let total: Money = [100, 200, 305]
            .into_iter()
            .map(Money::from_paise)
            .sum();
        assert_eq!(total, Money::from_paise(605));
        assert!(Money::from_paise(605).within(Money::from_paise(606), 1));
        assert!(!Money::from_paise(605).within(Money::from_paise(607), 1));
    }
}
