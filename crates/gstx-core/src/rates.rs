//! # GST Rate Taxonomy
//!
//! The GST slab set is closed: 0%, 5%, 12%, 18%, 28%. Any other value on an
//! input row is a `GST-001` defect, never a silently-accepted rate.
//!
//! Rates are carried as basis points internally so the intrastate half-split
//! (CGST = SGST = rate/2) stays exact: every slab halves to a whole number
//! of basis points.

use serde::{Deserialize, Serialize};

/// A valid GST rate slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GstRate {
    /// 0% — exempt / zero-rated supplies.
    Zero,
    /// 5%.
    Five,
    /// 12%.
    Twelve,
    /// 18% — the standard marketplace slab.
    Eighteen,
    /// 28%.
    TwentyEight,
}

impl GstRate {
    /// The rate in basis points (18% = 1800).
    pub const fn bps(self) -> i64 {
        match self {
            Self::Zero => 0,
            Self::Five => 500,
            Self::Twelve => 1200,
            Self::Eighteen => 1800,
            Self::TwentyEight => 2800,
        }
    }

    /// Half the rate in basis points — the CGST/SGST component.
    pub const fn half_bps(self) -> i64 {
        self.bps() / 2
    }

    /// The rate as a fraction (18% = 0.18). Presentation/CSV only.
    pub fn as_f64(self) -> f64 {
        self.bps() as f64 / 10_000.0
    }

    /// Whole-percent label used in file names and ledger labels
    /// (`"18"` for 18%, `"0"` for zero-rated).
    pub fn percent_label(self) -> &'static str {
        match self {
            Self::Zero => "0",
            Self::Five => "5",
            Self::Twelve => "12",
            Self::Eighteen => "18",
            Self::TwentyEight => "28",
        }
    }

    /// Map a fractional rate (`0.18`) to a slab. Values off the slab set
    /// return `None` — callers turn that into a `GST-001` exception.
    pub fn from_fraction(rate: f64) -> Option<Self> {
        Self::from_bps((rate * 10_000.0).round() as i64)
    }

    /// Map basis points to a slab.
    pub const fn from_bps(bps: i64) -> Option<Self> {
        match bps {
            0 => Some(Self::Zero),
            500 => Some(Self::Five),
            1200 => Some(Self::Twelve),
            1800 => Some(Self::Eighteen),
            2800 => Some(Self::TwentyEight),
            _ => None,
        }
    }

    /// Return the string representation of this rate.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "0.00",
            Self::Five => "0.05",
            Self::Twelve => "0.12",
            Self::Eighteen => "0.18",
            Self::TwentyEight => "0.28",
        }
    }

    /// Return all rate slabs.
    pub fn all() -> &'static [GstRate] {
        &[
            Self::Zero,
            Self::Five,
            Self::Twelve,
            Self::Eighteen,
            Self::TwentyEight,
        ]
    }
}

impl std::fmt::Display for GstRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slab_set_is_closed() {
        assert_eq!(GstRate::all().len(), 5);
        assert_eq!(GstRate::from_fraction(0.18), Some(GstRate::Eighteen));
        assert_eq!(GstRate::from_fraction(0.05), Some(GstRate::Five));
        assert_eq!(GstRate::from_fraction(0.15), None);
        assert_eq!(GstRate::from_fraction(0.1799), None);
    }

    #[test]
    fn halves_are_exact() {
        for rate in GstRate::all() {
            assert_eq!(rate.half_bps() * 2, rate.bps());
        }
    }

    #[test]
    fn percent_labels() {
        assert_eq!(GstRate::Eighteen.percent_label(), "18");
        assert_eq!(GstRate::Zero.percent_label(), "0");
    }
}
