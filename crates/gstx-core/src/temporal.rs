//! # Temporal Types
//!
//! A processing run is scoped to a calendar month. The [`Month`] newtype
//! enforces the `YYYY-MM` wire format once, at construction, so no stage
//! re-parses month strings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::GstxError;

/// A calendar month in `YYYY-MM` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Month(String);

impl Month {
    /// Validate and construct a month.
    pub fn new(value: impl Into<String>) -> Result<Self, GstxError> {
        let value = value.into().trim().to_string();
        let (year, month) = value
            .split_once('-')
            .ok_or_else(|| GstxError::validation(format!("month must be YYYY-MM: {value:?}")))?;
        let y: i32 = year
            .parse()
            .map_err(|_| GstxError::validation(format!("invalid year in month {value:?}")))?;
        let m: u32 = month
            .parse()
            .map_err(|_| GstxError::validation(format!("invalid month in {value:?}")))?;
        if year.len() != 4 || month.len() != 2 || !(1..=12).contains(&m) || y < 2000 {
            return Err(GstxError::validation(format!(
                "month out of range: {value:?}"
            )));
        }
        Ok(Self(value))
    }

    /// The `YYYY-MM` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two-digit month code (`"08"` for August) used in invoice numbers.
    pub fn month_code(&self) -> &str {
        &self.0[5..7]
    }

    /// Two-digit year (`"25"` for 2025) used in expense voucher numbers.
    pub fn year_code(&self) -> &str {
        &self.0[2..4]
    }

    /// Compact `YYYYMM` form used in synthesized voucher numbers.
    pub fn compact(&self) -> String {
        self.0.replace('-', "")
    }

    /// First day of the month. Voucher dates use this.
    pub fn first_day(&self) -> NaiveDate {
        let y: i32 = self.0[..4].parse().unwrap_or(2000);
        let m: u32 = self.0[5..7].parse().unwrap_or(1);
        NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(NaiveDate::MIN)
    }
}

impl std::fmt::Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Date formats seen across marketplace reports and seller invoices, in
/// priority order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d-%m-%y",
    "%d/%m/%y",
    "%Y/%m/%d",
];

/// Parse a date string in any of the formats upstream reports use.
pub fn parse_flexible_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    // Timestamps reduce to their date part.
    let date_part = s.split(&[' ', 'T'][..]).next().unwrap_or(s);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_parses_and_projects() {
        let m = Month::new("2025-08").unwrap();
        assert_eq!(m.month_code(), "08");
        assert_eq!(m.year_code(), "25");
        assert_eq!(m.compact(), "202508");
        assert_eq!(m.first_day().to_string(), "2025-08-01");
    }

    #[test]
    fn month_rejects_malformed() {
        assert!(Month::new("2025-13").is_err());
        assert!(Month::new("202508").is_err());
        assert!(Month::new("25-08").is_err());
        assert!(Month::new("2025-8").is_err());
    }

    #[test]
    fn flexible_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 8, 14).unwrap();
        assert_eq!(parse_flexible_date("2025-08-14"), Some(expected));
        assert_eq!(parse_flexible_date("14-08-2025"), Some(expected));
        assert_eq!(parse_flexible_date("14/08/25"), Some(expected));
        assert_eq!(parse_flexible_date("2025-08-14 10:30:00"), Some(expected));
        assert_eq!(parse_flexible_date("not a date"), None);
        assert_eq!(parse_flexible_date(""), None);
    }
}
