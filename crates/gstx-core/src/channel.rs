//! # Sales Channel Taxonomy
//!
//! One enum, four marketplaces. Channel-specific behavior (tax rules, pivot
//! dimensions, invoice prefixes, expense catalogs) lives in the stage crates
//! and matches exhaustively on this type.

use serde::{Deserialize, Serialize};

/// A supported e-commerce report channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Amazon Monthly Transaction Report (B2C sales + refunds).
    AmazonMtr,
    /// Amazon Stock Transfer Report (warehouse transfers, IGST only).
    AmazonStr,
    /// Flipkart marketplace sales.
    Flipkart,
    /// Pepperfry marketplace sales with a separate returns file.
    Pepperfry,
}

impl Channel {
    /// Return the string representation of this channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AmazonMtr => "amazon_mtr",
            Self::AmazonStr => "amazon_str",
            Self::Flipkart => "flipkart",
            Self::Pepperfry => "pepperfry",
        }
    }

    /// The marketplace family, used for expense rule and ledger lookups
    /// where MTR and STR share one catalog.
    pub fn family(&self) -> &'static str {
        match self {
            Self::AmazonMtr | Self::AmazonStr => "amazon",
            Self::Flipkart => "flipkart",
            Self::Pepperfry => "pepperfry",
        }
    }

    /// Title-case marketplace name for ledger labels
    /// (`"Amazon Payable"`, `"Flipkart Haryana"`).
    pub fn title(&self) -> &'static str {
        match self {
            Self::AmazonMtr | Self::AmazonStr => "Amazon",
            Self::Flipkart => "Flipkart",
            Self::Pepperfry => "Pepperfry",
        }
    }

    /// Parse a channel string as it appears in CLI flags and stored rows.
    ///
    /// Bare `"amazon"` resolves to the MTR report, matching the driver
    /// contract.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "amazon" | "amazon_mtr" => Some(Self::AmazonMtr),
            "amazon_str" => Some(Self::AmazonStr),
            "flipkart" => Some(Self::Flipkart),
            "pepperfry" => Some(Self::Pepperfry),
            _ => None,
        }
    }

    /// Return all channel variants.
    pub fn all() -> &'static [Channel] {
        &[
            Self::AmazonMtr,
            Self::AmazonStr,
            Self::Flipkart,
            Self::Pepperfry,
        ]
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_family_alias() {
        assert_eq!(Channel::parse("amazon"), Some(Channel::AmazonMtr));
        assert_eq!(Channel::parse("AMAZON_STR"), Some(Channel::AmazonStr));
        assert_eq!(Channel::parse("myntra"), None);
    }

    #[test]
    fn serde_roundtrip() {
        for ch in Channel::all() {
            let json = serde_json::to_string(ch).unwrap();
            let parsed: Channel = serde_json::from_str(&json).unwrap();
            assert_eq!(*ch, parsed);
        }
    }

    #[test]
    fn family_and_title() {
        assert_eq!(Channel::AmazonStr.family(), "amazon");
        assert_eq!(Channel::Pepperfry.title(), "Pepperfry");
    }
}
