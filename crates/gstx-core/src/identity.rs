//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the GSTX Stack.
//! Each identifier is a distinct type — you cannot pass a [`RunId`] where a
//! [`Gstin`] is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GstxError;
use crate::states;

/// A unique identifier for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a run identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 15-character Indian GST registration number.
///
/// Validated at construction: length 15, leading state-digit pair, and the
/// standard character classes. The first two digits encode the registered
/// state, which drives the intrastate/interstate decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gstin(String);

impl Gstin {
    /// Validate and construct a GSTIN.
    pub fn new(value: impl Into<String>) -> Result<Self, GstxError> {
        let value = value.into().trim().to_uppercase();
        if value.len() != 15 {
            return Err(GstxError::validation(format!(
                "GSTIN must be 15 characters, got {} ({value:?})",
                value.len()
            )));
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(GstxError::validation(format!(
                "GSTIN contains non-alphanumeric characters: {value:?}"
            )));
        }
        let digits = &value[..2];
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(GstxError::validation(format!(
                "GSTIN must start with a two-digit state code: {value:?}"
            )));
        }
        Ok(Self(value))
    }

    /// Access the GSTIN string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading two state digits (`"06"` for Haryana registrations).
    pub fn state_digits(&self) -> &str {
        &self.0[..2]
    }

    /// The registered state's two-letter abbreviation.
    pub fn state_abbrev(&self) -> &'static str {
        states::abbrev_from_gstin_digits(self.state_digits())
    }
}

impl std::fmt::Display for Gstin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gstin_accepts_valid() {
        let g = Gstin::new("06ABGCS4796R1ZA").unwrap();
        assert_eq!(g.state_digits(), "06");
        assert_eq!(g.state_abbrev(), "HR");
    }

    #[test]
    fn gstin_rejects_bad_length_and_chars() {
        assert!(Gstin::new("06ABC").is_err());
        assert!(Gstin::new("XXABGCS4796R1ZA").is_err());
        assert!(Gstin::new("06ABGCS4796R1Z!").is_err());
    }

    #[test]
    fn gstin_uppercases() {
        let g = Gstin::new("06abgcs4796r1za").unwrap();
        assert_eq!(g.as_str(), "06ABGCS4796R1ZA");
    }
}
