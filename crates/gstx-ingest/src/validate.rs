//! # Schema Validator
//!
//! Checks a normalized table (or raw headers) against a required-field set.
//! Validation never throws: the report lists every missing field so the
//! operator fixes the input once, not once per field.

use serde::{Deserialize, Serialize};

/// Fields every canonical row must carry for downstream stages to work.
pub const SEMANTIC_REQUIRED: &[&str] = &["invoice_date", "gst_rate", "state_code"];

/// Default required set for normalized sales data.
pub const STANDARD_REQUIRED: &[&str] = &[
    "invoice_date",
    "type",
    "order_id",
    "sku",
    "quantity",
    "taxable_value",
    "gst_rate",
    "state_code",
    "channel",
    "gstin",
    "month",
];

/// Result of a schema validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether every required field was present.
    pub success: bool,
    /// Fields that were missing, in required-set order.
    pub missing: Vec<String>,
    /// Schema contract version.
    pub schema_version: String,
}

/// Validates header sets against required-field lists.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    required: Vec<String>,
}

impl SchemaValidator {
    /// Validator over the standard canonical schema.
    pub fn standard() -> Self {
        Self {
            required: STANDARD_REQUIRED.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Validator over a caller-supplied required set. The semantic triplet
    /// is always enforced on top of it.
    pub fn with_required(required: impl IntoIterator<Item = String>) -> Self {
        let mut required: Vec<String> = required.into_iter().collect();
        for field in SEMANTIC_REQUIRED {
            if !required.iter().any(|r| r == field) {
                required.push(field.to_string());
            }
        }
        Self { required }
    }

    /// Validate a header set.
    pub fn validate(&self, headers: &[String]) -> ValidationReport {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|field| !headers.iter().any(|h| h == *field))
            .cloned()
            .collect();
        ValidationReport {
            success: missing.is_empty(),
            missing,
            schema_version: "1.0".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reports_all_missing_fields() {
        let validator = SchemaValidator::standard();
        let report = validator.validate(&headers(&["invoice_date", "sku", "quantity"]));
        assert!(!report.success);
        assert!(report.missing.contains(&"gst_rate".to_string()));
        assert!(report.missing.contains(&"state_code".to_string()));
        assert!(report.missing.contains(&"taxable_value".to_string()));
    }

    #[test]
    fn passes_full_schema() {
        let validator = SchemaValidator::standard();
        let report = validator.validate(&headers(STANDARD_REQUIRED));
        assert!(report.success);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn semantic_triplet_always_enforced() {
        let validator = SchemaValidator::with_required(vec!["order_id".to_string()]);
        let report = validator.validate(&headers(&["order_id"]));
        assert!(!report.success);
        assert_eq!(
            report.missing,
            headers(&["invoice_date", "gst_rate", "state_code"])
        );
    }
}
