//! # Error Code Catalog
//!
//! The closed set of defect codes. Each definition fixes the severity and
//! workflow flags once, so every detection pass and report agrees on what a
//! given code means.

use gstx_core::Severity;

/// Exceptions are persisted in batches of this size.
pub const EXCEPTION_BATCH_SIZE: usize = 100;

/// Definition of one error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDefinition {
    /// Code (`"MAP-001"`).
    pub code: &'static str,
    /// Category prefix (`"MAP"`).
    pub category: &'static str,
    /// Short name.
    pub name: &'static str,
    /// Default message.
    pub description: &'static str,
    /// Severity.
    pub severity: Severity,
    /// Whether the system may resolve it without a human.
    pub auto_resolve: bool,
    /// Whether it feeds the approval queue.
    pub requires_approval: bool,
}

/// The full catalog.
pub const ERROR_DEFINITIONS: &[ErrorDefinition] = &[
    // Mapping (MAP-xxx)
    ErrorDefinition { code: "MAP-001", category: "MAP", name: "Missing SKU Mapping", description: "SKU not found in item master", severity: Severity::Warning, auto_resolve: true, requires_approval: true },
    ErrorDefinition { code: "MAP-002", category: "MAP", name: "Missing ASIN Mapping", description: "ASIN not found in item master", severity: Severity::Warning, auto_resolve: true, requires_approval: true },
    ErrorDefinition { code: "MAP-003", category: "MAP", name: "Ambiguous SKU Mapping", description: "Multiple Final Goods found for one SKU", severity: Severity::Warning, auto_resolve: false, requires_approval: true },
    ErrorDefinition { code: "MAP-004", category: "MAP", name: "Invalid Final Goods Name", description: "Final Goods name malformed", severity: Severity::Error, auto_resolve: false, requires_approval: true },
    // Ledger (LED-xxx)
    ErrorDefinition { code: "LED-001", category: "LED", name: "Missing Ledger Mapping", description: "Channel and state combination not in ledger master", severity: Severity::Warning, auto_resolve: true, requires_approval: true },
    ErrorDefinition { code: "LED-002", category: "LED", name: "Invalid State Code", description: "State code not recognized", severity: Severity::Error, auto_resolve: false, requires_approval: true },
    ErrorDefinition { code: "LED-003", category: "LED", name: "Invalid Channel Name", description: "Channel not supported", severity: Severity::Error, auto_resolve: false, requires_approval: false },
    ErrorDefinition { code: "LED-004", category: "LED", name: "Duplicate Ledger Mapping", description: "Multiple ledgers for one channel-state key", severity: Severity::Warning, auto_resolve: false, requires_approval: true },
    // GST (GST-xxx)
    ErrorDefinition { code: "GST-001", category: "GST", name: "Invalid GST Rate", description: "GST rate not in the allowed slab set", severity: Severity::Error, auto_resolve: false, requires_approval: true },
    ErrorDefinition { code: "GST-002", category: "GST", name: "GST Calculation Mismatch", description: "Computed GST diverges from the expected amount", severity: Severity::Error, auto_resolve: false, requires_approval: false },
    ErrorDefinition { code: "GST-003", category: "GST", name: "Missing GST Rate", description: "No GST rate on a taxable transaction", severity: Severity::Error, auto_resolve: false, requires_approval: true },
    ErrorDefinition { code: "GST-004", category: "GST", name: "Interstate Detection Error", description: "Cannot determine intrastate vs interstate", severity: Severity::Error, auto_resolve: false, requires_approval: false },
    // Invoice (INV-xxx)
    ErrorDefinition { code: "INV-001", category: "INV", name: "Duplicate Invoice Number", description: "Invoice number already exists", severity: Severity::Error, auto_resolve: false, requires_approval: true },
    ErrorDefinition { code: "INV-002", category: "INV", name: "Invalid Invoice Format", description: "Invoice number off the channel pattern", severity: Severity::Warning, auto_resolve: true, requires_approval: false },
    ErrorDefinition { code: "INV-003", category: "INV", name: "Invoice Date Invalid", description: "Invoice date unparseable or out of range", severity: Severity::Error, auto_resolve: false, requires_approval: true },
    ErrorDefinition { code: "INV-004", category: "INV", name: "Invoice Sequence Gap", description: "Gap in the invoice number sequence", severity: Severity::Warning, auto_resolve: false, requires_approval: true },
    // Schema (SCH-xxx)
    ErrorDefinition { code: "SCH-001", category: "SCH", name: "Missing Required Column", description: "Required column missing from input", severity: Severity::Critical, auto_resolve: false, requires_approval: false },
    ErrorDefinition { code: "SCH-002", category: "SCH", name: "Invalid Data Type", description: "Non-numeric value where numeric required", severity: Severity::Error, auto_resolve: false, requires_approval: false },
    ErrorDefinition { code: "SCH-003", category: "SCH", name: "Data Out of Range", description: "Numeric value outside the acceptable range", severity: Severity::Warning, auto_resolve: false, requires_approval: true },
    ErrorDefinition { code: "SCH-004", category: "SCH", name: "Invalid Date Format", description: "Date column holds an unparseable value", severity: Severity::Error, auto_resolve: false, requires_approval: false },
    // Export (EXP-xxx)
    ErrorDefinition { code: "EXP-001", category: "EXP", name: "Template Not Found", description: "No X2Beta template for the GSTIN", severity: Severity::Critical, auto_resolve: false, requires_approval: false },
    ErrorDefinition { code: "EXP-002", category: "EXP", name: "Template Validation Failed", description: "X2Beta template structure invalid", severity: Severity::Error, auto_resolve: false, requires_approval: false },
    ErrorDefinition { code: "EXP-003", category: "EXP", name: "Export File Creation Failed", description: "Could not write the export workbook", severity: Severity::Error, auto_resolve: false, requires_approval: false },
    ErrorDefinition { code: "EXP-004", category: "EXP", name: "Data Mapping Error", description: "Batch data could not map onto the voucher schema", severity: Severity::Error, auto_resolve: false, requires_approval: false },
    // Data quality (DAT-xxx)
    ErrorDefinition { code: "DAT-001", category: "DAT", name: "Negative Amount", description: "Negative value in an amount field", severity: Severity::Warning, auto_resolve: true, requires_approval: true },
    ErrorDefinition { code: "DAT-002", category: "DAT", name: "Zero Quantity", description: "Zero or negative quantity on a sale", severity: Severity::Warning, auto_resolve: true, requires_approval: true },
    ErrorDefinition { code: "DAT-003", category: "DAT", name: "Missing Transaction Data", description: "Required transaction value missing", severity: Severity::Error, auto_resolve: false, requires_approval: false },
    ErrorDefinition { code: "DAT-004", category: "DAT", name: "Data Inconsistency", description: "Related fields disagree", severity: Severity::Warning, auto_resolve: false, requires_approval: true },
    // System (SYS-xxx)
    ErrorDefinition { code: "SYS-001", category: "SYS", name: "Database Connection Error", description: "Persistence layer unreachable", severity: Severity::Critical, auto_resolve: false, requires_approval: false },
    ErrorDefinition { code: "SYS-002", category: "SYS", name: "File Access Error", description: "File could not be read or written", severity: Severity::Error, auto_resolve: false, requires_approval: false },
    ErrorDefinition { code: "SYS-003", category: "SYS", name: "Memory Limit Exceeded", description: "Processing exceeded memory limits", severity: Severity::Critical, auto_resolve: false, requires_approval: false },
    ErrorDefinition { code: "SYS-004", category: "SYS", name: "Processing Timeout", description: "Operation timed out", severity: Severity::Error, auto_resolve: false, requires_approval: false },
];

/// Look up a code's definition.
pub fn error_definition(code: &str) -> Option<&'static ErrorDefinition> {
    ERROR_DEFINITIONS.iter().find(|d| d.code == code)
}

/// All definitions in a category.
pub fn definitions_in_category(category: &str) -> Vec<&'static ErrorDefinition> {
    ERROR_DEFINITIONS
        .iter()
        .filter(|d| d.category == category)
        .collect()
}

/// All definitions at a severity.
pub fn definitions_at_severity(severity: Severity) -> Vec<&'static ErrorDefinition> {
    ERROR_DEFINITIONS
        .iter()
        .filter(|d| d.severity == severity)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_codes() {
        let def = error_definition("GST-001").unwrap();
        assert_eq!(def.severity, Severity::Error);
        assert!(def.requires_approval);
        assert!(error_definition("ZZZ-999").is_none());
    }

    #[test]
    fn categories_are_complete() {
        for category in ["MAP", "LED", "GST", "INV", "SCH", "EXP", "DAT", "SYS"] {
            assert_eq!(definitions_in_category(category).len(), 4, "{category}");
        }
    }

    #[test]
    fn criticals_are_the_halting_set() {
        let criticals: Vec<&str> = definitions_at_severity(Severity::Critical)
            .iter()
            .map(|d| d.code)
            .collect();
        assert_eq!(criticals, vec!["SCH-001", "EXP-001", "SYS-001", "SYS-003"]);
    }

    #[test]
    fn codes_are_unique() {
        let mut seen = std::collections::BTreeSet::new();
        for def in ERROR_DEFINITIONS {
            assert!(seen.insert(def.code), "duplicate {}", def.code);
        }
    }
}
