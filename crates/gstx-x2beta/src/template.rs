//! # Template Registry
//!
//! Associates each company GSTIN with its X2Beta template registration.
//! Templates are fixed-schema — the registration carries the display
//! metadata (template file name, company name, state label) that lands in
//! the workbook's header zone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::X2BetaError;

/// Template registration for one GSTIN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateEntry {
    /// Template file name recorded with each export.
    pub template_name: String,
    /// Company display name for the header zone.
    pub company_name: String,
    /// Registered state label.
    pub state_name: String,
}

/// Registry of per-GSTIN template registrations.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    entries: BTreeMap<String, TemplateEntry>,
}

impl TemplateRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the standard company registrations.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (gstin, company, state) in [
            ("06ABGCS4796R1ZA", "Zaggle Haryana Private Limited", "HARYANA"),
            ("07ABGCS4796R1Z8", "Zaggle Delhi Private Limited", "DELHI"),
            ("09ABGCS4796R1Z4", "Zaggle Uttar Pradesh Private Limited", "UTTAR PRADESH"),
            ("24ABGCS4796R1ZC", "Zaggle Gujarat Private Limited", "GUJARAT"),
            ("29ABGCS4796R1Z2", "Zaggle Karnataka Private Limited", "KARNATAKA"),
        ] {
            registry.register(gstin, sales_entry(gstin, company, state));
        }
        registry
    }

    /// Register (or replace) a GSTIN's template.
    pub fn register(&mut self, gstin: impl Into<String>, entry: TemplateEntry) {
        self.entries.insert(gstin.into(), entry);
    }

    /// Look up a GSTIN's registration.
    pub fn get(&self, gstin: &str) -> Option<&TemplateEntry> {
        self.entries.get(gstin)
    }

    /// Look up a registration or fail with the `EXP-001` error.
    pub fn require(&self, gstin: &str) -> Result<&TemplateEntry, X2BetaError> {
        let entry = self
            .entries
            .get(gstin)
            .ok_or_else(|| X2BetaError::TemplateMissing(gstin.to_string()))?;
        if entry.template_name.is_empty() || entry.company_name.is_empty() {
            return Err(X2BetaError::TemplateInvalid {
                gstin: gstin.to_string(),
                reason: "registration is missing template or company name".into(),
            });
        }
        Ok(entry)
    }

    /// Registration for expense exports: a dedicated expense template when
    /// present, else the sales template as fallback.
    pub fn require_expense(&self, gstin: &str) -> Result<TemplateEntry, X2BetaError> {
        let base = self.require(gstin)?;
        let expense_name = base
            .template_name
            .replace("Sales Template", "Expense Template");
        Ok(TemplateEntry {
            template_name: expense_name,
            company_name: base.company_name.clone(),
            state_name: base.state_name.clone(),
        })
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn sales_entry(gstin: &str, company: &str, state: &str) -> TemplateEntry {
    TemplateEntry {
        template_name: format!("X2Beta Sales Template - {gstin}.xlsx"),
        company_name: company.to_string(),
        state_name: state.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_company_gstins() {
        let registry = TemplateRegistry::with_defaults();
        assert_eq!(registry.len(), 5);
        let entry = registry.require("06ABGCS4796R1ZA").unwrap();
        assert_eq!(entry.state_name, "HARYANA");
        assert_eq!(
            entry.template_name,
            "X2Beta Sales Template - 06ABGCS4796R1ZA.xlsx"
        );
    }

    #[test]
    fn missing_gstin_is_exp_001() {
        let registry = TemplateRegistry::with_defaults();
        assert!(matches!(
            registry.require("33ZZZZZ0000Z1Z9"),
            Err(X2BetaError::TemplateMissing(_))
        ));
    }

    #[test]
    fn expense_entry_renames_template() {
        let registry = TemplateRegistry::with_defaults();
        let entry = registry.require_expense("06ABGCS4796R1ZA").unwrap();
        assert_eq!(
            entry.template_name,
            "X2Beta Expense Template - 06ABGCS4796R1ZA.xlsx"
        );
    }
}
