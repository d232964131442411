//! # Run Options
//!
//! Explicit option structs for one pipeline invocation — the stage toggles
//! mirror the driver flags one to one.

use std::collections::HashMap;
use std::path::PathBuf;

use gstx_core::{Channel, Gstin, Month};

/// Which stages this run executes. Ingestion always runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageToggles {
    /// Item & ledger master mapping.
    pub mapping: bool,
    /// Tax computation & invoice numbering.
    pub tax_invoice: bool,
    /// Pivot & batch splitting.
    pub pivot_batch: bool,
    /// X2Beta voucher export.
    pub tally_export: bool,
    /// Seller invoice & expense processing.
    pub expense_processing: bool,
    /// Exception detection passes.
    pub exception_handling: bool,
    /// MIS report & audit trail generation.
    pub mis_audit: bool,
}

impl StageToggles {
    /// Everything on.
    pub fn full() -> Self {
        Self {
            mapping: true,
            tax_invoice: true,
            pivot_batch: true,
            tally_export: true,
            expense_processing: true,
            exception_handling: true,
            mis_audit: true,
        }
    }

    /// Normalize implied dependencies: a stage drags in what it consumes.
    pub fn normalized(mut self) -> Self {
        if self.tally_export {
            self.pivot_batch = true;
        }
        if self.pivot_batch {
            self.tax_invoice = true;
        }
        if self.tax_invoice {
            self.mapping = true;
        }
        self
    }
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Channel of the input report.
    pub channel: Channel,
    /// Company GSTIN.
    pub gstin: Gstin,
    /// Processing month.
    pub month: Month,
    /// Primary input report.
    pub input: PathBuf,
    /// Returns report (Pepperfry).
    pub returns: Option<PathBuf>,
    /// ASIN → SKU map (Amazon STR), preloaded.
    pub asin_to_sku: HashMap<String, String>,
    /// Seller invoice files for expense processing.
    pub seller_invoices: Vec<PathBuf>,
    /// Working directory for normalized/batch/export artifacts.
    pub work_dir: PathBuf,
    /// Stage toggles.
    pub stages: StageToggles,
    /// When set, pending approvals are decided (approved) by this
    /// approver at the end of the mapping stage and resolution reruns.
    pub approver: Option<String>,
    /// MIS export formats (`"csv"`, `"excel"`, `"database"`).
    pub mis_formats: Vec<String>,
    /// Worker pool size for row-level work.
    pub workers: usize,
}

impl PipelineRequest {
    /// A request with defaults for the optional surfaces.
    pub fn new(
        channel: Channel,
        gstin: Gstin,
        month: Month,
        input: PathBuf,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            channel,
            gstin,
            month,
            input,
            returns: None,
            asin_to_sku: HashMap::new(),
            seller_invoices: Vec::new(),
            work_dir,
            stages: StageToggles::full(),
            approver: None,
            mis_formats: vec!["csv".into(), "database".into()],
            workers: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_normalize_dependencies() {
        let toggles = StageToggles {
            tally_export: true,
            ..Default::default()
        }
        .normalized();
        assert!(toggles.pivot_batch);
        assert!(toggles.tax_invoice);
        assert!(toggles.mapping);
        assert!(!toggles.expense_processing);
    }
}
