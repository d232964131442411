//! # In-Memory Store
//!
//! The in-process implementation of the table surface. Process-wide
//! resources (masters, invoice registry) sit behind their own locks so
//! writes serialize on the key tuple; run-scoped tables are plain
//! append-only vectors behind one lock each.

use std::collections::BTreeSet;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use gstx_audit::{AuditEntry, MisReport};
use gstx_core::{Month, RunId, RunStatus};
use gstx_exceptions::{ApprovalRequest, ExceptionRecord};
use gstx_expense::{ExpenseExportInfo, SellerInvoiceRecord};
use gstx_masters::{ItemMasterTable, LedgerMasterTable};
use gstx_pivot::PivotRow;
use gstx_tax::InvoiceAllocation;
use gstx_x2beta::TallyExportInfo;

use crate::records::{
    BatchRegistryRecord, InvoiceRegistryRecord, ReportRecord, RunRecord, TaxComputationRecord,
};
use crate::StoreError;

/// In-memory datastore.
///
/// Masters and the invoice registry are process-wide and outlive runs;
/// everything else is owned by its run.
#[derive(Debug, Default)]
pub struct MemoryStore {
    // Process-wide, single-writer resources.
    /// Item master table.
    pub items: RwLock<ItemMasterTable>,
    /// Ledger master table.
    pub ledgers: RwLock<LedgerMasterTable>,
    invoice_numbers: RwLock<BTreeSet<String>>,
    invoice_registry: RwLock<Vec<InvoiceRegistryRecord>>,

    // Run-scoped tables.
    runs: RwLock<Vec<RunRecord>>,
    reports: RwLock<Vec<ReportRecord>>,
    tax_computations: RwLock<Vec<TaxComputationRecord>>,
    pivot_summaries: RwLock<Vec<(RunId, PivotRow)>>,
    batch_registry: RwLock<Vec<BatchRegistryRecord>>,
    tally_exports: RwLock<Vec<(RunId, TallyExportInfo)>>,
    seller_invoices: RwLock<Vec<(RunId, SellerInvoiceRecord)>>,
    expense_exports: RwLock<Vec<(RunId, ExpenseExportInfo)>>,
    exceptions: RwLock<Vec<(RunId, ExceptionRecord)>>,
    approvals: RwLock<Vec<(RunId, ApprovalRequest)>>,
    audit_logs: RwLock<Vec<AuditEntry>>,
    mis_reports: RwLock<Vec<MisReport>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // -- runs ---------------------------------------------------------------

    /// Register a new run in `running` state.
    pub fn create_run(&self, record: RunRecord) {
        self.runs.write().push(record);
    }

    /// Transition a run's status; terminal transitions stamp `finished_at`.
    pub fn update_run_status(&self, run_id: RunId, status: RunStatus) -> Result<(), StoreError> {
        let mut runs = self.runs.write();
        let run = runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        run.status = status;
        if status.is_terminal() {
            run.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Fetch a run.
    pub fn get_run(&self, run_id: RunId) -> Option<RunRecord> {
        self.runs.read().iter().find(|r| r.id == run_id).cloned()
    }

    /// Delete a run and every record keyed by it. Masters and the invoice
    /// registry survive — committed numbers are never reissued.
    pub fn delete_run(&self, run_id: RunId) {
        self.runs.write().retain(|r| r.id != run_id);
        self.reports.write().retain(|r| r.run_id != run_id);
        self.tax_computations.write().retain(|r| r.run_id != run_id);
        self.pivot_summaries.write().retain(|(id, _)| *id != run_id);
        self.batch_registry.write().retain(|r| r.run_id != run_id);
        self.tally_exports.write().retain(|(id, _)| *id != run_id);
        self.seller_invoices.write().retain(|(id, _)| *id != run_id);
        self.expense_exports.write().retain(|(id, _)| *id != run_id);
        self.exceptions.write().retain(|(id, _)| *id != run_id);
        self.approvals.write().retain(|(id, _)| *id != run_id);
        self.audit_logs.write().retain(|e| e.run_id != run_id);
        self.mis_reports.write().retain(|r| r.run_id != run_id);
    }

    // -- reports ------------------------------------------------------------

    /// Register an ingested report artifact.
    pub fn insert_report(
        &self,
        run_id: RunId,
        report_type: &str,
        file_path: &str,
        hash: &str,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.reports.write().push(ReportRecord {
            id,
            run_id,
            report_type: report_type.to_string(),
            file_path: file_path.to_string(),
            hash: hash.to_string(),
            created_at: Utc::now(),
        });
        id
    }

    /// Reports for a run.
    pub fn reports_for_run(&self, run_id: RunId) -> Vec<ReportRecord> {
        self.reports
            .read()
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect()
    }

    // -- invoice registry ---------------------------------------------------

    /// Numbers already committed for a `(channel, gstin, month)` scope.
    pub fn invoice_numbers_for(
        &self,
        channel: gstx_core::Channel,
        gstin: &str,
        month: &Month,
    ) -> Vec<String> {
        self.invoice_registry
            .read()
            .iter()
            .filter(|r| r.channel == channel && r.gstin == gstin && r.month == *month)
            .map(|r| r.invoice_no.clone())
            .collect()
    }

    /// Commit a run's allocations. The whole batch inserts under one write
    /// lock; any collision with a committed number rejects the batch.
    pub fn commit_invoice_allocations(
        &self,
        run_id: RunId,
        allocations: &[InvoiceAllocation],
    ) -> Result<(), StoreError> {
        let mut numbers = self.invoice_numbers.write();
        for allocation in allocations {
            if numbers.contains(&allocation.invoice_no) {
                return Err(StoreError::Conflict(format!(
                    "invoice_no {}",
                    allocation.invoice_no
                )));
            }
        }
        let mut registry = self.invoice_registry.write();
        for allocation in allocations {
            numbers.insert(allocation.invoice_no.clone());
            registry.push(InvoiceRegistryRecord {
                run_id,
                channel: allocation.channel,
                gstin: allocation.gstin.clone(),
                state_code: allocation.state_code.clone(),
                invoice_no: allocation.invoice_no.clone(),
                month: allocation.month.clone(),
            });
        }
        Ok(())
    }

    /// Every committed invoice number, across all runs.
    pub fn all_invoice_numbers(&self) -> Vec<String> {
        self.invoice_numbers.read().iter().cloned().collect()
    }

    // -- stage outputs ------------------------------------------------------

    /// Persist tax computations.
    pub fn insert_tax_computations(&self, records: Vec<TaxComputationRecord>) {
        self.tax_computations.write().extend(records);
    }

    /// Tax computations for a run.
    pub fn tax_computations_for_run(&self, run_id: RunId) -> Vec<TaxComputationRecord> {
        self.tax_computations
            .read()
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Persist pivot summaries.
    pub fn insert_pivot_summaries(&self, run_id: RunId, rows: &[PivotRow]) {
        let mut table = self.pivot_summaries.write();
        table.extend(rows.iter().cloned().map(|row| (run_id, row)));
    }

    /// Pivot summaries for a run.
    pub fn pivot_summaries_for_run(&self, run_id: RunId) -> Vec<PivotRow> {
        self.pivot_summaries
            .read()
            .iter()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, row)| row.clone())
            .collect()
    }

    /// Persist batch registry rows.
    pub fn insert_batch_records(&self, records: Vec<BatchRegistryRecord>) {
        self.batch_registry.write().extend(records);
    }

    /// Batch registry rows for a run.
    pub fn batches_for_run(&self, run_id: RunId) -> Vec<BatchRegistryRecord> {
        self.batch_registry
            .read()
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Persist voucher export metadata.
    pub fn insert_tally_exports(&self, run_id: RunId, exports: &[TallyExportInfo]) {
        let mut table = self.tally_exports.write();
        table.extend(exports.iter().cloned().map(|e| (run_id, e)));
    }

    /// Persist seller invoice lines.
    pub fn insert_seller_invoices(&self, run_id: RunId, records: &[SellerInvoiceRecord]) {
        let mut table = self.seller_invoices.write();
        table.extend(records.iter().cloned().map(|r| (run_id, r)));
    }

    /// Seller invoice lines for a run.
    pub fn seller_invoices_for_run(&self, run_id: RunId) -> Vec<SellerInvoiceRecord> {
        self.seller_invoices
            .read()
            .iter()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Persist expense export metadata.
    pub fn insert_expense_export(&self, run_id: RunId, export: ExpenseExportInfo) {
        self.expense_exports.write().push((run_id, export));
    }

    // -- exceptions & approvals ---------------------------------------------

    /// Persist one exception batch.
    pub fn insert_exceptions(&self, run_id: RunId, batch: Vec<ExceptionRecord>) {
        let mut table = self.exceptions.write();
        table.extend(batch.into_iter().map(|r| (run_id, r)));
    }

    /// Exceptions for a run.
    pub fn exceptions_for_run(&self, run_id: RunId) -> Vec<ExceptionRecord> {
        self.exceptions
            .read()
            .iter()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Exception count for a run.
    pub fn exception_count(&self, run_id: RunId) -> usize {
        self.exceptions
            .read()
            .iter()
            .filter(|(id, _)| *id == run_id)
            .count()
    }

    /// Persist approval request snapshots.
    pub fn insert_approvals(&self, run_id: RunId, requests: &[ApprovalRequest]) {
        let mut table = self.approvals.write();
        table.extend(requests.iter().cloned().map(|r| (run_id, r)));
    }

    /// Approval requests for a run.
    pub fn approvals_for_run(&self, run_id: RunId) -> Vec<ApprovalRequest> {
        self.approvals
            .read()
            .iter()
            .filter(|(id, _)| *id == run_id)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Approval count for a run.
    pub fn approval_count(&self, run_id: RunId) -> usize {
        self.approvals
            .read()
            .iter()
            .filter(|(id, _)| *id == run_id)
            .count()
    }

    // -- audit & MIS --------------------------------------------------------

    /// Append an ordered audit batch.
    pub fn append_audit_entries(&self, entries: Vec<AuditEntry>) {
        self.audit_logs.write().extend(entries);
    }

    /// Audit trail for a run, in emission order.
    pub fn audit_trail(&self, run_id: RunId) -> Vec<AuditEntry> {
        self.audit_logs
            .read()
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Persist an MIS report.
    pub fn insert_mis_report(&self, report: MisReport) {
        self.mis_reports.write().push(report);
    }

    /// MIS reports for a run.
    pub fn mis_reports_for_run(&self, run_id: RunId) -> Vec<MisReport> {
        self.mis_reports
            .read()
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstx_core::Channel;

    fn month() -> Month {
        Month::new("2025-08").unwrap()
    }

    fn allocation(invoice_no: &str) -> InvoiceAllocation {
        InvoiceAllocation {
            channel: Channel::AmazonMtr,
            gstin: "06ABGCS4796R1ZA".into(),
            state_code: "HR".into(),
            invoice_no: invoice_no.into(),
            month: month(),
        }
    }

    #[test]
    fn run_lifecycle_and_finish_stamp() {
        let store = MemoryStore::new();
        let run_id = RunId::new();
        store.create_run(RunRecord {
            id: run_id,
            channel: Channel::AmazonMtr,
            gstin: "06ABGCS4796R1ZA".into(),
            month: month(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
        });
        store.update_run_status(run_id, RunStatus::Success).unwrap();
        let run = store.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Success);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn invoice_registry_enforces_uniqueness_across_runs() {
        let store = MemoryStore::new();
        let run_a = RunId::new();
        let run_b = RunId::new();
        store
            .commit_invoice_allocations(run_a, &[allocation("AMZ-HR-08-0001")])
            .unwrap();
        let err = store
            .commit_invoice_allocations(run_b, &[allocation("AMZ-HR-08-0001")])
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(
            store.invoice_numbers_for(Channel::AmazonMtr, "06ABGCS4796R1ZA", &month()),
            vec!["AMZ-HR-08-0001".to_string()]
        );
    }

    #[test]
    fn delete_run_cascades_but_registry_survives() {
        let store = MemoryStore::new();
        let run_id = RunId::new();
        store.create_run(RunRecord {
            id: run_id,
            channel: Channel::AmazonMtr,
            gstin: "06ABGCS4796R1ZA".into(),
            month: month(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
        });
        store.insert_report(run_id, "amazon_mtr_normalized", "x.csv", "abc");
        store
            .commit_invoice_allocations(run_id, &[allocation("AMZ-HR-08-0001")])
            .unwrap();

        store.delete_run(run_id);
        assert!(store.get_run(run_id).is_none());
        assert!(store.reports_for_run(run_id).is_empty());
        // Committed numbers are never reissued.
        assert_eq!(store.all_invoice_numbers().len(), 1);
    }

    #[test]
    fn counts_for_mis() {
        let store = MemoryStore::new();
        let run_id = RunId::new();
        store.insert_exceptions(
            run_id,
            vec![ExceptionRecord::from_code(
                "DAT-001",
                "sales_row",
                None,
                serde_json::json!({}),
            )],
        );
        assert_eq!(store.exception_count(run_id), 1);
        assert_eq!(store.approval_count(run_id), 0);
    }
}
