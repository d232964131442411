//! # Pipeline Controller
//!
//! Runs one request through the stage sequence. The controller owns the
//! store handles, the template registry, the notification sink, and the
//! cancellation flag; stages themselves stay pure.
//!
//! ## Status resolution
//!
//! Stage-specific failures (`schema_invalid`, `tally_template_missing`,
//! `batch_missing`, `failed`) short-circuit. Otherwise pending approvals
//! dominate (`awaiting_approval`), then the deepest completed stage wins
//! (`exported` > `summarized` > `success`). Run finish is persisted on
//! every one of those paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;

use gstx_audit::{
    AuditAction, AuditActor, AuditLogger, AuditSession, MisReport,
};
use gstx_core::{
    Channel, NotificationSink, NormalizedRow, RunId, RunStatus, Severity, TracingSink,
};
use gstx_exceptions::{
    detect_data_quality_exceptions, detect_gst_exceptions, detect_invoice_exceptions,
    detect_mapping_exceptions, detect_schema_exceptions, ApprovalEngine, ExceptionCollector,
    ExceptionRecord,
};
use gstx_expense::{ExpenseExportInfo, MappedExpense};
use gstx_ingest::{normalize::write_normalized_csv, IngestRequest, SchemaValidator};
use gstx_masters::{MappedRow, ResolutionStats};
use gstx_pivot::{split_batches, BatchInfo, PivotRow, PivotStats};
use gstx_store::{
    BatchRegistryRecord, BlobStore, MemoryStore, RunRecord, StoreError, TaxComputationRecord,
};
use gstx_tax::{
    tax_single, tax_stats, NumberingEngine, NumberingResult, TaxRulesEngine, TaxStats, TaxedRow,
};
use gstx_x2beta::{sales_voucher_rows, TallyExportInfo, TemplateRegistry, X2BetaError};

use crate::options::PipelineRequest;
use crate::workers::parallel_map;

/// What a finished run looks like to the driver.
#[derive(Debug)]
pub struct RunOutcome {
    /// The run identifier.
    pub run_id: RunId,
    /// Terminal status.
    pub status: RunStatus,
    /// Rows that came out of normalization.
    pub rows_ingested: usize,
    /// Master resolution coverage, when the stage ran.
    pub mapping: Option<ResolutionStats>,
    /// Tax stage summary, when the stage ran.
    pub tax: Option<TaxStats>,
    /// Numbering summary, when the stage ran.
    pub numbering: Option<NumberingResult>,
    /// Pivot groups produced.
    pub pivot_groups: usize,
    /// Batch files written.
    pub batch_files: usize,
    /// Voucher exports written.
    pub exports: Vec<TallyExportInfo>,
    /// Expense export, when the stage ran.
    pub expense_export: Option<ExpenseExportInfo>,
    /// Approval requests still pending.
    pub pending_approvals: usize,
    /// Exceptions recorded.
    pub exceptions: usize,
    /// MIS report, when generated.
    pub mis: Option<MisReport>,
}

/// The staged pipeline controller.
pub struct Pipeline {
    store: Arc<MemoryStore>,
    templates: TemplateRegistry,
    sink: Arc<dyn NotificationSink>,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    /// Controller over a store with the default template registry and
    /// tracing notification sink.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            templates: TemplateRegistry::with_defaults(),
            sink: Arc::new(TracingSink),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replace the template registry.
    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    /// Replace the notification sink.
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Handle for requesting cancellation at the next stage boundary.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// The store behind this controller.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Execute one run. Never panics, never unwinds past this frame; the
    /// outcome's status is the contract with the driver.
    pub fn run(&self, request: &PipelineRequest) -> RunOutcome {
        let run_id = RunId::new();
        let stages = request.stages.normalized();

        self.store.create_run(RunRecord {
            id: run_id,
            channel: request.channel,
            gstin: request.gstin.as_str().to_string(),
            month: request.month.clone(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
        });

        let mut ctx = RunContext {
            store: Arc::clone(&self.store),
            logger: AuditLogger::new(run_id),
            session: AuditSession::start(),
            collector: ExceptionCollector::new(),
            run_id,
        };

        let mut outcome = RunOutcome {
            run_id,
            status: RunStatus::Success,
            rows_ingested: 0,
            mapping: None,
            tax: None,
            numbering: None,
            pivot_groups: 0,
            batch_files: 0,
            exports: Vec::new(),
            expense_export: None,
            pending_approvals: 0,
            exceptions: 0,
            mis: None,
        };

        // ---- Stage 1+2: ingestion & schema validation --------------------
        let rows = match self.stage_ingest(request, &mut ctx) {
            Ok(rows) => rows,
            Err(status) => return self.finish(ctx, outcome, status),
        };
        outcome.rows_ingested = rows.len();

        if self.cancelled() {
            return self.finish(ctx, outcome, RunStatus::Failed);
        }

        // ---- Stage 3: master resolution ---------------------------------
        let mut mapped: Vec<MappedRow> = Vec::new();
        let mut awaiting = false;
        if stages.mapping {
            let (resolved, pending) = self.stage_mapping(request, rows, &mut ctx, &mut outcome);
            mapped = resolved;
            awaiting = pending > 0;
            outcome.pending_approvals = pending;

            if stages.exception_handling {
                ctx.collector.extend(detect_mapping_exceptions(&mapped));
                ctx.collector
                    .extend(detect_data_quality_exceptions(&mapped));
                if let Some(status) = self.check_critical(&mut ctx) {
                    return self.finish(ctx, outcome, status);
                }
            }
        }

        if self.cancelled() {
            return self.finish(ctx, outcome, RunStatus::Failed);
        }

        // ---- Stage 4+5: tax engine & invoice numbering ------------------
        let mut taxed: Vec<TaxedRow> = Vec::new();
        if stages.tax_invoice && !mapped.is_empty() {
            match self.stage_tax_and_numbering(request, &mapped, &mut ctx, &mut outcome) {
                Ok(rows) => taxed = rows,
                Err(status) => return self.finish(ctx, outcome, status),
            }

            if stages.exception_handling {
                ctx.collector.extend(detect_gst_exceptions(&taxed));
                ctx.collector
                    .extend(detect_invoice_exceptions(&taxed, request.channel));
                if let Some(status) = self.check_critical(&mut ctx) {
                    return self.finish(ctx, outcome, status);
                }
            }
        }

        if self.cancelled() {
            return self.finish(ctx, outcome, RunStatus::Failed);
        }

        // ---- Stage 6: pivot & batch split -------------------------------
        let mut pivot: Vec<PivotRow> = Vec::new();
        let mut pivot_stats = PivotStats::default();
        let mut batches: Vec<BatchInfo> = Vec::new();
        let mut floor = RunStatus::Success;
        if stages.pivot_batch && !taxed.is_empty() {
            match self.stage_pivot_batch(request, &taxed, &mut ctx) {
                Ok((p, stats, b)) => {
                    outcome.pivot_groups = p.len();
                    outcome.batch_files = b.len();
                    pivot = p;
                    pivot_stats = stats;
                    batches = b;
                    floor = RunStatus::Summarized;
                }
                Err(status) => return self.finish(ctx, outcome, status),
            }
        }

        // ---- Stage 7: X2Beta export -------------------------------------
        if stages.tally_export && !batches.is_empty() {
            match self.stage_export(request, &batches, &mut ctx) {
                Ok(exports) => {
                    outcome.exports = exports;
                    floor = RunStatus::Exported;
                }
                Err(status) => return self.finish(ctx, outcome, status),
            }
        } else if stages.tally_export && !awaiting {
            // Export requested but nothing to export, and no approvals to
            // explain it.
            ctx.log_exception(ExceptionRecord::from_code(
                "EXP-004",
                "export",
                None,
                json!({ "reason": "no batch files to export" }),
            ));
            return self.finish(ctx, outcome, RunStatus::BatchMissing);
        }

        if self.cancelled() {
            return self.finish(ctx, outcome, RunStatus::Failed);
        }

        // ---- Stage 8: expense sub-pipeline ------------------------------
        let mut expenses: Vec<MappedExpense> = Vec::new();
        if stages.expense_processing && !request.seller_invoices.is_empty() {
            let (mapped_expenses, export) =
                self.stage_expenses(request, &batches, stages.tally_export, &mut ctx);
            expenses = mapped_expenses;
            outcome.expense_export = export;
        }

        // ---- Stage 9: exception wrap-up ---------------------------------
        if stages.exception_handling {
            if let Some(status) = self.check_critical(&mut ctx) {
                return self.finish(ctx, outcome, status);
            }
        }

        // ---- Stage 10: MIS & audit --------------------------------------
        if stages.mis_audit {
            let report = self.stage_mis(request, &pivot, &pivot_stats, &expenses, &mut ctx);
            outcome.mis = Some(report);
        }

        let status = if awaiting {
            RunStatus::AwaitingApproval
        } else {
            floor
        };
        self.finish(ctx, outcome, status)
    }

    /// Apply every pending approval for the masters with a named approver,
    /// mutating the process-wide tables. The driver calls this between an
    /// `awaiting_approval` run and its rerun.
    pub fn apply_pending_approvals(&self, engine: &mut ApprovalEngine, approver: &str) -> usize {
        let ids: Vec<_> = engine.pending().iter().map(|r| r.id).collect();
        let mut applied = 0;
        for id in ids {
            let mut items = self.store.items.write();
            let mut ledgers = self.store.ledgers.write();
            if engine.decide(id, true, approver, None, &mut items, &mut ledgers) {
                applied += 1;
            }
        }
        applied
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    // -- stages -------------------------------------------------------------

    fn stage_ingest(
        &self,
        request: &PipelineRequest,
        ctx: &mut RunContext,
    ) -> Result<Vec<NormalizedRow>, RunStatus> {
        let started = Instant::now();
        ctx.log(
            AuditActor::System,
            AuditAction::IngestStart,
            json!({ "channel": request.channel.as_str(), "input": request.input.display().to_string() }),
        );

        let ingest_request = IngestRequest {
            channel: request.channel,
            gstin: request.gstin.clone(),
            month: request.month.clone(),
            file_path: request.input.clone(),
            returns_path: request.returns.clone(),
            asin_to_sku: request.asin_to_sku.clone(),
        };

        let output = match gstx_ingest::normalize_report(&ingest_request) {
            Ok(output) => output,
            Err(err) => {
                ctx.log(
                    AuditActor::System,
                    AuditAction::IngestError,
                    json!({ "error": err.to_string() }),
                );
                let status = match &err {
                    gstx_ingest::IngestError::MissingColumn { target, candidates } => {
                        ctx.log_exception(ExceptionRecord::from_code(
                            "SCH-001",
                            "report",
                            Some(target.clone()),
                            json!({ "column": target, "candidates": candidates }),
                        ));
                        RunStatus::SchemaInvalid
                    }
                    _ => {
                        ctx.log_exception(ExceptionRecord::from_code(
                            "SYS-002",
                            "report",
                            None,
                            json!({ "error": err.to_string() }),
                        ));
                        RunStatus::Failed
                    }
                };
                self.sink.send(
                    Severity::Critical,
                    "Ingestion failed",
                    &json!({ "error": err.to_string() }),
                );
                ctx.session
                    .record_operation("ingest", started.elapsed().as_millis());
                return Err(status);
            }
        };

        // Schema validation over the normalized column set. Missing fields
        // here mean the channel mapping itself is defective.
        let headers = normalized_headers(request.channel);
        let validation = SchemaValidator::standard().validate(&headers);
        if !validation.success {
            ctx.collector
                .extend(detect_schema_exceptions(&validation.missing));
            ctx.session
                .record_operation("ingest", started.elapsed().as_millis());
            return Err(RunStatus::SchemaInvalid);
        }
        ctx.log(
            AuditActor::System,
            AuditAction::FileValidated,
            json!({ "schema_version": validation.schema_version }),
        );

        // Persist the normalized artifact and register the report.
        let normalized_dir = request.work_dir.join("normalized");
        let (path, hash) = match write_normalized_csv(&output.rows, &normalized_dir, request.channel)
        {
            Ok(result) => result,
            Err(err) => {
                ctx.log_exception(ExceptionRecord::from_code(
                    "SYS-002",
                    "report",
                    None,
                    json!({ "error": err.to_string() }),
                ));
                return Err(RunStatus::Failed);
            }
        };

        let storage_path = BlobStore::open(request.work_dir.join("storage"), "gstx-artifacts")
            .and_then(|blob| blob.upload(&path));
        match storage_path {
            Ok(storage_path) => {
                self.store.insert_report(
                    ctx.run_id,
                    &format!("{}_normalized", request.channel.as_str()),
                    &storage_path,
                    &hash,
                );
                ctx.log(
                    AuditActor::System,
                    AuditAction::FileUploaded,
                    json!({ "path": storage_path, "hash": hash }),
                );
            }
            Err(err) => {
                // The local artifact still exists; register it directly.
                tracing::warn!(%err, "blob upload failed; registering local path");
                self.store.insert_report(
                    ctx.run_id,
                    &format!("{}_normalized", request.channel.as_str()),
                    &path.display().to_string(),
                    &hash,
                );
            }
        }

        ctx.log(
            AuditActor::System,
            AuditAction::IngestComplete,
            json!({
                "rows": output.rows.len(),
                "encoding": output.encoding,
                "filtered": output.filtered_rows,
                "skipped_lines": output.skipped_lines,
            }),
        );
        ctx.session
            .record_operation("ingest", started.elapsed().as_millis());
        Ok(output.rows)
    }

    fn stage_mapping(
        &self,
        request: &PipelineRequest,
        rows: Vec<NormalizedRow>,
        ctx: &mut RunContext,
        outcome: &mut RunOutcome,
    ) -> (Vec<MappedRow>, usize) {
        let started = Instant::now();
        ctx.log(AuditActor::Agent, AuditAction::MappingStart, json!({}));

        let resolve = |rows: Vec<NormalizedRow>| {
            let items = self.store.items.read();
            let ledgers = self.store.ledgers.read();
            gstx_masters::resolve_rows(rows, &items, &ledgers)
        };

        let (mapped, item_misses, ledger_misses, stats) = resolve(rows);

        let mut engine = ApprovalEngine::new();
        let mut auto_approved = 0usize;
        {
            let mut items = self.store.items.write();
            for decision in engine.submit_item_misses(&item_misses, &mut items, self.sink.as_ref())
            {
                if matches!(decision, gstx_exceptions::ApprovalDecision::AutoApproved { .. }) {
                    auto_approved += 1;
                }
            }
        }
        {
            let mut ledgers = self.store.ledgers.write();
            for decision in
                engine.submit_ledger_misses(&ledger_misses, &mut ledgers, self.sink.as_ref())
            {
                if matches!(decision, gstx_exceptions::ApprovalDecision::AutoApproved { .. }) {
                    auto_approved += 1;
                }
            }
        }

        // A named approver clears the queue immediately (the driver's
        // non-interactive approval path).
        if let Some(approver) = &request.approver {
            let applied = self.apply_pending_approvals(&mut engine, approver);
            if applied > 0 {
                ctx.log(
                    AuditActor::Finance,
                    AuditAction::ApprovalGranted,
                    json!({ "approver": approver, "applied": applied }),
                );
            }
        }

        for request_snapshot in engine.requests() {
            ctx.log(
                AuditActor::Agent,
                AuditAction::ApprovalRequested,
                json!({
                    "request_type": request_snapshot.request_type.as_str(),
                    "suggested_value": request_snapshot.suggested_value,
                    "status": request_snapshot.status,
                }),
            );
        }
        if auto_approved > 0 {
            ctx.log(
                AuditActor::System,
                AuditAction::AutoApproval,
                json!({ "count": auto_approved }),
            );
        }

        // Approvals that landed (auto or named-approver) widen the masters;
        // rerun resolution so this run benefits immediately.
        let decided = engine.requests().len() - engine.pending().len();
        let (mapped, stats) = if decided > 0 {
            let rows: Vec<NormalizedRow> = mapped.into_iter().map(|m| m.row).collect();
            let (remapped, _, _, restats) = resolve(rows);
            (remapped, restats)
        } else {
            (mapped, stats)
        };

        self.store.insert_approvals(ctx.run_id, engine.requests());
        let pending = engine.pending().len();

        ctx.log(
            AuditActor::Agent,
            AuditAction::MappingComplete,
            json!({
                "total_rows": stats.total_rows,
                "mapped_rows": stats.mapped_rows,
                "coverage_percent": stats.coverage_percent(),
                "pending_approvals": pending,
            }),
        );
        ctx.session
            .record_operation("mapping", started.elapsed().as_millis());
        outcome.mapping = Some(stats);
        (mapped, pending)
    }

    fn stage_tax_and_numbering(
        &self,
        request: &PipelineRequest,
        mapped: &[MappedRow],
        ctx: &mut RunContext,
        outcome: &mut RunOutcome,
    ) -> Result<Vec<TaxedRow>, RunStatus> {
        let started = Instant::now();
        ctx.log(AuditActor::Agent, AuditAction::TaxComputeStart, json!({}));

        // Unmapped rows block tax and numbering; they stay behind as
        // exceptions/approvals.
        let eligible: Vec<MappedRow> = mapped
            .iter()
            .filter(|m| m.fully_mapped())
            .cloned()
            .collect();

        let engine = TaxRulesEngine::new(request.gstin.clone());
        let mut taxed: Vec<TaxedRow> =
            parallel_map(eligible, request.workers, |row| tax_single(row, &engine));
        let stats = tax_stats(&taxed);

        ctx.log(
            AuditActor::Agent,
            AuditAction::TaxComputeComplete,
            json!({
                "processed": stats.processed,
                "computed": stats.computed,
                "failed": stats.failed,
            }),
        );

        // Numbering: preload committed numbers, allocate, and commit under
        // the registry's uniqueness guarantee. A conflict means another run
        // committed between preload and commit — re-preload and retry once.
        let mut numbering = NumberingResult::default();
        for attempt in 0..2 {
            let mut engine = NumberingEngine::new(
                request.channel,
                request.gstin.as_str(),
                request.month.clone(),
            );
            engine.register_existing(self.store.invoice_numbers_for(
                request.channel,
                request.gstin.as_str(),
                &request.month,
            ));
            for row in &mut taxed {
                row.invoice_no.clear();
            }
            let (result, allocations) = engine.allocate_batch(&mut taxed);
            numbering = result;

            match self.store.commit_invoice_allocations(ctx.run_id, &allocations) {
                Ok(()) => break,
                Err(StoreError::Conflict(detail)) if attempt == 0 => {
                    tracing::warn!(detail, "invoice allocation conflict; retrying");
                    continue;
                }
                Err(err) => {
                    ctx.log_exception(ExceptionRecord::from_code(
                        "INV-001",
                        "invoice",
                        None,
                        json!({ "error": err.to_string() }),
                    ));
                    ctx.session
                        .record_operation("tax_invoice", started.elapsed().as_millis());
                    return Err(RunStatus::Failed);
                }
            }
        }

        ctx.log(
            AuditActor::Agent,
            AuditAction::InvoiceGenerated,
            json!({
                "generated": numbering.generated,
                "states": numbering.states_covered,
                "failed": numbering.failed,
            }),
        );

        // Persist row-level computations.
        let records: Vec<TaxComputationRecord> = taxed
            .iter()
            .filter(|t| t.rate.is_some())
            .map(|t| TaxComputationRecord {
                run_id: ctx.run_id,
                channel: request.channel,
                gstin: request.gstin.as_str().to_string(),
                state_code: t.mapped.row.state_code.clone(),
                sku: t.mapped.row.sku.clone(),
                taxable_value: t.taxable_value,
                shipping_value: t.shipping_value,
                cgst: t.cgst,
                sgst: t.sgst,
                igst: t.igst,
                gst_rate: t.rate.unwrap_or(gstx_core::GstRate::Zero),
            })
            .collect();
        self.store.insert_tax_computations(records);

        ctx.session
            .record_operation("tax_invoice", started.elapsed().as_millis());
        outcome.tax = Some(stats);
        outcome.numbering = Some(numbering);
        Ok(taxed)
    }

    fn stage_pivot_batch(
        &self,
        request: &PipelineRequest,
        taxed: &[TaxedRow],
        ctx: &mut RunContext,
    ) -> Result<(Vec<PivotRow>, PivotStats, Vec<BatchInfo>), RunStatus> {
        let started = Instant::now();
        let (pivot, stats) = gstx_pivot::pivot_rows(taxed, request.channel);
        self.store.insert_pivot_summaries(ctx.run_id, &pivot);
        ctx.log(
            AuditActor::Agent,
            AuditAction::PivotGenerated,
            json!({
                "groups": pivot.len(),
                "unique_ledgers": stats.unique_ledgers,
                "unique_fgs": stats.unique_fgs,
            }),
        );

        let batch_dir = request.work_dir.join("batch");
        let (batches, validation) = match split_batches(
            &pivot,
            request.channel,
            request.gstin.as_str(),
            &request.month,
            &batch_dir,
        ) {
            Ok(result) => result,
            Err(err) => {
                ctx.log_exception(ExceptionRecord::from_code(
                    "DAT-004",
                    "batch",
                    None,
                    json!({ "error": err.to_string() }),
                ));
                ctx.session
                    .record_operation("pivot_batch", started.elapsed().as_millis());
                return Err(RunStatus::Failed);
            }
        };

        let batch_records: Vec<BatchRegistryRecord> = batches
            .iter()
            .map(|b| BatchRegistryRecord {
                run_id: ctx.run_id,
                channel: request.channel,
                gstin: request.gstin.as_str().to_string(),
                month: request.month.clone(),
                gst_rate: b.gst_rate,
                file_path: b.file_path.display().to_string(),
                record_count: b.record_count,
                total_taxable: b.total_taxable,
                total_tax: b.total_tax,
            })
            .collect();
        self.store.insert_batch_records(batch_records);

        ctx.log(
            AuditActor::Agent,
            AuditAction::BatchCreated,
            json!({
                "files": batches.len(),
                "records": validation.batch_records,
            }),
        );
        ctx.session
            .record_operation("pivot_batch", started.elapsed().as_millis());
        Ok((pivot, stats, batches))
    }

    fn stage_export(
        &self,
        request: &PipelineRequest,
        batches: &[BatchInfo],
        ctx: &mut RunContext,
    ) -> Result<Vec<TallyExportInfo>, RunStatus> {
        let started = Instant::now();
        ctx.log(AuditActor::Agent, AuditAction::ExportStart, json!({}));

        let export_dir = request.work_dir.join("exports");
        let outcome = match gstx_x2beta::export_batches(
            batches,
            &self.templates,
            request.channel,
            request.gstin.as_str(),
            &request.month,
            &export_dir,
        ) {
            Ok(outcome) => outcome,
            Err(X2BetaError::TemplateMissing(gstin)) => {
                ctx.log_exception(ExceptionRecord::from_code(
                    "EXP-001",
                    "export",
                    Some(gstin.clone()),
                    json!({ "gstin": gstin }),
                ));
                self.sink.send(
                    Severity::Critical,
                    "EXP-001 Template Not Found",
                    &json!({ "gstin": gstin }),
                );
                ctx.session
                    .record_operation("tally_export", started.elapsed().as_millis());
                return Err(RunStatus::TallyTemplateMissing);
            }
            Err(err) => {
                ctx.log_exception(ExceptionRecord::from_code(
                    "EXP-003",
                    "export",
                    None,
                    json!({ "error": err.to_string() }),
                ));
                ctx.session
                    .record_operation("tally_export", started.elapsed().as_millis());
                return Err(RunStatus::Failed);
            }
        };

        for (rate, err) in &outcome.failures {
            let code = match err {
                X2BetaError::Unbalanced(_) => "EXP-004",
                _ => "EXP-003",
            };
            ctx.log_exception(ExceptionRecord::from_code(
                code,
                "export",
                Some(rate.percent_label().to_string()),
                json!({ "error": err.to_string() }),
            ));
        }

        self.store.insert_tally_exports(ctx.run_id, &outcome.exports);
        ctx.log(
            AuditActor::Agent,
            AuditAction::TallyExport,
            json!({
                "files": outcome.exports.len(),
                "failures": outcome.failures.len(),
            }),
        );
        ctx.log(AuditActor::Agent, AuditAction::ExportComplete, json!({}));
        ctx.session
            .record_operation("tally_export", started.elapsed().as_millis());
        Ok(outcome.exports)
    }

    fn stage_expenses(
        &self,
        request: &PipelineRequest,
        batches: &[BatchInfo],
        combine_with_sales: bool,
        ctx: &mut RunContext,
    ) -> (Vec<MappedExpense>, Option<ExpenseExportInfo>) {
        let started = Instant::now();
        let mut parsed = Vec::new();
        for path in &request.seller_invoices {
            let result = match path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .as_deref()
            {
                Some("xlsx") | Some("xls") => gstx_expense::parse_spreadsheet_invoice(path),
                _ => std::fs::read(path)
                    .map_err(gstx_expense::ExpenseError::from)
                    .and_then(|bytes| {
                        let (text, _) = gstx_ingest::encoding::decode_report(&bytes)
                            .ok_or_else(|| {
                                gstx_expense::ExpenseError::Unparseable(
                                    path.display().to_string(),
                                )
                            })?;
                        gstx_expense::parse_invoice_text(&text, &path.display().to_string())
                    }),
            };
            match result {
                Ok(invoice) => {
                    ctx.log(
                        AuditActor::Agent,
                        AuditAction::ExpenseParsed,
                        json!({
                            "invoice_no": invoice.invoice_no,
                            "line_items": invoice.line_items.len(),
                        }),
                    );
                    parsed.push(invoice);
                }
                Err(err) => {
                    ctx.log_exception(ExceptionRecord::from_code(
                        "DAT-003",
                        "seller_invoice",
                        Some(path.display().to_string()),
                        json!({ "error": err.to_string() }),
                    ));
                }
            }
        }

        let (expenses, stats) =
            gstx_expense::map_invoices(&parsed, request.channel, &request.gstin);
        for error in gstx_expense::mapper::validate_mapping(&expenses) {
            ctx.log_exception(ExceptionRecord::from_code(
                "DAT-004",
                "seller_invoice",
                None,
                json!({ "error": error }),
            ));
        }
        let records: Vec<_> = expenses.iter().map(|e| e.record.clone()).collect();
        self.store.insert_seller_invoices(ctx.run_id, &records);
        ctx.log(
            AuditActor::Agent,
            AuditAction::ExpenseMapped,
            json!({
                "invoices": stats.invoices,
                "lines": stats.lines,
                "gst_mismatches": stats.gst_mismatches,
            }),
        );

        let export_dir = request.work_dir.join("exports");
        let export = match gstx_expense::export_expenses(
            &expenses,
            &self.templates,
            request.channel,
            request.gstin.as_str(),
            &request.month,
            &export_dir,
        ) {
            Ok(info) => {
                self.store.insert_expense_export(ctx.run_id, info.clone());
                Some(info)
            }
            Err(err) => {
                ctx.log_exception(ExceptionRecord::from_code(
                    "EXP-003",
                    "export",
                    None,
                    json!({ "error": err.to_string(), "side": "expense" }),
                ));
                None
            }
        };

        // Combined workbook when the sales side also exported.
        if combine_with_sales && !batches.is_empty() && !expenses.is_empty() {
            let mut sales_rows = Vec::new();
            for batch in batches {
                if let Ok(rows) = sales_voucher_rows(&batch.rows, &request.month) {
                    sales_rows.extend(rows);
                }
            }
            if let Err(err) = gstx_expense::export_combined(
                &sales_rows,
                &expenses,
                &self.templates,
                request.channel,
                request.gstin.as_str(),
                &request.month,
                &export_dir,
            ) {
                ctx.log_exception(ExceptionRecord::from_code(
                    "EXP-003",
                    "export",
                    None,
                    json!({ "error": err.to_string(), "side": "combined" }),
                ));
            }
        }

        ctx.session
            .record_operation("expense", started.elapsed().as_millis());
        (expenses, export)
    }

    fn stage_mis(
        &self,
        request: &PipelineRequest,
        pivot: &[PivotRow],
        pivot_stats: &PivotStats,
        expenses: &[MappedExpense],
        ctx: &mut RunContext,
    ) -> MisReport {
        let started = Instant::now();
        let report = MisReport::generate(
            ctx.run_id,
            request.channel,
            request.gstin.as_str(),
            request.month.clone(),
            pivot,
            pivot_stats,
            expenses,
            self.store.exception_count(ctx.run_id) + ctx.collector.len(),
            self.store.approval_count(ctx.run_id),
        );

        let report_dir = request.work_dir.join("reports");
        for format in &request.mis_formats {
            let result = match format.as_str() {
                "csv" => gstx_audit::export_mis_csv(
                    &report,
                    &report_dir.join(format!("mis_{}.csv", ctx.run_id)),
                ),
                "excel" => gstx_audit::export_mis_excel(
                    &report,
                    &report_dir.join(format!("mis_{}.xlsx", ctx.run_id)),
                ),
                "database" => {
                    self.store.insert_mis_report(report.clone());
                    Ok(())
                }
                other => {
                    tracing::warn!(format = other, "unknown MIS export format skipped");
                    Ok(())
                }
            };
            if let Err(err) = result {
                ctx.log_exception(ExceptionRecord::from_code(
                    "SYS-002",
                    "mis_report",
                    Some(format.clone()),
                    json!({ "error": err.to_string() }),
                ));
            }
        }

        ctx.log(
            AuditActor::System,
            AuditAction::MisGenerated,
            json!({
                "data_quality_score": report.data_quality_score,
                "exception_count": report.exception_count,
                "approval_count": report.approval_count,
            }),
        );
        ctx.session
            .record_operation("mis_audit", started.elapsed().as_millis());
        report
    }

    // -- shared plumbing ----------------------------------------------------

    fn check_critical(&self, ctx: &mut RunContext) -> Option<RunStatus> {
        if ctx.collector.has_critical() {
            self.sink.send(
                Severity::Critical,
                "Critical exception halted the run",
                &json!({ "exceptions": ctx.collector.len() }),
            );
            Some(RunStatus::Failed)
        } else {
            None
        }
    }

    /// Persist the terminal state. Every exit path of [`Pipeline::run`]
    /// funnels through here: exceptions drain to the store, the audit
    /// buffer flushes in order, timings land on the final event, and the
    /// run row gets its status and finish stamp.
    fn finish(
        &self,
        mut ctx: RunContext,
        mut outcome: RunOutcome,
        status: RunStatus,
    ) -> RunOutcome {
        for batch in ctx.collector.drain_batches() {
            let count = batch.len();
            self.store.insert_exceptions(ctx.run_id, batch);
            outcome.exceptions += count;
        }

        ctx.log(
            AuditActor::System,
            AuditAction::RunFinished,
            json!({ "status": status.as_str() }),
        );
        let timing = ctx.session.timing_metadata();
        if let Some(batch) = ctx.logger.log(
            AuditActor::System,
            AuditAction::OperationComplete,
            None,
            None,
            json!({ "operation": "run" }),
            timing,
        ) {
            self.store.append_audit_entries(batch);
        }
        self.store.append_audit_entries(ctx.logger.take_remaining());

        if let Err(err) = self.store.update_run_status(ctx.run_id, status) {
            tracing::error!(%err, "failed to persist run status");
        }

        outcome.status = status;
        tracing::info!(
            run_id = %ctx.run_id,
            status = %status,
            exceptions = outcome.exceptions,
            "run finished"
        );
        outcome
    }
}

/// Per-run mutable context threaded through the stages.
struct RunContext {
    store: Arc<MemoryStore>,
    logger: AuditLogger,
    session: AuditSession,
    collector: ExceptionCollector,
    run_id: RunId,
}

impl RunContext {
    fn log(&mut self, actor: AuditActor, action: AuditAction, details: serde_json::Value) {
        if let Some(batch) = self
            .logger
            .log(actor, action, None, None, details, serde_json::Value::Null)
        {
            self.store.append_audit_entries(batch);
        }
    }

    fn log_exception(&mut self, record: ExceptionRecord) {
        self.log(
            AuditActor::System,
            AuditAction::ExceptionDetected,
            json!({ "code": record.error_code, "message": record.error_message }),
        );
        self.collector.extend(vec![record]);
    }
}

/// The normalized column set a channel's CSV carries.
fn normalized_headers(channel: Channel) -> Vec<String> {
    let mut headers: Vec<String> = [
        "invoice_date",
        "type",
        "order_id",
        "sku",
        "asin",
        "quantity",
        "taxable_value",
        "gst_rate",
        "state_code",
        "channel",
        "gstin",
        "month",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    match channel {
        Channel::Pepperfry => headers.push("is_return".into()),
        Channel::Flipkart => headers.push("final_date".into()),
        _ => {}
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use gstx_core::Gstin;
    use gstx_masters::{ItemMasterRecord, LedgerMasterRecord};
    use std::io::Write;

    const MTR_CSV: &str = "\
Transaction Type,Order Id,Sku,Asin,Quantity,Principal Amount,Igst Rate,Cgst Rate,Sgst Rate,Ship To State,Invoice Date
Shipment,O1,SKU1,B0A,1,1000.00,0,0.09,0.09,HARYANA,2025-08-02
";

    fn seeded_pipeline() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .items
            .write()
            .insert(ItemMasterRecord::new(Some("SKU1"), None, "Widget", 1800));
        store.ledgers.write().insert(LedgerMasterRecord::new(
            "amazon",
            "HR",
            "Amazon Sales - HR",
        ));
        store
    }

    fn request(dir: &tempfile::TempDir) -> PipelineRequest {
        let input = dir.path().join("mtr.csv");
        let mut f = std::fs::File::create(&input).unwrap();
        f.write_all(MTR_CSV.as_bytes()).unwrap();
        PipelineRequest::new(
            Channel::AmazonMtr,
            Gstin::new("06ABGCS4796R1ZA").unwrap(),
            gstx_core::Month::new("2025-08").unwrap(),
            input,
            dir.path().join("work"),
        )
    }

    #[test]
    fn full_pipeline_reaches_exported() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_pipeline();
        let pipeline = Pipeline::new(Arc::clone(&store));
        let outcome = pipeline.run(&request(&dir));

        assert_eq!(outcome.status, RunStatus::Exported);
        assert_eq!(outcome.rows_ingested, 1);
        assert_eq!(outcome.pivot_groups, 1);
        assert_eq!(outcome.batch_files, 1);
        assert_eq!(outcome.exports.len(), 1);
        assert_eq!(outcome.pending_approvals, 0);

        let run = store.get_run(outcome.run_id).unwrap();
        assert_eq!(run.status, RunStatus::Exported);
        assert!(run.finished_at.is_some());

        // Registry carries the allocated number; the trail is non-empty.
        assert_eq!(store.all_invoice_numbers(), vec!["AMZ-HR-08-0001"]);
        assert!(!store.audit_trail(outcome.run_id).is_empty());
    }

    #[test]
    fn unknown_sku_queues_approval_and_awaits() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.ledgers.write().insert(LedgerMasterRecord::new(
            "amazon",
            "HR",
            "Amazon Sales - HR",
        ));
        let pipeline = Pipeline::new(Arc::clone(&store));
        let outcome = pipeline.run(&request(&dir));

        assert_eq!(outcome.status, RunStatus::AwaitingApproval);
        assert!(outcome.pending_approvals > 0);
        assert!(outcome.exports.is_empty());
        let run = store.get_run(outcome.run_id).unwrap();
        assert!(run.finished_at.is_some(), "finish persisted on approval path");
    }

    #[test]
    fn named_approver_clears_the_queue_in_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.ledgers.write().insert(LedgerMasterRecord::new(
            "amazon",
            "HR",
            "Amazon Sales - HR",
        ));
        let pipeline = Pipeline::new(Arc::clone(&store));
        let mut req = request(&dir);
        req.approver = Some("finance".into());
        let outcome = pipeline.run(&req);

        assert_eq!(outcome.status, RunStatus::Exported);
        assert!(store.items.read().lookup("SKU1", "").is_some());
    }

    #[test]
    fn template_missing_sets_stage_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_pipeline();
        let pipeline =
            Pipeline::new(Arc::clone(&store)).with_templates(TemplateRegistry::new());
        let outcome = pipeline.run(&request(&dir));

        assert_eq!(outcome.status, RunStatus::TallyTemplateMissing);
        let exceptions = store.exceptions_for_run(outcome.run_id);
        assert!(exceptions.iter().any(|e| e.error_code == "EXP-001"));
    }

    #[test]
    fn cancellation_fails_at_stage_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_pipeline();
        let pipeline = Pipeline::new(Arc::clone(&store));
        pipeline.cancel_flag().store(true, Ordering::SeqCst);
        let outcome = pipeline.run(&request(&dir));

        assert_eq!(outcome.status, RunStatus::Failed);
        let run = store.get_run(outcome.run_id).unwrap();
        assert!(run.finished_at.is_some());
    }
}
