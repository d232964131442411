//! # Audit Logger
//!
//! Append-only event trail for a run. Entries are buffered and flushed in
//! emission order; the caller persists drained batches. Sessions wrap a
//! run with wall-clock accounting and per-operation timing statistics.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gstx_core::RunId;

/// Entries are flushed to the store in batches of this size.
pub const AUDIT_BUFFER_SIZE: usize = 100;

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    /// The pipeline itself.
    System,
    /// An interactive operator.
    User,
    /// An automated stage agent.
    Agent,
    /// The finance approver role.
    Finance,
    /// An administrator.
    Admin,
}

impl AuditActor {
    /// Return the string representation of this actor.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Agent => "agent",
            Self::Finance => "finance",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for AuditActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Ingestion
    /// Report ingestion started.
    IngestStart,
    /// Report ingestion completed.
    IngestComplete,
    /// Report ingestion failed.
    IngestError,
    /// Input file uploaded to the object store.
    FileUploaded,
    /// Input file passed schema validation.
    FileValidated,
    // Processing
    /// Master mapping started.
    MappingStart,
    /// Master mapping completed.
    MappingComplete,
    /// Tax computation started.
    TaxComputeStart,
    /// Tax computation completed.
    TaxComputeComplete,
    /// Invoice numbers generated.
    InvoiceGenerated,
    /// Pivot summary generated.
    PivotGenerated,
    /// Batch files created.
    BatchCreated,
    // Export
    /// Export started.
    ExportStart,
    /// Export completed.
    ExportComplete,
    /// Export failed.
    ExportError,
    /// Voucher files handed to the ledger importer.
    TallyExport,
    // Expense
    /// Seller invoice parsed.
    ExpenseParsed,
    /// Expense mapping completed.
    ExpenseMapped,
    // Approvals
    /// Approval request raised.
    ApprovalRequested,
    /// Approval granted.
    ApprovalGranted,
    /// Approval rejected.
    ApprovalRejected,
    /// Request cleared by an auto-approval rule.
    AutoApproval,
    // Exceptions
    /// Exception recorded.
    ExceptionDetected,
    /// Exception resolved.
    ExceptionResolved,
    /// Critical failure.
    CriticalError,
    // MIS / lifecycle
    /// MIS report generated.
    MisGenerated,
    /// Operation started (scoped guard entry).
    OperationStart,
    /// Operation completed (scoped guard exit).
    OperationComplete,
    /// Run finished.
    RunFinished,
}

impl AuditAction {
    /// Return the string representation of this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IngestStart => "ingest_start",
            Self::IngestComplete => "ingest_complete",
            Self::IngestError => "ingest_error",
            Self::FileUploaded => "file_uploaded",
            Self::FileValidated => "file_validated",
            Self::MappingStart => "mapping_start",
            Self::MappingComplete => "mapping_complete",
            Self::TaxComputeStart => "tax_compute_start",
            Self::TaxComputeComplete => "tax_compute_complete",
            Self::InvoiceGenerated => "invoice_generated",
            Self::PivotGenerated => "pivot_generated",
            Self::BatchCreated => "batch_created",
            Self::ExportStart => "export_start",
            Self::ExportComplete => "export_complete",
            Self::ExportError => "export_error",
            Self::TallyExport => "tally_export",
            Self::ExpenseParsed => "expense_parsed",
            Self::ExpenseMapped => "expense_mapped",
            Self::ApprovalRequested => "approval_requested",
            Self::ApprovalGranted => "approval_granted",
            Self::ApprovalRejected => "approval_rejected",
            Self::AutoApproval => "auto_approval",
            Self::ExceptionDetected => "exception_detected",
            Self::ExceptionResolved => "exception_resolved",
            Self::CriticalError => "critical_error",
            Self::MisGenerated => "mis_generated",
            Self::OperationStart => "operation_start",
            Self::OperationComplete => "operation_complete",
            Self::RunFinished => "run_finished",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of entity an entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// An input or output file.
    File,
    /// A data record.
    Record,
    /// An approval request.
    Approval,
    /// An export artifact.
    Export,
    /// An exception row.
    Exception,
    /// A batch file.
    Batch,
    /// An invoice.
    Invoice,
    /// A tax computation.
    TaxComputation,
    /// An MIS report.
    MisReport,
}

/// One audit log entry. Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Run the entry belongs to.
    pub run_id: RunId,
    /// Who acted.
    pub actor: AuditActor,
    /// What happened.
    pub action: AuditAction,
    /// Entity kind, when the entry is about one.
    pub entity_type: Option<EntityType>,
    /// Entity identifier.
    pub entity_id: Option<String>,
    /// Event details.
    pub details: serde_json::Value,
    /// Ambient metadata (timings, counts).
    pub metadata: serde_json::Value,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

/// Buffered, order-preserving audit logger for one run.
#[derive(Debug)]
pub struct AuditLogger {
    run_id: RunId,
    buffer: Vec<AuditEntry>,
    emitted: usize,
}

impl AuditLogger {
    /// Logger for a run.
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            buffer: Vec::with_capacity(AUDIT_BUFFER_SIZE),
            emitted: 0,
        }
    }

    /// The run this logger serves.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Total entries emitted through this logger.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Append an entry. When the buffer reaches [`AUDIT_BUFFER_SIZE`] the
    /// full batch is returned, in emission order, for persistence.
    pub fn log(
        &mut self,
        actor: AuditActor,
        action: AuditAction,
        entity_type: Option<EntityType>,
        entity_id: Option<String>,
        details: serde_json::Value,
        metadata: serde_json::Value,
    ) -> Option<Vec<AuditEntry>> {
        self.buffer.push(AuditEntry {
            run_id: self.run_id,
            actor,
            action,
            entity_type,
            entity_id,
            details,
            metadata,
            timestamp: Utc::now(),
        });
        self.emitted += 1;
        tracing::debug!(action = %action, "audit entry");

        if self.buffer.len() >= AUDIT_BUFFER_SIZE {
            Some(std::mem::take(&mut self.buffer))
        } else {
            None
        }
    }

    /// Shorthand for system-actor events with no entity.
    pub fn system(
        &mut self,
        action: AuditAction,
        details: serde_json::Value,
    ) -> Option<Vec<AuditEntry>> {
        self.log(AuditActor::System, action, None, None, details, serde_json::Value::Null)
    }

    /// Drain whatever remains in the buffer.
    pub fn take_remaining(&mut self) -> Vec<AuditEntry> {
        std::mem::take(&mut self.buffer)
    }
}

/// Timing statistics for one named operation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OperationTiming {
    /// Invocations.
    pub count: usize,
    /// Total duration in milliseconds.
    pub total_ms: u128,
    /// Shortest invocation.
    pub min_ms: u128,
    /// Longest invocation.
    pub max_ms: u128,
}

impl OperationTiming {
    /// Mean duration in milliseconds.
    pub fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms as f64 / self.count as f64
        }
    }

    fn record(&mut self, elapsed_ms: u128) {
        if self.count == 0 || elapsed_ms < self.min_ms {
            self.min_ms = elapsed_ms;
        }
        if elapsed_ms > self.max_ms {
            self.max_ms = elapsed_ms;
        }
        self.count += 1;
        self.total_ms += elapsed_ms;
    }
}

/// A run-scoped audit session: wall-clock accounting plus per-operation
/// timing aggregation.
#[derive(Debug)]
pub struct AuditSession {
    started: Instant,
    started_at: DateTime<Utc>,
    operations: BTreeMap<String, OperationTiming>,
}

impl AuditSession {
    /// Start a session now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
            operations: BTreeMap::new(),
        }
    }

    /// Session start time.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Elapsed wall-clock milliseconds.
    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    /// Aggregated per-operation timings.
    pub fn operations(&self) -> &BTreeMap<String, OperationTiming> {
        &self.operations
    }

    /// Record one finished operation.
    pub fn record_operation(&mut self, name: &str, elapsed_ms: u128) {
        self.operations
            .entry(name.to_string())
            .or_default()
            .record(elapsed_ms);
    }

    /// Timing summary as a metadata payload.
    pub fn timing_metadata(&self) -> serde_json::Value {
        let ops: serde_json::Map<String, serde_json::Value> = self
            .operations
            .iter()
            .map(|(name, t)| {
                (
                    name.clone(),
                    serde_json::json!({
                        "count": t.count,
                        "total_ms": t.total_ms as u64,
                        "min_ms": t.min_ms as u64,
                        "max_ms": t.max_ms as u64,
                        "avg_ms": t.avg_ms(),
                    }),
                )
            })
            .collect();
        serde_json::json!({
            "session_ms": self.elapsed_ms() as u64,
            "operations": ops,
        })
    }
}

/// Scoped operation wrapper: START on construction, COMPLETE on drop —
/// or CRITICAL_ERROR when the scope was marked failed. Emission on drop
/// guarantees the exit event on every path, early returns included.
pub struct OperationGuard<'a> {
    name: String,
    started: Instant,
    failed: bool,
    logger: &'a mut AuditLogger,
    session: &'a mut AuditSession,
    /// Batches the guard's own log calls produced; the caller persists
    /// them after the guard drops.
    pub flushed: Vec<Vec<AuditEntry>>,
}

impl<'a> OperationGuard<'a> {
    /// Open a guard, emitting the START event.
    pub fn begin(
        name: impl Into<String>,
        logger: &'a mut AuditLogger,
        session: &'a mut AuditSession,
    ) -> Self {
        let name = name.into();
        let mut flushed = Vec::new();
        if let Some(batch) = logger.system(
            AuditAction::OperationStart,
            serde_json::json!({ "operation": name }),
        ) {
            flushed.push(batch);
        }
        Self {
            name,
            started: Instant::now(),
            failed: false,
            logger,
            session,
            flushed,
        }
    }

    /// Mark the scope failed; drop will emit CRITICAL_ERROR.
    pub fn fail(&mut self) {
        self.failed = true;
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed().as_millis();
        self.session.record_operation(&self.name, elapsed);
        let action = if self.failed {
            AuditAction::CriticalError
        } else {
            AuditAction::OperationComplete
        };
        if let Some(batch) = self.logger.system(
            action,
            serde_json::json!({ "operation": self.name, "elapsed_ms": elapsed as u64 }),
        ) {
            self.flushed.push(batch);
        }
    }
}
