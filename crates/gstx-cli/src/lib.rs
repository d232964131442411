//! # gstx-cli — Driver Library
//!
//! Argument surface and dispatch for the `gstx` binary. The flag names are
//! the orchestration contract with the surrounding automation — they do
//! not change between releases.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use gstx_core::{Channel, Gstin, Month};
use gstx_masters::loaders::load_asin_map;
use gstx_pipeline::{Pipeline, PipelineRequest, StageToggles};
use gstx_store::MemoryStore;

/// GSTX Stack pipeline driver.
///
/// Ingests one marketplace report and carries it as far as the enabled
/// stages allow: master mapping, GST computation and invoice numbering,
/// pivot and batch split, X2Beta voucher export, seller-invoice expense
/// processing, exception handling, and MIS/audit generation.
#[derive(Parser, Debug)]
#[command(name = "gstx", version, about, long_about = None)]
pub struct Cli {
    /// Ingestion agent for the input report.
    #[arg(long, value_parser = ["amazon_mtr", "amazon_str", "flipkart", "pepperfry"])]
    pub agent: String,

    /// Path to the input report (CSV or Excel).
    #[arg(long)]
    pub input: PathBuf,

    /// Path to the returns report (Pepperfry only).
    #[arg(long)]
    pub returns: Option<PathBuf>,

    /// Path to an ASIN→SKU map (Amazon STR only).
    #[arg(long = "asin-map")]
    pub asin_map: Option<PathBuf>,

    /// Channel label recorded on every row.
    #[arg(long)]
    pub channel: String,

    /// Company GSTIN the run is scoped to.
    #[arg(long)]
    pub gstin: String,

    /// Processing month, YYYY-MM.
    #[arg(long)]
    pub month: String,

    /// Enable item & ledger master mapping.
    #[arg(long = "enable-mapping")]
    pub enable_mapping: bool,

    /// Apply pending approvals non-interactively as this approver.
    #[arg(long = "interactive-approval")]
    pub interactive_approval: bool,

    /// Approver name recorded on applied decisions.
    #[arg(long)]
    pub approver: Option<String>,

    /// Enable tax computation & invoice numbering.
    #[arg(long = "enable-tax-invoice")]
    pub enable_tax_invoice: bool,

    /// Enable pivoting & batch splitting.
    #[arg(long = "enable-pivot-batch")]
    pub enable_pivot_batch: bool,

    /// Enable X2Beta voucher export.
    #[arg(long = "enable-tally-export")]
    pub enable_tally_export: bool,

    /// Enable seller invoice & expense processing.
    #[arg(long = "enable-expense-processing")]
    pub enable_expense_processing: bool,

    /// Seller invoice files (text or Excel).
    #[arg(long = "seller-invoices", num_args = 1..)]
    pub seller_invoices: Vec<PathBuf>,

    /// Enable exception detection passes.
    #[arg(long = "enable-exception-handling")]
    pub enable_exception_handling: bool,

    /// Skip exception detection passes.
    #[arg(long = "skip-exception-handling")]
    pub skip_exception_handling: bool,

    /// Enable MIS report & audit trail generation.
    #[arg(long = "enable-mis-audit")]
    pub enable_mis_audit: bool,

    /// MIS export formats.
    #[arg(long = "mis-export-formats", num_args = 1.., default_values = ["csv", "database"])]
    pub mis_export_formats: Vec<String>,

    /// Enable the complete pipeline.
    #[arg(long = "full-pipeline")]
    pub full_pipeline: bool,

    /// Working directory for run artifacts.
    #[arg(long = "work-dir", default_value = "gstx-work")]
    pub work_dir: PathBuf,

    /// Worker pool size for row-level work.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Cli {
    /// Resolve the stage toggles from the flag combination.
    pub fn stage_toggles(&self) -> StageToggles {
        if self.full_pipeline {
            let mut toggles = StageToggles::full();
            if self.skip_exception_handling {
                toggles.exception_handling = false;
            }
            return toggles;
        }
        StageToggles {
            mapping: self.enable_mapping,
            tax_invoice: self.enable_tax_invoice,
            pivot_batch: self.enable_pivot_batch,
            tally_export: self.enable_tally_export,
            expense_processing: self.enable_expense_processing,
            exception_handling: self.enable_exception_handling && !self.skip_exception_handling,
            mis_audit: self.enable_mis_audit,
        }
    }
}

/// Build the pipeline request from parsed arguments.
pub fn build_request(cli: &Cli) -> Result<PipelineRequest> {
    let channel = Channel::parse(&cli.agent)
        .with_context(|| format!("unknown agent {:?}", cli.agent))?;
    if Channel::parse(&cli.channel).is_none() {
        bail!("unknown channel {:?}", cli.channel);
    }
    let gstin = Gstin::new(cli.gstin.clone()).context("invalid --gstin")?;
    let month = Month::new(cli.month.clone()).context("invalid --month")?;

    if channel == Channel::Pepperfry && cli.returns.is_none() {
        tracing::warn!("pepperfry run without --returns; returns will not be merged");
    }

    let asin_to_sku = match &cli.asin_map {
        Some(path) => load_asin_map(path)
            .with_context(|| format!("failed to load --asin-map {}", path.display()))?,
        None => Default::default(),
    };

    let mut request = PipelineRequest::new(channel, gstin, month, cli.input.clone(), cli.work_dir.clone());
    request.returns = cli.returns.clone();
    request.asin_to_sku = asin_to_sku;
    request.seller_invoices = cli.seller_invoices.clone();
    request.stages = cli.stage_toggles();
    request.approver = if cli.interactive_approval || cli.approver.is_some() {
        Some(cli.approver.clone().unwrap_or_else(|| "manual".into()))
    } else {
        None
    };
    request.mis_formats = cli.mis_export_formats.clone();
    request.workers = cli.workers;
    Ok(request)
}

/// Execute the run and map its status to an exit code.
pub fn run_command(cli: &Cli) -> Result<u8> {
    let request = build_request(cli)?;
    if !request.input.exists() {
        bail!("input file not found: {}", request.input.display());
    }

    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(store);
    let outcome = pipeline.run(&request);

    println!("run {}: {}", outcome.run_id, outcome.status);
    println!("  rows ingested: {}", outcome.rows_ingested);
    if let Some(mapping) = &outcome.mapping {
        println!(
            "  mapping coverage: {:.1}% ({} pending approvals)",
            mapping.coverage_percent(),
            outcome.pending_approvals
        );
    }
    if let Some(tax) = &outcome.tax {
        println!("  tax computed: {}/{}", tax.computed, tax.processed);
    }
    if outcome.batch_files > 0 {
        println!(
            "  pivot groups: {} across {} batch file(s)",
            outcome.pivot_groups, outcome.batch_files
        );
    }
    for export in &outcome.exports {
        println!("  exported: {}", export.file_path.display());
    }
    if let Some(expense) = &outcome.expense_export {
        println!("  expense export: {}", expense.file_path.display());
    }
    if outcome.exceptions > 0 {
        println!("  exceptions recorded: {}", outcome.exceptions);
    }
    if let Some(mis) = &outcome.mis {
        println!("  data quality score: {:.1}", mis.data_quality_score);
    }

    Ok(if outcome.status.is_ok() { 0 } else { 1 })
}
