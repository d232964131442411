//! # Channel Normalization
//!
//! Applies the channel mapping to a [`SourceTable`], runs the
//! report-specific row filter, injects run metadata, and coerces numeric
//! columns. The output is the canonical row set plus the normalized CSV
//! artifact with its SHA-256 content hash.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use uuid::Uuid;

use gstx_core::temporal::parse_flexible_date;
use gstx_core::{Channel, Gstin, Money, Month, NormalizedRow, TransactionKind};

use crate::mappings::{candidates_for, channel_mapping, NUMERIC_TARGETS};
use crate::table::SourceTable;
use crate::IngestError;

/// Inputs for one report normalization.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Channel the report belongs to.
    pub channel: Channel,
    /// Company GSTIN the run is scoped to.
    pub gstin: Gstin,
    /// Processing month.
    pub month: Month,
    /// Primary report file.
    pub file_path: PathBuf,
    /// Returns file (Pepperfry only).
    pub returns_path: Option<PathBuf>,
    /// ASIN → SKU map (Amazon STR only).
    pub asin_to_sku: HashMap<String, String>,
}

/// Result of one report normalization.
#[derive(Debug)]
pub struct IngestOutput {
    /// Canonical rows, in input order (returns appended for Pepperfry).
    pub rows: Vec<NormalizedRow>,
    /// Encoding the decoder settled on.
    pub encoding: &'static str,
    /// Data rows read from the source before filtering.
    pub source_rows: usize,
    /// Rows dropped by the report-specific filter.
    pub filtered_rows: usize,
    /// Malformed lines skipped by the CSV parser.
    pub skipped_lines: usize,
}

/// Normalize one report into canonical rows.
pub fn normalize_report(request: &IngestRequest) -> Result<IngestOutput, IngestError> {
    let table = SourceTable::read_path(&request.file_path)?;
    require_state_column(request.channel, &table)?;

    let mut output = match request.channel {
        Channel::AmazonMtr => normalize_amazon_mtr(request, &table),
        Channel::AmazonStr => normalize_amazon_str(request, &table),
        Channel::Flipkart => normalize_flipkart(request, &table),
        Channel::Pepperfry => normalize_pepperfry_sales(request, &table),
    };

    if request.channel == Channel::Pepperfry {
        if let Some(returns_path) = &request.returns_path {
            let returns_table = SourceTable::read_path(returns_path)?;
            let returns = normalize_pepperfry_returns(request, &returns_table);
            output.source_rows += returns.source_rows;
            output.filtered_rows += returns.filtered_rows;
            output.skipped_lines += returns.skipped_lines;
            output.rows.extend(returns.rows);
        }
    }

    tracing::info!(
        channel = %request.channel,
        encoding = output.encoding,
        rows = output.rows.len(),
        filtered = output.filtered_rows,
        skipped = output.skipped_lines,
        "report normalized"
    );
    Ok(output)
}

/// Write normalized rows to `{dir}/{channel}_{uuid}.csv` and return the
/// path with the SHA-256 hex digest of the file contents.
pub fn write_normalized_csv(
    rows: &[NormalizedRow],
    dir: &Path,
    channel: Channel,
) -> Result<(PathBuf, String), IngestError> {
    std::fs::create_dir_all(dir).map_err(|source| IngestError::Io {
        path: dir.display().to_string(),
        source,
    })?;
    let file_name = format!("{}_{}.csv", channel.as_str(), Uuid::new_v4().simple());
    let path = dir.join(file_name);

    let mut buffer = Vec::new();
    {
        let mut writer = csv::Writer::from_writer(&mut buffer);
        let mut header: Vec<&str> = vec![
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
        ];
        match channel {
            Channel::Pepperfry => header.push("is_return"),
            Channel::Flipkart => header.push("final_date"),
            _ => {}
        }
        writer
            .write_record(&header)
            .map_err(|e| IngestError::Empty(e.to_string()))?;
        for row in rows {
            let mut record = vec![
                row.invoice_date.clone(),
                row.kind.as_str().to_string(),
                row.order_id.clone(),
                row.sku.clone(),
                row.asin.clone(),
                row.quantity.to_string(),
                row.taxable_value.to_string(),
                row.gst_rate_string(),
                row.state_code.clone(),
                row.channel.as_str().to_string(),
                row.gstin.clone(),
                row.month.as_str().to_string(),
            ];
            match channel {
                Channel::Pepperfry => record.push(row.is_return.to_string()),
                Channel::Flipkart => record.push(row.final_date.clone().unwrap_or_default()),
                _ => {}
            }
            writer
                .write_record(&record)
                .map_err(|e| IngestError::Empty(e.to_string()))?;
        }
        writer.flush().map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })?;
    }

    std::fs::write(&path, &buffer).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&buffer);
    let hash = format!("{:x}", hasher.finalize());
    Ok((path, hash))
}

// ---------------------------------------------------------------------------
// Per-channel normalizers
// ---------------------------------------------------------------------------

fn normalize_amazon_mtr(request: &IngestRequest, table: &SourceTable) -> IngestOutput {
    let type_col = table.first_present(&["type", "transaction_type", "line_item_type"]);
    let rate_cols = present_rate_columns(table);

    let mut rows = Vec::new();
    let mut filtered = 0usize;
    for (i, _) in table.rows.iter().enumerate() {
        let kind = match type_col {
            Some(col) => match TransactionKind::parse(table.cell(i, col)) {
                Some(k @ (TransactionKind::Shipment | TransactionKind::Refund)) => k,
                _ => {
                    filtered += 1;
                    continue;
                }
            },
            None => TransactionKind::Shipment,
        };

        let mut row = base_row(request, table, i, kind);
        // MTR splits the rate across IGST/CGST/SGST component columns;
        // the canonical rate is their sum.
        row.gst_rate_bps = rate_cols
            .iter()
            .map(|&col| parse_rate_bps(table.cell(i, col)))
            .sum();
        rows.push(row);
    }

    IngestOutput {
        rows,
        encoding: table.encoding,
        source_rows: table.rows.len(),
        filtered_rows: filtered,
        skipped_lines: table.skipped_lines,
    }
}

fn normalize_amazon_str(request: &IngestRequest, table: &SourceTable) -> IngestOutput {
    let ship_col = table.first_present(&[
        "ship_to_state",
        "ship_to_state_code",
        "ship_state_code",
        "destination_state",
        "state_code",
    ]);
    let seller_col = table.first_present(&[
        "ship_from_state",
        "seller_state_code",
        "from_state_code",
        "origin_state_code",
    ]);

    let mut rows = Vec::new();
    let mut filtered = 0usize;
    for (i, _) in table.rows.iter().enumerate() {
        // STR is stock transfer: only interstate movements are taxable
        // events here. Filter applies only when both columns exist.
        if let (Some(ship), Some(seller)) = (ship_col, seller_col) {
            if !table.cell(i, ship).is_empty()
                && table.cell(i, ship).eq_ignore_ascii_case(table.cell(i, seller))
            {
                filtered += 1;
                continue;
            }
        }

        let mut row = base_row(request, table, i, TransactionKind::Shipment);
        if row.sku.is_empty() && !row.asin.is_empty() {
            if let Some(sku) = request.asin_to_sku.get(&row.asin) {
                row.sku = sku.clone();
            }
        }
        if let Some(col) = seller_col {
            let value = table.cell(i, col);
            if !value.is_empty() {
                row.seller_state = Some(value.to_string());
            }
        }
        rows.push(row);
    }

    IngestOutput {
        rows,
        encoding: table.encoding,
        source_rows: table.rows.len(),
        filtered_rows: filtered,
        skipped_lines: table.skipped_lines,
    }
}

fn normalize_flipkart(request: &IngestRequest, table: &SourceTable) -> IngestOutput {
    let seller_col = table.first_present(candidates_for(request.channel, "seller_state"));
    let mut rows = Vec::new();
    for (i, _) in table.rows.iter().enumerate() {
        let mut row = base_row(request, table, i, TransactionKind::Shipment);
        row.final_date = parse_flexible_date(&row.invoice_date).map(|d| d.to_string());
        row.seller_state = seller_col
            .map(|c| table.cell(i, c).to_string())
            .filter(|s| !s.is_empty());
        rows.push(row);
    }
    IngestOutput {
        rows,
        encoding: table.encoding,
        source_rows: table.rows.len(),
        filtered_rows: 0,
        skipped_lines: table.skipped_lines,
    }
}

fn normalize_pepperfry_sales(request: &IngestRequest, table: &SourceTable) -> IngestOutput {
    let total_col = table.first_present(&["total_qty", "ordered_qty"]);
    let returned_col = table.first_present(&["returned_qty", "return_qty"]);

    let mut rows = Vec::new();
    for (i, _) in table.rows.iter().enumerate() {
        let mut row = base_row(request, table, i, TransactionKind::Shipment);
        row.total_qty = total_col
            .map(|c| parse_i64(table.cell(i, c)))
            .filter(|&v| v > 0)
            .or(Some(row.quantity.max(0)));
        row.returned_qty = returned_col.map(|c| parse_i64(table.cell(i, c)));
        rows.push(row);
    }
    IngestOutput {
        rows,
        encoding: table.encoding,
        source_rows: table.rows.len(),
        filtered_rows: 0,
        skipped_lines: table.skipped_lines,
    }
}

fn normalize_pepperfry_returns(request: &IngestRequest, table: &SourceTable) -> IngestOutput {
    let mut rows = Vec::new();
    for (i, _) in table.rows.iter().enumerate() {
        let mut row = base_row(request, table, i, TransactionKind::Return);
        row.is_return = true;
        row.quantity = -row.quantity.abs();
        rows.push(row);
    }
    IngestOutput {
        rows,
        encoding: table.encoding,
        source_rows: table.rows.len(),
        filtered_rows: 0,
        skipped_lines: table.skipped_lines,
    }
}

// ---------------------------------------------------------------------------
// Shared row construction
// ---------------------------------------------------------------------------

fn base_row(
    request: &IngestRequest,
    table: &SourceTable,
    i: usize,
    kind: TransactionKind,
) -> NormalizedRow {
    let get = |target: &str| -> String {
        table
            .first_present(candidates_for(request.channel, target))
            .map(|col| table.cell(i, col).to_string())
            .unwrap_or_default()
    };

    NormalizedRow {
        invoice_date: get("invoice_date"),
        kind,
        order_id: get("order_id"),
        sku: get("sku"),
        asin: get("asin"),
        quantity: parse_i64(&get("quantity")),
        taxable_value: parse_money(&get("taxable_value")),
        gst_rate_bps: parse_rate_bps(&get("gst_rate")),
        state_code: get("state_code"),
        seller_state: None,
        final_date: None,
        channel: request.channel,
        gstin: request.gstin.as_str().to_string(),
        month: request.month.clone(),
        is_return: false,
        total_qty: None,
        returned_qty: None,
    }
}

fn require_state_column(channel: Channel, table: &SourceTable) -> Result<(), IngestError> {
    let candidates = candidates_for(channel, "state_code");
    if table.first_present(candidates).is_none() {
        return Err(IngestError::MissingColumn {
            target: "state_code".into(),
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
        });
    }
    Ok(())
}

fn present_rate_columns(table: &SourceTable) -> Vec<usize> {
    ["igst_rate", "cgst_rate", "sgst_rate"]
        .iter()
        .filter_map(|name| table.column(name))
        .collect()
}

/// Parse an integer cell; non-numeric input defaults to 0.
pub fn parse_i64(s: &str) -> i64 {
    let cleaned = s.trim().replace(',', "");
    cleaned
        .parse::<i64>()
        .or_else(|_| cleaned.parse::<f64>().map(|f| f.round() as i64))
        .unwrap_or(0)
}

/// Parse a money cell; non-numeric input defaults to zero.
pub fn parse_money(s: &str) -> Money {
    let cleaned = s.trim().replace([',', '₹'], "");
    Money::parse(&cleaned)
        .or_else(|| cleaned.parse::<f64>().ok().map(Money::from_rupees))
        .unwrap_or(Money::ZERO)
}

/// Parse a fractional rate cell into basis points (`"0.18"` → 1800).
pub fn parse_rate_bps(s: &str) -> i64 {
    let cleaned = s.trim().trim_end_matches('%');
    cleaned
        .parse::<f64>()
        .map(|f| (f * 10_000.0).round() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn request(channel: Channel, file: &Path) -> IngestRequest {
        IngestRequest {
            channel,
            gstin: Gstin::new("06ABGCS4796R1ZA").unwrap(),
            month: Month::new("2025-08").unwrap(),
            file_path: file.to_path_buf(),
            returns_path: None,
            asin_to_sku: HashMap::new(),
        }
    }

    fn write_temp(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn mtr_filters_and_sums_rate_components() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "mtr.csv",
            "Transaction Type,Order Id,Sku,Asin,Quantity,Principal Amount,Igst Rate,Cgst Rate,Sgst Rate,Ship To State,Invoice Date\n\
             Shipment,O1,SKU1,B0A,1,1000.00,0,0.09,0.09,HARYANA,2025-08-02\n\
             Cancel,O2,SKU2,B0B,1,500.00,0.18,0,0,KARNATAKA,2025-08-03\n\
             Refund,O3,SKU1,B0A,1,200.00,0.18,0,0,KARNATAKA,2025-08-04\n",
        );
        let out = normalize_report(&request(Channel::AmazonMtr, &path)).unwrap();
        assert_eq!(out.rows.len(), 2);
        assert_eq!(out.filtered_rows, 1);
        assert_eq!(out.rows[0].gst_rate_bps, 1800);
        assert_eq!(out.rows[0].taxable_value, Money::from_paise(100_000));
        assert_eq!(out.rows[0].kind, TransactionKind::Shipment);
        assert_eq!(out.rows[1].kind, TransactionKind::Refund);
        assert_eq!(out.rows[0].gstin, "06ABGCS4796R1ZA");
        assert_eq!(out.rows[0].month.as_str(), "2025-08");
    }

    #[test]
    fn str_filters_intrastate_and_maps_asin() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "str.csv",
            "Invoice Date,Order Id,Asin,Quantity,Taxable Value,Gst Rate,Ship To State,Ship From State\n\
             2025-08-01,O1,B0A,2,500.00,0.18,KARNATAKA,HARYANA\n\
             2025-08-01,O2,B0B,1,300.00,0.18,HARYANA,HARYANA\n",
        );
        let mut req = request(Channel::AmazonStr, &path);
        req.asin_to_sku.insert("B0A".into(), "SKU-A".into());
        let out = normalize_report(&req).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.filtered_rows, 1);
        assert_eq!(out.rows[0].sku, "SKU-A");
        assert_eq!(out.rows[0].seller_state.as_deref(), Some("HARYANA"));
    }

    #[test]
    fn flipkart_derives_final_date() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "fk.csv",
            "Order Date,Order Id,Fsn,Qty,Net Amount,Tax Rate,State\n\
             14-08-2025,OD1,FSN1,1,999.00,0.18,DELHI\n",
        );
        let out = normalize_report(&request(Channel::Flipkart, &path)).unwrap();
        assert_eq!(out.rows[0].final_date.as_deref(), Some("2025-08-14"));
        assert_eq!(out.rows[0].sku, "FSN1");
    }

    #[test]
    fn pepperfry_merges_returns_with_negative_quantity() {
        let dir = tempfile::tempdir().unwrap();
        let sales = write_temp(
            &dir,
            "pf.csv",
            "Invoice Date,Order Id,Item Sku,Qty,Net Amount,Tax Rate,State\n\
             2025-08-05,P1,PSKU,4,400.00,0.18,HARYANA\n",
        );
        let returns = write_temp(
            &dir,
            "pf_ret.csv",
            "Invoice Date,Order Id,Item Sku,Qty,Net Amount,Tax Rate,State\n\
             2025-08-09,P1,PSKU,1,100.00,0.18,HARYANA\n",
        );
        let mut req = request(Channel::Pepperfry, &sales);
        req.returns_path = Some(returns);
        let out = normalize_report(&req).unwrap();
        assert_eq!(out.rows.len(), 2);
        assert!(!out.rows[0].is_return);
        assert!(out.rows[1].is_return);
        assert_eq!(out.rows[1].quantity, -1);
        assert_eq!(out.rows[0].total_qty, Some(4));
    }

    #[test]
    fn missing_state_column_is_schema_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(&dir, "bad.csv", "Order Id,Quantity\nO1,1\n");
        let err = normalize_report(&request(Channel::AmazonMtr, &path)).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn { .. }));
    }

    #[test]
    fn normalized_csv_is_deterministic_for_same_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_temp(
            &dir,
            "mtr.csv",
            "Transaction Type,Order Id,Sku,Asin,Quantity,Principal Amount,Igst Rate,Ship To State,Invoice Date\n\
             Shipment,O1,SKU1,B0A,1,1000.00,0.18,HARYANA,2025-08-02\n",
        );
        let out = normalize_report(&request(Channel::AmazonMtr, &path)).unwrap();
        let (p1, h1) = write_normalized_csv(&out.rows, dir.path(), Channel::AmazonMtr).unwrap();
        let (p2, h2) = write_normalized_csv(&out.rows, dir.path(), Channel::AmazonMtr).unwrap();
        assert_ne!(p1, p2, "file names carry a uuid suffix");
        assert_eq!(h1, h2, "content hash is input-determined");
    }

    #[test]
    fn numeric_coercion_defaults() {
        assert_eq!(parse_i64("3"), 3);
        assert_eq!(parse_i64("3.0"), 3);
        assert_eq!(parse_i64("n/a"), 0);
        assert_eq!(parse_money("1,234.56"), Money::from_paise(123_456));
        assert_eq!(parse_money(""), Money::ZERO);
        assert_eq!(parse_rate_bps("0.18"), 1800);
        assert_eq!(parse_rate_bps(""), 0);
    }
}
