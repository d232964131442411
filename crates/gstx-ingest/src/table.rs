//! # Source Table
//!
//! A decoded report as headers plus string cells. Both CSV and spreadsheet
//! inputs land here before channel mapping; downstream code never touches
//! the file format again.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::encoding::decode_report;
use crate::IngestError;

/// A report loaded into memory with normalized headers.
#[derive(Debug, Clone)]
pub struct SourceTable {
    /// Normalized (lowercase, underscore) column headers.
    pub headers: Vec<String>,
    /// Row cells, padded/truncated to the header width.
    pub rows: Vec<Vec<String>>,
    /// Encoding label the decoder settled on (`"utf-8"`, `"cp1252"`, …;
    /// `"binary"` for spreadsheets).
    pub encoding: &'static str,
    /// Number of malformed lines skipped during parsing.
    pub skipped_lines: usize,
}

impl SourceTable {
    /// Load a report from disk, dispatching on extension.
    pub fn read_path(path: &Path) -> Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xls" | "xlsm" => Self::read_spreadsheet(path),
            _ => Self::read_csv(path),
        }
    }

    /// Load a delimited text report with encoding fallback.
    pub fn read_csv(path: &Path) -> Result<Self, IngestError> {
        let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let (text, encoding) = decode_report(&bytes)
            .ok_or_else(|| IngestError::Undecodable(path.display().to_string()))?;
        Self::from_csv_text(&text, encoding)
    }

    /// Parse already-decoded CSV text.
    pub fn from_csv_text(text: &str, encoding: &'static str) -> Result<Self, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = reader.records();
        let headers: Vec<String> = match records.next() {
            Some(Ok(record)) => record.iter().map(normalize_header).collect(),
            _ => return Err(IngestError::Empty("no header row".into())),
        };

        let mut rows = Vec::new();
        let mut skipped_lines = 0usize;
        for record in records {
            match record {
                Ok(record) => {
                    let mut cells: Vec<String> =
                        record.iter().map(|c| c.trim().to_string()).collect();
                    cells.resize(headers.len(), String::new());
                    rows.push(cells);
                }
                Err(err) => {
                    skipped_lines += 1;
                    tracing::warn!(%err, "skipping malformed report line");
                }
            }
        }

        Ok(Self {
            headers,
            rows,
            encoding,
            skipped_lines,
        })
    }

    /// Load the first sheet of a spreadsheet report.
    pub fn read_spreadsheet(path: &Path) -> Result<Self, IngestError> {
        let mut workbook = open_workbook_auto(path).map_err(|e| IngestError::Spreadsheet {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| IngestError::Spreadsheet {
                path: path.display().to_string(),
                message: "workbook has no sheets".into(),
            })?;
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| IngestError::Spreadsheet {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut row_iter = range.rows();
        let headers: Vec<String> = match row_iter.next() {
            Some(cells) => cells.iter().map(|c| normalize_header(&cell_text(c))).collect(),
            None => return Err(IngestError::Empty(path.display().to_string())),
        };

        let rows: Vec<Vec<String>> = row_iter
            .map(|cells| {
                let mut out: Vec<String> = cells.iter().map(cell_text).collect();
                out.resize(headers.len(), String::new());
                out
            })
            .collect();

        Ok(Self {
            headers,
            rows,
            encoding: "binary",
            skipped_lines: 0,
        })
    }

    /// Index of a header, if present.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of the first present header among candidates.
    pub fn first_present(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|c| self.column(c))
    }

    /// Cell value at (row, col), empty string when out of range.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Lowercase a header and collapse non-alphanumerics to single underscores.
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = true;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn cell_text(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                format!("{f}")
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header("Ship To State"), "ship_to_state");
        assert_eq!(normalize_header("  Order ID  "), "order_id");
        assert_eq!(normalize_header("Invoice Amount (INR)"), "invoice_amount_inr");
        assert_eq!(normalize_header("SKU"), "sku");
    }

    #[test]
    fn csv_text_parses_and_pads() {
        let table = SourceTable::from_csv_text(
            "SKU,Quantity,Taxable Value\nA1,2,100.50\nB2,1\n",
            "utf-8",
        )
        .unwrap();
        assert_eq!(table.headers, vec!["sku", "quantity", "taxable_value"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.cell(0, 2), "100.50");
        assert_eq!(table.cell(1, 2), "");
    }

    #[test]
    fn first_present_honors_order() {
        let table =
            SourceTable::from_csv_text("tax_exclusive_gross,principal_amount\n1,2\n", "utf-8")
                .unwrap();
        let idx = table
            .first_present(&["principal_amount", "tax_exclusive_gross"])
            .unwrap();
        assert_eq!(table.headers[idx], "principal_amount");
    }
}
