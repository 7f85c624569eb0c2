//! Spreadsheet ingest adapter.
//!
//! Turns a CSV export of an inventory sheet into `(MPN, manufacturer)`
//! rows. Column detection is name-based with positional fallbacks, so the
//! adapter copes with whatever headers the inventory system emits.

use anyhow::{bail, Result};

/// One batch input row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRow {
    pub mpn: String,
    pub manufacturer: String,
}

/// Header names accepted for the MPN column, in priority order.
const MPN_HEADERS: [&str; 4] = ["mpn", "part number", "sku", "mfg part number"];
/// Header names accepted for the manufacturer column.
const MANUFACTURER_HEADERS: [&str; 3] = ["manufacturer", "mfg", "brand"];

/// Parse one CSV line honoring quoted fields and doubled quotes.
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields
}

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    for name in names {
        if let Some(idx) = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
        {
            return Some(idx);
        }
    }
    None
}

/// Parse CSV content into batch rows.
///
/// MPN column: first of `mpn`/`part number`/`sku`/`mfg part number`
/// (case-insensitive), falling back to the first column. Manufacturer:
/// `manufacturer`/`mfg`/`brand`, falling back to the second column. Rows
/// with an empty MPN are dropped.
pub fn parse_batch_csv(content: &str) -> Result<Vec<BatchRow>> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(header_line) = lines.next() else {
        bail!("batch file is empty");
    };

    let headers = parse_csv_line(header_line);
    let mpn_col = find_column(&headers, &MPN_HEADERS).unwrap_or(0);
    let manufacturer_col = find_column(&headers, &MANUFACTURER_HEADERS).unwrap_or(1);

    let mut rows = Vec::new();
    for line in lines {
        let fields = parse_csv_line(line);
        let mpn = fields
            .get(mpn_col)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if mpn.is_empty() {
            continue;
        }
        let manufacturer = fields
            .get(manufacturer_col)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        rows.push(BatchRow { mpn, manufacturer });
    }
    Ok(rows)
}
