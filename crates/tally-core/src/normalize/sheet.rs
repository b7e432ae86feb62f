//! Projection of receipts into 9-column spreadsheet rows.
//!
//! Column order is fixed by [`SHEET_HEADER`]. The total is written as a plain
//! number so spreadsheet formulas can sum it; every other absent value becomes
//! a sentinel string.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::receipt::ReceiptRecord;

/// Header row, in column order.
pub const SHEET_HEADER: [&str; 9] = [
    "date",
    "category",
    "store",
    "total",
    "item_count",
    "items",
    "payment_method",
    "receipt_link",
    "memo",
];

/// Category cell for a record without an expense category.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Payment cell for a record without a payment method.
pub const UNKNOWN_PAYMENT: &str = "unknown";

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Integer(i64),
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Integer(n) => write!(f, "{n}"),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// One spreadsheet row, ordered as [`SHEET_HEADER`].
pub type SheetRow = [Cell; 9];

/// Project a receipt into a spreadsheet row.
///
/// `None` yields an empty row that still carries the link and memo.
pub fn format_for_spreadsheet(record: Option<&ReceiptRecord>, link: &str, memo: &str) -> SheetRow {
    let Some(record) = record else {
        return [
            Cell::text(""),
            Cell::text(""),
            Cell::text(""),
            Cell::text(""),
            Cell::Integer(0),
            Cell::text(""),
            Cell::text(""),
            Cell::text(link),
            Cell::text(memo),
        ];
    };

    let date = record
        .receipt_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    let category = record
        .expense_category
        .as_ref()
        .map(|c| c.key())
        .filter(|key| !key.is_empty())
        .unwrap_or(UNCATEGORIZED);

    let total = if record.total_amount > 0.0 {
        Cell::Number(record.total_amount)
    } else {
        Cell::text("")
    };

    let items = record
        .items
        .iter()
        .map(|item| item.name.as_str())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let payment = record
        .payment_method
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(UNKNOWN_PAYMENT);

    [
        Cell::Text(date),
        Cell::text(category),
        Cell::text(record.store_name.as_str()),
        total,
        Cell::Integer(record.items.len() as i64),
        Cell::Text(items),
        Cell::text(payment),
        Cell::text(link),
        Cell::text(memo),
    ]
}

/// A receipt queued for a batched append.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptEntry {
    pub data: Option<ReceiptRecord>,
    pub link: String,
    pub memo: String,
}

impl ReceiptEntry {
    pub fn new(data: Option<ReceiptRecord>, link: impl Into<String>, memo: impl Into<String>) -> Self {
        Self {
            data,
            link: link.into(),
            memo: memo.into(),
        }
    }

    pub fn to_row(&self) -> SheetRow {
        format_for_spreadsheet(self.data.as_ref(), &self.link, &self.memo)
    }
}

/// Destination for spreadsheet rows.
pub trait SheetSink {
    type Error: fmt::Display;

    /// Whether the first row is already populated.
    fn has_header(&mut self) -> Result<bool, Self::Error>;

    /// Append rows after the last populated row.
    fn append_rows(&mut self, rows: &[Vec<Cell>]) -> Result<(), Self::Error>;
}

/// Write [`SHEET_HEADER`] if the sink has no first row. Returns whether it wrote one.
///
/// A sink that cannot report its header state is treated as empty.
pub fn ensure_header<S: SheetSink>(sink: &mut S) -> Result<bool, S::Error> {
    match sink.has_header() {
        Ok(true) => return Ok(false),
        Ok(false) => {}
        Err(e) => warn!("Could not read sheet header, assuming empty sheet: {}", e),
    }

    let header: Vec<Cell> = SHEET_HEADER.iter().map(|&name| Cell::from(name)).collect();
    sink.append_rows(&[header])?;
    info!("Wrote sheet header");
    Ok(true)
}

/// Append one row per entry in a single batch.
///
/// Sink failures are logged and absorbed; returns the number of rows written.
pub fn record_receipts<S: SheetSink>(sink: &mut S, entries: &[ReceiptEntry]) -> usize {
    if entries.is_empty() {
        return 0;
    }

    let rows: Vec<Vec<Cell>> = entries.iter().map(|entry| entry.to_row().to_vec()).collect();
    match sink.append_rows(&rows) {
        Ok(()) => {
            info!("Added {} receipts to sheet", rows.len());
            rows.len()
        }
        Err(e) => {
            warn!("Failed to add {} receipts to sheet: {}", rows.len(), e);
            0
        }
    }
}

/// Write the header when needed, then append the entries.
///
/// A header failure is logged and the rows are still attempted; returns the
/// number of rows written.
pub fn append_receipts<S: SheetSink>(sink: &mut S, entries: &[ReceiptEntry]) -> usize {
    if entries.is_empty() {
        return 0;
    }
    if let Err(e) = ensure_header(sink) {
        warn!("Failed to write sheet header: {}", e);
    }
    record_receipts(sink, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::receipt::{ExpenseCategory, ReceiptLineItem};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct MemorySink {
        rows: Vec<Vec<Cell>>,
        fail: bool,
    }

    impl SheetSink for MemorySink {
        type Error = String;

        fn has_header(&mut self) -> Result<bool, String> {
            if self.fail {
                return Err("sheet unavailable".to_string());
            }
            Ok(!self.rows.is_empty())
        }

        fn append_rows(&mut self, rows: &[Vec<Cell>]) -> Result<(), String> {
            if self.fail {
                return Err("quota exceeded".to_string());
            }
            self.rows.extend_from_slice(rows);
            Ok(())
        }
    }

    fn acme() -> ReceiptRecord {
        ReceiptRecord {
            store_name: "Acme".to_string(),
            receipt_date: Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).single(),
            total_amount: 1250.50,
            currency: "USD".to_string(),
            ..ReceiptRecord::default()
        }
    }

    #[test]
    fn test_row_for_minimal_record() {
        let mut record = acme();
        record.total_amount = 42.0;
        let row = format_for_spreadsheet(Some(&record), "https://x/r.png", "");

        assert_eq!(
            row.to_vec(),
            vec![
                Cell::text("2024-01-01"),
                Cell::text("uncategorized"),
                Cell::text("Acme"),
                Cell::Number(42.0),
                Cell::Integer(0),
                Cell::text(""),
                Cell::text("unknown"),
                Cell::text("https://x/r.png"),
                Cell::text(""),
            ]
        );
    }

    #[test]
    fn test_total_cell_is_numeric_only_when_positive() {
        let mut record = acme();
        assert_eq!(format_for_spreadsheet(Some(&record), "", "")[3], Cell::Number(1250.50));

        record.total_amount = 0.0;
        assert_eq!(format_for_spreadsheet(Some(&record), "", "")[3], Cell::text(""));
    }

    #[test]
    fn test_items_summary_skips_blank_names() {
        let mut record = acme();
        record.items = vec![
            ReceiptLineItem::new("Coffee", 3.5),
            ReceiptLineItem::new("", 1.0),
            ReceiptLineItem::new("Water", 1.0),
        ];
        let row = format_for_spreadsheet(Some(&record), "", "");
        assert_eq!(row[4], Cell::Integer(3));
        assert_eq!(row[5], Cell::text("Coffee, Water"));
    }

    #[test]
    fn test_category_and_payment_cells() {
        let mut record = acme();
        record.expense_category = Some(ExpenseCategory::CultureLeisure);
        record.payment_method = Some("card".to_string());
        let row = format_for_spreadsheet(Some(&record), "", "");
        assert_eq!(row[1], Cell::text("culture_leisure"));
        assert_eq!(row[6], Cell::text("card"));

        record.expense_category = ExpenseCategory::parse("groceries");
        assert_eq!(format_for_spreadsheet(Some(&record), "", "")[1], Cell::text("groceries"));
    }

    #[test]
    fn test_missing_record_row() {
        let row = format_for_spreadsheet(None, "https://x/r.png", "lunch");
        assert_eq!(
            row.to_vec(),
            vec![
                Cell::text(""),
                Cell::text(""),
                Cell::text(""),
                Cell::text(""),
                Cell::Integer(0),
                Cell::text(""),
                Cell::text(""),
                Cell::text("https://x/r.png"),
                Cell::text("lunch"),
            ]
        );
    }

    #[test]
    fn test_row_serializes_as_plain_values() {
        let mut record = acme();
        record.total_amount = 42.0;
        let row = format_for_spreadsheet(Some(&record), "link", "");
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["2024-01-01","uncategorized","Acme",42.0,0,"","unknown","link",""]"#);
    }

    #[test]
    fn test_ensure_header_is_idempotent() {
        let mut sink = MemorySink::default();
        assert_eq!(ensure_header(&mut sink), Ok(true));
        assert_eq!(ensure_header(&mut sink), Ok(false));
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(sink.rows[0][0], Cell::text("date"));
        assert_eq!(sink.rows[0][8], Cell::text("memo"));
    }

    #[test]
    fn test_record_receipts_batches_rows() {
        let mut sink = MemorySink::default();
        let entries = vec![
            ReceiptEntry::new(Some(acme()), "a", ""),
            ReceiptEntry::new(None, "b", "unreadable"),
        ];
        assert_eq!(record_receipts(&mut sink, &entries), 2);
        assert_eq!(sink.rows[1][7], Cell::text("b"));
        assert_eq!(record_receipts(&mut sink, &[]), 0);
    }

    #[test]
    fn test_sink_failures_are_absorbed() {
        let mut sink = MemorySink {
            fail: true,
            ..MemorySink::default()
        };
        assert_eq!(record_receipts(&mut sink, &[ReceiptEntry::new(Some(acme()), "", "")]), 0);
        assert!(ensure_header(&mut sink).is_err());
        assert_eq!(append_receipts(&mut sink, &[ReceiptEntry::new(Some(acme()), "", "")]), 0);
    }

    #[test]
    fn test_append_receipts_writes_header_once() {
        let mut sink = MemorySink::default();
        let entries = [ReceiptEntry::new(Some(acme()), "a", "")];
        assert_eq!(append_receipts(&mut sink, &entries), 1);
        assert_eq!(append_receipts(&mut sink, &entries), 1);
        assert_eq!(append_receipts(&mut sink, &[]), 0);
        assert_eq!(sink.rows.len(), 3);
        assert_eq!(sink.rows[0][0], Cell::text("date"));
        assert_eq!(sink.rows[2][2], Cell::text("Acme"));
    }
}
