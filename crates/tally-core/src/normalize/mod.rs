//! Derived quantities and completeness checks for extracted receipts.

pub mod sheet;

pub use sheet::{
    Cell, ReceiptEntry, SHEET_HEADER, SheetRow, SheetSink, append_receipts, ensure_header,
    format_for_spreadsheet, record_receipts,
};

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use tracing::warn;

use crate::error::RecordIssue;
use crate::models::receipt::{ReceiptLineItem, ReceiptRecord};

/// Bucket for items without a category.
pub const UNCATEGORIZED_ITEMS: &str = "Uncategorized";

/// Largest accepted gap between the reported total and its components.
const TOTAL_TOLERANCE: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

impl ReceiptRecord {
    /// Pre-tax total: the subtotal when reported, else total minus tax.
    pub fn total_without_tax(&self) -> f64 {
        if self.subtotal_amount > 0.0 {
            self.subtotal_amount
        } else if self.tax_amount > 0.0 {
            self.total_amount - self.tax_amount
        } else {
            self.total_amount
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of item quantities.
    pub fn total_quantity(&self) -> f64 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Items keyed by category, in category order.
    pub fn group_by_category(&self) -> BTreeMap<&str, Vec<&ReceiptLineItem>> {
        let mut groups: BTreeMap<&str, Vec<&ReceiptLineItem>> = BTreeMap::new();
        for item in &self.items {
            let category = item
                .category
                .as_deref()
                .filter(|c| !c.is_empty())
                .unwrap_or(UNCATEGORIZED_ITEMS);
            groups.entry(category).or_default().push(item);
        }
        groups
    }

    /// One-line description, e.g. `Acme | 2024-01-01 | 3 items | Total: 42.00 USD`.
    pub fn summary(&self) -> String {
        let date = self
            .receipt_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "no date".to_string());
        format!(
            "{} | {} | {} items | Total: {:.2} {}",
            self.store_name,
            date,
            self.items.len(),
            self.total_amount,
            self.currency
        )
    }

    /// Completeness problems, empty when the record is usable as is.
    pub fn validate(&self) -> Vec<RecordIssue> {
        let mut issues = Vec::new();

        if self.store_name.trim().is_empty() {
            issues.push(RecordIssue::MissingStoreName);
        }
        if self.total_amount <= 0.0 {
            issues.push(RecordIssue::NonPositiveTotal(self.total_amount));
        }
        if self.currency.trim().is_empty() {
            issues.push(RecordIssue::MissingCurrency);
        }
        if self.receipt_date.is_none() {
            issues.push(RecordIssue::MissingDate);
        }
        if let Some(mismatch) = self.total_mismatch() {
            issues.push(mismatch);
        }

        for issue in &issues {
            warn!("Receipt from {:?}: {}", self.store_name, issue);
        }
        issues
    }

    /// Compare `subtotal + tax + tip - discount` with the total, in cents.
    ///
    /// Only checked when a subtotal is reported.
    fn total_mismatch(&self) -> Option<RecordIssue> {
        if self.subtotal_amount <= 0.0 {
            return None;
        }

        let expected = cents(self.subtotal_amount) + cents(self.tax_amount) + cents(self.tip_amount)
            - cents(self.discount_amount);
        let total = cents(self.total_amount);

        if (expected - total).abs() > TOTAL_TOLERANCE {
            Some(RecordIssue::TotalMismatch {
                expected: expected.to_f64().unwrap_or_default(),
                total: self.total_amount,
            })
        } else {
            None
        }
    }
}

fn cents(amount: f64) -> Decimal {
    Decimal::from_f64(amount).unwrap_or_default().round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn record(subtotal: f64, tax: f64, total: f64) -> ReceiptRecord {
        ReceiptRecord {
            store_name: "Acme".to_string(),
            receipt_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
            currency: "USD".to_string(),
            subtotal_amount: subtotal,
            tax_amount: tax,
            total_amount: total,
            ..ReceiptRecord::default()
        }
    }

    fn item(name: &str, quantity: f64, category: Option<&str>) -> ReceiptLineItem {
        ReceiptLineItem {
            quantity,
            category: category.map(str::to_string),
            ..ReceiptLineItem::new(name, 1.0)
        }
    }

    #[test]
    fn test_total_without_tax() {
        assert_eq!(record(10.0, 2.0, 12.0).total_without_tax(), 10.0);
        assert_eq!(record(0.0, 2.0, 12.0).total_without_tax(), 10.0);
        assert_eq!(record(0.0, 0.0, 12.0).total_without_tax(), 12.0);
    }

    #[test]
    fn test_counts_and_quantities() {
        let mut receipt = record(0.0, 0.0, 12.0);
        receipt.items = vec![
            item("Apple", 1.5, Some("produce")),
            item("Bread", 2.0, None),
            item("Pear", 0.5, Some("produce")),
        ];

        assert_eq!(receipt.item_count(), 3);
        assert_eq!(receipt.total_quantity(), 4.0);

        let groups = receipt.group_by_category();
        assert_eq!(groups.keys().copied().collect::<Vec<_>>(), vec!["Uncategorized", "produce"]);
        assert_eq!(
            groups["produce"].iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            vec!["Apple", "Pear"]
        );
    }

    #[test]
    fn test_empty_category_is_uncategorized() {
        let mut receipt = record(0.0, 0.0, 1.0);
        receipt.items = vec![item("Gum", 1.0, Some(""))];
        assert_eq!(receipt.group_by_category()[UNCATEGORIZED_ITEMS].len(), 1);
    }

    #[test]
    fn test_summary() {
        let mut receipt = record(0.0, 0.0, 42.0);
        receipt.items = vec![item("Coffee", 1.0, None)];
        assert_eq!(receipt.summary(), "Acme | 2024-01-01 | 1 items | Total: 42.00 USD");

        receipt.receipt_date = None;
        assert!(receipt.summary().contains("no date"));
    }

    #[test]
    fn test_validate_complete_record() {
        assert_eq!(record(0.0, 0.0, 42.0).validate(), vec![]);
    }

    #[test]
    fn test_validate_reports_every_missing_field() {
        let issues = ReceiptRecord::default().validate();
        assert_eq!(
            issues,
            vec![
                RecordIssue::MissingStoreName,
                RecordIssue::NonPositiveTotal(0.0),
                RecordIssue::MissingCurrency,
                RecordIssue::MissingDate,
            ]
        );
    }

    #[test]
    fn test_negative_total_is_rejected() {
        let issues = record(0.0, 0.0, -3.0).validate();
        assert_eq!(issues, vec![RecordIssue::NonPositiveTotal(-3.0)]);
    }

    #[test]
    fn test_total_mismatch_only_with_subtotal() {
        // Tax without subtotal is never cross-checked.
        assert_eq!(record(0.0, 50.0, 12.0).validate(), vec![]);

        assert_eq!(record(10.0, 2.0, 12.0).validate(), vec![]);
        assert_eq!(record(10.0, 2.0, 12.04).validate(), vec![]);
        assert_eq!(record(0.1, 0.2, 0.3).validate(), vec![]);

        let issues = record(10.0, 2.0, 15.0).validate();
        assert_eq!(
            issues,
            vec![RecordIssue::TotalMismatch {
                expected: 12.0,
                total: 15.0
            }]
        );
    }

    #[test]
    fn test_discount_and_tip_in_total_check() {
        let mut receipt = record(20.0, 1.6, 19.6);
        receipt.discount_amount = 5.0;
        receipt.tip_amount = 3.0;
        assert_eq!(receipt.validate(), vec![]);
    }
}
