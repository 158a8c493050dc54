//! Presentation of invoices as a text table and as a detail view.
//!
//! The view owns no data: it is rebuilt from the query result after every action.
//! Each row binds the natural key of its invoice when the view is built, and row
//! actions act on that key.

use crate::{core::export::HEADERS, core::invoice::NaturalKey, entities::nota_fiscal};
use unicode_width::UnicodeWidthStr;

/// Label of the action column
const ACTION_HEADER: &str = "#";

/// One table row.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRow {
    /// 1-based row number; the handle the edit and delete actions are invoked with
    pub number: usize,
    /// Cell texts in `HEADERS` order
    pub cells: [String; 6],
    /// Key of the invoice this row shows
    pub key: NaturalKey,
}

impl InvoiceRow {
    fn new(number: usize, invoice: &nota_fiscal::Model) -> Self {
        Self {
            number,
            cells: [
                invoice.file_name.clone(),
                text(invoice.issuer_name.as_ref()),
                text(invoice.issuer_tax_id.as_ref()),
                text(invoice.invoice_number.as_ref()),
                text(invoice.issue_date.as_ref()),
                format_value(invoice.total_value),
            ],
            key: NaturalKey::from(invoice),
        }
    }

    /// Read-only detail view of this row.
    #[must_use]
    pub fn details(&self) -> String {
        render_details(&self.cells)
    }
}

/// Stored text, with NULL shown as empty.
fn text(value: Option<&String>) -> String {
    value.cloned().unwrap_or_default()
}

/// Formats a currency amount with two decimals.
#[must_use]
pub fn format_value(value: f64) -> String {
    format!("{value:.2}")
}

/// Renders labeled fields of one invoice, titled with its file name.
#[must_use]
pub fn render_details(cells: &[String; 6]) -> String {
    let mut out = format!("Detalhes da Nota: {}\n", cells[0]);
    for (label, value) in HEADERS.iter().zip(cells).skip(1) {
        out.push_str(&format!("{label}: {value}\n"));
    }
    out
}

/// Detail view of a stored invoice.
#[must_use]
pub fn invoice_details(invoice: &nota_fiscal::Model) -> String {
    InvoiceRow::new(1, invoice).details()
}

/// The invoice table shown after a search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableView {
    rows: Vec<InvoiceRow>,
}

impl TableView {
    /// Builds the table from a query result, numbering rows from 1.
    #[must_use]
    pub fn from_invoices(invoices: &[nota_fiscal::Model]) -> Self {
        Self {
            rows: invoices
                .iter()
                .enumerate()
                .map(|(i, invoice)| InvoiceRow::new(i + 1, invoice))
                .collect(),
        }
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[InvoiceRow] {
        &self.rows
    }

    /// The row with the given 1-based number.
    #[must_use]
    pub fn row(&self, number: usize) -> Option<&InvoiceRow> {
        number.checked_sub(1).and_then(|i| self.rows.get(i))
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders the table with columns aligned by display width.
    #[must_use]
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return "No invoices found.".to_string();
        }

        let numbers: Vec<String> = self.rows.iter().map(|r| r.number.to_string()).collect();
        let mut widths = [0usize; 7];
        widths[0] = numbers
            .iter()
            .map(|n| n.width())
            .chain([ACTION_HEADER.width()])
            .max()
            .unwrap_or(1);
        for (i, header) in HEADERS.iter().enumerate() {
            widths[i + 1] = self
                .rows
                .iter()
                .map(|r| r.cells[i].width())
                .chain([header.width()])
                .max()
                .unwrap_or(0);
        }

        let mut out = String::new();
        let header: Vec<&str> = std::iter::once(ACTION_HEADER).chain(HEADERS).collect();
        push_line(&mut out, &header, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_line(&mut out, &rule, &widths);
        for (row, number) in self.rows.iter().zip(&numbers) {
            let cells: Vec<&str> = std::iter::once(number.as_str())
                .chain(row.cells.iter().map(String::as_str))
                .collect();
            push_line(&mut out, &cells, &widths);
        }
        out.push_str(&format!("{} invoice(s)", self.rows.len()));
        out
    }
}

fn push_line<S: AsRef<str>>(out: &mut String, cells: &[S], widths: &[usize; 7]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, width))| {
            let cell = cell.as_ref();
            let padding = " ".repeat(width.saturating_sub(cell.width()));
            // amounts are right-aligned
            if i == 6 {
                format!("{padding}{cell}")
            } else {
                format!("{cell}{padding}")
            }
        })
        .collect();
    out.push_str(line.join(" | ").trim_end());
    out.push('\n');
}
