//! Spreadsheet export of every stored invoice.
//!
//! The workbook has a single `Notas Fiscais` worksheet with a header row followed by
//! one row per invoice in store order. Active search filters never apply here.

use crate::{
    entities::nota_fiscal,
    errors::{Error, Result},
};
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Name of the exported worksheet
pub const SHEET_NAME: &str = "Notas Fiscais";

/// Header labels, in column order
pub const HEADERS: [&str; 6] = [
    "Arquivo",
    "Emitente",
    "CNPJ",
    "Número",
    "Data de Emissão",
    "Valor Total",
];

/// What happened to an export request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The workbook was written
    Written {
        /// Where it was written
        path: PathBuf,
        /// Number of invoice rows, header excluded
        rows: usize,
    },
    /// The user cancelled the destination choice; nothing was written
    Cancelled,
}

/// Where a workbook is written before it replaces `path`: a hidden file in the same
/// directory, so the final rename never crosses filesystems.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "export".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.partial"))
}

fn discard_staging(staging: &Path) {
    if staging.is_file() {
        if let Err(e) = std::fs::remove_file(staging) {
            warn!("Could not remove partial export {:?}: {}", staging, e);
        }
    }
}

/// Writes `invoices` to a new workbook at `path`.
///
/// The workbook is saved next to `path` and renamed into place, so a failed save
/// leaves neither a partial file nor a damaged copy of a file already at `path`.
///
/// # Errors
/// Returns an error if the workbook cannot be built, saved or moved into place.
pub fn write_workbook(invoices: &[nota_fiscal::Model], path: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    let money_format = Format::new().set_num_format("#,##0.00");

    for (col, label) in (0u16..).zip(HEADERS) {
        worksheet.write_string_with_format(0, col, label, &header_format)?;
    }

    for (row, invoice) in (1u32..).zip(invoices) {
        let text = [
            invoice.file_name.as_str(),
            invoice.issuer_name.as_deref().unwrap_or_default(),
            invoice.issuer_tax_id.as_deref().unwrap_or_default(),
            invoice.invoice_number.as_deref().unwrap_or_default(),
            invoice.issue_date.as_deref().unwrap_or_default(),
        ];
        for (col, value) in (0u16..).zip(text) {
            worksheet.write_string(row, col, value)?;
        }
        worksheet.write_number_with_format(row, 5, invoice.total_value, &money_format)?;
    }

    let staging = staging_path(path);
    if let Err(e) = workbook.save(&staging) {
        discard_staging(&staging);
        return Err(e.into());
    }
    if let Err(e) = std::fs::rename(&staging, path) {
        discard_staging(&staging);
        return Err(e.into());
    }
    Ok(())
}

/// Exports `invoices` to a destination chosen by `choose_destination`.
///
/// The destination is only requested when there is something to export. A `None`
/// destination means the user cancelled.
///
/// # Errors
/// Returns `Error::ExportRefused` if `invoices` is empty, or an error if the workbook
/// write fails.
#[instrument(skip_all, fields(rows = invoices.len()))]
pub fn export_invoices<F>(
    invoices: &[nota_fiscal::Model],
    choose_destination: F,
) -> Result<ExportOutcome>
where
    F: FnOnce() -> Option<PathBuf>,
{
    if invoices.is_empty() {
        return Err(Error::ExportRefused {
            reason: "no invoices found to export".to_string(),
        });
    }

    let Some(path) = choose_destination() else {
        info!("Export cancelled");
        return Ok(ExportOutcome::Cancelled);
    };

    write_workbook(invoices, &path)?;
    info!("Exported {} invoices to {:?}", invoices.len(), path);
    Ok(ExportOutcome::Written {
        path,
        rows: invoices.len(),
    })
}
