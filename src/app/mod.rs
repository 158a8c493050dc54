//! Application layer - user actions over the invoice store.
//!
//! Each public method of [`App`] is one user action. An action opens its own short-lived
//! connection to the store, runs the core operations, and reports the outcome through
//! the [`Prompter`]. Connections are closed before the user is asked anything. Failures stop at the action boundary: they become error notices and
//! the application stays usable for the next action.

/// Confirmation prompts, notices and the terminal implementation
pub mod prompt;
/// Interactive shell
pub mod shell;
/// Table and detail rendering
pub mod view;

use crate::{
    config::database::Store,
    core::{
        export::{ExportOutcome, export_invoices},
        ingest::{IngestReport, ingest_files, is_xml_file},
        invoice::{
            InvoiceChanges, NaturalKey, SearchFilter, delete_invoice, find_by_key,
            list_all_invoices, search_invoices, update_invoice,
        },
    },
    errors::{Error, Result},
};
use prompt::{Notice, Prompter};
use std::path::PathBuf;
use tracing::{debug, error, info};
use view::{TableView, invoice_details};

/// Maps a failed action to the notice the user sees.
#[must_use]
pub fn notice_for_error(action: &str, error: &Error) -> Notice {
    match error {
        Error::ExportRefused { .. } => {
            Notice::info("Nothing to export", "No invoices found to export.")
        }
        Error::KeyConflict { .. } | Error::InvalidAmount { .. } | Error::RowNotFound { .. } => {
            Notice::warning(action, error.to_string())
        }
        Error::Parse { .. } => Notice::warning("Error", error.to_string()),
        _ => Notice::error("Error", format!("{action} failed: {error}")),
    }
}

/// Summary message of an ingest batch.
#[must_use]
pub fn ingest_summary(report: &IngestReport) -> String {
    let mut message = format!("{} invoice(s) inserted successfully!", report.inserted);
    if !report.skipped.is_empty() {
        message.push_str("\nInvoices ignored because they already exist:\n");
        message.push_str(&report.skipped.join("\n"));
    }
    message
}

/// Expands a user selection: directories contribute the `.xml` files directly inside
/// them, sorted by name; other paths are kept as given.
///
/// # Errors
/// Returns an error if a directory cannot be read.
pub fn expand_selection(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<std::io::Result<_>>()?;
            found.retain(|p| p.is_file() && is_xml_file(p));
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    Ok(files)
}

/// The invoice manager: the store handle, the interactive surface and the state the
/// user sees between actions.
pub struct App<P> {
    store: Store,
    prompter: P,
    export_file_name: String,
    selected: Vec<PathBuf>,
    filter: SearchFilter,
    table: TableView,
    failed_actions: usize,
}

impl<P: Prompter> App<P> {
    /// Creates the application over `store`, proposing `export_file_name` on export.
    pub fn new(store: Store, prompter: P, export_file_name: impl Into<String>) -> Self {
        Self {
            store,
            prompter,
            export_file_name: export_file_name.into(),
            selected: Vec::new(),
            filter: SearchFilter::default(),
            table: TableView::default(),
            failed_actions: 0,
        }
    }

    /// The interactive surface.
    pub const fn prompter(&self) -> &P {
        &self.prompter
    }

    /// Mutable access to the interactive surface.
    pub const fn prompter_mut(&mut self) -> &mut P {
        &mut self.prompter
    }

    /// The table as of the last refresh.
    pub const fn table(&self) -> &TableView {
        &self.table
    }

    /// Files selected for the next processing run.
    pub fn selected_files(&self) -> &[PathBuf] {
        &self.selected
    }

    /// Number of actions that ended in an error notice.
    pub const fn failed_actions(&self) -> usize {
        self.failed_actions
    }

    fn conclude(&mut self, action: &str, result: Result<()>) {
        if let Err(e) = result {
            error!("{} failed: {}", action, e);
            self.failed_actions += 1;
            let notice = notice_for_error(action, &e);
            self.prompter.notify(notice);
        }
    }

    /// Selects a batch of files for processing. An empty selection keeps the previous one.
    pub fn select_files(&mut self, paths: &[PathBuf]) {
        let result = expand_selection(paths).map(|files| {
            if files.is_empty() {
                debug!("Empty selection, keeping {} files", self.selected.len());
                return;
            }
            self.prompter.notify(Notice::info(
                "Files selected",
                format!("{} file(s) selected.", files.len()),
            ));
            self.selected = files;
        });
        self.conclude("Select files", result);
    }

    /// Extracts and stores the selected files, then refreshes the table.
    pub async fn process_selected(&mut self) {
        if self.selected.is_empty() {
            self.prompter
                .notify(Notice::warning("Warning", "No files loaded."));
            return;
        }
        let result = self.try_process().await;
        self.conclude("Process files", result);
        self.refresh().await;
    }

    async fn try_process(&mut self) -> Result<()> {
        let db = self.store.open().await?;
        let report = ingest_files(&db, &self.selected).await;
        db.close().await?;

        for failure in &report.failed {
            self.prompter
                .notify(Notice::warning("Error", failure.reason.clone()));
        }
        self.prompter
            .notify(Notice::info("Result", ingest_summary(&report)));
        Ok(())
    }

    /// Selects and processes `paths` in one step.
    pub async fn import(&mut self, paths: &[PathBuf]) {
        self.select_files(paths);
        self.process_selected().await;
    }

    /// Makes `filter` the active search and shows its results.
    pub async fn search(&mut self, filter: SearchFilter) {
        self.filter = filter;
        self.refresh().await;
    }

    /// Rebuilds the table from the store using the active search.
    pub async fn refresh(&mut self) {
        let result = self.try_refresh().await;
        self.conclude("Search", result);
    }

    async fn try_refresh(&mut self) -> Result<()> {
        let db = self.store.open().await?;
        let invoices = search_invoices(&db, &self.filter).await?;
        db.close().await?;

        self.table = TableView::from_invoices(&invoices);
        self.prompter.display(&self.table.render());
        Ok(())
    }

    fn key_of_row(&self, row: usize) -> Result<NaturalKey> {
        self.table
            .row(row)
            .map(|r| r.key.clone())
            .ok_or(Error::RowNotFound { row })
    }

    /// Shows the detail view of a row of the current table.
    pub fn show_row(&mut self, row: usize) {
        let result = self.table.row(row).map(view::InvoiceRow::details).map_or(
            Err(Error::RowNotFound { row }),
            |details| {
                self.prompter.display(&details);
                Ok(())
            },
        );
        self.conclude("Show", result);
    }

    /// Shows the detail view of the invoice with `key`.
    pub async fn show(&mut self, key: &NaturalKey) {
        let result = self.try_show(key).await;
        self.conclude("Show", result);
    }

    async fn try_show(&mut self, key: &NaturalKey) -> Result<()> {
        let db = self.store.open().await?;
        let found = find_by_key(&db, key).await?;
        db.close().await?;

        match found {
            Some(invoice) => self.prompter.display(&invoice_details(&invoice)),
            None => self
                .prompter
                .notify(Notice::warning("Not found", format!("No invoice {key}."))),
        }
        Ok(())
    }

    /// Edits the invoice shown on a row of the current table.
    pub async fn edit_row(&mut self, row: usize, changes: InvoiceChanges) {
        match self.key_of_row(row) {
            Ok(key) => self.edit(&key, changes).await,
            Err(e) => self.conclude("Edit", Err(e)),
        }
    }

    /// Shows the invoice with `key`, asks for confirmation and applies `changes`.
    ///
    /// A key with no invoice abandons the edit without a notice.
    pub async fn edit(&mut self, key: &NaturalKey, changes: InvoiceChanges) {
        let result = self.try_edit(key, changes).await;
        self.conclude("Edit", result);
    }

    async fn try_edit(&mut self, key: &NaturalKey, changes: InvoiceChanges) -> Result<()> {
        let db = self.store.open().await?;
        let current = find_by_key(&db, key).await?;
        db.close().await?;

        let Some(current) = current else {
            debug!("Edit abandoned, {} no longer exists", key);
            return Ok(());
        };
        self.prompter.display(&invoice_details(&current));

        if changes.is_empty() {
            self.prompter
                .notify(Notice::info("Edit", "Nothing to change."));
            return Ok(());
        }
        if !self
            .prompter
            .confirm("Edit Invoice", "Save the changes to this invoice?")
        {
            return Ok(());
        }

        let db = self.store.open().await?;
        let updated = update_invoice(&db, key, changes).await?;
        db.close().await?;
        if let Some(invoice) = updated {
            info!("Invoice ID {} edited", invoice.id);
            self.prompter
                .notify(Notice::info("Updated", "Invoice updated successfully."));
            self.refresh().await;
        }
        Ok(())
    }

    /// Deletes the invoice shown on a row of the current table.
    pub async fn delete_row(&mut self, row: usize) {
        match self.key_of_row(row) {
            Ok(key) => self.delete(&key).await,
            Err(e) => self.conclude("Delete", Err(e)),
        }
    }

    /// Asks for confirmation and deletes the invoice with `key`.
    pub async fn delete(&mut self, key: &NaturalKey) {
        if !self.prompter.confirm(
            "Delete Invoice",
            "Are you sure you want to delete this invoice?",
        ) {
            return;
        }
        let result = self.try_delete(key).await;
        self.conclude("Delete", result);
    }

    async fn try_delete(&mut self, key: &NaturalKey) -> Result<()> {
        let db = self.store.open().await?;
        delete_invoice(&db, key).await?;
        db.close().await?;

        self.prompter
            .notify(Notice::info("Removed", "Invoice deleted successfully."));
        self.refresh().await;
        Ok(())
    }

    /// Exports every stored invoice to `destination`, or to a path chosen by the user.
    pub async fn export(&mut self, destination: Option<PathBuf>) {
        let result = self.try_export(destination).await;
        self.conclude("Export", result);
    }

    async fn try_export(&mut self, destination: Option<PathBuf>) -> Result<()> {
        let db = self.store.open().await?;
        let invoices = list_all_invoices(&db).await?;
        db.close().await?;

        let prompter = &mut self.prompter;
        let default_name = self.export_file_name.as_str();
        let outcome = export_invoices(&invoices, || {
            destination.or_else(|| prompter.choose_save_path(default_name))
        })?;

        if let ExportOutcome::Written { path, .. } = outcome {
            self.prompter.notify(Notice::info(
                "Success",
                format!("Exported to {}", path.display()),
            ));
        }
        Ok(())
    }
}
