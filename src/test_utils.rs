//! Shared test utilities.
//!
//! This module provides helpers for setting up test databases, creating invoices with
//! sensible defaults, and writing NFe documents to disk.

use crate::{
    app::prompt::{Notice, Prompter},
    core::{extract::ExtractedInvoice, invoice},
    entities,
    errors::Result,
};
use sea_orm::DatabaseConnection;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Creates an in-memory `SQLite` database with the invoice table initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test invoice with sensible defaults.
///
/// # Defaults
/// * `file_name`: `"{invoice_number}.xml"`
/// * `issuer_name`: `"Test Issuer"`
/// * `total_value`: 100.0
pub async fn create_test_invoice(
    db: &DatabaseConnection,
    issuer_tax_id: &str,
    invoice_number: &str,
    issue_date: &str,
) -> Result<entities::nota_fiscal::Model> {
    create_custom_invoice(
        db,
        &format!("{invoice_number}.xml"),
        "Test Issuer",
        issuer_tax_id,
        invoice_number,
        issue_date,
        100.0,
    )
    .await
}

/// Creates a test invoice with every field chosen by the caller.
pub async fn create_custom_invoice(
    db: &DatabaseConnection,
    file_name: &str,
    issuer_name: &str,
    issuer_tax_id: &str,
    invoice_number: &str,
    issue_date: &str,
    total_value: f64,
) -> Result<entities::nota_fiscal::Model> {
    let extracted = ExtractedInvoice {
        file_name: file_name.to_string(),
        issuer_name: issuer_name.to_string(),
        issuer_tax_id: issuer_tax_id.to_string(),
        invoice_number: invoice_number.to_string(),
        issue_date: issue_date.to_string(),
        total_value,
    };
    invoice::create_invoice(db, &extracted).await
}

/// Renders a minimal NFe document carrying the five extracted fields.
pub fn nfe_xml(
    issuer_name: &str,
    issuer_tax_id: &str,
    invoice_number: &str,
    issue_date: &str,
    total_value: &str,
) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe" versao="4.00">
  <NFe>
    <infNFe Id="NFe35240111111111000111550010000001001000001001" versao="4.00">
      <ide>
        <cUF>35</cUF>
        <nNF>{invoice_number}</nNF>
        <dhEmi>{issue_date}</dhEmi>
      </ide>
      <emit>
        <CNPJ>{issuer_tax_id}</CNPJ>
        <xNome>{issuer_name}</xNome>
        <enderEmit><xMun>São Paulo</xMun></enderEmit>
      </emit>
      <total>
        <ICMSTot>
          <vBC>0.00</vBC>
          <vNF>{total_value}</vNF>
        </ICMSTot>
      </total>
    </infNFe>
  </NFe>
</nfeProc>
"#
    )
}

/// Writes an NFe document for issuer `11.111.111/0001-11` to `dir/file_name`.
pub fn write_nfe_file(
    dir: &Path,
    file_name: &str,
    invoice_number: &str,
    total_value: &str,
) -> PathBuf {
    let path = dir.join(file_name);
    let xml = nfe_xml(
        "Acme Comércio Ltda",
        "11.111.111/0001-11",
        invoice_number,
        "2024-01-10T10:00:00-03:00",
        total_value,
    );
    #[allow(clippy::expect_used)]
    std::fs::write(&path, xml).expect("failed to write test NFe file");
    path
}

/// Prompter that answers from queues and records everything it was shown.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    /// Answers to `confirm`, in order; an empty queue answers no
    pub confirms: VecDeque<bool>,
    /// Answers to `choose_save_path`, in order; an empty queue cancels
    pub save_paths: VecDeque<Option<PathBuf>>,
    /// Default names proposed by `choose_save_path`
    pub save_path_defaults: Vec<String>,
    /// Every notice shown
    pub notices: Vec<Notice>,
    /// Every rendered view shown
    pub displayed: Vec<String>,
}

impl ScriptedPrompter {
    /// Whether any notice message contains `text`.
    pub fn has_notice(&self, text: &str) -> bool {
        self.notices.iter().any(|n| n.message.contains(text))
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&mut self, _title: &str, _question: &str) -> bool {
        self.confirms.pop_front().unwrap_or(false)
    }

    fn choose_save_path(&mut self, default_name: &str) -> Option<PathBuf> {
        self.save_path_defaults.push(default_name.to_string());
        self.save_paths.pop_front().flatten()
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn display(&mut self, content: &str) {
        self.displayed.push(content.to_string());
    }
}
