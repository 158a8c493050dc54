//! Ingest business logic - deduplicate extracted invoices and store the new ones.
//!
//! Each invoice is checked against the store by natural key before it is inserted, in
//! input order, so the first document seen for a key wins. The batch is not a
//! transaction: every insert commits on its own, and each file's outcome is independent.
//! A file that cannot be read, parsed or stored is recorded as failed and the batch
//! moves on to the next one.

use crate::{
    core::{
        extract::{ExtractedInvoice, display_name, extract_invoice},
        invoice::{create_invoice, find_by_key},
    },
    errors::Result,
};
use sea_orm::DatabaseConnection;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

/// A file that could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    /// Display name of the file
    pub file: String,
    /// Why it failed
    pub reason: String,
}

/// Outcome of ingesting one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Number of invoices inserted
    pub inserted: usize,
    /// Files skipped because their natural key was already stored
    pub skipped: Vec<String>,
    /// Files that could not be read, parsed or stored
    pub failed: Vec<FileFailure>,
}

impl IngestReport {
    /// Number of files skipped as duplicates.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// Whether a path looks like an XML document, judged by extension.
#[must_use]
pub fn is_xml_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

/// Stores one invoice unless its natural key already exists.
///
/// Returns `true` if the invoice was inserted.
async fn store_one(db: &DatabaseConnection, invoice: &ExtractedInvoice) -> Result<bool> {
    let key = invoice.key();
    if find_by_key(db, &key).await?.is_some() {
        debug!("Skipping {}: {} already stored", invoice.file_name, key);
        return Ok(false);
    }
    create_invoice(db, invoice).await?;
    Ok(true)
}

/// Stores one invoice and records the outcome in `report`.
async fn ingest_one(
    db: &DatabaseConnection,
    invoice: &ExtractedInvoice,
    report: &mut IngestReport,
) {
    match store_one(db, invoice).await {
        Ok(true) => report.inserted += 1,
        Ok(false) => report.skipped.push(invoice.file_name.clone()),
        Err(e) => {
            error!("Failed to store {}: {}", invoice.file_name, e);
            report.failed.push(FileFailure {
                file: invoice.file_name.clone(),
                reason: format!("Failed to store {}: {e}", invoice.file_name),
            });
        }
    }
}

/// Stores a batch of already extracted invoices, skipping duplicates.
///
/// An invoice the store rejects is recorded in the report's `failed` list and the
/// rest of the batch is still stored.
#[instrument(skip_all, fields(batch = invoices.len()))]
pub async fn ingest(db: &DatabaseConnection, invoices: &[ExtractedInvoice]) -> IngestReport {
    let mut report = IngestReport::default();
    for invoice in invoices {
        ingest_one(db, invoice, &mut report).await;
    }
    info!(
        "Ingest finished: {} inserted, {} skipped, {} failed",
        report.inserted,
        report.skipped_count(),
        report.failed.len()
    );
    report
}

/// Extracts and stores a batch of XML files.
///
/// Paths without an `.xml` extension are ignored. A file that cannot be read, parsed
/// or stored is recorded in the report's `failed` list and the batch continues with
/// the next file.
#[instrument(skip_all, fields(batch = paths.len()))]
pub async fn ingest_files(db: &DatabaseConnection, paths: &[PathBuf]) -> IngestReport {
    let mut report = IngestReport::default();

    for path in paths {
        if !is_xml_file(path) {
            debug!("Ignoring non-XML file {:?}", path);
            continue;
        }

        match extract_invoice(path) {
            Ok(invoice) => ingest_one(db, &invoice, &mut report).await,
            Err(e) => {
                warn!("{}", e);
                report.failed.push(FileFailure {
                    file: display_name(path),
                    reason: e.to_string(),
                });
            }
        }
    }

    info!(
        "Ingest finished: {} inserted, {} skipped, {} failed",
        report.inserted,
        report.skipped_count(),
        report.failed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::extract::extract_from_str;
    use crate::core::invoice::{NaturalKey, list_all_invoices};
    use crate::test_utils::*;
    use sea_orm::ConnectionTrait;

    const TAX_ID: &str = "11.111.111/0001-11";
    const ISSUED: &str = "2024-01-10T10:00:00-03:00";

    #[tokio::test]
    async fn test_same_file_twice_is_stored_once() -> Result<()> {
        let db = setup_test_db().await?;
        let dir = tempfile::tempdir()?;
        let path = write_nfe_file(dir.path(), "a.xml", "100", "150.00");

        let first = ingest_files(&db, std::slice::from_ref(&path)).await;
        assert_eq!(first.inserted, 1);
        assert_eq!(first.skipped_count(), 0);

        let second = ingest_files(&db, &[path]).await;
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, vec!["a.xml".to_string()]);

        assert_eq!(list_all_invoices(&db).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_first_write_wins() -> Result<()> {
        let db = setup_test_db().await?;
        let a = extract_from_str("A.xml", &nfe_xml("Acme", TAX_ID, "100", ISSUED, "150.00"))?;
        let b = extract_from_str("B.xml", &nfe_xml("Acme", TAX_ID, "100", ISSUED, "200.00"))?;

        let report = ingest(&db, &[a, b]).await;
        assert_eq!(report.inserted, 1);
        assert_eq!(report.skipped, vec!["B.xml".to_string()]);

        let stored = find_by_key(&db, &NaturalKey::new(TAX_ID, "100", ISSUED))
            .await?
            .unwrap();
        assert_eq!(stored.total_value, 150.0);
        assert_eq!(stored.file_name, "A.xml");
        Ok(())
    }

    #[tokio::test]
    async fn test_distinct_keys_are_all_kept() -> Result<()> {
        let db = setup_test_db().await?;
        let invoices = vec![
            extract_from_str("1.xml", &nfe_xml("Acme", TAX_ID, "100", ISSUED, "1"))?,
            extract_from_str("2.xml", &nfe_xml("Acme", TAX_ID, "101", ISSUED, "1"))?,
            extract_from_str("3.xml", &nfe_xml("Acme", "22.222.222/0001-22", "100", ISSUED, "1"))?,
            extract_from_str("4.xml", &nfe_xml("Acme", TAX_ID, "100", "2024-01-11T10:00:00-03:00", "1"))?,
        ];

        let report = ingest(&db, &invoices).await;
        assert_eq!(report.inserted, 4);
        assert!(report.skipped.is_empty());
        assert_eq!(list_all_invoices(&db).await?.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_file_does_not_abort_batch() -> Result<()> {
        let db = setup_test_db().await?;
        let dir = tempfile::tempdir()?;
        let good_one = write_nfe_file(dir.path(), "good-1.xml", "1", "10.00");
        let broken = dir.path().join("broken.xml");
        std::fs::write(&broken, "<NFe><emit>")?;
        let good_two = write_nfe_file(dir.path(), "good-2.xml", "2", "20.00");
        let ignored = dir.path().join("notes.txt");
        std::fs::write(&ignored, "not an invoice")?;

        let report = ingest_files(&db, &[good_one, broken, ignored, good_two]).await;
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file, "broken.xml");
        assert!(report.failed[0].reason.contains("broken.xml"));
        Ok(())
    }

    #[tokio::test]
    async fn test_store_failure_does_not_abort_batch() -> Result<()> {
        let db = setup_test_db().await?;
        db.execute_unprepared(
            "CREATE TRIGGER reject_second BEFORE INSERT ON notas_fiscais \
             WHEN NEW.numero = '2' BEGIN SELECT RAISE(ABORT, 'rejected'); END",
        )
        .await?;
        let dir = tempfile::tempdir()?;
        let paths = [
            write_nfe_file(dir.path(), "1.xml", "1", "10.00"),
            write_nfe_file(dir.path(), "2.xml", "2", "20.00"),
            write_nfe_file(dir.path(), "3.xml", "3", "30.00"),
        ];

        let report = ingest_files(&db, &paths).await;
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].file, "2.xml");
        assert!(report.failed[0].reason.starts_with("Failed to store 2.xml"));

        let stored: Vec<String> = list_all_invoices(&db)
            .await?
            .into_iter()
            .map(|m| m.file_name)
            .collect();
        assert_eq!(stored, vec!["1.xml", "3.xml"]);
        Ok(())
    }

    #[test]
    fn test_is_xml_file() {
        assert!(is_xml_file(Path::new("nota.xml")));
        assert!(is_xml_file(Path::new("/tmp/NOTA.XML")));
        assert!(!is_xml_file(Path::new("nota.xlsx")));
        assert!(!is_xml_file(Path::new("xml")));
    }
}
