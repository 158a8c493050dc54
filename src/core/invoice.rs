//! Invoice business logic - lookup, search, edit and delete.
//!
//! Records are addressed by their natural key, the (CNPJ, invoice number, issue date)
//! triple. The surrogate id is only used internally to overwrite the right row during
//! an edit. All functions take the connection explicitly so callers decide which store
//! they run against.

use crate::{
    core::extract::ExtractedInvoice,
    entities::{NotaFiscal, nota_fiscal},
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, Set, prelude::*, sea_query::Expr};
use std::fmt;
use tracing::{debug, info, instrument};

/// The (CNPJ, invoice number, issue date) triple that identifies an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    /// Issuer CNPJ
    pub issuer_tax_id: String,
    /// Invoice number
    pub invoice_number: String,
    /// Issue timestamp
    pub issue_date: String,
}

impl NaturalKey {
    /// Builds a key from its three parts.
    #[must_use]
    pub fn new(issuer_tax_id: &str, invoice_number: &str, issue_date: &str) -> Self {
        Self {
            issuer_tax_id: issuer_tax_id.to_string(),
            invoice_number: invoice_number.to_string(),
            issue_date: issue_date.to_string(),
        }
    }
}

impl From<&nota_fiscal::Model> for NaturalKey {
    fn from(model: &nota_fiscal::Model) -> Self {
        Self::new(
            model.issuer_tax_id.as_deref().unwrap_or_default(),
            model.invoice_number.as_deref().unwrap_or_default(),
            model.issue_date.as_deref().unwrap_or_default(),
        )
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nº {} ({})",
            self.issuer_tax_id, self.invoice_number, self.issue_date
        )
    }
}

/// Search criteria. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    /// Substring of the issuer CNPJ
    pub tax_id: String,
    /// `YYYY-MM` month the invoice was issued in
    pub month: String,
    /// Substring of the issuer name
    pub issuer: String,
}

impl SearchFilter {
    /// Builds a filter from raw user input, trimming surrounding whitespace.
    #[must_use]
    pub fn new(tax_id: &str, month: &str, issuer: &str) -> Self {
        Self {
            tax_id: tax_id.trim().to_string(),
            month: month.trim().to_string(),
            issuer: issuer.trim().to_string(),
        }
    }

    /// Whether this filter matches every record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tax_id.is_empty() && self.month.is_empty() && self.issuer.is_empty()
    }
}

/// Replacement values for an edit. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceChanges {
    /// New display file name
    pub file_name: Option<String>,
    /// New issuer name
    pub issuer_name: Option<String>,
    /// New issuer CNPJ
    pub issuer_tax_id: Option<String>,
    /// New invoice number
    pub invoice_number: Option<String>,
    /// New issue timestamp
    pub issue_date: Option<String>,
    /// New total
    pub total_value: Option<f64>,
}

impl InvoiceChanges {
    /// Whether the edit would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// The natural key `current` would have after these changes.
    #[must_use]
    pub fn key_after(&self, current: &nota_fiscal::Model) -> NaturalKey {
        let current_key = NaturalKey::from(current);
        NaturalKey::new(
            self.issuer_tax_id
                .as_deref()
                .unwrap_or(&current_key.issuer_tax_id),
            self.invoice_number
                .as_deref()
                .unwrap_or(&current_key.invoice_number),
            self.issue_date
                .as_deref()
                .unwrap_or(&current_key.issue_date),
        )
    }
}

/// Matches a text column against `value`, where NULL counts as empty text.
fn text_equals(column: nota_fiscal::Column, value: &str) -> Condition {
    let condition = Condition::any().add(column.eq(value));
    if value.is_empty() {
        condition.add(column.is_null())
    } else {
        condition
    }
}

fn key_condition(key: &NaturalKey) -> Condition {
    Condition::all()
        .add(text_equals(nota_fiscal::Column::IssuerTaxId, &key.issuer_tax_id))
        .add(text_equals(nota_fiscal::Column::InvoiceNumber, &key.invoice_number))
        .add(text_equals(nota_fiscal::Column::IssueDate, &key.issue_date))
}

/// Finds the invoice with the given natural key.
///
/// # Errors
/// Returns an error if the database query fails.
#[instrument(skip(db))]
pub async fn find_by_key(
    db: &DatabaseConnection,
    key: &NaturalKey,
) -> Result<Option<nota_fiscal::Model>> {
    let found = NotaFiscal::find()
        .filter(key_condition(key))
        .order_by_asc(nota_fiscal::Column::Id)
        .one(db)
        .await?;
    debug!("Lookup of {}: {:?}", key, found.as_ref().map(|m| m.id));
    Ok(found)
}

/// Retrieves a specific invoice by its surrogate id.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_invoice_by_id(
    db: &DatabaseConnection,
    id: i64,
) -> Result<Option<nota_fiscal::Model>> {
    NotaFiscal::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Retrieves every stored invoice in insertion order.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn list_all_invoices(db: &DatabaseConnection) -> Result<Vec<nota_fiscal::Model>> {
    search_invoices(db, &SearchFilter::default()).await
}

/// Retrieves the invoices matching every non-empty criterion of `filter`.
///
/// CNPJ and issuer criteria are case-sensitive literal substrings; the month criterion
/// must equal the first seven characters of the issue date.
///
/// # Errors
/// Returns an error if the database query fails.
#[instrument(skip(db))]
pub async fn search_invoices(
    db: &DatabaseConnection,
    filter: &SearchFilter,
) -> Result<Vec<nota_fiscal::Model>> {
    let mut query = NotaFiscal::find();

    if !filter.tax_id.is_empty() {
        query = query.filter(Expr::cust_with_values(
            "instr(cnpj, ?) > 0",
            [filter.tax_id.clone()],
        ));
    }
    if !filter.month.is_empty() {
        query = query.filter(Expr::cust_with_values(
            "substr(data_emissao, 1, 7) = ?",
            [filter.month.clone()],
        ));
    }
    if !filter.issuer.is_empty() {
        query = query.filter(Expr::cust_with_values(
            "instr(emitente, ?) > 0",
            [filter.issuer.clone()],
        ));
    }

    let invoices = query
        .order_by_asc(nota_fiscal::Column::Id)
        .all(db)
        .await?;
    debug!("Search matched {} invoices", invoices.len());
    Ok(invoices)
}

/// Inserts a freshly extracted invoice.
///
/// No duplicate check happens here; ingest performs it first.
///
/// # Errors
/// Returns an error if the database insert fails.
pub async fn create_invoice(
    db: &DatabaseConnection,
    invoice: &ExtractedInvoice,
) -> Result<nota_fiscal::Model> {
    let record = nota_fiscal::ActiveModel {
        file_name: Set(invoice.file_name.clone()),
        issuer_name: Set(Some(invoice.issuer_name.clone())),
        issuer_tax_id: Set(Some(invoice.issuer_tax_id.clone())),
        invoice_number: Set(Some(invoice.invoice_number.clone())),
        issue_date: Set(Some(invoice.issue_date.clone())),
        total_value: Set(invoice.total_value),
        ..Default::default()
    };
    let model = record.insert(db).await?;
    info!(
        "Inserted invoice {} (ID: {}) from {}",
        invoice.key(),
        model.id,
        model.file_name
    );
    Ok(model)
}

/// Overwrites the invoice identified by `key` with `changes`, keeping its id.
///
/// Returns `Ok(None)` when no invoice has that key, in which case nothing is written.
///
/// # Errors
/// Returns an error if:
/// - The new total is NaN or infinite
/// - The changes would move the invoice onto the key of another invoice
/// - The database query or update fails
#[instrument(skip(db))]
pub async fn update_invoice(
    db: &DatabaseConnection,
    key: &NaturalKey,
    changes: InvoiceChanges,
) -> Result<Option<nota_fiscal::Model>> {
    if let Some(amount) = changes.total_value {
        if !amount.is_finite() {
            return Err(Error::InvalidAmount { amount });
        }
    }

    let Some(current) = find_by_key(db, key).await? else {
        debug!("Edit of {} abandoned: no such invoice", key);
        return Ok(None);
    };
    if changes.is_empty() {
        return Ok(Some(current));
    }

    let new_key = changes.key_after(&current);
    if new_key != *key {
        if let Some(other) = find_by_key(db, &new_key).await? {
            if other.id != current.id {
                return Err(Error::KeyConflict {
                    key: new_key.to_string(),
                });
            }
        }
    }

    let id = current.id;
    let mut record: nota_fiscal::ActiveModel = current.into();
    if let Some(file_name) = changes.file_name {
        record.file_name = Set(file_name);
    }
    if let Some(issuer_name) = changes.issuer_name {
        record.issuer_name = Set(Some(issuer_name));
    }
    if let Some(issuer_tax_id) = changes.issuer_tax_id {
        record.issuer_tax_id = Set(Some(issuer_tax_id));
    }
    if let Some(invoice_number) = changes.invoice_number {
        record.invoice_number = Set(Some(invoice_number));
    }
    if let Some(issue_date) = changes.issue_date {
        record.issue_date = Set(Some(issue_date));
    }
    if let Some(total_value) = changes.total_value {
        record.total_value = Set(total_value);
    }

    let updated = record.update(db).await?;
    info!("Updated invoice ID {}: {} -> {}", id, key, new_key);
    Ok(Some(updated))
}

/// Deletes every invoice with the given natural key.
///
/// Returns the number of rows removed; 0 means there was nothing to delete.
///
/// # Errors
/// Returns an error if the database delete fails.
#[instrument(skip(db))]
pub async fn delete_invoice(db: &DatabaseConnection, key: &NaturalKey) -> Result<u64> {
    let result = NotaFiscal::delete_many()
        .filter(key_condition(key))
        .exec(db)
        .await?;
    info!(
        "Deleted invoice {}, rows affected: {}",
        key, result.rows_affected
    );
    Ok(result.rows_affected)
}
