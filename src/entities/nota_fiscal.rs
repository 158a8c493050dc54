//! Invoice entity - One row per ingested NFe document.
//!
//! Column names follow the `notas_fiscais` table used by existing databases,
//! while the Rust fields carry descriptive names. The triple
//! (`issuer_tax_id`, `invoice_number`, `issue_date`) is the natural key and is
//! kept unique by the ingest and edit operations rather than by an index.
//!
//! Older databases hold NULL in the text columns of documents whose elements were
//! empty, so those columns are optional here and read back as empty text.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invoice database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notas_fiscais")]
pub struct Model {
    /// Surrogate identifier assigned by the store
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name of the source XML file
    #[sea_orm(column_name = "arquivo")]
    pub file_name: String,
    /// Issuer company name (`xNome`)
    #[sea_orm(column_name = "emitente")]
    pub issuer_name: Option<String>,
    /// Issuer CNPJ
    #[sea_orm(column_name = "cnpj")]
    pub issuer_tax_id: Option<String>,
    /// Invoice number (`nNF`)
    #[sea_orm(column_name = "numero")]
    pub invoice_number: Option<String>,
    /// Issue timestamp as written in the document (`dhEmi`)
    #[sea_orm(column_name = "data_emissao")]
    pub issue_date: Option<String>,
    /// Invoice total (`vNF`)
    #[sea_orm(column_name = "valor_total")]
    pub total_value: f64,
}

/// Invoices have no relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
