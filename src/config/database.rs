//! Database configuration module.
//!
//! This module handles the `SQLite` store: the `Store` handle that remembers where the
//! database lives, short-lived connection opening, and table creation using `SeaORM`'s
//! `Schema::create_table_from_entity` so the schema always matches the entity definition.

use crate::entities::NotaFiscal;
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use tracing::debug;

/// Default store location, created on first use.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://notas_fiscais.db?mode=rwc";

/// Handle to the persistent invoice store.
///
/// The handle only carries the database URL. Every logical action opens its own
/// connection with [`Store::open`] and closes it when done, so nothing holds the
/// database file open between user interactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Store {
    url: String,
}

impl Store {
    /// Creates a store handle for the given `SeaORM` connection URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Creates a store handle for a `SQLite` file, creating the file on first use.
    #[must_use]
    pub fn from_path(path: &std::path::Path) -> Self {
        Self::new(format!(
            "sqlite://{}?mode=rwc",
            escape_url_path(&path.display().to_string())
        ))
    }

    /// The connection URL of this store.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Opens a connection and makes sure the invoice table exists.
    pub async fn open(&self) -> Result<DatabaseConnection> {
        debug!("Opening store at {}", self.url);
        let db = Database::connect(&self.url).await?;
        create_tables(&db).await?;
        Ok(db)
    }
}

/// Percent-encodes the characters that would end the path part of a connection URL.
fn escape_url_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '?' => escaped.push_str("%3F"),
            '#' => escaped.push_str("%23"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Creates the invoice table from its entity definition if it does not exist yet.
///
/// Databases written by earlier versions of the program already have the table and
/// are left untouched.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut invoice_table = schema.create_table_from_entity(NotaFiscal);
    invoice_table.if_not_exists();

    db.execute(builder.build(&invoice_table)).await?;

    Ok(())
}
