//! Core business logic - framework-agnostic extraction, ingest, search, edit and export.
//!
//! Every function here takes the database connection explicitly and returns typed
//! errors; turning outcomes into messages is left to the `app` layer.

/// Spreadsheet export
pub mod export;
/// NFe XML field extraction
pub mod extract;
/// Duplicate detection and insertion of extracted invoices
pub mod ingest;
/// Lookup, search, edit and delete by natural key
pub mod invoice;
