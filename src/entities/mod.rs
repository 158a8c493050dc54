//! Entity module - Contains the SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod nota_fiscal;

pub use nota_fiscal::{Column as NotaFiscalColumn, Entity as NotaFiscal, Model as NotaFiscalModel};
