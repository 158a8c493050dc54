//! Command line interface.
//!
//! One-shot subcommands address invoices by natural key; the `shell` subcommand starts
//! the interactive loop, where invoices are addressed by their row in the last listing.

use crate::{
    app::{App, prompt::Console, shell::run_shell},
    config::{
        database::Store,
        settings::{DEFAULT_CONFIG_PATH, Settings, resolve_database_url},
    },
    core::invoice::{InvoiceChanges, NaturalKey, SearchFilter},
    errors::Result,
};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// NFe manager - ingest, search, edit and export Brazilian electronic invoices
#[derive(Debug, Parser)]
#[command(name = "nfe-manager")]
#[command(version, long_about = None)]
pub struct Cli {
    /// Enable verbose output (repeat for more)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the settings file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Database URL, overriding settings and `DATABASE_URL`
    #[arg(long, global = true)]
    pub database: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract and store NFe XML files (directories are scanned for .xml files)
    Import {
        /// Files or directories to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List invoices matching the filters
    Search(SearchArgs),

    /// Show every field of one invoice
    Show(KeyArgs),

    /// Change fields of one invoice
    Edit {
        #[command(flatten)]
        key: KeyArgs,
        #[command(flatten)]
        changes: ChangeArgs,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Delete one invoice
    Delete {
        #[command(flatten)]
        key: KeyArgs,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Export every invoice to an .xlsx spreadsheet
    Export {
        /// Destination file; asked interactively when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the interactive shell
    Shell,
}

/// Search filters; empty filters match everything
#[derive(Debug, Clone, Default, Args)]
pub struct SearchArgs {
    /// Part of the issuer CNPJ
    #[arg(long, default_value = "")]
    pub cnpj: String,
    /// Issue month as YYYY-MM
    #[arg(long, default_value = "")]
    pub month: String,
    /// Part of the issuer name
    #[arg(long, default_value = "")]
    pub issuer: String,
}

impl SearchArgs {
    /// The filter these arguments describe.
    #[must_use]
    pub fn filter(&self) -> SearchFilter {
        SearchFilter::new(&self.cnpj, &self.month, &self.issuer)
    }
}

/// Natural key of one invoice
#[derive(Debug, Clone, Args)]
pub struct KeyArgs {
    /// Issuer CNPJ
    #[arg(long)]
    pub cnpj: String,
    /// Invoice number
    #[arg(long)]
    pub number: String,
    /// Issue date exactly as stored
    #[arg(long)]
    pub date: String,
}

impl KeyArgs {
    /// The key these arguments describe.
    #[must_use]
    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(&self.cnpj, &self.number, &self.date)
    }
}

/// Replacement field values; omitted fields keep their value
#[derive(Debug, Clone, Default, Args)]
pub struct ChangeArgs {
    /// New file label
    #[arg(long = "set-file")]
    pub file_name: Option<String>,
    /// New issuer name
    #[arg(long = "set-issuer")]
    pub issuer_name: Option<String>,
    /// New issuer CNPJ
    #[arg(long = "set-cnpj")]
    pub issuer_tax_id: Option<String>,
    /// New invoice number
    #[arg(long = "set-number")]
    pub invoice_number: Option<String>,
    /// New issue date
    #[arg(long = "set-date")]
    pub issue_date: Option<String>,
    /// New total value
    #[arg(long = "set-total")]
    pub total_value: Option<f64>,
}

impl From<ChangeArgs> for InvoiceChanges {
    fn from(args: ChangeArgs) -> Self {
        Self {
            file_name: args.file_name,
            issuer_name: args.issuer_name,
            issuer_tax_id: args.issuer_tax_id,
            invoice_number: args.invoice_number,
            issue_date: args.issue_date,
            total_value: args.total_value,
        }
    }
}

/// Runs one command line invocation against the configured store.
///
/// One-shot commands exit with failure when their action ended in an error notice.
///
/// # Errors
/// Returns an error only if the interactive shell loses its terminal.
pub async fn run(cli: Cli, settings: &Settings) -> Result<ExitCode> {
    let store = Store::new(resolve_database_url(settings, cli.database.as_deref()));
    let assume_yes = matches!(
        cli.command,
        Command::Edit { yes: true, .. } | Command::Delete { yes: true, .. }
    );
    let console = Console::new(std::io::stdin().lock(), std::io::stdout()).assume_yes(assume_yes);
    let mut app = App::new(store, console, settings.export.default_file_name.clone());

    match cli.command {
        Command::Import { paths } => app.import(&paths).await,
        Command::Search(args) => app.search(args.filter()).await,
        Command::Show(key) => app.show(&key.key()).await,
        Command::Edit { key, changes, .. } => app.edit(&key.key(), changes.into()).await,
        Command::Delete { key, .. } => app.delete(&key.key()).await,
        Command::Export { output } => app.export(output).await,
        Command::Shell => {
            run_shell(&mut app).await?;
            return Ok(ExitCode::SUCCESS);
        }
    }

    Ok(if app.failed_actions() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
