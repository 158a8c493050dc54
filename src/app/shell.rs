//! Interactive shell - the interaction loop.
//!
//! Reads one command per line, runs it as a single action, and goes back to reading.
//! Rows are addressed by their number in the last listing; the key each row stands for
//! was bound when the listing was built.

use crate::{
    app::{
        App,
        prompt::{Console, Notice, Prompter},
    },
    cli::{ChangeArgs, SearchArgs},
    errors::Result,
};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;
use tracing::debug;

const PROMPT: &str = "nfe> ";

#[derive(Debug, Parser)]
#[command(name = "nfe", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Debug, Subcommand)]
enum ShellCommand {
    /// Select XML files, or directories of XML files, to process
    Load {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Extract and store the selected files
    Process,
    /// List invoices; without filters lists everything
    Search(SearchArgs),
    /// Show every field of a row
    Show { row: usize },
    /// Change fields of a row
    Edit {
        row: usize,
        #[command(flatten)]
        changes: ChangeArgs,
    },
    /// Delete a row
    Delete { row: usize },
    /// Export every invoice to an .xlsx spreadsheet
    Export {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

/// Splits a command line into words. Single and double quotes group words, and a
/// backslash outside single quotes escapes the next character.
///
/// # Errors
/// Returns a message if a quote is left open.
pub fn split_words(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"') | None, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {q} quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

async fn dispatch<P: Prompter>(app: &mut App<P>, command: ShellCommand) -> ControlFlow<()> {
    debug!("Shell command: {:?}", command);
    match command {
        ShellCommand::Load { paths } => app.select_files(&paths),
        ShellCommand::Process => app.process_selected().await,
        ShellCommand::Search(args) => app.search(args.filter()).await,
        ShellCommand::Show { row } => app.show_row(row),
        ShellCommand::Edit { row, changes } => app.edit_row(row, changes.into()).await,
        ShellCommand::Delete { row } => app.delete_row(row).await,
        ShellCommand::Export { output } => app.export(output).await,
        ShellCommand::Quit => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

/// Runs the interaction loop until `quit` or end of input.
///
/// # Errors
/// Returns an error if the terminal cannot be read.
pub async fn run_shell<R: BufRead, W: Write>(app: &mut App<Console<R, W>>) -> Result<()> {
    app.prompter_mut()
        .display("NFe manager. Type `help` for commands, `quit` to leave.");
    app.refresh().await;

    while let Some(line) = app.prompter_mut().read_line(PROMPT)? {
        let words = match split_words(&line) {
            Ok(words) if words.is_empty() => continue,
            Ok(words) => words,
            Err(message) => {
                app.prompter_mut().notify(Notice::warning("Input", message));
                continue;
            }
        };

        let command = match ShellLine::try_parse_from(&words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                app.prompter_mut()
                    .display(e.render().to_string().trim_end());
                continue;
            }
        };

        if dispatch(app, command).await.is_break() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::database::Store;
    use crate::test_utils::write_nfe_file;

    #[test]
    fn test_split_words() {
        assert_eq!(
            split_words("edit 1 --set-issuer \"Pão & Cia\" --set-total 10").unwrap(),
            vec!["edit", "1", "--set-issuer", "Pão & Cia", "--set-total", "10"]
        );
        assert_eq!(
            split_words("  load 'my dir'/a.xml b\\ c.xml ").unwrap(),
            vec!["load", "my dir/a.xml", "b c.xml"]
        );
        assert_eq!(split_words("search --issuer \"\"").unwrap(), vec!["search", "--issuer", ""]);
        assert!(split_words("   ").unwrap().is_empty());
        assert!(split_words("search --issuer \"open").is_err());
    }

    #[tokio::test]
    async fn test_shell_session() {
        let dir = tempfile::tempdir().unwrap();
        write_nfe_file(dir.path(), "a.xml", "1", "10.00");
        write_nfe_file(dir.path(), "b.xml", "2", "20.00");

        let script = format!(
            "\nload \"{}\"\nprocess\nsearch --cnpj 111\nshow 2\nedit 1 --set-total 15\ny\n\
             delete 2\ny\nbogus\nexport --output \"{}\"\nquit\nsearch\n",
            dir.path().display(),
            dir.path().join("out.xlsx").display()
        );
        let console = Console::new(script.as_bytes(), Vec::new());
        let store = Store::from_path(&dir.path().join("shell.db"));
        let mut app = App::new(store, console, "notas_fiscais.xlsx");

        run_shell(&mut app).await.unwrap();

        let output = String::from_utf8(app.prompter().output().clone()).unwrap();
        assert!(output.contains("No invoices found."));
        assert!(output.contains("2 file(s) selected."));
        assert!(output.contains("2 invoice(s) inserted successfully!"));
        assert!(output.contains("Detalhes da Nota: b.xml"));
        assert!(output.contains("Invoice updated successfully."));
        assert!(output.contains("Invoice deleted successfully."));
        assert!(output.contains("bogus"));
        assert!(dir.path().join("out.xlsx").exists());

        assert_eq!(app.table().len(), 1);
        assert_eq!(app.table().row(1).unwrap().cells[5], "15.00");
        assert_eq!(app.failed_actions(), 0);
    }
}
