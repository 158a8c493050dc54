//! The interactive surface: confirmations, destination choice, notices and display.
//!
//! Actions talk to the user only through the [`Prompter`] trait, so the terminal
//! implementation here can be swapped for a scripted one in tests.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::warn;

/// Severity of a notice shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational outcome
    Info,
    /// Something was skipped or refused
    Warning,
    /// An action failed
    Error,
}

/// A message box: a level, a short title and the message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Short title
    pub title: String,
    /// Message body, possibly multi-line
    pub message: String,
}

impl Notice {
    /// Builds an informational notice.
    #[must_use]
    pub fn info(title: &str, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title, message)
    }

    /// Builds a warning notice.
    #[must_use]
    pub fn warning(title: &str, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, title, message)
    }

    /// Builds an error notice.
    #[must_use]
    pub fn error(title: &str, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title, message)
    }

    fn new(level: NoticeLevel, title: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

/// Everything an action may ask of, or tell, the user.
pub trait Prompter {
    /// Asks a yes/no question. Anything but an explicit yes is a no.
    fn confirm(&mut self, title: &str, question: &str) -> bool;

    /// Asks where to save a file, proposing `default_name`. `None` means cancelled.
    fn choose_save_path(&mut self, default_name: &str) -> Option<PathBuf>;

    /// Shows a notice.
    fn notify(&mut self, notice: Notice);

    /// Shows rendered content such as a table or a detail view.
    fn display(&mut self, content: &str);
}

/// Line-oriented terminal prompter.
pub struct Console<R, W> {
    input: R,
    output: W,
    assume_yes: bool,
}

impl<R: BufRead, W: Write> Console<R, W> {
    /// Creates a console reading answers from `input` and writing to `output`.
    pub const fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            assume_yes: false,
        }
    }

    /// Answers every confirmation with yes without reading input.
    #[must_use]
    pub fn assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }

    /// Prints `prompt` and reads one line. `Ok(None)` means end of input.
    pub fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// The output the console writes to.
    pub const fn output(&self) -> &W {
        &self.output
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = writeln!(self.output, "{text}").and_then(|()| self.output.flush()) {
            warn!("Failed to write to the terminal: {}", e);
        }
    }

    fn ask(&mut self, prompt: &str) -> Option<String> {
        self.read_line(prompt).unwrap_or_else(|e| {
            warn!("Failed to read from the terminal: {}", e);
            None
        })
    }
}

/// Whether a typed answer means yes. Portuguese answers are accepted too.
#[must_use]
pub fn is_yes(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "y" | "yes" | "s" | "sim"
    )
}

/// Turns a typed destination into a path: empty means the default, `-` cancels, and
/// a missing extension becomes `.xlsx`.
#[must_use]
pub fn parse_save_answer(answer: &str, default_name: &str) -> Option<PathBuf> {
    let answer = answer.trim();
    if answer == "-" {
        return None;
    }
    let mut path = PathBuf::from(if answer.is_empty() { default_name } else { answer });
    if path.extension().is_none() {
        path.set_extension("xlsx");
    }
    Some(path)
}

impl<R: BufRead, W: Write> Prompter for Console<R, W> {
    fn confirm(&mut self, title: &str, question: &str) -> bool {
        if self.assume_yes {
            self.emit(&format!("{title}: {question} [y/N] y"));
            return true;
        }
        self.ask(&format!("{title}: {question} [y/N] "))
            .is_some_and(|answer| is_yes(&answer))
    }

    fn choose_save_path(&mut self, default_name: &str) -> Option<PathBuf> {
        self.ask(&format!("Save as [{default_name}] (- to cancel): "))
            .and_then(|answer| parse_save_answer(&answer, default_name))
    }

    fn notify(&mut self, notice: Notice) {
        let tag = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        self.emit(&format!("[{tag}] {}: {}", notice.title, notice.message));
    }

    fn display(&mut self, content: &str) {
        self.emit(content);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn console(input: &str) -> Console<&[u8], Vec<u8>> {
        Console::new(input.as_bytes(), Vec::new())
    }

    #[test]
    fn test_confirm_answers() {
        assert!(console("y\n").confirm("Delete", "Sure?"));
        assert!(console("Sim\n").confirm("Delete", "Sure?"));
        assert!(!console("n\n").confirm("Delete", "Sure?"));
        assert!(!console("\n").confirm("Delete", "Sure?"));
        assert!(!console("").confirm("Delete", "Sure?"));
        assert!(console("").assume_yes(true).confirm("Delete", "Sure?"));
    }

    #[test]
    fn test_choose_save_path() {
        let default = "notas_fiscais.xlsx";
        assert_eq!(
            console("\n").choose_save_path(default),
            Some(PathBuf::from(default))
        );
        assert_eq!(
            console("out/relatorio\n").choose_save_path(default),
            Some(PathBuf::from("out/relatorio.xlsx"))
        );
        assert_eq!(console("-\n").choose_save_path(default), None);
        assert_eq!(console("").choose_save_path(default), None);
    }

    #[test]
    fn test_notify_and_display_write_output() {
        let mut c = console("");
        c.notify(Notice::warning("Warning", "No files loaded."));
        c.display("table");
        let written = String::from_utf8(c.output().clone()).unwrap();
        assert_eq!(written, "[warning] Warning: No files loaded.\ntable\n");
    }

    #[test]
    fn test_read_line_strips_newline() {
        let mut c = console("search --month 2024-03\r\n");
        assert_eq!(
            c.read_line("> ").unwrap(),
            Some("search --month 2024-03".to_string())
        );
        assert_eq!(c.read_line("> ").unwrap(), None);
    }
}
