//! Shared diagnostics: a `description()`-rendering trait implemented by
//! every error type in the crate, plus the [`Lint`] it renders from.
//!
//! This generalizes the teacher's `CompilerError`/`Lint` pair: nothing here
//! is strictly "compiling" (a `RuntimeError` or an `EmitError` can carry a
//! `Lint` too), so the trait is named for what it does.

use std::error::Error;
use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::source::SourceFile;

/// Number of bytes of context shown around a lint on either side.
const CONTEXT_WINDOW: usize = 50;

/// Implemented by every error type in this crate so `main` can render a
/// single consistent, optionally source-located, message.
pub trait ReportableError: Error {
    /// The source location this error is about, if any.
    fn lint(&self) -> Option<&Lint> {
        None
    }

    /// A fancy, colorized, print-ready rendering of this error.
    fn description(&self) -> String {
        let mut out = String::new();

        let gravity = self.lint().map_or(LintGravity::Error, |l| l.gravity);
        match gravity {
            LintGravity::Error => out.push_str(&"error:".color(gravity.color()).bold().to_string()),
            LintGravity::Warning => {
                out.push_str(&"warning:".color(gravity.color()).bold().to_string())
            }
        }

        match self.lint() {
            Some(lint) => {
                out.push_str(&format!(
                    " {} (Ln {}, Col {} in {})\n",
                    self.to_string().bold(),
                    lint.line,
                    lint.col,
                    lint.path.display(),
                ));
                out.push_str(&"  ".to_string());
                out.push_str(&"[...] ".black().to_string());
                out.push_str(&lint.context.color(gravity.color()).to_string());
                out.push_str(&" [...]".black().to_string());
            }
            None => {
                out.push_str(&format!(" {}", self.to_string().bold()));
            }
        }

        out
    }
}

/// A source-located annotation attached to an error: where it happened, at
/// what severity, and a snippet of surrounding text for context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lint {
    gravity: LintGravity,
    path: PathBuf,
    line: usize,
    col: usize,
    context: String,
}

impl Lint {
    /// Builds a [`Lint`] pointing at `byte_offset` within `source`, with
    /// [`LintGravity::Error`] severity.
    pub fn error_at(source: &SourceFile, byte_offset: usize) -> Lint {
        Lint::at(source, byte_offset, LintGravity::Error)
    }

    /// Builds a [`Lint`] pointing at `byte_offset` within `source`, with
    /// [`LintGravity::Warning`] severity.
    pub fn warning_at(source: &SourceFile, byte_offset: usize) -> Lint {
        Lint::at(source, byte_offset, LintGravity::Warning)
    }

    fn at(source: &SourceFile, byte_offset: usize, gravity: LintGravity) -> Lint {
        let (line, col) = source.line_col(byte_offset).unwrap_or((1, 1));
        let context = source.context_window(byte_offset, CONTEXT_WINDOW).to_string();
        Lint {
            gravity,
            path: source.path().to_path_buf(),
            line,
            col,
            context,
        }
    }

    /// The path of the source file this lint points into.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One-indexed line number.
    pub fn line(&self) -> usize {
        self.line
    }

    /// One-indexed column number.
    pub fn col(&self) -> usize {
        self.col
    }
}

/// How serious a [`Lint`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LintGravity {
    #[default]
    Error,
    Warning,
}

impl LintGravity {
    fn color(&self) -> colored::Color {
        match self {
            LintGravity::Error => colored::Color::Red,
            LintGravity::Warning => colored::Color::Yellow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct DummyError(Lint);

    impl ReportableError for DummyError {
        fn lint(&self) -> Option<&Lint> {
            Some(&self.0)
        }
    }

    #[test]
    fn description_includes_position() {
        let source = SourceFile::from_raw_parts(PathBuf::from("<test>"), "++[--".into());
        let err = DummyError(Lint::error_at(&source, 4));
        let desc = ReportableError::description(&err);
        assert!(desc.contains("Ln 1"));
        assert!(desc.contains("Col 5"));
    }
}
