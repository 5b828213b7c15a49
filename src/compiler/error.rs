//! Errors raised while compiling trimmed Brainfuck source to IR.

use thiserror::Error;

use crate::error::{Lint, ReportableError};

/// Failure mode of the compiler (spec §4.1's error conditions): exactly one
/// kind, `UnmatchedBracket`, for both directions of imbalance.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A `]` appeared with no open `[`, or a `[` was never closed.
    #[error("unmatched bracket")]
    UnmatchedBracket {
        /// Where the orphaned bracket (or, for an unclosed `[`, the end of
        /// input) was found, if source provenance was available.
        lint: Option<Lint>,
    },
}

impl ReportableError for CompileError {
    fn lint(&self) -> Option<&Lint> {
        match self {
            CompileError::UnmatchedBracket { lint } => lint.as_ref(),
        }
    }
}
