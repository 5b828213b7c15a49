//! Provenance for a Brainfuck program: the raw text plus the path it was
//! read from, so that diagnostics can point back at a line and column.

use std::{fmt, fs, io, path::{Path, PathBuf}};

use thiserror::Error;

use crate::utils::find_ln_col;

/// A Brainfuck source file, or an inline `-e` string given a synthetic path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    contents: String,
    path: PathBuf,
}

impl SourceFile {
    /// Builds a [`SourceFile`] from already-available parts (used for `-e`
    /// and for tests).
    pub fn from_raw_parts(path: PathBuf, contents: String) -> SourceFile {
        SourceFile { contents, path }
    }

    /// Reads a [`SourceFile`] from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<SourceFile, SourceFileError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|error| SourceFileError::Open {
            error,
            path: path.to_path_buf(),
        })?;

        Ok(SourceFile {
            contents,
            path: path.to_path_buf(),
        })
    }

    /// The raw, untrimmed text of the source file.
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// The path this source came from (a synthetic one, e.g. `<inline>`, for
    /// sources not backed by a file).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Only the eight significant Brainfuck characters, in order.
    pub fn trimmed(&self) -> String {
        crate::utils::trim(&self.contents)
    }

    /// Resolves a byte offset into this file's raw text to a one-indexed
    /// `(line, column)`, for use in a [`crate::error::Lint`].
    pub fn line_col(&self, byte_offset: usize) -> Option<(usize, usize)> {
        find_ln_col(&self.contents, byte_offset)
    }

    /// A window of up to `radius` bytes on either side of `byte_offset`,
    /// snapped to char boundaries, used to render error context.
    pub fn context_window(&self, byte_offset: usize, radius: usize) -> &str {
        let start = self.contents[..byte_offset.min(self.contents.len())]
            .char_indices()
            .rev()
            .map(|(i, _)| i)
            .nth(radius)
            .unwrap_or(0);
        let end = self.contents[byte_offset.min(self.contents.len())..]
            .char_indices()
            .map(|(i, _)| byte_offset + i)
            .nth(radius)
            .unwrap_or(self.contents.len());
        &self.contents[start..end]
    }
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.contents)
    }
}

/// An error encountered while loading a [`SourceFile`].
#[derive(Debug, Error)]
pub enum SourceFileError {
    /// The file at `path` could not be opened or read.
    #[error("failed to open source file at \"{path}\": {error}")]
    Open {
        /// The underlying I/O failure.
        #[source]
        error: io::Error,
        /// The path that failed to open.
        path: PathBuf,
    },
}
