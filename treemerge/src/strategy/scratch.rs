//! Scratch files for the semistructured fallback.
//!
//! The line-based strategy works on file paths, so opaque leaf texts are
//! written to uniquely named temporary files for the duration of one content
//! merge. The holder owns all four files; dropping it removes them on every
//! exit path, normal or not. There is no process-wide scratch state.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Result;

/// Temporary input and output files for one line-based content merge.
pub struct ScratchFiles {
    left: NamedTempFile,
    base: NamedTempFile,
    right: NamedTempFile,
    output: NamedTempFile,
}

impl ScratchFiles {
    /// Creates the scratch files and writes the three input texts.
    pub fn new(left_text: &str, base_text: &str, right_text: &str) -> Result<Self> {
        let mut left = NamedTempFile::new()?;
        left.write_all(left_text.as_bytes())?;
        left.flush()?;

        let mut base = NamedTempFile::new()?;
        base.write_all(base_text.as_bytes())?;
        base.flush()?;

        let mut right = NamedTempFile::new()?;
        right.write_all(right_text.as_bytes())?;
        right.flush()?;

        let output = NamedTempFile::new()?;

        Ok(ScratchFiles {
            left,
            base,
            right,
            output,
        })
    }

    /// Path of the left input file.
    pub fn left_path(&self) -> &Path {
        self.left.path()
    }

    /// Path of the base input file.
    pub fn base_path(&self) -> &Path {
        self.base.path()
    }

    /// Path of the right input file.
    pub fn right_path(&self) -> &Path {
        self.right.path()
    }

    /// Path of the output file.
    pub fn output_path(&self) -> &Path {
        self.output.path()
    }

    /// Reads the merged output back.
    pub fn read_output(&self) -> Result<String> {
        Ok(fs::read_to_string(self.output.path())?)
    }
}
