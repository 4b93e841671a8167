//! Staging uploaded PDF bytes on disk for the engine.
//!
//! Engines read from a file path, so an upload is written to a temporary
//! file first. [`StagedPdf`] owns that file: it is removed when the guard is
//! dropped, on the success path and on every error path alike.

use crate::error::StudioError;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Magic bytes every PDF starts with.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Reject uploads that are obviously not PDFs before writing anything.
pub fn validate_pdf_magic(bytes: &[u8]) -> Result<(), StudioError> {
    if bytes.starts_with(PDF_MAGIC) {
        Ok(())
    } else {
        Err(StudioError::NotAPdf {
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        })
    }
}

/// A staged upload. The file exists for as long as this value lives.
#[derive(Debug)]
pub struct StagedPdf {
    file: NamedTempFile,
}

impl StagedPdf {
    /// Stage `bytes` in the system temp directory.
    pub fn stage(bytes: &[u8]) -> Result<Self, StudioError> {
        Self::stage_in(std::env::temp_dir(), bytes)
    }

    /// Stage `bytes` in `dir`.
    pub fn stage_in(dir: impl AsRef<Path>, bytes: &[u8]) -> Result<Self, StudioError> {
        validate_pdf_magic(bytes)?;

        let mut file = tempfile::Builder::new()
            .prefix("pdf2md-upload-")
            .suffix(".pdf")
            .tempfile_in(dir)
            .map_err(StudioError::Staging)?;
        file.write_all(bytes).map_err(StudioError::Staging)?;
        file.flush().map_err(StudioError::Staging)?;

        debug!("Staged {} bytes at {}", bytes.len(), file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Remove the staged file now, reporting any I/O error.
    ///
    /// Dropping the guard removes it as well, silently.
    pub fn remove(self) -> Result<(), StudioError> {
        let path = self.file.path().to_path_buf();
        self.file.close().map_err(StudioError::Staging)?;
        debug!("Removed staged upload {}", path.display());
        Ok(())
    }
}
