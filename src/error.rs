//! Error types for the edgequake-pdf2md-studio library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`StudioError`] — **Fatal**: the conversion action cannot proceed
//!   (missing credentials, no upload, engine failure). Returned as
//!   `Err(StudioError)` from the flow entry points and surfaced once by the
//!   shell as a single message.
//!
//! * [`NormalizationError`] — **Local**: a page returned by the engine could
//!   not be cleaned. The normaliser catches it, reports it, and yields no
//!   document; statistics are still available.

use crate::config::ProviderKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2md-studio library.
#[derive(Debug, Error)]
pub enum StudioError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// A credential required by the selected provider is empty or unset.
    ///
    /// Raised before any I/O; the extraction is never started.
    #[error("Configuration error: {message}")]
    Configuration {
        provider: ProviderKind,
        missing: Vec<&'static str>,
        message: String,
    },

    /// The provider name given by the caller is not one of the supported set.
    #[error("Configuration error: Unknown provider '{name}'")]
    UnknownProvider { name: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The uploaded credentials document is not a valid JSON object.
    #[error("Failed to parse credentials JSON: {0}")]
    CredentialsParse(#[from] serde_json::Error),

    // ── Input errors ──────────────────────────────────────────────────────
    /// The action was triggered without a PDF upload.
    #[error("Please upload a PDF file first")]
    NoInput,

    /// The page-selection text is neither empty, a number, nor a comma list.
    #[error("Invalid page selection format: '{input}'\nUse a single number (5) or a comma-separated list (1,3,5).")]
    InvalidPageSelection { input: String },

    /// The uploaded bytes do not start with the `%PDF` magic.
    #[error("Uploaded file is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { magic: Vec<u8> },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The upload could not be written to its staging file.
    #[error("Failed to stage uploaded PDF: {0}")]
    Staging(#[source] std::io::Error),

    // ── Engine errors ─────────────────────────────────────────────────────
    /// Any failure reported by the extraction engine. Not classified further.
    #[error("{0}")]
    Engine(#[from] EngineError),

    /// The extraction task was cancelled before it produced an outcome.
    #[error("Extraction was cancelled")]
    Cancelled,

    // ── Output errors ─────────────────────────────────────────────────────
    /// A page could not be normalised into the final document.
    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    /// Could not create or write the downloadable Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StudioError {
    /// True for the errors detected before any I/O is attempted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StudioError::Configuration { .. }
                | StudioError::UnknownProvider { .. }
                | StudioError::InvalidConfig(_)
                | StudioError::NoInput
                | StudioError::InvalidPageSelection { .. }
        )
    }
}

/// Opaque failure from an [`crate::engine::ExtractionEngine`].
///
/// Auth failures, quota errors, malformed PDFs and network errors all land
/// here with the engine's own message; callers do not branch on the cause.
#[derive(Debug, Error)]
#[error("Extraction engine error: {message}")]
pub struct EngineError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// A page of engine output that the normaliser could not process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    /// The engine returned a page entry without any content.
    #[error("Error extracting content: page {page} has no content")]
    MissingContent { page: usize },
}
