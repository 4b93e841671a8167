//! # edgequake-pdf2md-studio
//!
//! The form-driven front half of a PDF-to-Markdown converter: collect a
//! provider, its credentials, a page selection and an upload; validate them;
//! hand the PDF to an extraction engine; clean up what comes back.
//!
//! Document understanding itself (rasterising, reading, writing Markdown)
//! lives behind the [`ExtractionEngine`] trait. The built-in [`VlmEngine`]
//! renders pages with pdfium and reads them with a vision model through
//! `edgequake-llm`.
//!
//! ## Flow
//!
//! ```text
//! ConversionForm
//!  │
//!  ├─ 1. Validate   form overrides → Credentials, page selection, provider keys
//!  ├─ 2. Stage      upload → temp file (removed on every path)
//!  ├─ 3. Invoke     ExtractionEngine::extract on a spawned, cancellable task
//!  ├─ 4. Normalize  strip `content='**…'` artefacts, join pages, stats
//!  └─ 5. Display    ConversionReport { document, stats }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2md_studio::{ConversionForm, Credentials, ProviderKind, Session, VlmEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(Arc::new(VlmEngine::default()), Credentials::from_env());
//!
//!     let mut form = ConversionForm::new(ProviderKind::OpenAi);
//!     form.upload = Some(std::fs::read("document.pdf")?);
//!     form.page_selection = "1,3".into();
//!
//!     let report = session.run(&form).await?;
//!     if let Some(doc) = report.document {
//!         println!("{doc}");
//!     }
//!     for (label, value) in report.stats.entries() {
//!         eprintln!("{label}: {value}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2md-studio` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod invoke;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod providers;
pub mod session;
pub mod staging;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CredentialField, Credentials, EngineSettings, PageSelection, ProcessRequest,
    ProcessRequestBuilder, ProviderArgs, ProviderKind,
};
pub use engine::{route_model, ExtractionEngine, VlmEngine};
pub use error::{EngineError, NormalizationError, StudioError};
pub use invoke::{invoke, Invocation};
pub use normalize::{
    extract_content, format_stats, try_extract_content, NormalizedDocument, ProcessingStats,
};
pub use output::{ExtractionResult, PageContent};
pub use progress::{NoopObserver, Phase, PhaseObserver, SharedObserver};
pub use providers::{check, check_named, RequirementReport};
pub use session::{ConversionForm, ConversionReport, Session};
pub use staging::StagedPdf;
