//! Stages of the built-in [`crate::engine::VlmEngine`].
//!
//! ```text
//! render ──▶ encode ──▶ llm ──▶ tidy
//! (pdfium)   (base64)   (VLM)   (fences, line endings)
//!                          ▲
//!                       provider (built from Credentials)
//! ```
//!
//! 1. [`render`] — rasterise the selected pages; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 2. [`encode`] — PNG-encode and base64-wrap each page image
//! 3. [`llm`]    — one VLM call per page with retry/backoff; the only stage
//!    with network I/O
//! 4. [`tidy`]   — minimal cleanup of what the model returned
//!
//! [`provider`] builds the `edgequake-llm` backend that [`llm`] calls.

pub mod encode;
pub mod llm;
pub mod provider;
pub mod render;
pub mod tidy;
