//! Output normalisation: engine pages → one Markdown document + stats.
//!
//! Engines that serialise their page objects through a `repr`-style string
//! leave artefacts around the text: a leading `content='` (often followed by
//! the `**` of a bold first line) and a trailing `'`. Those are removed once
//! per page, then the pages are joined with a single blank line.
//!
//! Both entry points are pure; nothing here touches the file system except
//! [`NormalizedDocument::save`], which the shell calls explicitly.

use crate::error::{NormalizationError, StudioError};
use crate::output::{ExtractionResult, PageContent};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::path::Path;
use tracing::{debug, error};

/// Separator inserted between consecutive pages: exactly one blank line.
pub const PAGE_JOINER: &str = "\n\n";

/// File name offered for the downloadable document.
pub const DOWNLOAD_FILE_NAME: &str = "output.md";

/// Media type of the downloadable document.
pub const MARKDOWN_MEDIA_TYPE: &str = "text/markdown";

static RE_LEADING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^content='(?:\*\*)?").unwrap());

// ── Document ─────────────────────────────────────────────────────────────

/// The cleaned, concatenated Markdown for one extraction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct NormalizedDocument(String);

impl NormalizedDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// True when the document holds no visible text.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Write the document as UTF-8 to `path`.
    ///
    /// Uses atomic write (temp file + rename) so a reader never sees a
    /// half-written file.
    pub async fn save(&self, path: &Path) -> Result<(), StudioError> {
        let write_err = |source| StudioError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = path.with_extension("md.tmp");
        tokio::fs::write(&tmp_path, self.0.as_bytes())
            .await
            .map_err(write_err)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
        debug!("Saved {} bytes of Markdown to {}", self.0.len(), path.display());
        Ok(())
    }
}

impl fmt::Display for NormalizedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedDocument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Content extraction ───────────────────────────────────────────────────

/// Remove one leading `content='` / `content='**` marker and one trailing `'`.
///
/// Text without those artefacts is returned unchanged.
pub fn clean_page(content: &str) -> String {
    let without_marker = RE_LEADING_MARKER.replace(content, "");
    without_marker
        .strip_suffix('\'')
        .unwrap_or(&without_marker)
        .to_string()
}

/// Clean every page and join them with [`PAGE_JOINER`].
///
/// # Errors
/// [`NormalizationError::MissingContent`] for the first page the engine
/// returned without content.
pub fn try_extract_content(result: &ExtractionResult) -> Result<NormalizedDocument, NormalizationError> {
    let cleaned = result
        .pages
        .iter()
        .map(|p| {
            p.content
                .as_deref()
                .map(clean_page)
                .ok_or(NormalizationError::MissingContent { page: p.page })
        })
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        "Normalised {} pages ({} raw bytes)",
        result.page_count(),
        result.pages.iter().map(PageContent::content_length).sum::<usize>()
    );
    Ok(NormalizedDocument(cleaned.join(PAGE_JOINER)))
}

/// Like [`try_extract_content`], but reports failures instead of returning
/// them: the error is logged and the caller gets `None` (no document).
pub fn extract_content(result: &ExtractionResult) -> Option<NormalizedDocument> {
    match try_extract_content(result) {
        Ok(doc) => Some(doc),
        Err(e) => {
            error!("{e}");
            None
        }
    }
}

// ── Statistics ───────────────────────────────────────────────────────────

/// Flat statistics record for one extraction.
///
/// Serialises as a JSON object whose keys keep the display order of
/// [`ProcessingStats::LABELS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStats {
    pub processing_time_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub pages_processed: u64,
}

impl ProcessingStats {
    pub const LABELS: [&'static str; 4] = [
        "Processing Time (ms)",
        "Input Tokens",
        "Output Tokens",
        "Pages Processed",
    ];

    /// Label/value pairs in display order.
    pub fn entries(&self) -> [(&'static str, u64); 4] {
        let [time, input, output, pages] = Self::LABELS;
        [
            (time, self.processing_time_ms),
            (input, self.input_tokens),
            (output, self.output_tokens),
            (pages, self.pages_processed),
        ]
    }
}

impl Serialize for ProcessingStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (label, value) in entries {
            map.serialize_entry(label, &value)?;
        }
        map.end()
    }
}

/// Pull the statistics out of an extraction result.
pub fn format_stats(result: &ExtractionResult) -> ProcessingStats {
    ProcessingStats {
        processing_time_ms: result.completion_time_ms,
        input_tokens: result.input_tokens,
        output_tokens: result.output_tokens,
        pages_processed: result.page_count() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(pages: Vec<PageContent>) -> ExtractionResult {
        ExtractionResult {
            file_name: "doc".into(),
            pages,
            completion_time_ms: 1534,
            input_tokens: 2100,
            output_tokens: 640,
        }
    }

    #[test]
    fn strips_marker_with_bold() {
        assert_eq!(clean_page("content='**Hello"), "Hello");
    }

    #[test]
    fn strips_marker_and_trailing_quote() {
        assert_eq!(clean_page("content='# Title\nBody'"), "# Title\nBody");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(clean_page("Plain text"), "Plain text");
        assert_eq!(clean_page(""), "");
    }

    #[test]
    fn strips_only_one_marker_and_one_quote() {
        assert_eq!(clean_page("content='content='x''"), "content='x'");
    }

    #[test]
    fn marker_must_be_leading() {
        assert_eq!(clean_page("see content='**x"), "see content='**x");
    }

    #[test]
    fn joins_pages_with_one_blank_line() {
        let result = result_with(vec![
            PageContent::new(1, "content='**One'"),
            PageContent::new(2, "Two"),
            PageContent::new(3, "Three"),
        ]);
        let doc = try_extract_content(&result).unwrap();
        assert_eq!(doc.as_str(), "One\n\nTwo\n\nThree");
        assert_eq!(doc.as_str().matches(PAGE_JOINER).count(), 2);
    }

    #[test]
    fn single_page_has_no_separator() {
        let doc = try_extract_content(&result_with(vec![PageContent::new(1, "Only")])).unwrap();
        assert_eq!(doc.as_str(), "Only");
    }

    #[test]
    fn zero_pages_gives_empty_document() {
        let doc = try_extract_content(&result_with(vec![])).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn missing_content_yields_no_document() {
        let result = result_with(vec![PageContent::new(1, "ok"), PageContent::empty(2)]);
        assert_eq!(
            try_extract_content(&result),
            Err(NormalizationError::MissingContent { page: 2 })
        );
        assert_eq!(extract_content(&result), None);
    }

    #[test]
    fn stats_have_four_entries_in_order() {
        let result = result_with(vec![PageContent::new(1, "a"), PageContent::new(2, "b")]);
        let stats = format_stats(&result);
        let entries = stats.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(
            entries.map(|(label, _)| label),
            ProcessingStats::LABELS
        );
        assert_eq!(entries[0].1, 1534);
        assert_eq!(entries[1].1, 2100);
        assert_eq!(entries[2].1, 640);
        assert_eq!(entries[3].1, 2);
    }

    #[test]
    fn stats_serialise_in_display_order() {
        let stats = format_stats(&result_with(vec![PageContent::new(1, "a")]));
        let json = serde_json::to_string(&stats).unwrap();
        assert_eq!(
            json,
            r#"{"Processing Time (ms)":1534,"Input Tokens":2100,"Output Tokens":640,"Pages Processed":1}"#
        );
    }

    #[tokio::test]
    async fn save_writes_utf8_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DOWNLOAD_FILE_NAME);
        let doc = NormalizedDocument("# Grüße\n\nzweite Seite".into());
        doc.save(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), doc.as_str());
        assert!(!path.with_extension("md.tmp").exists());
    }
}
