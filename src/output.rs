//! Structured result returned by an extraction engine.

use serde::{Deserialize, Serialize};

/// Raw content of one page, as serialised by the engine.
///
/// `content` may still carry serialisation artefacts (`content='**…'`);
/// [`crate::normalize`] strips them. `None` means the engine emitted a page
/// entry without any text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    /// 1-indexed page number in the source document.
    pub page: usize,
    pub content: Option<String>,
}

impl PageContent {
    pub fn new(page: usize, content: impl Into<String>) -> Self {
        Self {
            page,
            content: Some(content.into()),
        }
    }

    /// A page entry the engine produced without content.
    pub fn empty(page: usize) -> Self {
        Self {
            page,
            content: None,
        }
    }

    /// Byte length of the raw content, 0 when absent.
    pub fn content_length(&self) -> usize {
        self.content.as_ref().map_or(0, String::len)
    }
}

/// Everything one successful extraction produced. Read-only once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Stem of the source file, also used for the engine's own output file.
    pub file_name: String,
    /// Pages in document order.
    pub pages: Vec<PageContent>,
    /// Wall-clock time of the whole extraction, in milliseconds.
    pub completion_time_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl ExtractionResult {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
