//! VLM interaction: one chat call per page image.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors are transient under concurrent load. Exponential
//! backoff (`retry_backoff_ms * 2^attempt`) gives a throttled provider
//! progressively more room: with a 500 ms base and 3 retries the waits are
//! 500 ms → 1 s → 2 s, under 4 s of back-off per page.
//!
//! A page that still fails after the last retry fails the whole extraction.

use crate::config::EngineSettings;
use crate::error::EngineError;
use crate::prompts::maintain_format_context;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Markdown and token usage for one page.
#[derive(Debug, Clone)]
pub struct PageReading {
    /// 1-indexed page number.
    pub page_num: usize,
    pub markdown: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Ask the VLM to transcribe one page.
///
/// ## Message Layout
///
/// 1. **System message**: the form's custom prompt, or
///    [`crate::prompts::DEFAULT_SYSTEM_PROMPT`]
/// 2. **Format-continuity message** *(sequential mode only)*: the previous
///    page's Markdown, so list numbering and heading levels carry across
///    the page break
/// 3. **User message**: the page PNG with empty text
///
/// The user turn has no text because the APIs need a user message to answer
/// while the image carries all of the content.
///
/// ## Errors
///
/// Unlike a best-effort page loop, this returns `Err` once retries are
/// exhausted; [`crate::engine::VlmEngine`] fails the whole extraction.
pub async fn read_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image: ImageData,
    system_prompt: &str,
    prior_page: Option<&str>,
    settings: &EngineSettings,
) -> Result<PageReading, EngineError> {
    let start = Instant::now();

    let mut messages = vec![ChatMessage::system(system_prompt)];
    if let Some(prior) = prior_page.filter(|p| !p.is_empty()) {
        messages.push(ChatMessage::system(maintain_format_context(prior)));
    }
    messages.push(ChatMessage::user_with_images("", vec![image]));

    let options = build_options(settings);
    let mut last_err = String::from("no attempt made");

    for attempt in 0..=settings.max_retries {
        if attempt > 0 {
            let backoff = settings.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, settings.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "Page {}: {} input tokens, {} output tokens, {:?}",
                    page_num,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                return Ok(PageReading {
                    page_num,
                    markdown: response.content,
                    input_tokens: response.prompt_tokens as u64,
                    output_tokens: response.completion_tokens as u64,
                });
            }
            Err(e) => {
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, e);
                last_err = e.to_string();
            }
        }
    }

    Err(EngineError::new(format!(
        "Page {page_num}: VLM call failed after {} retries: {last_err}",
        settings.max_retries
    )))
}

fn build_options(settings: &EngineSettings) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_settings() {
        let settings = EngineSettings {
            temperature: 0.0,
            max_tokens: 2048,
            ..EngineSettings::default()
        };
        let opts = build_options(&settings);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(2048));
    }
}
