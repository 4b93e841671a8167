//! The extraction-engine boundary.
//!
//! Document understanding is not done here: an [`ExtractionEngine`] turns a
//! staged PDF into per-page text. Everything on this side of the trait only
//! validates inputs and post-processes outputs, so engines can be swapped
//! (or scripted in tests) without touching the flow.
//!
//! [`VlmEngine`] is the built-in engine: pdfium rasterises the pages and a
//! vision model reads them through `edgequake-llm`.

use crate::config::{Credentials, EngineSettings, ProcessRequest, ProviderArgs, ProviderKind};
use crate::error::EngineError;
use crate::output::{ExtractionResult, PageContent};
use crate::pipeline::llm::PageReading;
use crate::pipeline::{encode, llm, provider, render, tidy};
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ImageData, LLMProvider};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Converts a PDF into structured per-page content.
///
/// Implementations own every failure mode (auth, quota, network, malformed
/// PDF) and report them as a single [`EngineError`]. Extraction is
/// all-or-nothing: an `Ok` result contains every selected page.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Extract `request.file_path()`.
    ///
    /// `credentials` is the validated configuration for the request;
    /// `provider_args` carries provider-specific extras, passed untouched.
    async fn extract(
        &self,
        request: &ProcessRequest,
        credentials: &Credentials,
        provider_args: &ProviderArgs,
    ) -> Result<ExtractionResult, EngineError>;
}

// ── Model routing ────────────────────────────────────────────────────────

/// Split an engine model identifier into its provider and bare model name.
///
/// Explicit prefixes win (`azure/`, `vertex_ai/`, `gemini/`, `anthropic/`,
/// `openai/`); otherwise `claude*` routes to Anthropic, `gemini*` to Gemini,
/// and everything else to OpenAI.
pub fn route_model(model: &str) -> (ProviderKind, &str) {
    const PREFIXES: [(&str, ProviderKind); 5] = [
        ("azure/", ProviderKind::AzureOpenAi),
        ("vertex_ai/", ProviderKind::VertexAi),
        ("gemini/", ProviderKind::Gemini),
        ("anthropic/", ProviderKind::Anthropic),
        ("openai/", ProviderKind::OpenAi),
    ];
    for (prefix, kind) in PREFIXES {
        if let Some(rest) = model.strip_prefix(prefix) {
            return (kind, rest);
        }
    }
    if model.starts_with("claude") {
        (ProviderKind::Anthropic, model)
    } else if model.starts_with("gemini") {
        (ProviderKind::Gemini, model)
    } else {
        (ProviderKind::OpenAi, model)
    }
}

// ── VlmEngine ────────────────────────────────────────────────────────────

/// Built-in engine: pdfium rendering + one VLM call per page.
///
/// Writes the joined Markdown to `<output_dir>/<file stem>.md` and returns
/// the raw page texts with token and timing counters.
pub struct VlmEngine {
    settings: EngineSettings,
    provider: Option<Arc<dyn LLMProvider>>,
}

impl VlmEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            provider: None,
        }
    }

    /// Use a pre-built provider instead of creating one from the model id.
    pub fn with_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    async fn resolve_provider(
        &self,
        model: &str,
        credentials: &Credentials,
        provider_args: &ProviderArgs,
    ) -> Result<Arc<dyn LLMProvider>, EngineError> {
        if let Some(ref provider) = self.provider {
            return Ok(Arc::clone(provider));
        }

        let (kind, bare_model) = route_model(model);
        provider::build_provider(kind, bare_model, credentials, provider_args).await
    }

    async fn read_concurrent(
        &self,
        provider: &Arc<dyn LLMProvider>,
        pages: Vec<(usize, ImageData)>,
        system_prompt: &str,
    ) -> Result<Vec<PageReading>, EngineError> {
        let settings = &self.settings;
        let results: Vec<Result<PageReading, EngineError>> =
            stream::iter(pages.into_iter().map(|(page_num, image)| async move {
                llm::read_page(provider, page_num, image, system_prompt, None, settings).await
            }))
            .buffer_unordered(settings.concurrency.max(1))
            .collect()
            .await;

        let mut readings = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        readings.sort_by_key(|r| r.page_num);
        Ok(readings)
    }

    async fn read_sequential(
        &self,
        provider: &Arc<dyn LLMProvider>,
        pages: Vec<(usize, ImageData)>,
        system_prompt: &str,
    ) -> Result<Vec<PageReading>, EngineError> {
        let mut readings: Vec<PageReading> = Vec::with_capacity(pages.len());
        for (page_num, image) in pages {
            let prior = readings.last().map(|r| r.markdown.as_str());
            let reading =
                llm::read_page(provider, page_num, image, system_prompt, prior, &self.settings)
                    .await?;
            readings.push(reading);
        }
        Ok(readings)
    }
}

impl Default for VlmEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

#[async_trait]
impl ExtractionEngine for VlmEngine {
    async fn extract(
        &self,
        request: &ProcessRequest,
        credentials: &Credentials,
        provider_args: &ProviderArgs,
    ) -> Result<ExtractionResult, EngineError> {
        let start = Instant::now();
        info!(
            "Extracting {} with {}",
            request.file_path().display(),
            request.model()
        );

        let provider = self
            .resolve_provider(request.model(), credentials, provider_args)
            .await?;
        let system_prompt = request.system_prompt().unwrap_or(DEFAULT_SYSTEM_PROMPT);

        let rendered = render::render_pages(request.file_path(), request.pages(), &self.settings).await?;
        debug!(
            "Rendered {}/{} pages",
            rendered.images.len(),
            rendered.total_pages
        );

        let encoded = rendered
            .images
            .iter()
            .map(|(idx, img)| encode::encode_page(idx + 1, img).map(|data| (idx + 1, data)))
            .collect::<Result<Vec<_>, _>>()?;
        drop(rendered);

        let readings = if self.settings.maintain_format {
            self.read_sequential(&provider, encoded, system_prompt).await?
        } else {
            self.read_concurrent(&provider, encoded, system_prompt).await?
        };

        let pages: Vec<PageContent> = readings
            .iter()
            .map(|r| PageContent::new(r.page_num, tidy::tidy_page(&r.markdown)))
            .collect();

        let file_name = request
            .file_path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        write_markdown(request.output_dir(), &file_name, &pages).await?;

        let result = ExtractionResult {
            file_name,
            completion_time_ms: start.elapsed().as_millis() as u64,
            input_tokens: readings.iter().map(|r| r.input_tokens).sum(),
            output_tokens: readings.iter().map(|r| r.output_tokens).sum(),
            pages,
        };
        info!(
            "Extraction complete: {} pages, {}ms",
            result.pages.len(),
            result.completion_time_ms
        );
        Ok(result)
    }
}

/// Write the engine's own copy of the document next to other outputs.
async fn write_markdown(
    output_dir: &Path,
    file_name: &str,
    pages: &[PageContent],
) -> Result<(), EngineError> {
    tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
        EngineError::with_source(
            format!("Failed to create output directory '{}'", output_dir.display()),
            e,
        )
    })?;

    let path = output_dir.join(format!("{file_name}.md"));
    let body = pages
        .iter()
        .filter_map(|p| p.content.as_deref())
        .collect::<Vec<_>>()
        .join("\n\n");
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| EngineError::with_source(format!("Failed to write '{}'", path.display()), e))?;
    debug!("Wrote {}", path.display());
    Ok(())
}
