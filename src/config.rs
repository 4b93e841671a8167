//! Configuration types for a single conversion action.
//!
//! Everything the extraction needs travels explicitly through the call chain:
//!
//! * [`ProviderKind`] — the closed set of supported VLM backends, each with
//!   its own required credential keys.
//! * [`Credentials`] — the named key/value credential store. Loaded once from
//!   the environment (and `.env`), then overridden by form inputs.
//! * [`ProcessRequest`] — file, model, output directory, prompt and page
//!   selection for one extraction, built via [`ProcessRequestBuilder`].
//! * [`ProviderArgs`] — provider-specific extras passed to the engine as-is.

use crate::error::StudioError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ── Credential keys ──────────────────────────────────────────────────────

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const AZURE_API_KEY: &str = "AZURE_API_KEY";
pub const AZURE_API_BASE: &str = "AZURE_API_BASE";
pub const AZURE_API_VERSION: &str = "AZURE_API_VERSION";
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const VERTEX_CREDENTIALS: &str = "VERTEX_CREDENTIALS";
pub const VERTEXAI_PROJECT: &str = "VERTEXAI_PROJECT";
pub const VERTEXAI_LOCATION: &str = "VERTEXAI_LOCATION";
/// Optional OAuth token for Vertex AI. When absent, one is minted from the
/// service-account credentials with `gcloud`.
pub const GOOGLE_ACCESS_TOKEN: &str = "GOOGLE_ACCESS_TOKEN";

/// Every key any provider reads. Used when loading from the environment.
pub const ALL_CREDENTIAL_KEYS: [&str; 10] = [
    OPENAI_API_KEY,
    AZURE_API_KEY,
    AZURE_API_BASE,
    AZURE_API_VERSION,
    GEMINI_API_KEY,
    ANTHROPIC_API_KEY,
    VERTEX_CREDENTIALS,
    VERTEXAI_PROJECT,
    VERTEXAI_LOCATION,
    GOOGLE_ACCESS_TOKEN,
];

/// Azure API version applied when the form leaves it untouched.
pub const DEFAULT_AZURE_API_VERSION: &str = "2023-05-15";

/// Default output directory for engine-written Markdown files.
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// One required credential: the configuration key and the label used in
/// "missing" messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialField {
    pub key: &'static str,
    pub label: &'static str,
}

const fn field(key: &'static str, label: &'static str) -> CredentialField {
    CredentialField { key, label }
}

// ── Providers ────────────────────────────────────────────────────────────

/// A vision-capable model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    OpenAi,
    AzureOpenAi,
    Gemini,
    Anthropic,
    VertexAi,
}

impl ProviderKind {
    /// All providers, in the order the form lists them.
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAi,
        ProviderKind::AzureOpenAi,
        ProviderKind::Gemini,
        ProviderKind::Anthropic,
        ProviderKind::VertexAi,
    ];

    /// Human-readable name, used as the prefix of requirement messages.
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OpenAI",
            ProviderKind::AzureOpenAi => "Azure OpenAI",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::Anthropic => "Anthropic",
            ProviderKind::VertexAi => "Vertex AI",
        }
    }

    /// Credential fields that must be non-empty before extraction starts.
    pub fn required_fields(self) -> &'static [CredentialField] {
        const OPENAI: &[CredentialField] = &[field(OPENAI_API_KEY, "API key")];
        const AZURE: &[CredentialField] = &[
            field(AZURE_API_KEY, "API key"),
            field(AZURE_API_BASE, "API base"),
            field(AZURE_API_VERSION, "API version"),
        ];
        const GEMINI: &[CredentialField] = &[field(GEMINI_API_KEY, "API key")];
        const ANTHROPIC: &[CredentialField] = &[field(ANTHROPIC_API_KEY, "API key")];
        const VERTEX: &[CredentialField] = &[
            field(VERTEX_CREDENTIALS, "credentials"),
            field(VERTEXAI_PROJECT, "project"),
            field(VERTEXAI_LOCATION, "location"),
        ];

        match self {
            ProviderKind::OpenAi => OPENAI,
            ProviderKind::AzureOpenAi => AZURE,
            ProviderKind::Gemini => GEMINI,
            ProviderKind::Anthropic => ANTHROPIC,
            ProviderKind::VertexAi => VERTEX,
        }
    }

    /// Model (or deployment) name pre-filled in the form.
    ///
    /// Azure has no sensible default: the deployment name is user-specific.
    pub fn default_model_name(self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("gpt-4o"),
            ProviderKind::AzureOpenAi => None,
            ProviderKind::Gemini => Some("gemini/gemini-1.5-pro-002"),
            ProviderKind::Anthropic => Some("claude-3-5-sonnet-20240620"),
            ProviderKind::VertexAi => Some("gemini-1.5-flash-001"),
        }
    }

    /// Build the engine-facing model identifier from the form's model name.
    ///
    /// Azure deployments are addressed as `azure/<deployment>` and Vertex
    /// models as `vertex_ai/<model>`; other providers use the name verbatim.
    pub fn model_identifier(self, name: Option<&str>) -> String {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .or(self.default_model_name())
            .unwrap_or_default();
        match self {
            ProviderKind::AzureOpenAi => format!("azure/{name}"),
            ProviderKind::VertexAi => format!("vertex_ai/{name}"),
            _ => name.to_string(),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderKind {
    type Err = StudioError;

    /// Accepts display names ("Azure OpenAI") and short CLI forms
    /// ("azure", "vertex-ai"), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();
        match norm.as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "azure" | "azureopenai" => Ok(ProviderKind::AzureOpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "vertex" | "vertexai" => Ok(ProviderKind::VertexAi),
            _ => Err(StudioError::UnknownProvider {
                name: s.to_string(),
            }),
        }
    }
}

// ── Credentials ──────────────────────────────────────────────────────────

/// Named, string-valued credential store.
///
/// Replaces reads and writes of the process environment: the shell loads it
/// once, applies form overrides, and hands it to the checker and the engine.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `.env` (if present) and then read every known credential key
    /// from the process environment.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment overrides from {}", path.display());
        }
        let mut creds = Self::new();
        for key in ALL_CREDENTIAL_KEYS {
            if let Ok(value) = std::env::var(key) {
                creds.set(key, value);
            }
        }
        creds
    }

    /// Insert or replace a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Set `key` only when `value` is present and non-empty.
    ///
    /// Mirrors the form semantics: a blank input leaves the loaded value alone.
    pub fn set_if_present(&mut self, key: &str, value: Option<&str>) {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.set(key, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// True when `key` holds a non-empty value.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values are secrets; only the key names are printed.
        f.debug_set().entries(self.values.keys()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut creds = Self::new();
        for (k, v) in iter {
            creds.set(k, v);
        }
        creds
    }
}

/// Provider-specific keyword arguments forwarded to the engine untouched.
pub type ProviderArgs = BTreeMap<String, String>;

/// Key under which uploaded Vertex credentials are forwarded to the engine.
pub const VERTEX_CREDENTIALS_ARG: &str = "vertex_credentials";

// ── Page selection ───────────────────────────────────────────────────────

/// Which pages of the PDF to extract. Page numbers are 1-indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page (default; the form's empty input).
    #[default]
    All,
    /// One page.
    Single(usize),
    /// An ordered list of pages, kept exactly as entered.
    List(Vec<usize>),
}

impl PageSelection {
    /// Parse the form's page-selection text.
    ///
    /// * `""`      → [`PageSelection::All`]
    /// * `"2"`     → [`PageSelection::Single(2)`]
    /// * `"1,3,5"` → [`PageSelection::List(vec![1, 3, 5])`]
    pub fn parse(input: &str) -> Result<Self, StudioError> {
        let s = input.trim();
        if s.is_empty() {
            return Ok(PageSelection::All);
        }

        let invalid = || StudioError::InvalidPageSelection {
            input: input.to_string(),
        };

        if s.contains(',') {
            let pages = s
                .split(',')
                .map(|p| p.trim().parse::<usize>().map_err(|_| invalid()))
                .collect::<Result<Vec<_>, _>>()?;
            if pages.contains(&0) {
                return Err(invalid());
            }
            return Ok(PageSelection::List(pages));
        }

        match s.parse::<usize>() {
            Ok(0) | Err(_) => Err(invalid()),
            Ok(page) => Ok(PageSelection::Single(page)),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, PageSelection::All)
    }

    /// Resolve against a document of `total_pages` into sorted, deduplicated
    /// 0-indexed page numbers. Out-of-range pages are dropped.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let in_range = |p: &usize| *p >= 1 && *p <= total_pages;
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => std::iter::once(*p)
                .filter(in_range)
                .map(|p| p - 1)
                .collect(),
            PageSelection::List(pages) => {
                pages.iter().copied().filter(in_range).map(|p| p - 1).collect()
            }
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

// ── Process request ──────────────────────────────────────────────────────

/// One extraction request. Built fresh for every action; never mutated after
/// it is handed to the invoker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRequest {
    file_path: PathBuf,
    model: String,
    output_dir: PathBuf,
    system_prompt: Option<String>,
    pages: PageSelection,
}

impl ProcessRequest {
    pub fn builder(file_path: impl Into<PathBuf>, model: impl Into<String>) -> ProcessRequestBuilder {
        ProcessRequestBuilder {
            file_path: file_path.into(),
            model: model.into(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            system_prompt: None,
            pages: PageSelection::All,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn pages(&self) -> &PageSelection {
        &self.pages
    }
}

/// Builder for [`ProcessRequest`].
#[derive(Debug)]
pub struct ProcessRequestBuilder {
    file_path: PathBuf,
    model: String,
    output_dir: PathBuf,
    system_prompt: Option<String>,
    pages: PageSelection,
}

impl ProcessRequestBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Custom system prompt. Blank prompts count as "not provided".
    pub fn system_prompt(mut self, prompt: Option<impl Into<String>>) -> Self {
        self.system_prompt = prompt.map(Into::into).filter(|p| !p.trim().is_empty());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.pages = selection;
        self
    }

    /// Build the request, validating constraints.
    pub fn build(self) -> Result<ProcessRequest, StudioError> {
        if self.model.trim().is_empty() {
            return Err(StudioError::InvalidConfig(
                "Model identifier must not be empty".into(),
            ));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(StudioError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        Ok(ProcessRequest {
            file_path: self.file_path,
            model: self.model,
            output_dir: self.output_dir,
            system_prompt: self.system_prompt,
            pages: self.pages,
        })
    }
}

// ── Engine settings ──────────────────────────────────────────────────────

/// Knobs of the built-in [`crate::engine::VlmEngine`].
///
/// These are engine internals, not part of a [`ProcessRequest`]: the form
/// never changes them per action.
#[derive(Clone)]
pub struct EngineSettings {
    /// Concurrent VLM calls when `maintain_format` is off. Default: 10.
    pub concurrency: usize,
    /// Sampling temperature. Default: 0.1 (transcription wants determinism).
    pub temperature: f32,
    /// Max tokens generated per page. Default: 4096.
    pub max_tokens: usize,
    /// Retries per page on a failed VLM call. Default: 3.
    pub max_retries: u32,
    /// Initial backoff in ms, doubled after each retry. Default: 500.
    pub retry_backoff_ms: u64,
    /// Cap on the longest edge of a rendered page, in pixels. Default: 2000.
    pub max_rendered_pixels: u32,
    /// Process pages one at a time, passing the previous page as context.
    /// Default: false.
    pub maintain_format: bool,
    /// User password for encrypted PDFs.
    pub password: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            max_rendered_pixels: 2000,
            maintain_format: false,
            password: None,
        }
    }
}

impl fmt::Debug for EngineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineSettings")
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("maintain_format", &self.maintain_format)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_settings_debug_redacts_password() {
        let settings = EngineSettings {
            password: Some("hunter2".into()),
            ..EngineSettings::default()
        };
        let dbg = format!("{settings:?}");
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn parse_page_list_keeps_order() {
        assert_eq!(
            PageSelection::parse("1,3,5").unwrap(),
            PageSelection::List(vec![1, 3, 5])
        );
        assert_eq!(
            PageSelection::parse(" 5 , 2 ").unwrap(),
            PageSelection::List(vec![5, 2])
        );
    }

    #[test]
    fn parse_single_page() {
        assert_eq!(PageSelection::parse("2").unwrap(), PageSelection::Single(2));
    }

    #[test]
    fn parse_empty_is_all() {
        assert_eq!(PageSelection::parse("").unwrap(), PageSelection::All);
        assert_eq!(PageSelection::parse("   ").unwrap(), PageSelection::All);
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["abc", "1,x", "0", "1,0", "3-5", "1,,2"] {
            assert!(
                matches!(
                    PageSelection::parse(bad),
                    Err(StudioError::InvalidPageSelection { .. })
                ),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::Single(2).to_indices(3), vec![1]);
        assert_eq!(PageSelection::Single(9).to_indices(3), Vec::<usize>::new());
        assert_eq!(
            PageSelection::List(vec![3, 1, 3, 7]).to_indices(5),
            vec![0, 2]
        );
    }

    #[test]
    fn provider_from_str_accepts_display_and_short_names() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(
            "Azure OpenAI".parse::<ProviderKind>().unwrap(),
            ProviderKind::AzureOpenAi
        );
        assert_eq!("azure".parse::<ProviderKind>().unwrap(), ProviderKind::AzureOpenAi);
        assert_eq!("vertex-ai".parse::<ProviderKind>().unwrap(), ProviderKind::VertexAi);
        assert_eq!("Vertex AI".parse::<ProviderKind>().unwrap(), ProviderKind::VertexAi);
        assert!("mistral".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for p in ProviderKind::ALL {
            assert_eq!(p.to_string().parse::<ProviderKind>().unwrap(), p);
        }
    }

    #[test]
    fn model_identifiers() {
        assert_eq!(ProviderKind::OpenAi.model_identifier(None), "gpt-4o");
        assert_eq!(
            ProviderKind::AzureOpenAi.model_identifier(Some("my-gpt4o")),
            "azure/my-gpt4o"
        );
        assert_eq!(
            ProviderKind::VertexAi.model_identifier(Some("")),
            "vertex_ai/gemini-1.5-flash-001"
        );
        assert_eq!(
            ProviderKind::Anthropic.model_identifier(Some(" claude-x ")),
            "claude-x"
        );
    }

    #[test]
    fn credentials_set_if_present_ignores_blank() {
        let mut creds = Credentials::new();
        creds.set(OPENAI_API_KEY, "sk-env");
        creds.set_if_present(OPENAI_API_KEY, Some(""));
        creds.set_if_present(OPENAI_API_KEY, None);
        assert_eq!(creds.get(OPENAI_API_KEY), Some("sk-env"));
        creds.set_if_present(OPENAI_API_KEY, Some("sk-form"));
        assert_eq!(creds.get(OPENAI_API_KEY), Some("sk-form"));
    }

    #[test]
    fn credentials_debug_hides_values() {
        let creds: Credentials = [(OPENAI_API_KEY, "sk-secret")].into_iter().collect();
        let dbg = format!("{creds:?}");
        assert!(dbg.contains(OPENAI_API_KEY));
        assert!(!dbg.contains("sk-secret"));
    }

    #[test]
    fn builder_rejects_empty_model() {
        let err = ProcessRequest::builder("in.pdf", "  ").build().unwrap_err();
        assert!(matches!(err, StudioError::InvalidConfig(_)));
    }

    #[test]
    fn builder_drops_blank_prompt() {
        let req = ProcessRequest::builder("in.pdf", "gpt-4o")
            .system_prompt(Some("   "))
            .build()
            .unwrap();
        assert_eq!(req.system_prompt(), None);
        assert_eq!(req.output_dir(), Path::new(DEFAULT_OUTPUT_DIR));
        assert!(req.pages().is_all());
    }
}
