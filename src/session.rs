//! The conversion action: form inputs in, Markdown and stats out.
//!
//! [`Session::run`] performs one user-initiated conversion:
//!
//! 1. **Validating** — apply form overrides to a copy of the loaded
//!    credentials, parse the page selection (unreadable text falls back to
//!    all pages with a warning), check the provider's required keys, require
//!    an upload. Nothing touches the disk or network until all
//!    of these pass.
//! 2. **Invoking** — stage the upload to a temp file and run the engine as a
//!    spawned [`Invocation`].
//! 3. **Normalizing** — clean and join the pages, extract stats.
//! 4. **Displaying** — hand the [`ConversionReport`] back to the shell.
//!
//! The staged file is removed after normalisation and on every error path.
//! No state survives between runs: each call starts from the form again.

use crate::config::{
    Credentials, PageSelection, ProcessRequest, ProviderArgs, ProviderKind, ANTHROPIC_API_KEY,
    AZURE_API_BASE, AZURE_API_KEY, AZURE_API_VERSION, DEFAULT_AZURE_API_VERSION,
    DEFAULT_OUTPUT_DIR, GEMINI_API_KEY, OPENAI_API_KEY, VERTEXAI_LOCATION, VERTEXAI_PROJECT,
    VERTEX_CREDENTIALS, VERTEX_CREDENTIALS_ARG,
};
use crate::credentials;
use crate::engine::ExtractionEngine;
use crate::error::StudioError;
use crate::invoke::Invocation;
use crate::normalize::{extract_content, format_stats, NormalizedDocument, ProcessingStats};
use crate::progress::{NoopObserver, Phase, SharedObserver};
use crate::providers;
use crate::staging::StagedPdf;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Everything the user entered for one conversion.
///
/// Blank optional inputs mean "keep what was loaded from the environment".
#[derive(Clone)]
pub struct ConversionForm {
    pub provider: ProviderKind,
    /// Model name, or the deployment name for Azure. `None` uses the
    /// provider default.
    pub model_name: Option<String>,
    pub api_key: Option<String>,
    /// Azure only.
    pub api_base: Option<String>,
    /// Azure only. Pre-filled with [`DEFAULT_AZURE_API_VERSION`].
    pub api_version: Option<String>,
    /// Vertex AI only: uploaded service-account JSON.
    pub vertex_credentials: Option<Vec<u8>>,
    /// Vertex AI only.
    pub project: Option<String>,
    /// Vertex AI only.
    pub location: Option<String>,
    /// Uploaded PDF bytes.
    pub upload: Option<Vec<u8>>,
    pub system_prompt: Option<String>,
    /// Raw page-selection text: empty, `"5"`, or `"1,3,5"`.
    pub page_selection: String,
    pub output_dir: PathBuf,
}

impl ConversionForm {
    /// A form with the provider's defaults filled in.
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            model_name: provider.default_model_name().map(str::to_string),
            api_key: None,
            api_base: None,
            api_version: Some(DEFAULT_AZURE_API_VERSION.to_string()),
            vertex_credentials: None,
            project: None,
            location: None,
            upload: None,
            system_prompt: None,
            page_selection: String::new(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }

    /// Engine-facing model identifier for this form.
    pub fn model_identifier(&self) -> String {
        self.provider.model_identifier(self.model_name.as_deref())
    }

    /// Copy this form's non-blank credential inputs into `credentials`.
    ///
    /// Only the selected provider's inputs are applied. Uploaded Vertex
    /// credentials are canonicalised and also returned as provider args.
    ///
    /// # Errors
    /// [`StudioError::CredentialsParse`] for a malformed Vertex upload.
    pub fn apply_credentials(&self, credentials: &mut Credentials) -> Result<ProviderArgs, StudioError> {
        let mut args = ProviderArgs::new();
        let api_key = self.api_key.as_deref();
        match self.provider {
            ProviderKind::OpenAi => credentials.set_if_present(OPENAI_API_KEY, api_key),
            ProviderKind::AzureOpenAi => {
                credentials.set_if_present(AZURE_API_KEY, api_key);
                credentials.set_if_present(AZURE_API_BASE, self.api_base.as_deref());
                credentials.set_if_present(AZURE_API_VERSION, self.api_version.as_deref());
            }
            ProviderKind::Gemini => credentials.set_if_present(GEMINI_API_KEY, api_key),
            ProviderKind::Anthropic => credentials.set_if_present(ANTHROPIC_API_KEY, api_key),
            ProviderKind::VertexAi => {
                if let Some(blob) = credentials::load_bytes(self.vertex_credentials.as_deref())? {
                    credentials.set(VERTEX_CREDENTIALS, blob.clone());
                    args.insert(VERTEX_CREDENTIALS_ARG.to_string(), blob);
                }
                credentials.set_if_present(VERTEXAI_PROJECT, self.project.as_deref());
                credentials.set_if_present(VERTEXAI_LOCATION, self.location.as_deref());
            }
        }
        Ok(args)
    }
}

impl std::fmt::Debug for ConversionForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionForm")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field(
                "vertex_credentials",
                &self.vertex_credentials.as_ref().map(|b| format!("<{} bytes>", b.len())),
            )
            .field("project", &self.project)
            .field("location", &self.location)
            .field("upload", &self.upload.as_ref().map(|b| format!("<{} bytes>", b.len())))
            .field("system_prompt", &self.system_prompt)
            .field("page_selection", &self.page_selection)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

/// What the shell displays after a successful action.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// `None` when a page could not be normalised (already reported).
    pub document: Option<NormalizedDocument>,
    pub stats: ProcessingStats,
    /// Stem of the file the engine wrote into the output directory.
    pub file_name: String,
}

impl ConversionReport {
    /// The document to preview and offer for download. An empty document
    /// (no pages, or only blank ones) counts as nothing to show.
    pub fn displayable(&self) -> Option<&NormalizedDocument> {
        self.document.as_ref().filter(|doc| !doc.is_empty())
    }
}

/// Runs conversion actions against one engine.
pub struct Session {
    engine: Arc<dyn ExtractionEngine>,
    credentials: Credentials,
    observer: SharedObserver,
    staging_dir: Option<PathBuf>,
}

impl Session {
    /// `credentials` is the loaded configuration; forms override a copy of it
    /// per run and never modify it.
    pub fn new(engine: Arc<dyn ExtractionEngine>, credentials: Credentials) -> Self {
        Self {
            engine,
            credentials,
            observer: Arc::new(NoopObserver),
            staging_dir: None,
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Stage uploads in `dir` instead of the system temp directory.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Perform one conversion action.
    ///
    /// # Errors
    /// Validation errors ([`StudioError::is_validation`]) before any I/O;
    /// staging, engine and cancellation errors afterwards. A page that fails
    /// normalisation is not an error: the report carries no document.
    pub async fn run(&self, form: &ConversionForm) -> Result<ConversionReport, StudioError> {
        self.observer.on_phase(Phase::Idle);
        match self.run_inner(form).await {
            Ok(report) => {
                self.observer.on_phase(Phase::Displaying);
                Ok(report)
            }
            Err(e) => {
                self.observer.on_phase(Phase::Error);
                self.observer.on_error(&e);
                Err(e)
            }
        }
    }

    /// Check the form's provider settings without touching the upload.
    ///
    /// Lets a shell fail fast before fetching a remote PDF; [`Session::run`]
    /// repeats the same check.
    ///
    /// # Errors
    /// [`StudioError::Configuration`] or [`StudioError::CredentialsParse`].
    pub fn preflight(&self, form: &ConversionForm) -> Result<(), StudioError> {
        self.validated_credentials(form).map(|_| ())
    }

    /// Apply form overrides to a copy of the loaded credentials and check the
    /// provider's required keys.
    fn validated_credentials(
        &self,
        form: &ConversionForm,
    ) -> Result<(Credentials, ProviderArgs), StudioError> {
        let mut credentials = self.credentials.clone();
        let provider_args = form.apply_credentials(&mut credentials)?;
        providers::check(form.provider, &credentials).into_result()?;
        Ok((credentials, provider_args))
    }

    /// Parse the selection text; unreadable input is reported and the whole
    /// document is processed instead.
    fn page_selection(&self, raw: &str) -> PageSelection {
        PageSelection::parse(raw).unwrap_or_else(|e| {
            error!("{e}");
            self.observer.on_warning(&e);
            PageSelection::All
        })
    }

    async fn run_inner(&self, form: &ConversionForm) -> Result<ConversionReport, StudioError> {
        // ── Validating ───────────────────────────────────────────────────
        self.observer.on_phase(Phase::Validating);
        let (credentials, provider_args) = self.validated_credentials(form)?;
        let pages = self.page_selection(&form.page_selection);
        let upload = form.upload.as_deref().ok_or(StudioError::NoInput)?;
        debug!("Validated {} request, pages {:?}", form.provider, pages);

        // ── Invoking ─────────────────────────────────────────────────────
        let staged = match &self.staging_dir {
            Some(dir) => StagedPdf::stage_in(dir, upload)?,
            None => StagedPdf::stage(upload)?,
        };
        let request = ProcessRequest::builder(staged.path(), form.model_identifier())
            .output_dir(form.output_dir.clone())
            .system_prompt(form.system_prompt.clone())
            .pages(pages)
            .build()?;

        self.observer.on_phase(Phase::Invoking);
        let result = Invocation::spawn(
            Arc::clone(&self.engine),
            request,
            credentials,
            provider_args,
        )
        .outcome()
        .await?;

        // ── Normalizing ──────────────────────────────────────────────────
        self.observer.on_phase(Phase::Normalizing);
        let document = extract_content(&result);
        let stats = format_stats(&result);
        staged.remove()?;

        info!(
            "Conversion finished: {} pages, {} input / {} output tokens",
            stats.pages_processed, stats.input_tokens, stats.output_tokens
        );
        Ok(ConversionReport {
            document,
            stats,
            file_name: result.file_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_form_has_provider_defaults() {
        let form = ConversionForm::new(ProviderKind::Gemini);
        assert_eq!(form.model_identifier(), "gemini/gemini-1.5-pro-002");
        assert_eq!(form.output_dir, PathBuf::from("./output"));
        assert_eq!(form.api_version.as_deref(), Some("2023-05-15"));
    }

    #[test]
    fn azure_form_fills_default_api_version() {
        let mut form = ConversionForm::new(ProviderKind::AzureOpenAi);
        form.model_name = Some("prod-gpt4o".into());
        form.api_key = Some("key".into());
        form.api_base = Some("https://example.openai.azure.com".into());
        let mut creds = Credentials::new();
        form.apply_credentials(&mut creds).unwrap();
        assert_eq!(creds.get(AZURE_API_VERSION), Some("2023-05-15"));
        assert!(providers::check(ProviderKind::AzureOpenAi, &creds).is_satisfied());
        assert_eq!(form.model_identifier(), "azure/prod-gpt4o");
    }

    #[test]
    fn only_selected_provider_inputs_are_applied() {
        let mut form = ConversionForm::new(ProviderKind::Anthropic);
        form.api_key = Some("sk-ant".into());
        let mut creds = Credentials::new();
        form.apply_credentials(&mut creds).unwrap();
        assert_eq!(creds.get(ANTHROPIC_API_KEY), Some("sk-ant"));
        assert_eq!(creds.get(OPENAI_API_KEY), None);
    }

    #[test]
    fn vertex_upload_becomes_credential_and_provider_arg() {
        let mut form = ConversionForm::new(ProviderKind::VertexAi);
        form.vertex_credentials = Some(br#"{"type": "service_account"}"#.to_vec());
        form.project = Some("proj".into());
        let mut creds = Credentials::new();
        let args = form.apply_credentials(&mut creds).unwrap();
        assert_eq!(creds.get(VERTEX_CREDENTIALS), Some(r#"{"type":"service_account"}"#));
        assert_eq!(
            args.get(VERTEX_CREDENTIALS_ARG).map(String::as_str),
            Some(r#"{"type":"service_account"}"#)
        );
        assert_eq!(creds.get(VERTEXAI_PROJECT), Some("proj"));
        assert!(!creds.is_set(VERTEXAI_LOCATION));
    }

    #[test]
    fn malformed_vertex_upload_is_a_parse_error() {
        let mut form = ConversionForm::new(ProviderKind::VertexAi);
        form.vertex_credentials = Some(b"{oops".to_vec());
        let err = form.apply_credentials(&mut Credentials::new()).unwrap_err();
        assert!(matches!(err, StudioError::CredentialsParse(_)));
    }

    #[test]
    fn preflight_checks_credentials_without_an_upload() {
        use crate::engine::VlmEngine;

        let session = Session::new(Arc::new(VlmEngine::default()), Credentials::new());
        let mut form = ConversionForm::new(ProviderKind::OpenAi);
        assert!(form.upload.is_none());

        let err = session.preflight(&form).unwrap_err();
        assert!(matches!(err, StudioError::Configuration { .. }));

        form.api_key = Some("sk-form".into());
        session.preflight(&form).unwrap();
        assert!(!session.credentials().is_set(OPENAI_API_KEY));
    }

    fn report_for(pages: Vec<crate::output::PageContent>) -> ConversionReport {
        let result = crate::output::ExtractionResult {
            file_name: "doc".into(),
            pages,
            completion_time_ms: 0,
            input_tokens: 0,
            output_tokens: 0,
        };
        ConversionReport {
            document: extract_content(&result),
            stats: format_stats(&result),
            file_name: result.file_name,
        }
    }

    #[test]
    fn empty_document_is_not_displayable() {
        use crate::output::PageContent;

        assert!(report_for(vec![]).displayable().is_none());
        assert!(report_for(vec![PageContent::new(1, "content=''")])
            .displayable()
            .is_none());
        assert!(report_for(vec![PageContent::empty(1)]).displayable().is_none());
        assert!(report_for(vec![PageContent::new(1, " \n"), PageContent::new(2, "")])
            .displayable()
            .is_none());
        assert_eq!(
            report_for(vec![PageContent::new(1, "# Hi")])
                .displayable()
                .map(NormalizedDocument::as_str),
            Some("# Hi")
        );
    }

    #[test]
    fn form_debug_redacts_key_and_upload() {
        let mut form = ConversionForm::new(ProviderKind::OpenAi);
        form.api_key = Some("sk-live".into());
        form.upload = Some(vec![0; 42]);
        let dbg = format!("{form:?}");
        assert!(!dbg.contains("sk-live"));
        assert!(dbg.contains("<42 bytes>"));
    }
}
