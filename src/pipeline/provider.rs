//! VLM provider construction from explicit [`Credentials`].
//!
//! Every backend is built with its `edgequake-llm` constructor and the values
//! the conversion form validated. Nothing is read from or written to the
//! process environment, so concurrent conversions with different keys never
//! see each other's credentials.
//!
//! ## Credential mapping
//!
//! | Provider     | Constructor                                   | Credentials used                                    |
//! |--------------|-----------------------------------------------|-----------------------------------------------------|
//! | OpenAI       | `OpenAIProvider::new`                         | `OPENAI_API_KEY`                                    |
//! | Azure OpenAI | `AzureOpenAIProvider::new` + `with_api_version` | `AZURE_API_BASE`, `AZURE_API_KEY`, `AZURE_API_VERSION`; model = deployment |
//! | Gemini       | `GeminiProvider::new`                         | `GEMINI_API_KEY`                                    |
//! | Anthropic    | `AnthropicProvider::new`                      | `ANTHROPIC_API_KEY`                                 |
//! | Vertex AI    | `GeminiProvider::vertex_ai`                   | `VERTEXAI_PROJECT`, `VERTEXAI_LOCATION`, access token |
//!
//! ## Vertex AI access tokens
//!
//! Vertex AI takes an OAuth access token rather than the service-account
//! document itself. A `GOOGLE_ACCESS_TOKEN` credential is used as-is;
//! otherwise `gcloud auth print-access-token` is run with
//! `CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE` pointing at a temporary copy of
//! the service-account JSON. The override is set on the child process only.

use crate::config::{
    Credentials, ProviderArgs, ProviderKind, ANTHROPIC_API_KEY, AZURE_API_BASE, AZURE_API_KEY,
    AZURE_API_VERSION, GEMINI_API_KEY, GOOGLE_ACCESS_TOKEN, OPENAI_API_KEY, VERTEXAI_LOCATION,
    VERTEXAI_PROJECT, VERTEX_CREDENTIALS, VERTEX_CREDENTIALS_ARG,
};
use crate::error::EngineError;
use edgequake_llm::{
    AnthropicProvider, AzureOpenAIProvider, GeminiProvider, LLMProvider, OpenAIProvider,
};
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

/// gcloud property override naming a credential file for one invocation.
const GCLOUD_CREDENTIAL_OVERRIDE_ENV: &str = "CLOUDSDK_AUTH_CREDENTIAL_FILE_OVERRIDE";

/// Build the provider for `kind` serving `model` (the bare model name, or
/// the deployment name for Azure).
///
/// # Errors
/// A required credential is empty or absent, Azure has no deployment name,
/// or no Vertex AI access token could be obtained.
pub async fn build_provider(
    kind: ProviderKind,
    model: &str,
    credentials: &Credentials,
    provider_args: &ProviderArgs,
) -> Result<Arc<dyn LLMProvider>, EngineError> {
    let provider: Arc<dyn LLMProvider> = match kind {
        ProviderKind::OpenAi => Arc::new(
            OpenAIProvider::new(required(kind, credentials, OPENAI_API_KEY)?).with_model(model),
        ),
        ProviderKind::AzureOpenAi => {
            if model.trim().is_empty() {
                return Err(EngineError::new(
                    "Azure OpenAI needs a deployment name as the model",
                ));
            }
            Arc::new(
                AzureOpenAIProvider::new(
                    required(kind, credentials, AZURE_API_BASE)?,
                    required(kind, credentials, AZURE_API_KEY)?,
                    model,
                )
                .with_api_version(required(kind, credentials, AZURE_API_VERSION)?),
            )
        }
        ProviderKind::Gemini => Arc::new(
            GeminiProvider::new(required(kind, credentials, GEMINI_API_KEY)?).with_model(model),
        ),
        ProviderKind::Anthropic => Arc::new(
            AnthropicProvider::new(required(kind, credentials, ANTHROPIC_API_KEY)?)
                .with_model(model),
        ),
        ProviderKind::VertexAi => {
            let project = required(kind, credentials, VERTEXAI_PROJECT)?;
            let location = required(kind, credentials, VERTEXAI_LOCATION)?;
            let token = vertex_access_token(credentials, provider_args).await?;
            Arc::new(GeminiProvider::vertex_ai(project, location, token).with_model(model))
        }
    };

    debug!("Built {} provider for model {}", provider.name(), provider.model());
    Ok(provider)
}

fn required<'a>(
    kind: ProviderKind,
    credentials: &'a Credentials,
    key: &str,
) -> Result<&'a str, EngineError> {
    credentials
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| EngineError::new(format!("{kind} credential {key} is not set")))
}

async fn vertex_access_token(
    credentials: &Credentials,
    provider_args: &ProviderArgs,
) -> Result<String, EngineError> {
    if let Some(token) = credentials.get(GOOGLE_ACCESS_TOKEN).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    let blob = provider_args
        .get(VERTEX_CREDENTIALS_ARG)
        .map(String::as_str)
        .or_else(|| credentials.get(VERTEX_CREDENTIALS))
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| EngineError::new("Vertex AI credentials are not set"))?;
    mint_access_token(blob).await
}

/// Ask `gcloud` for a token on behalf of the service account in `blob`.
async fn mint_access_token(blob: &str) -> Result<String, EngineError> {
    let mut file = tempfile::Builder::new()
        .prefix("pdf2md-vertex-")
        .suffix(".json")
        .tempfile()
        .map_err(|e| EngineError::with_source("Failed to stage Vertex AI credentials", e))?;
    file.write_all(blob.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| EngineError::with_source("Failed to stage Vertex AI credentials", e))?;

    debug!("Minting Vertex AI access token with gcloud");
    let output = tokio::process::Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .env(GCLOUD_CREDENTIAL_OVERRIDE_ENV, file.path())
        .output()
        .await
        .map_err(|e| {
            EngineError::with_source(
                format!(
                    "Failed to run gcloud: install the Google Cloud CLI or set {GOOGLE_ACCESS_TOKEN}"
                ),
                e,
            )
        })?;

    if !output.status.success() {
        return Err(EngineError::new(format!(
            "gcloud could not mint a Vertex AI access token: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(EngineError::new("gcloud returned an empty access token"));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_AZURE_API_VERSION;

    fn full_credentials() -> Credentials {
        [
            (OPENAI_API_KEY, "sk-openai"),
            (AZURE_API_KEY, "azure-key"),
            (AZURE_API_BASE, "https://example.openai.azure.com/"),
            (AZURE_API_VERSION, DEFAULT_AZURE_API_VERSION),
            (GEMINI_API_KEY, "gemini-key"),
            (ANTHROPIC_API_KEY, "sk-ant"),
            (VERTEX_CREDENTIALS, r#"{"type":"service_account"}"#),
            (VERTEXAI_PROJECT, "demo-project"),
            (VERTEXAI_LOCATION, "us-central1"),
            (GOOGLE_ACCESS_TOKEN, "ya29.token"),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn builds_every_provider_from_credentials_alone() {
        let creds = full_credentials();
        let cases = [
            (ProviderKind::OpenAi, "gpt-4o", "openai"),
            (ProviderKind::AzureOpenAi, "prod-gpt4o", "azure-openai"),
            (ProviderKind::Gemini, "gemini-1.5-pro-002", "gemini"),
            (ProviderKind::Anthropic, "claude-3-5-sonnet-20240620", "anthropic"),
            (ProviderKind::VertexAi, "gemini-1.5-flash-001", "vertex-ai"),
        ];
        for (kind, model, name) in cases {
            let provider = build_provider(kind, model, &creds, &ProviderArgs::new())
                .await
                .unwrap_or_else(|e| panic!("{kind}: {e}"));
            assert_eq!(provider.name(), name, "{kind}");
            assert_eq!(provider.model(), model, "{kind}");
        }
    }

    #[tokio::test]
    async fn missing_key_names_the_credential() {
        let mut creds = full_credentials();
        creds.set(AZURE_API_BASE, "");
        let err = build_provider(ProviderKind::AzureOpenAi, "d", &creds, &ProviderArgs::new())
            .await
            .err()
            .expect("empty base must fail");
        assert!(err.message.contains(AZURE_API_BASE), "{}", err.message);
    }

    #[tokio::test]
    async fn azure_requires_a_deployment_name() {
        let err = build_provider(
            ProviderKind::AzureOpenAi,
            "",
            &full_credentials(),
            &ProviderArgs::new(),
        )
        .await
        .err()
        .expect("blank deployment must fail");
        assert!(err.message.contains("deployment"));
    }

    #[tokio::test]
    async fn explicit_access_token_skips_gcloud() {
        let mut creds = full_credentials();
        creds.set(VERTEX_CREDENTIALS, "");
        let token = vertex_access_token(&creds, &ProviderArgs::new()).await.unwrap();
        assert_eq!(token, "ya29.token");
    }

    #[tokio::test]
    async fn vertex_without_token_or_document_fails() {
        let creds: Credentials = [(VERTEXAI_PROJECT, "p"), (VERTEXAI_LOCATION, "l")]
            .into_iter()
            .collect();
        let err = vertex_access_token(&creds, &ProviderArgs::new())
            .await
            .unwrap_err();
        assert_eq!(err.message, "Vertex AI credentials are not set");
    }
}
