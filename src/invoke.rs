//! Running one extraction against an engine.
//!
//! [`invoke`] awaits the engine directly. [`Invocation`] spawns the same call
//! as a Tokio task so a caller can cancel it, poll it, or race it against a
//! timer of its own; this layer imposes no timeout and never retries.

use crate::config::{Credentials, ProcessRequest, ProviderArgs};
use crate::engine::ExtractionEngine;
use crate::error::{EngineError, StudioError};
use crate::output::ExtractionResult;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Run `request` on `engine` and wait for the outcome.
///
/// Engine failures are returned as [`StudioError::Engine`] with the engine's
/// message intact.
pub async fn invoke(
    engine: &dyn ExtractionEngine,
    request: &ProcessRequest,
    credentials: &Credentials,
    provider_args: &ProviderArgs,
) -> Result<ExtractionResult, StudioError> {
    info!("Invoking extraction engine (model {})", request.model());
    let result = engine.extract(request, credentials, provider_args).await?;
    info!(
        "Engine returned {} pages in {}ms",
        result.page_count(),
        result.completion_time_ms
    );
    Ok(result)
}

/// A spawned extraction with an explicit result-or-error outcome.
///
/// Dropping an `Invocation` detaches the task; call [`Invocation::cancel`]
/// to stop it.
#[derive(Debug)]
pub struct Invocation {
    handle: JoinHandle<Result<ExtractionResult, EngineError>>,
}

impl Invocation {
    /// Spawn the extraction on the current Tokio runtime.
    ///
    /// # Panics
    /// When called outside a Tokio runtime.
    pub fn spawn(
        engine: Arc<dyn ExtractionEngine>,
        request: ProcessRequest,
        credentials: Credentials,
        provider_args: ProviderArgs,
    ) -> Self {
        let handle = tokio::spawn(async move {
            engine
                .extract(&request, &credentials, &provider_args)
                .await
        });
        Self { handle }
    }

    /// Request cancellation. The outcome becomes [`StudioError::Cancelled`]
    /// unless the engine already finished.
    pub fn cancel(&self) {
        warn!("Extraction cancelled by caller");
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task and return its outcome.
    pub async fn outcome(self) -> Result<ExtractionResult, StudioError> {
        match self.handle.await {
            Ok(result) => result.map_err(StudioError::from),
            Err(e) if e.is_cancelled() => Err(StudioError::Cancelled),
            Err(e) => Err(StudioError::Internal(format!("Extraction task panicked: {e}"))),
        }
    }
}
