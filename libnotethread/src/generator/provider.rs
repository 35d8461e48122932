//! Completion provider abstraction
//!
//! Two ways to get a thread out of a prompt: call the completion API directly
//! with the user's own key, or hand the prompt to the backend which runs the
//! completion for license holders. The mode is picked once per sync from the
//! settings.

use async_trait::async_trait;
use std::sync::Arc;

use super::openai::DirectProvider;
use super::proxy::ProxyProvider;
use crate::backend::BackendApi;
use crate::config::{CompletionConfig, Settings};
use crate::error::{ApiError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
}

/// Something that turns a prompt into a raw (unsanitized) thread
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run the completion and parse the thread out of it
    ///
    /// # Errors
    ///
    /// - `ApiError::CredentialMissing` if the provider has no usable key
    /// - `ApiError::Upstream` on transport failures, timeouts or non-2xx
    /// - `ApiError::MalformedResponse` if the reply is not the expected JSON
    async fn request_completion(&self, request: &CompletionRequest) -> Result<Vec<String>>;

    /// Short identifier for logs ("direct", "proxy", ...)
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    /// User's own completion key, request goes straight to the API
    Direct,
    /// License key, the backend performs the completion
    Proxied,
}

impl ProviderMode {
    /// A license key wins over a personal completion key
    pub fn for_settings(settings: &Settings) -> Result<Self> {
        if settings.license().is_some() {
            Ok(ProviderMode::Proxied)
        } else if settings.completion_key().is_some() {
            Ok(ProviderMode::Direct)
        } else {
            Err(ApiError::CredentialMissing(
                "set settings.completion_api_key or settings.license_key".to_string(),
            )
            .into())
        }
    }
}

impl std::fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderMode::Direct => f.write_str("direct"),
            ProviderMode::Proxied => f.write_str("proxied"),
        }
    }
}

/// Build the provider the settings call for
pub fn select_provider(
    settings: &Settings,
    completion: &CompletionConfig,
    backend: Arc<dyn BackendApi>,
) -> Result<Arc<dyn CompletionProvider>> {
    let mode = ProviderMode::for_settings(settings)?;
    tracing::debug!("Using {} completion mode", mode);

    match mode {
        ProviderMode::Proxied => {
            let license = settings
                .license()
                .ok_or_else(|| ApiError::CredentialMissing("license key".to_string()))?;
            Ok(Arc::new(ProxyProvider::new(backend, license)))
        }
        ProviderMode::Direct => {
            let key = settings
                .completion_key()
                .ok_or_else(|| ApiError::CredentialMissing("completion API key".to_string()))?;
            Ok(Arc::new(DirectProvider::new(completion, key)?))
        }
    }
}
