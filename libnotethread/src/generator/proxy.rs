//! Proxied mode: the backend runs the completion for license holders

use async_trait::async_trait;
use std::sync::Arc;

use super::provider::{CompletionProvider, CompletionRequest};
use crate::backend::{BackendApi, GenerateTweetsRequest};
use crate::error::{ApiError, Result};

pub struct ProxyProvider {
    backend: Arc<dyn BackendApi>,
    license_key: String,
}

impl ProxyProvider {
    pub fn new(backend: Arc<dyn BackendApi>, license_key: &str) -> Self {
        Self {
            backend,
            license_key: license_key.to_string(),
        }
    }
}

#[async_trait]
impl CompletionProvider for ProxyProvider {
    async fn request_completion(&self, request: &CompletionRequest) -> Result<Vec<String>> {
        let response = self
            .backend
            .generate_tweets(&GenerateTweetsRequest {
                prompt: request.prompt.clone(),
                license_key: self.license_key.clone(),
            })
            .await?;

        if let Some(error) = response.error {
            return Err(ApiError::Upstream(format!("backend generation failed: {}", error)).into());
        }

        response.twitter_thread.ok_or_else(|| {
            ApiError::MalformedResponse("backend response has no twitterThread".to_string()).into()
        })
    }

    fn name(&self) -> &str {
        "proxy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::GenerateTweetsResponse;

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "the prompt".to_string(),
            max_tokens: 300,
        }
    }

    #[tokio::test]
    async fn test_sends_prompt_and_license() {
        let backend = MockBackend::success();
        let provider = ProxyProvider::new(Arc::new(backend.clone()), "lic-1");

        let thread = provider.request_completion(&request()).await.unwrap();
        assert_eq!(thread, vec!["generated".to_string()]);

        let sent = backend.generate_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].prompt, "the prompt");
        assert_eq!(sent[0].license_key, "lic-1");
    }

    #[tokio::test]
    async fn test_error_body_is_upstream() {
        let backend = MockBackend::success();
        backend.reconfigure(|c| {
            c.generate = Ok(GenerateTweetsResponse {
                twitter_thread: None,
                error: Some("invalid license".to_string()),
            })
        });
        let provider = ProxyProvider::new(Arc::new(backend), "lic");

        let err = provider.request_completion(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            crate::NotethreadError::Api(ApiError::Upstream(ref m)) if m.contains("invalid license")
        ));
    }

    #[tokio::test]
    async fn test_missing_thread_is_malformed() {
        let backend = MockBackend::success();
        backend.reconfigure(|c| c.generate = Ok(GenerateTweetsResponse::default()));
        let provider = ProxyProvider::new(Arc::new(backend), "lic");

        assert!(matches!(
            provider.request_completion(&request()).await,
            Err(crate::NotethreadError::Api(ApiError::MalformedResponse(_)))
        ));
    }
}
