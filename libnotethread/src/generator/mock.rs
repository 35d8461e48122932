//! Scripted completion provider for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::provider::{CompletionProvider, CompletionRequest};
use crate::error::{ApiError, Result};

/// Replays queued responses in order, then falls back to `default`
pub struct MockProvider {
    responses: Mutex<VecDeque<std::result::Result<Vec<String>, ApiError>>>,
    default: std::result::Result<Vec<String>, ApiError>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    pub fn with_responses(responses: Vec<std::result::Result<Vec<String>, ApiError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            default: Err(ApiError::Upstream("mock provider exhausted".to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same thread
    pub fn always(thread: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default: Ok(thread),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    async fn request_completion(&self, request: &CompletionRequest) -> Result<Vec<String>> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        Ok(next?)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
