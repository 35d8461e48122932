//! Direct mode: chat-completions API called with the user's own key

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::provider::{CompletionProvider, CompletionRequest};
use super::parse_thread;
use crate::backend::http::body_error;
use crate::config::CompletionConfig;
use crate::error::{ApiError, Result};

pub struct DirectProvider {
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl DirectProvider {
    pub fn new(config: &CompletionConfig, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ApiError::CredentialMissing("completion API key is empty".to_string()).into());
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Upstream(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key: api_key.trim().to_string(),
            client,
        })
    }
}

/// First choice's message text, if any
fn first_choice_content(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ApiError::MalformedResponse("completion returned no content".to_string()).into())
}

#[async_trait]
impl CompletionProvider for DirectProvider {
    async fn request_completion(&self, request: &CompletionRequest) -> Result<Vec<String>> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!("completion HTTP {}: {}", status, text)).into());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| body_error("completion", e))?;

        let content = first_choice_content(parsed)?;
        Ok(parse_thread(&content)?)
    }

    fn name(&self) -> &str {
        "direct"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one connection with a raw HTTP response, then hold it open
    async fn serve_once(response: &'static str, hold: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            tokio::time::sleep(hold).await;
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn provider_at(endpoint: String, timeout_secs: u64) -> DirectProvider {
        let config = CompletionConfig {
            endpoint,
            timeout_secs,
            ..CompletionConfig::default()
        };
        DirectProvider::new(&config, "sk-test").unwrap()
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: "p".to_string(),
            max_tokens: 300,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "gpt-3.5-turbo",
            messages: vec![ChatMessage {
                role: "user",
                content: "prompt",
            }],
            max_tokens: 300,
            temperature: 0.5,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [{ "role": "user", "content": "prompt" }],
                "max_tokens": 300,
                "temperature": 0.5,
            })
        );
    }

    #[test]
    fn test_first_choice_content() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "{\"twitterThread\": []}" } },
                { "message": { "role": "assistant", "content": "ignored" } }
            ]
        }))
        .unwrap();
        assert_eq!(
            first_choice_content(response).unwrap(),
            "{\"twitterThread\": []}"
        );
    }

    #[test]
    fn test_empty_choices_is_malformed() {
        let response: ChatResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(
            first_choice_content(response),
            Err(crate::NotethreadError::Api(ApiError::MalformedResponse(_)))
        ));
    }

    #[test]
    fn test_blank_key_is_credential_missing() {
        let result = DirectProvider::new(&CompletionConfig::default(), " ");
        assert!(matches!(
            result,
            Err(crate::NotethreadError::Api(ApiError::CredentialMissing(_)))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_upstream() {
        let config = CompletionConfig {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            timeout_secs: 2,
            ..CompletionConfig::default()
        };
        let provider = DirectProvider::new(&config, "sk-test").unwrap();
        let result = provider
            .request_completion(&CompletionRequest {
                prompt: "p".to_string(),
                max_tokens: 300,
            })
            .await;
        assert!(matches!(
            result,
            Err(crate::NotethreadError::Api(ApiError::Upstream(_)))
        ));
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream() {
        let endpoint = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 4\r\nconnection: close\r\n\r\nboom",
            Duration::ZERO,
        )
        .await;

        match provider_at(endpoint, 5).request_completion(&request()).await {
            Err(crate::NotethreadError::Api(ApiError::Upstream(message))) => {
                assert!(message.contains("500"), "{}", message);
                assert!(message.contains("boom"), "{}", message);
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_body_timeout_is_upstream() {
        let endpoint = serve_once(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"choices\"",
            Duration::from_secs(5),
        )
        .await;

        let result = provider_at(endpoint, 1).request_completion(&request()).await;
        assert!(matches!(
            result,
            Err(crate::NotethreadError::Api(ApiError::Upstream(_)))
        ));
    }
}
