//! reqwest implementation of [`BackendApi`]

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::{
    AuthLoginRequest, AuthLoginResponse, BackendApi, GenerateTweetsRequest,
    GenerateTweetsResponse, ScheduleTweetRequest, VerifyPinRequest, VerifyPinResponse,
    AUTH_LOGIN_URL_PATH, GENERATE_TWEETS_PATH, SCHEDULE_TWEET_PATH, VERIFY_PIN_PATH,
};
use crate::config::BackendConfig;
use crate::error::{ApiError, Result};

pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::Upstream(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path);
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Upstream(format!("{} request failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("{} returned HTTP {}", path, status);
            return Err(ApiError::Upstream(format!("{} HTTP {}: {}", path, status, text)).into());
        }

        response
            .json::<R>()
            .await
            .map_err(|e| body_error(path, e).into())
    }
}

/// Classify a failure while reading a 2xx body
///
/// A timeout or a dropped connection is an upstream problem; only a body
/// that arrived and failed to decode is malformed.
pub(crate) fn body_error(context: &str, e: reqwest::Error) -> ApiError {
    let undecodable = std::error::Error::source(&e).is_some_and(|s| s.is::<serde_json::Error>());
    if e.is_timeout() || !undecodable {
        ApiError::Upstream(format!("{} response interrupted: {}", context, e))
    } else {
        ApiError::MalformedResponse(format!("{} response: {}", context, e))
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    async fn get_auth_login_url(&self, request: &AuthLoginRequest) -> Result<AuthLoginResponse> {
        self.post_json(AUTH_LOGIN_URL_PATH, request).await
    }

    async fn verify_pin(&self, request: &VerifyPinRequest) -> Result<VerifyPinResponse> {
        self.post_json(VERIFY_PIN_PATH, request).await
    }

    async fn schedule_tweet(&self, request: &ScheduleTweetRequest) -> Result<serde_json::Value> {
        self.post_json(SCHEDULE_TWEET_PATH, request).await
    }

    async fn generate_tweets(
        &self,
        request: &GenerateTweetsRequest,
    ) -> Result<GenerateTweetsResponse> {
        self.post_json(GENERATE_TWEETS_PATH, request).await
    }
}
