//! Client for the notethread backend service
//!
//! The backend proxies everything that needs the social network's request
//! signing: the login-link handshake, PIN verification and scheduling. It
//! also offers server-side generation for license holders.
//!
//! [`BackendApi`] is the seam; [`http::HttpBackend`] talks to the real
//! service and [`mock::MockBackend`] records calls for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod http;

// Mock backend is available for all builds to support binary integration tests
pub mod mock;

pub const AUTH_LOGIN_URL_PATH: &str = "get-auth-login-url";
pub const VERIFY_PIN_PATH: &str = "verify-pin";
pub const SCHEDULE_TWEET_PATH: &str = "schedule-tweet";
pub const GENERATE_TWEETS_PATH: &str = "generate-tweets";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthLoginRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthLoginResponse {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temp_auth_token: Option<String>,
    #[serde(default)]
    pub temp_auth_token_secret: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPinRequest {
    pub pin: String,
    pub temp_auth_token: String,
    pub temp_auth_token_secret: String,
    pub user_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
}

/// Permanent credentials as returned by `verify-pin`; either may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPinResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub access_token_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTweetRequest {
    pub tweets: Vec<String>,
    pub user_identifier: String,
    /// ISO-8601, UTC
    pub scheduled_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTweetsRequest {
    pub prompt: String,
    pub license_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTweetsResponse {
    #[serde(default)]
    pub twitter_thread: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Operations offered by the backend service
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// `POST /get-auth-login-url`
    async fn get_auth_login_url(&self, request: &AuthLoginRequest) -> Result<AuthLoginResponse>;

    /// `POST /verify-pin`
    async fn verify_pin(&self, request: &VerifyPinRequest) -> Result<VerifyPinResponse>;

    /// `POST /schedule-tweet`; the acknowledgement payload is opaque
    async fn schedule_tweet(&self, request: &ScheduleTweetRequest) -> Result<serde_json::Value>;

    /// `POST /generate-tweets`
    async fn generate_tweets(
        &self,
        request: &GenerateTweetsRequest,
    ) -> Result<GenerateTweetsResponse>;
}
