//! Scriptable in-process backend
//!
//! Every call is counted and every request recorded so tests can assert both
//! what was sent and that nothing was sent at all.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{
    AuthLoginRequest, AuthLoginResponse, BackendApi, GenerateTweetsRequest,
    GenerateTweetsResponse, ScheduleTweetRequest, VerifyPinRequest, VerifyPinResponse,
};
use crate::error::{ApiError, Result};

/// Canned behaviour for [`MockBackend`]
#[derive(Debug, Clone)]
pub struct MockBackendConfig {
    pub auth_login: std::result::Result<AuthLoginResponse, ApiError>,
    pub verify_pin: std::result::Result<VerifyPinResponse, ApiError>,
    pub schedule: std::result::Result<serde_json::Value, ApiError>,
    pub generate: std::result::Result<GenerateTweetsResponse, ApiError>,
}

impl Default for MockBackendConfig {
    fn default() -> Self {
        Self {
            auth_login: Ok(AuthLoginResponse {
                url: Some("https://api.twitter.com/oauth/authorize?oauth_token=tmp".to_string()),
                temp_auth_token: Some("tmp-token".to_string()),
                temp_auth_token_secret: Some("tmp-secret".to_string()),
                error: None,
            }),
            verify_pin: Ok(VerifyPinResponse {
                access_token: Some("access-token".to_string()),
                access_token_secret: Some("access-secret".to_string()),
            }),
            schedule: Ok(serde_json::json!({ "status": "scheduled" })),
            generate: Ok(GenerateTweetsResponse {
                twitter_thread: Some(vec!["generated".to_string()]),
                error: None,
            }),
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    auth_login: Vec<AuthLoginRequest>,
    verify_pin: Vec<VerifyPinRequest>,
    schedule: Vec<ScheduleTweetRequest>,
    generate: Vec<GenerateTweetsRequest>,
}

#[derive(Clone)]
pub struct MockBackend {
    config: Arc<Mutex<MockBackendConfig>>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockBackend {
    pub fn new(config: MockBackendConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    /// A backend where every call succeeds
    pub fn success() -> Self {
        Self::new(MockBackendConfig::default())
    }

    /// Change behaviour between calls, e.g. fail once and then succeed
    pub fn reconfigure(&self, update: impl FnOnce(&mut MockBackendConfig)) {
        let mut config = self.config.lock().unwrap();
        update(&mut config);
    }

    pub fn total_calls(&self) -> usize {
        let recorded = self.recorded.lock().unwrap();
        recorded.auth_login.len()
            + recorded.verify_pin.len()
            + recorded.schedule.len()
            + recorded.generate.len()
    }

    pub fn auth_login_requests(&self) -> Vec<AuthLoginRequest> {
        self.recorded.lock().unwrap().auth_login.clone()
    }

    pub fn verify_pin_requests(&self) -> Vec<VerifyPinRequest> {
        self.recorded.lock().unwrap().verify_pin.clone()
    }

    pub fn schedule_requests(&self) -> Vec<ScheduleTweetRequest> {
        self.recorded.lock().unwrap().schedule.clone()
    }

    pub fn generate_requests(&self) -> Vec<GenerateTweetsRequest> {
        self.recorded.lock().unwrap().generate.clone()
    }
}

#[async_trait]
impl BackendApi for MockBackend {
    async fn get_auth_login_url(&self, request: &AuthLoginRequest) -> Result<AuthLoginResponse> {
        self.recorded.lock().unwrap().auth_login.push(request.clone());
        let response = self.config.lock().unwrap().auth_login.clone();
        Ok(response?)
    }

    async fn verify_pin(&self, request: &VerifyPinRequest) -> Result<VerifyPinResponse> {
        self.recorded.lock().unwrap().verify_pin.push(request.clone());
        let response = self.config.lock().unwrap().verify_pin.clone();
        Ok(response?)
    }

    async fn schedule_tweet(&self, request: &ScheduleTweetRequest) -> Result<serde_json::Value> {
        self.recorded.lock().unwrap().schedule.push(request.clone());
        let response = self.config.lock().unwrap().schedule.clone();
        Ok(response?)
    }

    async fn generate_tweets(
        &self,
        request: &GenerateTweetsRequest,
    ) -> Result<GenerateTweetsResponse> {
        self.recorded.lock().unwrap().generate.push(request.clone());
        let response = self.config.lock().unwrap().generate.clone();
        Ok(response?)
    }
}
