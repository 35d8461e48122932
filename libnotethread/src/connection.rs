//! Connection flow with the social network, brokered by the backend
//!
//! `Disconnected → AwaitingPin → Connected`. The backend holds the app's
//! signing keys: it hands out a login link plus a temporary token pair, and
//! later exchanges the PIN the user copied from that page for permanent
//! credentials. The state is derived from what is in the preference store,
//! so it survives restarts.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libnotethread::backend::mock::MockBackend;
//! use libnotethread::connection::ConnectionFlow;
//! use libnotethread::config::Settings;
//! use libnotethread::service::events::EventBus;
//! use libnotethread::store::{MemoryStore, Preferences};
//!
//! # async fn example() -> libnotethread::Result<()> {
//! let prefs = Preferences::new(Arc::new(MemoryStore::new()));
//! let flow = ConnectionFlow::new(Arc::new(MockBackend::success()), prefs, EventBus::new(16));
//! let settings = Settings { license_key: Some("lic".into()), ..Settings::default() };
//!
//! let link = flow.begin(&settings).await?;
//! println!("Open {} and enter the PIN", link.url);
//! flow.verify_pin("123456", &settings).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::backend::{AuthLoginRequest, BackendApi, VerifyPinRequest};
use crate::config::Settings;
use crate::error::{ApiError, ConnectionError, NotethreadError, Result};
use crate::service::events::{Event, EventBus};
use crate::store::Preferences;
use crate::types::{ConnectionSession, ConnectionState};

/// Login link returned by [`ConnectionFlow::begin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthLink {
    pub url: String,
    pub temp_token: String,
    pub temp_secret: String,
}

#[derive(Clone)]
pub struct ConnectionFlow {
    backend: Arc<dyn BackendApi>,
    prefs: Preferences,
    events: EventBus,
}

/// Credentials forwarded to the backend on both handshake calls
struct Credentials {
    api_key: Option<String>,
    api_secret: Option<String>,
    license_key: Option<String>,
}

impl Credentials {
    fn from_settings(settings: &Settings) -> Result<Self> {
        let license_key = settings.license().map(str::to_string);
        let pair = settings.social_key_pair();

        if license_key.is_none() && pair.is_none() {
            return Err(ConnectionError::MissingCredentials(
                "set settings.license_key or both settings.social_api_key and settings.social_api_secret"
                    .to_string(),
            )
            .into());
        }

        Ok(Self {
            api_key: pair.map(|(key, _)| key.to_string()),
            api_secret: pair.map(|(_, secret)| secret.to_string()),
            license_key,
        })
    }
}

impl ConnectionFlow {
    pub fn new(backend: Arc<dyn BackendApi>, prefs: Preferences, events: EventBus) -> Self {
        Self {
            backend,
            prefs,
            events,
        }
    }

    pub fn state(&self) -> Result<ConnectionState> {
        Ok(self.prefs.connection_session()?.state())
    }

    pub fn session(&self) -> Result<ConnectionSession> {
        self.prefs.connection_session()
    }

    /// Request a login link and store the temporary token pair
    ///
    /// Any earlier temp pair is overwritten and permanent credentials are
    /// dropped, so the flow ends up in `AwaitingPin`.
    pub async fn begin(&self, settings: &Settings) -> Result<AuthLink> {
        let credentials = Credentials::from_settings(settings)?;

        let response = self
            .backend
            .get_auth_login_url(&AuthLoginRequest {
                api_key: credentials.api_key,
                api_secret: credentials.api_secret,
                license_key: credentials.license_key,
            })
            .await?;

        if let Some(error) = response.error {
            return Err(ApiError::Upstream(format!("login link request rejected: {}", error)).into());
        }

        let (url, temp_token, temp_secret) = match (
            response.url,
            response.temp_auth_token,
            response.temp_auth_token_secret,
        ) {
            (Some(url), Some(token), Some(secret))
                if !url.is_empty() && !token.is_empty() && !secret.is_empty() =>
            {
                (url, token, secret)
            }
            _ => {
                return Err(ApiError::MalformedResponse(
                    "login link response is missing url or temporary tokens".to_string(),
                )
                .into())
            }
        };

        self.prefs.clear_connection()?;
        self.prefs.save_temp_credentials(&temp_token, &temp_secret)?;
        tracing::info!("Connection started, waiting for PIN");
        self.events.emit(Event::ConnectionStateChanged {
            state: ConnectionState::AwaitingPin,
        });

        Ok(AuthLink {
            url,
            temp_token,
            temp_secret,
        })
    }

    /// Exchange the PIN for permanent credentials
    ///
    /// A failed attempt changes nothing, so the user can retry with another
    /// PIN against the same temporary pair.
    pub async fn verify_pin(&self, pin: &str, settings: &Settings) -> Result<ConnectionSession> {
        let pin = pin.trim();
        if pin.is_empty() {
            return Err(NotethreadError::InvalidInput("PIN cannot be empty".to_string()));
        }

        let session = self.prefs.connection_session()?;
        let (temp_token, temp_secret) = match (session.temp_token, session.temp_secret) {
            (Some(token), Some(secret)) if !token.is_empty() && !secret.is_empty() => {
                (token, secret)
            }
            _ => {
                return Err(ConnectionError::VerificationFailed(
                    "no connection in progress; run `nt-connect begin` first".to_string(),
                )
                .into())
            }
        };

        let credentials = Credentials::from_settings(settings)?;
        let request = VerifyPinRequest {
            pin: pin.to_string(),
            temp_auth_token: temp_token,
            temp_auth_token_secret: temp_secret,
            user_identifier: self.prefs.user_identifier()?,
            api_key: credentials.api_key,
            api_secret: credentials.api_secret,
            license_key: credentials.license_key,
        };

        let response = self.backend.verify_pin(&request).await.map_err(|e| {
            tracing::warn!("PIN verification request failed: {}", e);
            ConnectionError::VerificationFailed(e.to_string())
        })?;

        let (token, secret) = match (response.access_token, response.access_token_secret) {
            (Some(token), Some(secret)) if !token.is_empty() && !secret.is_empty() => {
                (token, secret)
            }
            _ => {
                tracing::warn!("verify-pin response lacked a token or secret");
                return Err(ConnectionError::VerificationFailed(
                    "backend did not return both an access token and secret; check the PIN and try again"
                        .to_string(),
                )
                .into());
            }
        };

        self.prefs.save_permanent_credentials(&token, &secret)?;
        self.prefs.clear_temp_credentials()?;
        tracing::info!("Connection verified");
        self.events.emit(Event::ConnectionStateChanged {
            state: ConnectionState::Connected,
        });

        self.prefs.connection_session()
    }

    /// Forget all stored connection credentials
    pub fn disconnect(&self) -> Result<()> {
        self.prefs.clear_connection()?;
        self.events.emit(Event::ConnectionStateChanged {
            state: ConnectionState::Disconnected,
        });
        Ok(())
    }
}
