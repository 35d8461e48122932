//! Error types for Notethread

use thiserror::Error;

pub type Result<T> = std::result::Result<T, NotethreadError>;

#[derive(Error, Debug)]
pub enum NotethreadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Preference store error: {0}")]
    Store(#[from] StoreError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Another operation is already in progress: {0}")]
    Busy(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl NotethreadError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            NotethreadError::InvalidInput(_) => 3,
            NotethreadError::Api(ApiError::CredentialMissing(_)) => 2,
            NotethreadError::Connection(_) => 2,
            NotethreadError::Api(_) => 1,
            NotethreadError::Busy(_) => 1,
            NotethreadError::Config(_) => 1,
            NotethreadError::Store(_) => 1,
            NotethreadError::Vault(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access preference file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt value for key '{key}': {message}")]
    Corrupt { key: String, message: String },
}

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Failed to read vault: {0}")]
    Io(#[from] std::io::Error),

    #[error("Vault directory not found: {0}")]
    NotFound(String),

    #[error("Failed to walk vault: {0}")]
    Walk(#[from] ignore::Error),
}

/// Failures talking to the completion API or the scheduling backend
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Credential missing: {0}")]
    CredentialMissing(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Not connected. Run `nt-connect begin` and `nt-connect verify <PIN>` first")]
    NotConnected,

    #[error("PIN verification failed: {0}")]
    VerificationFailed(String),
}
