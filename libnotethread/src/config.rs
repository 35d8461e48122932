//! Configuration management for Notethread

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

pub const DEFAULT_BACKEND_URL: &str = "https://tutils-9ad81be56d35.herokuapp.com/";
pub const DEFAULT_COMPLETION_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

pub const DEFAULT_THREAD_PROMPT: &str = "A tweet is basically a single message. Based on the content below, create a single twitter thread (chains of tweets) comprising of multiple tweets that explain a concept fully using at least 5 tweets with examples, analogies, and allusions. The thread starts with something attention grabbing and ends with a conclusion that wraps up the idea.
The twitter thread is directed to a reader and should use an appropriate tone and writing style to connect with the reader and address them.
The first tweet begins the thread and should be made up of two sentences. The first sentence or phrase introduces the concept in a way that hooks the reader in by triggering anger, curiosity, fear, shock, or awe. This hook should be a complete sentence and directed to a person scrolling by. Then the second sentence should be an introduction to the tweets that are to come with another attention grabbing sentence.
Then, the rest of the tweets in the thread should lead into the other and make wanting to click to read the next one. They should build on each other in order to convey the information. You can use analogies or examples to further explain better.
Each of the tweets should use complete sentences yet in a conversational but public facing tone.
The content may be personal but the tweet should be for an audience of other people viewing it and should not include too many personal details but instead the inner learnings.
Do not use emojis, instead use your words to convey the emotions. Do not use any hashtags as they are not effective.
Each tweet should be a maximum of 3 sentences.
";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// User-editable settings: API keys, the license key and the prompt template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub completion_api_key: Option<String>,
    #[serde(default)]
    pub social_api_key: Option<String>,
    #[serde(default)]
    pub social_api_secret: Option<String>,
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
    #[serde(default)]
    pub license_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            completion_api_key: None,
            social_api_key: None,
            social_api_secret: None,
            prompt_template: default_prompt_template(),
            license_key: None,
        }
    }
}

impl Settings {
    /// License key, if one is set and non-blank
    pub fn license(&self) -> Option<&str> {
        non_blank(self.license_key.as_deref())
    }

    pub fn completion_key(&self) -> Option<&str> {
        non_blank(self.completion_api_key.as_deref())
    }

    /// Personal social-network key pair, only when both halves are present
    pub fn social_key_pair(&self) -> Option<(&str, &str)> {
        match (
            non_blank(self.social_api_key.as_deref()),
            non_blank(self.social_api_secret.as_deref()),
        ) {
            (Some(key), Some(secret)) => Some((key, secret)),
            _ => None,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default = "default_vault_path")]
    pub path: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: default_vault_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_completion_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Window used when no value has been stored in the preference store
    #[serde(default = "default_window_days")]
    pub default_window_days: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_window_days: default_window_days(),
        }
    }
}

fn default_prompt_template() -> String {
    DEFAULT_THREAD_PROMPT.to_string()
}

fn default_vault_path() -> String {
    "~/Notes".to_string()
}

fn default_store_path() -> String {
    "~/.local/share/notethread/preferences.json".to_string()
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_completion_endpoint() -> String {
    DEFAULT_COMPLETION_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_window_days() -> u32 {
    1
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file yields the default configuration.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default_config());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Write configuration to a specific path, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::ReadError)?;
        }
        std::fs::write(path, content).map_err(ConfigError::ReadError)?;
        Ok(())
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Vault directory with `~` expanded
    pub fn vault_path(&self) -> PathBuf {
        expand_path(&self.vault.path)
    }

    /// Preference file with `~` expanded
    pub fn store_path(&self) -> PathBuf {
        expand_path(&self.store.path)
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("NOTETHREAD_CONFIG") {
        return Ok(expand_path(&path));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("notethread").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
[settings]
completion_api_key = "sk-test"

[vault]
path = "/tmp/vault"
"#,
        )
        .unwrap();

        assert_eq!(config.settings.completion_key(), Some("sk-test"));
        assert_eq!(config.settings.prompt_template, DEFAULT_THREAD_PROMPT);
        assert_eq!(config.vault.path, "/tmp/vault");
        assert_eq!(config.backend.url, DEFAULT_BACKEND_URL);
        assert_eq!(config.completion.model, "gpt-3.5-turbo");
        assert_eq!(config.sync.default_window_days, 1);
    }

    #[test]
    fn test_blank_keys_are_treated_as_absent() {
        let settings = Settings {
            completion_api_key: Some("   ".to_string()),
            license_key: Some(String::new()),
            social_api_key: Some("key".to_string()),
            social_api_secret: None,
            ..Settings::default()
        };

        assert_eq!(settings.completion_key(), None);
        assert_eq!(settings.license(), None);
        assert_eq!(settings.social_key_pair(), None);
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default_config();
        config.settings.license_key = Some("lic-123".to_string());
        config.settings.prompt_template = "Summarise:".to_string();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.settings, config.settings);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[settings\nbroken").unwrap();

        let result = Config::load_from_path(&path);
        assert!(matches!(
            result,
            Err(crate::NotethreadError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_from_env() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.toml");
        std::env::set_var("NOTETHREAD_CONFIG", &path);

        let resolved = resolve_config_path().unwrap();
        std::env::remove_var("NOTETHREAD_CONFIG");

        assert_eq!(resolved, path);
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var("NOTETHREAD_CONFIG", temp_dir.path().join("absent.toml"));

        let config = Config::load();
        std::env::remove_var("NOTETHREAD_CONFIG");

        let config = config.unwrap();
        assert_eq!(config.vault.path, "~/Notes");
    }
}
