//! Local preference store
//!
//! A flat, durable key-value store owned by the running process. Components
//! never touch a global: they receive a [`Preferences`] handle wrapping any
//! [`PreferenceStore`] implementation, so tests can swap in [`MemoryStore`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use libnotethread::store::{FileStore, Preferences};
//!
//! # fn example() -> libnotethread::Result<()> {
//! let store = FileStore::open("/tmp/notethread/preferences.json".into())?;
//! let prefs = Preferences::new(Arc::new(store));
//!
//! let user = prefs.user_identifier()?;
//! println!("user {} has {} drafts", user, prefs.drafts()?.len());
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::error::{Result, StoreError};
use crate::types::{ConnectionSession, Draft};

/// Key names used in the preference store
pub mod keys {
    pub const LAST_SYNC_TIME: &str = "lastSyncTime";
    pub const LAST_GENERATED_TWEETS: &str = "lastGeneratedTweets";
    pub const LAST_DAYS_GENERATED_SETTING: &str = "lastDaysGeneratedSettings";
    pub const USER_IDENTIFIER: &str = "userIdentifier";
    pub const TWITTER_TEMP_AUTH_TOKEN: &str = "twitterTempAuthToken";
    pub const TWITTER_TEMP_AUTH_SECRET: &str = "twitterTempAuthSecret";
    pub const TWITTER_AUTH_TOKEN: &str = "twitterAuthToken";
    pub const TWITTER_AUTH_SECRET: &str = "twitterAuthSecret";
    pub const LAST_TWEET_TIME: &str = "lastTweetTime";
}

/// Backend for the preference store
///
/// Implementations must be durable for the lifetime they advertise: a value
/// returned by `get` after `set` must be the value that was set.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Deleting a missing key is not an error
    fn delete(&self, key: &str) -> Result<()>;

    fn backend_name(&self) -> &str;
}

/// JSON-file backed store
///
/// The whole map is kept in memory and rewritten on every mutation through a
/// temporary file and a rename, so a crash never leaves a half-written file.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(StoreError::Io)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                    key: path.display().to_string(),
                    message: e.to_string(),
                })?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(
            "Opened preference store at {} ({} keys)",
            path.display(),
            entries.len()
        );

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::Io)?;
        }

        let content = serde_json::to_string_pretty(entries).map_err(|e| StoreError::Corrupt {
            key: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(StoreError::Io)?;
        std::fs::rename(&tmp, &self.path).map_err(StoreError::Io)?;
        Ok(())
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| poisoned(key))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned(key))?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned(key))?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "file"
    }
}

fn poisoned(key: &str) -> StoreError {
    StoreError::Corrupt {
        key: key.to_string(),
        message: "store lock poisoned".to_string(),
    }
}

/// In-memory store for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set`/`delete` calls made so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of the raw key-value pairs
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|_| poisoned(key))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.write().map_err(|_| poisoned(key))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.write().map_err(|_| poisoned(key))?;
        entries.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

/// Typed access to the values notethread keeps in the preference store
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn PreferenceStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub fn backend_name(&self) -> &str {
        self.store.backend_name()
    }

    /// Cached drafts from the last sync, in generation order
    pub fn drafts(&self) -> Result<Vec<Draft>> {
        match self.store.get(keys::LAST_GENERATED_TWEETS)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                StoreError::Corrupt {
                    key: keys::LAST_GENERATED_TWEETS.to_string(),
                    message: e.to_string(),
                }
                .into()
            }),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the whole draft cache
    pub fn save_drafts(&self, drafts: &[Draft]) -> Result<()> {
        let raw = serde_json::to_string(drafts).map_err(|e| StoreError::Corrupt {
            key: keys::LAST_GENERATED_TWEETS.to_string(),
            message: e.to_string(),
        })?;
        self.store.set(keys::LAST_GENERATED_TWEETS, &raw)
    }

    pub fn clear_drafts(&self) -> Result<()> {
        self.store.delete(keys::LAST_GENERATED_TWEETS)
    }

    /// Stable identifier for this user, generated on first use
    pub fn user_identifier(&self) -> Result<String> {
        if let Some(existing) = self.store.get(keys::USER_IDENTIFIER)? {
            if !existing.is_empty() {
                return Ok(existing);
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("Generated new user identifier {}", id);
        self.store.set(keys::USER_IDENTIFIER, &id)?;
        Ok(id)
    }

    pub fn connection_session(&self) -> Result<ConnectionSession> {
        Ok(ConnectionSession {
            temp_token: self.store.get(keys::TWITTER_TEMP_AUTH_TOKEN)?,
            temp_secret: self.store.get(keys::TWITTER_TEMP_AUTH_SECRET)?,
            permanent_token: self.store.get(keys::TWITTER_AUTH_TOKEN)?,
            permanent_secret: self.store.get(keys::TWITTER_AUTH_SECRET)?,
        })
    }

    /// Overwrite the temp pair for a new connection attempt
    pub fn save_temp_credentials(&self, token: &str, secret: &str) -> Result<()> {
        self.store.set(keys::TWITTER_TEMP_AUTH_TOKEN, token)?;
        self.store.set(keys::TWITTER_TEMP_AUTH_SECRET, secret)
    }

    pub fn clear_temp_credentials(&self) -> Result<()> {
        self.store.delete(keys::TWITTER_TEMP_AUTH_TOKEN)?;
        self.store.delete(keys::TWITTER_TEMP_AUTH_SECRET)
    }

    pub fn save_permanent_credentials(&self, token: &str, secret: &str) -> Result<()> {
        self.store.set(keys::TWITTER_AUTH_TOKEN, token)?;
        self.store.set(keys::TWITTER_AUTH_SECRET, secret)
    }

    /// Forget every connection credential, temp and permanent
    pub fn clear_connection(&self) -> Result<()> {
        for key in [
            keys::TWITTER_TEMP_AUTH_TOKEN,
            keys::TWITTER_TEMP_AUTH_SECRET,
            keys::TWITTER_AUTH_TOKEN,
            keys::TWITTER_AUTH_SECRET,
        ] {
            self.store.delete(key)?;
        }
        Ok(())
    }

    /// Last slot handed to the scheduling backend
    pub fn schedule_cursor(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_timestamp(keys::LAST_TWEET_TIME)
    }

    pub fn set_schedule_cursor(&self, slot: DateTime<Utc>) -> Result<()> {
        self.store.set(keys::LAST_TWEET_TIME, &slot.to_rfc3339())
    }

    pub fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        self.get_timestamp(keys::LAST_SYNC_TIME)
    }

    pub fn set_last_sync(&self, at: DateTime<Utc>) -> Result<()> {
        self.store.set(keys::LAST_SYNC_TIME, &at.to_rfc3339())
    }

    /// Stored sync window, if the user has ever set one
    pub fn sync_window_days(&self) -> Result<Option<u32>> {
        match self.store.get(keys::LAST_DAYS_GENERATED_SETTING)? {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|days| *days >= 1)
                .map(Some)
                .ok_or_else(|| {
                    StoreError::Corrupt {
                        key: keys::LAST_DAYS_GENERATED_SETTING.to_string(),
                        message: format!("expected a whole number of days >= 1, got '{}'", raw),
                    }
                    .into()
                }),
            None => Ok(None),
        }
    }

    pub fn set_sync_window_days(&self, days: u32) -> Result<()> {
        if days == 0 {
            return Err(crate::NotethreadError::InvalidInput(
                "Sync window must be at least 1 day".to_string(),
            ));
        }
        self.store
            .set(keys::LAST_DAYS_GENERATED_SETTING, &days.to_string())
    }

    fn get_timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        match self.store.get(key)? {
            Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| {
                    StoreError::Corrupt {
                        key: key.to_string(),
                        message: e.to_string(),
                    }
                    .into()
                }),
            None => Ok(None),
        }
    }
}
