//! Service layer for notethread
//!
//! `NotethreadService` wires the pieces together so every front end drives
//! the same sync, scheduling and connection logic:
//!
//! - sync: collect notes modified in the window, generate drafts, persist them
//! - [`SchedulingClient`]: hand a draft to the backend at the next slot
//! - [`ConnectionFlow`]: obtain posting credentials via the backend
//! - [`EventBus`]: progress events for whatever UI is attached
//!
//! Only one sync or schedule runs at a time per service instance; a second
//! request while one is in flight fails with `NotethreadError::Busy`.
//!
//! # Example
//!
//! ```no_run
//! use libnotethread::service::{NotethreadService, SyncOutcome};
//!
//! # async fn example() -> libnotethread::Result<()> {
//! let service = NotethreadService::new()?;
//!
//! match service.sync(None).await? {
//!     SyncOutcome::NothingModified { window_days } => {
//!         println!("No notes modified in the last {} day(s)", window_days);
//!     }
//!     SyncOutcome::Generated { report, .. } => {
//!         println!("{} drafts ready", report.drafts.len());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod events;

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use self::events::{Event, EventBus, EventReceiver};
use crate::backend::http::HttpBackend;
use crate::backend::BackendApi;
use crate::config::Config;
use crate::connection::ConnectionFlow;
use crate::generator::{
    select_provider, CompletionProvider, DraftGenerator, GenerationReport, ProviderMode,
};
use crate::scheduling::{ScheduledThread, SchedulingClient};
use crate::store::{FileStore, Preferences};
use crate::types::Draft;
use crate::vault::{collect_modified_notes, FsVault, VaultReader};
use crate::{NotethreadError, Result};

/// What a sync did
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// No note changed inside the window; the draft cache was left alone
    NothingModified { window_days: u32 },
    /// Drafts were generated and replaced the cache
    Generated {
        window_days: u32,
        report: GenerationReport,
    },
}

pub struct NotethreadService {
    config: Arc<Config>,
    prefs: Preferences,
    vault: Arc<dyn VaultReader>,
    backend: Arc<dyn BackendApi>,
    provider: Option<Arc<dyn CompletionProvider>>,
    connection: ConnectionFlow,
    scheduling: SchedulingClient,
    event_bus: EventBus,
    in_flight: Mutex<()>,
}

impl NotethreadService {
    /// Build a service from the default configuration file
    pub fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config)
    }

    /// Build a service backed by the file store, the vault directory and the
    /// HTTP backend named in `config`
    pub fn from_config(config: Config) -> Result<Self> {
        let prefs = Preferences::new(Arc::new(FileStore::open(config.store_path())?));
        let vault: Arc<dyn VaultReader> = Arc::new(FsVault::new(config.vault_path()));
        let backend: Arc<dyn BackendApi> = Arc::new(HttpBackend::new(&config.backend)?);
        Ok(Self::from_parts(config, prefs, vault, backend))
    }

    /// Assemble a service from explicit components
    pub fn from_parts(
        config: Config,
        prefs: Preferences,
        vault: Arc<dyn VaultReader>,
        backend: Arc<dyn BackendApi>,
    ) -> Self {
        let event_bus = EventBus::new(100);
        let connection = ConnectionFlow::new(Arc::clone(&backend), prefs.clone(), event_bus.clone());
        let scheduling =
            SchedulingClient::new(Arc::clone(&backend), prefs.clone(), event_bus.clone());

        Self {
            config: Arc::new(config),
            prefs,
            vault,
            backend,
            provider: None,
            connection,
            scheduling,
            event_bus,
            in_flight: Mutex::new(()),
        }
    }

    /// Use `provider` for completions instead of the one the settings select
    ///
    /// Credentials are still checked against the settings.
    pub fn with_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn connection(&self) -> &ConnectionFlow {
        &self.connection
    }

    pub fn scheduling(&self) -> &SchedulingClient {
        &self.scheduling
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    fn begin_operation(&self, operation: &str) -> Result<MutexGuard<'_, ()>> {
        self.in_flight.try_lock().map_err(|_| {
            NotethreadError::Busy(format!(
                "cannot {} while another sync or schedule is running",
                operation
            ))
        })
    }

    /// Sync window in effect: the stored value, else the configured default
    pub fn sync_window_days(&self) -> Result<u32> {
        Ok(self
            .prefs
            .sync_window_days()?
            .unwrap_or(self.config.sync.default_window_days))
    }

    /// Generate drafts from every note modified within the sync window
    ///
    /// `window_override` is stored as the new window before it is used.
    ///
    /// # Errors
    ///
    /// - `ApiError::CredentialMissing` before anything else if the settings
    ///   hold neither a completion key nor a license key
    /// - `NotethreadError::Busy` if another operation is running
    /// - `InvalidInput` for a zero-day window
    pub async fn sync(&self, window_override: Option<u32>) -> Result<SyncOutcome> {
        let _guard = self.begin_operation("sync")?;
        let settings = &self.config.settings;

        let mode = ProviderMode::for_settings(settings)?;
        let provider = match &self.provider {
            Some(provider) => Arc::clone(provider),
            None => select_provider(settings, &self.config.completion, Arc::clone(&self.backend))?,
        };

        let window_days = match window_override {
            Some(days) => {
                self.prefs.set_sync_window_days(days)?;
                days
            }
            None => self.sync_window_days()?,
        };

        let now = Utc::now();
        let notes = collect_modified_notes(self.vault.as_ref(), window_days, now).await?;
        if notes.is_empty() {
            tracing::info!("No notes modified in the last {} day(s)", window_days);
            return Ok(SyncOutcome::NothingModified { window_days });
        }

        tracing::info!(
            "Generating drafts for {} note(s) in {} mode",
            notes.len(),
            mode
        );
        self.event_bus.emit(Event::SyncStarted {
            window_days,
            notes: notes.len(),
        });

        let generator = DraftGenerator::new(
            provider,
            settings.prompt_template.clone(),
            self.event_bus.clone(),
        );
        let report = generator.generate_drafts(&notes).await;

        self.prefs.save_drafts(&report.drafts)?;
        self.prefs.set_last_sync(now)?;

        self.event_bus.emit(Event::SyncCompleted {
            drafts: report.drafts.len(),
            failures: report.failures.len(),
        });

        Ok(SyncOutcome::Generated {
            window_days,
            report,
        })
    }

    /// Schedule the cached draft at `index`
    pub async fn schedule(&self, index: usize) -> Result<ScheduledThread> {
        let _guard = self.begin_operation("schedule")?;
        self.scheduling.schedule(index).await
    }

    pub fn drafts(&self) -> Result<Vec<Draft>> {
        self.prefs.drafts()
    }

    /// Delete every cached draft
    pub fn clear_drafts(&self) -> Result<()> {
        self.prefs.clear_drafts()?;
        tracing::info!("Draft cache cleared");
        Ok(())
    }
}
