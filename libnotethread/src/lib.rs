//! Notethread - turn recently edited notes into social threads
//!
//! This library collects the markdown notes modified within a sync window,
//! asks a completion API for a thread per note, caches the drafts locally and
//! schedules them through the backend service on a fixed cadence.

pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod generator;
pub mod logging;
pub mod scheduling;
pub mod service;
pub mod store;
pub mod types;
pub mod vault;

// Re-export commonly used types
pub use config::{Config, Settings};
pub use error::{NotethreadError, Result};
pub use service::{NotethreadService, SyncOutcome};
pub use store::{FileStore, MemoryStore, PreferenceStore, Preferences};
pub use types::{ConnectionSession, ConnectionState, Draft, Note, ScheduleState};
