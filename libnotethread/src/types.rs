//! Core types for Notethread

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A note read from the vault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub path: PathBuf,
    pub name: String,
    pub modified_at: DateTime<Utc>,
    pub content: String,
}

/// One generated thread: an ordered list of short posts
///
/// Serialized as a bare JSON array so the draft cache reads
/// `[["first", "second"], ["..."]]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Draft {
    pub fragments: Vec<String>,
}

impl Draft {
    pub fn new(fragments: Vec<String>) -> Self {
        Self { fragments }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// All fragments on one line, separated by single spaces
    pub fn joined(&self) -> String {
        self.fragments.join(" ")
    }
}

impl From<Vec<String>> for Draft {
    fn from(fragments: Vec<String>) -> Self {
        Self::new(fragments)
    }
}

/// Temporary and permanent social-network credentials
///
/// The temp pair only lives for one connection attempt. The permanent pair
/// is what makes the session "connected".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSession {
    pub temp_token: Option<String>,
    pub temp_secret: Option<String>,
    pub permanent_token: Option<String>,
    pub permanent_secret: Option<String>,
}

impl ConnectionSession {
    pub fn is_connected(&self) -> bool {
        present(&self.permanent_token) && present(&self.permanent_secret)
    }

    pub fn has_temp(&self) -> bool {
        present(&self.temp_token) && present(&self.temp_secret)
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else if self.has_temp() {
            ConnectionState::AwaitingPin
        } else {
            ConnectionState::Disconnected
        }
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    AwaitingPin,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::AwaitingPin => "awaiting PIN",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// Lifecycle of a single draft while it is handed to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleState {
    Unscheduled,
    Scheduling,
    Scheduled,
    Failed,
}

impl ScheduleState {
    /// Whether a schedule attempt may start from this state
    pub fn can_schedule(self) -> bool {
        matches!(self, ScheduleState::Unscheduled | ScheduleState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_serializes_as_bare_array() {
        let drafts = vec![
            Draft::new(vec!["a".to_string(), "b".to_string()]),
            Draft::default(),
        ];
        let json = serde_json::to_string(&drafts).unwrap();
        assert_eq!(json, r#"[["a","b"],[]]"#);

        let back: Vec<Draft> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, drafts);
    }

    #[test]
    fn test_draft_joined() {
        let draft = Draft::new(vec!["one.".to_string(), "two.".to_string()]);
        assert_eq!(draft.joined(), "one. two.");
    }

    #[test]
    fn test_connection_state_derivation() {
        let mut session = ConnectionSession::default();
        assert_eq!(session.state(), ConnectionState::Disconnected);

        session.temp_token = Some("t".to_string());
        session.temp_secret = Some("s".to_string());
        assert_eq!(session.state(), ConnectionState::AwaitingPin);

        session.permanent_token = Some("pt".to_string());
        assert_eq!(session.state(), ConnectionState::AwaitingPin);

        session.permanent_secret = Some("ps".to_string());
        assert_eq!(session.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_empty_strings_do_not_count_as_credentials() {
        let session = ConnectionSession {
            permanent_token: Some(String::new()),
            permanent_secret: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(!session.is_connected());
    }

    #[test]
    fn test_schedule_state_retry_allowed_after_failure() {
        assert!(ScheduleState::Unscheduled.can_schedule());
        assert!(ScheduleState::Failed.can_schedule());
        assert!(!ScheduleState::Scheduling.can_schedule());
        assert!(!ScheduleState::Scheduled.can_schedule());
    }
}
