//! Posting-slot cadence and the scheduling client
//!
//! Slots follow two rules:
//! - without a future cursor, the next slot is the next 08:00 in the local
//!   time zone (never earlier than 12 hours after a past cursor);
//! - with a future cursor, the next slot is that cursor plus 12 hours.
//!
//! The slot is written to the preference store before the backend is called,
//! so an interrupted attempt never hands the same slot out twice.

use chrono::{DateTime, Duration, Local, NaiveTime, SecondsFormat, TimeZone, Utc};
use std::sync::Arc;

use crate::backend::{BackendApi, ScheduleTweetRequest};
use crate::error::{ConnectionError, NotethreadError, Result};
use crate::service::events::{Event, EventBus};
use crate::store::Preferences;
use crate::types::{Draft, ScheduleState};

/// Local hour of the first slot of a day
pub const ANCHOR_HOUR: u32 = 8;

/// Minimum spacing between two slots
pub const CADENCE_HOURS: i64 = 12;

pub fn cadence() -> Duration {
    Duration::hours(CADENCE_HOURS)
}

/// Compute the slot following `last_cursor`, as seen from `now`
pub fn next_slot<Tz: TimeZone>(last_cursor: Option<DateTime<Utc>>, now: DateTime<Tz>) -> DateTime<Utc> {
    let now_utc = now.with_timezone(&Utc);

    let earliest = match last_cursor {
        Some(cursor) if cursor > now_utc => return cursor + cadence(),
        Some(cursor) => std::cmp::max(now_utc, cursor + cadence()),
        None => now_utc,
    };

    next_anchor_at_or_after(&now.timezone(), earliest)
}

/// First `ANCHOR_HOUR:00` local time that is not before `earliest`
fn next_anchor_at_or_after<Tz: TimeZone>(tz: &Tz, earliest: DateTime<Utc>) -> DateTime<Utc> {
    let anchor_time = NaiveTime::from_hms_opt(ANCHOR_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    let mut date = earliest.with_timezone(tz).date_naive();

    // A DST gap can swallow the anchor on one day; the next day always has it.
    loop {
        if let Some(candidate) = tz
            .from_local_datetime(&date.and_time(anchor_time))
            .earliest()
        {
            let candidate = candidate.with_timezone(&Utc);
            if candidate >= earliest {
                return candidate;
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => return earliest,
        }
    }
}

/// Wire format for the backend: ISO-8601 in UTC with millisecond precision
pub fn to_backend_time(slot: DateTime<Utc>) -> String {
    slot.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A draft accepted by the backend
#[derive(Debug, Clone)]
pub struct ScheduledThread {
    pub index: usize,
    pub draft: Draft,
    pub slot: DateTime<Utc>,
    pub acknowledgement: serde_json::Value,
    /// Set when the backend accepted the thread but the draft is still cached
    pub cache_warning: Option<String>,
}

/// Hands drafts to the backend at the next free slot
#[derive(Clone)]
pub struct SchedulingClient {
    backend: Arc<dyn BackendApi>,
    prefs: Preferences,
    events: EventBus,
}

impl SchedulingClient {
    pub fn new(backend: Arc<dyn BackendApi>, prefs: Preferences, events: EventBus) -> Self {
        Self {
            backend,
            prefs,
            events,
        }
    }

    /// Compute the next slot and persist it as the new cursor
    pub fn claim_next_slot<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Result<DateTime<Utc>> {
        let slot = next_slot(self.prefs.schedule_cursor()?, now);
        self.prefs.set_schedule_cursor(slot)?;
        Ok(slot)
    }

    /// Schedule the draft at `index` using the local clock
    pub async fn schedule(&self, index: usize) -> Result<ScheduledThread> {
        self.schedule_at(index, Local::now()).await
    }

    /// Schedule the draft at `index` as if the current time were `now`
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotConnected` before any network call when no
    ///   permanent credentials are stored
    /// - `InvalidInput` for an unknown index or an empty draft
    /// - `ApiError::Upstream` / `MalformedResponse` from the backend; the
    ///   draft stays in the cache for a retry
    /// - `StoreError` when the slot cannot be claimed
    ///
    /// `Failed` is emitted for every error raised after `Scheduling`. Once the
    /// backend has accepted the thread the call succeeds even if the cache
    /// cannot be updated; see [`ScheduledThread::cache_warning`].
    pub async fn schedule_at<Tz: TimeZone>(
        &self,
        index: usize,
        now: DateTime<Tz>,
    ) -> Result<ScheduledThread> {
        let drafts = self.prefs.drafts()?;
        let draft = drafts.get(index).cloned().ok_or_else(|| {
            NotethreadError::InvalidInput(format!(
                "No draft at index {} ({} drafts cached)",
                index,
                drafts.len()
            ))
        })?;

        if !self.prefs.connection_session()?.is_connected() {
            return Err(ConnectionError::NotConnected.into());
        }

        if draft.is_empty() {
            return Err(NotethreadError::InvalidInput(format!(
                "Draft {} has no posts to schedule",
                index
            )));
        }

        self.set_state(index, ScheduleState::Scheduling);

        let (slot, request) = match self.prepare_request(&draft, now) {
            Ok(prepared) => prepared,
            Err(e) => {
                tracing::error!("Could not claim a slot for draft {}: {}", index, e);
                self.set_state(index, ScheduleState::Failed);
                return Err(e);
            }
        };
        tracing::info!(
            "Scheduling draft {} ({} posts) for {}",
            index,
            draft.len(),
            request.scheduled_time
        );

        let acknowledgement = match self.backend.schedule_tweet(&request).await {
            Ok(ack) => ack,
            Err(e) => {
                tracing::error!("Scheduling draft {} failed: {}", index, e);
                self.set_state(index, ScheduleState::Failed);
                return Err(e);
            }
        };

        // The backend owns the thread now; a cache error must not read as a failed schedule
        let cache_warning = match self.remove_draft(index, &draft) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    "Draft {} was scheduled but could not be removed from the cache: {}",
                    index,
                    e
                );
                Some(e.to_string())
            }
        };
        self.set_state(index, ScheduleState::Scheduled);

        Ok(ScheduledThread {
            index,
            draft,
            slot,
            acknowledgement,
            cache_warning,
        })
    }

    /// Claim the slot and build the backend request
    fn prepare_request<Tz: TimeZone>(
        &self,
        draft: &Draft,
        now: DateTime<Tz>,
    ) -> Result<(DateTime<Utc>, ScheduleTweetRequest)> {
        let slot = self.claim_next_slot(now)?;
        let request = ScheduleTweetRequest {
            tweets: draft.fragments.clone(),
            user_identifier: self.prefs.user_identifier()?,
            scheduled_time: to_backend_time(slot),
        };
        Ok((slot, request))
    }

    /// Drop the scheduled draft from the cache, keeping the others in order
    fn remove_draft(&self, index: usize, draft: &Draft) -> Result<()> {
        let mut drafts = self.prefs.drafts()?;
        let position = if drafts.get(index) == Some(draft) {
            Some(index)
        } else {
            drafts.iter().position(|d| d == draft)
        };

        match position {
            Some(position) => {
                drafts.remove(position);
                self.prefs.save_drafts(&drafts)
            }
            None => {
                tracing::warn!("Scheduled draft {} was already gone from the cache", index);
                Ok(())
            }
        }
    }

    fn set_state(&self, index: usize, state: ScheduleState) {
        self.events
            .emit(Event::ScheduleStateChanged { index, state });
    }
}
