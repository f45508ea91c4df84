//! Log group, stream and event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use awsfacade_core::{FacadeError, FacadeResult};

/// Convert provider epoch milliseconds.
#[must_use]
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

/// A log group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogGroup {
    /// Group name.
    pub name: String,
    /// Group ARN.
    pub arn: Option<String>,
    /// Creation time.
    pub creation_time: Option<DateTime<Utc>>,
    /// Retention setting in days; `None` means never expire.
    pub retention_days: Option<i32>,
    /// Stored bytes as reported by the provider.
    pub stored_bytes: Option<u64>,
}

/// A log stream within a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStream {
    /// Stream name.
    pub name: String,
    /// Creation time.
    pub creation_time: Option<DateTime<Utc>>,
    /// Timestamp of the oldest event.
    pub first_event_time: Option<DateTime<Utc>>,
    /// Timestamp of the newest event.
    pub last_event_time: Option<DateTime<Utc>>,
    /// Last time events were ingested.
    pub last_ingestion_time: Option<DateTime<Utc>>,
}

/// One log event returned by a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    /// Stream the event belongs to.
    pub stream_name: Option<String>,
    /// Event timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    /// Ingestion time.
    pub ingestion_time: Option<DateTime<Utc>>,
    /// Message text.
    pub message: String,
    /// Provider event id.
    pub event_id: Option<String>,
}

/// Inclusive time window, millisecond precision. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    /// Earliest event timestamp to include.
    pub start: Option<DateTime<Utc>>,
    /// Latest event timestamp to include.
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// No bounds.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Bounded on both ends.
    #[must_use]
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Events at or after `start`.
    #[must_use]
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Start as epoch milliseconds.
    #[must_use]
    pub fn start_millis(&self) -> Option<i64> {
        self.start.map(|t| t.timestamp_millis())
    }

    /// End as epoch milliseconds.
    #[must_use]
    pub fn end_millis(&self) -> Option<i64> {
        self.end.map(|t| t.timestamp_millis())
    }

    /// Whether an event at `ms` falls inside the window.
    #[must_use]
    pub fn contains_millis(&self, ms: i64) -> bool {
        self.start_millis().is_none_or(|s| ms >= s) && self.end_millis().is_none_or(|e| ms <= e)
    }

    /// Reject a window whose start lies after its end.
    ///
    /// # Errors
    /// Returns [`FacadeError::InvalidInput`] for an inverted window.
    pub fn validate(&self) -> FacadeResult<()> {
        match (self.start_millis(), self.end_millis()) {
            (Some(s), Some(e)) if s > e => Err(FacadeError::invalid_input(format!(
                "time window start {s} is after end {e}"
            ))),
            _ => Ok(()),
        }
    }
}
