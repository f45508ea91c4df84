//! In-memory log groups.
//!
//! Besides serving [`LogBackend`] reads, the store exposes the write side of
//! the service (create group, create stream, put events) so callers can seed
//! it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use awsfacade_core::{AccountId, AwsRegion, FacadeError, FacadeResult, Page, PageRequest, paginate};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use tracing::debug;

use crate::backend::LogBackend;
use crate::pattern::FilterPattern;
use crate::types::{LogEvent, LogGroup, LogStream, TimeWindow, from_millis};

/// Provider default page sizes.
const GROUP_PAGE_LIMIT: usize = 50;
const STREAM_PAGE_LIMIT: usize = 50;
const EVENT_PAGE_LIMIT: usize = 10_000;

#[derive(Debug, Clone)]
struct StoredEvent {
    timestamp: i64,
    ingestion_time: i64,
    message: String,
    event_id: String,
}

#[derive(Debug)]
struct MemoryStream {
    creation_time: i64,
    events: Vec<StoredEvent>,
}

#[derive(Debug)]
struct MemoryGroup {
    arn: String,
    creation_time: i64,
    retention_days: Option<i32>,
    streams: RwLock<BTreeMap<String, MemoryStream>>,
}

fn group_missing(group: &str) -> FacadeError {
    FacadeError::from_code(
        Some("ResourceNotFoundException"),
        format!("log group {group} does not exist"),
    )
}

/// In-memory [`LogBackend`].
#[derive(Debug, Default)]
pub struct MemoryLogs {
    groups: DashMap<String, MemoryGroup>,
    region: AwsRegion,
    account: AccountId,
}

impl MemoryLogs {
    /// No log groups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a log group.
    ///
    /// # Errors
    /// [`FacadeError::AlreadyExists`] when the group exists.
    pub fn create_log_group(&self, name: &str, retention_days: Option<i32>) -> FacadeResult<()> {
        match self.groups.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(FacadeError::from_code(
                Some("ResourceAlreadyExistsException"),
                format!("log group {name} already exists"),
            )),
            Entry::Vacant(slot) => {
                slot.insert(MemoryGroup {
                    arn: format!(
                        "arn:aws:logs:{}:{}:log-group:{name}:*",
                        self.region, self.account
                    ),
                    creation_time: Utc::now().timestamp_millis(),
                    retention_days,
                    streams: RwLock::new(BTreeMap::new()),
                });
                debug!(group = name, "memory log group created");
                Ok(())
            }
        }
    }

    /// Create a stream in an existing group.
    ///
    /// # Errors
    /// [`FacadeError::NotFound`] for a missing group,
    /// [`FacadeError::AlreadyExists`] for an existing stream.
    pub fn create_log_stream(&self, group: &str, stream: &str) -> FacadeResult<()> {
        let g = self.groups.get(group).ok_or_else(|| group_missing(group))?;
        let mut streams = g.streams.write();
        if streams.contains_key(stream) {
            return Err(FacadeError::from_code(
                Some("ResourceAlreadyExistsException"),
                format!("log stream {stream} already exists"),
            ));
        }
        streams.insert(
            stream.to_owned(),
            MemoryStream {
                creation_time: Utc::now().timestamp_millis(),
                events: Vec::new(),
            },
        );
        Ok(())
    }

    /// Append events to a stream, creating the stream if needed.
    ///
    /// # Errors
    /// [`FacadeError::NotFound`] for a missing group.
    pub fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: impl IntoIterator<Item = (DateTime<Utc>, String)>,
    ) -> FacadeResult<usize> {
        let g = self.groups.get(group).ok_or_else(|| group_missing(group))?;
        let now = Utc::now().timestamp_millis();
        let mut streams = g.streams.write();
        let target = streams
            .entry(stream.to_owned())
            .or_insert_with(|| MemoryStream {
                creation_time: now,
                events: Vec::new(),
            });
        let before = target.events.len();
        target
            .events
            .extend(events.into_iter().map(|(ts, message)| StoredEvent {
                timestamp: ts.timestamp_millis(),
                ingestion_time: now,
                message,
                event_id: uuid::Uuid::new_v4().simple().to_string(),
            }));
        target.events.sort_by_key(|e| e.timestamp);
        Ok(target.events.len() - before)
    }
}

#[async_trait]
impl LogBackend for MemoryLogs {
    async fn describe_log_groups(
        &self,
        name_prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogGroup>> {
        let mut groups: Vec<LogGroup> = self
            .groups
            .iter()
            .filter(|g| name_prefix.is_none_or(|p| g.key().starts_with(p)))
            .map(|g| LogGroup {
                name: g.key().clone(),
                arn: Some(g.arn.clone()),
                creation_time: from_millis(g.creation_time),
                retention_days: g.retention_days,
                stored_bytes: Some(
                    g.streams
                        .read()
                        .values()
                        .flat_map(|s| &s.events)
                        .map(|e| e.message.len() as u64)
                        .sum(),
                ),
            })
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        paginate(groups, page, GROUP_PAGE_LIMIT)
    }

    async fn describe_log_streams(
        &self,
        group: &str,
        stream_prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogStream>> {
        let streams: Vec<LogStream> = {
            let g = self.groups.get(group).ok_or_else(|| group_missing(group))?;
            let streams = g.streams.read();
            streams
                .iter()
                .filter(|(name, _)| stream_prefix.is_none_or(|p| name.starts_with(p)))
                .map(|(name, s)| LogStream {
                    name: name.clone(),
                    creation_time: from_millis(s.creation_time),
                    first_event_time: s.events.first().and_then(|e| from_millis(e.timestamp)),
                    last_event_time: s.events.last().and_then(|e| from_millis(e.timestamp)),
                    last_ingestion_time: s
                        .events
                        .iter()
                        .map(|e| e.ingestion_time)
                        .max()
                        .and_then(from_millis),
                })
                .collect()
        };
        paginate(streams, page, STREAM_PAGE_LIMIT)
    }

    async fn filter_log_events(
        &self,
        group: &str,
        pattern: &str,
        window: &TimeWindow,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogEvent>> {
        let pattern = FilterPattern::parse(pattern)?;
        let mut events: Vec<(i64, LogEvent)> = {
            let g = self.groups.get(group).ok_or_else(|| group_missing(group))?;
            let streams = g.streams.read();
            streams
                .iter()
                .flat_map(|(name, s)| s.events.iter().map(move |e| (name, e)))
                .filter(|(_, e)| window.contains_millis(e.timestamp) && pattern.matches(&e.message))
                .map(|(name, e)| {
                    (
                        e.timestamp,
                        LogEvent {
                            stream_name: Some(name.clone()),
                            timestamp: from_millis(e.timestamp),
                            ingestion_time: from_millis(e.ingestion_time),
                            message: e.message.clone(),
                            event_id: Some(e.event_id.clone()),
                        },
                    )
                })
                .collect()
        };
        // Stable: events with equal timestamps stay in stream-name order.
        events.sort_by_key(|(ts, _)| *ts);
        paginate(
            events.into_iter().map(|(_, e)| e).collect(),
            page,
            EVENT_PAGE_LIMIT,
        )
    }
}
