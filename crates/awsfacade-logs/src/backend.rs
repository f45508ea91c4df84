//! The seam between [`LogFacade`](crate::LogFacade) and a provider.

use async_trait::async_trait;
use awsfacade_core::{FacadeResult, Page, PageRequest};

use crate::types::{LogEvent, LogGroup, LogStream, TimeWindow};

/// Log aggregation read operations, one provider request each.
#[async_trait]
pub trait LogBackend: Send + Sync + std::fmt::Debug {
    /// One page of log groups, optionally by name prefix.
    async fn describe_log_groups(
        &self,
        name_prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogGroup>>;

    /// One page of the streams of `group`, optionally by name prefix.
    async fn describe_log_streams(
        &self,
        group: &str,
        stream_prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogStream>>;

    /// One page of events in `group` matching `pattern` within `window`.
    ///
    /// An empty `pattern` matches every event.
    async fn filter_log_events(
        &self,
        group: &str,
        pattern: &str,
        window: &TimeWindow,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogEvent>>;
}
