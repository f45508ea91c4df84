//! Read access to log groups, streams and events.

use awsfacade_core::logging::service_span;
use awsfacade_core::{FacadeResult, Page, PageRequest};
use tracing::{Instrument, Span, debug};

use crate::backend::LogBackend;
use crate::types::{LogEvent, LogGroup, LogStream, TimeWindow};

/// Facade over a log aggregation backend.
#[derive(Debug)]
pub struct LogFacade<B> {
    backend: B,
    span: Span,
}

impl<B: LogBackend> LogFacade<B> {
    /// Wrap a backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            span: service_span("logs"),
        }
    }

    /// Replace the span every call is recorded under.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// One page of log groups.
    ///
    /// # Errors
    /// Any provider failure.
    pub async fn list_log_groups(
        &self,
        name_prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogGroup>> {
        async {
            let groups = self.backend.describe_log_groups(name_prefix, page).await?;
            debug!(prefix = name_prefix, count = groups.len(), more = groups.has_more(), "log groups listed");
            Ok(groups)
        }
        .instrument(self.span.clone())
        .await
    }

    /// One page of the streams of a group.
    ///
    /// # Errors
    /// A missing group, or any provider failure.
    pub async fn list_log_streams(
        &self,
        group_name: &str,
        stream_prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogStream>> {
        async {
            let streams = self
                .backend
                .describe_log_streams(group_name, stream_prefix, page)
                .await?;
            debug!(group = group_name, count = streams.len(), more = streams.has_more(), "log streams listed");
            Ok(streams)
        }
        .instrument(self.span.clone())
        .await
    }

    /// One page of events in a group matching `pattern` within `window`.
    ///
    /// The provider may return an empty page with a continuation token
    /// while it is still searching; keep paging until the token is `None`.
    ///
    /// # Errors
    /// An inverted window, a missing group, a pattern the backend cannot
    /// evaluate, or any provider failure.
    pub async fn filter_log_events(
        &self,
        group_name: &str,
        pattern: &str,
        window: &TimeWindow,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogEvent>> {
        window.validate()?;
        async {
            let events = self
                .backend
                .filter_log_events(group_name, pattern.trim(), window, page)
                .await?;
            debug!(group = group_name, pattern, count = events.len(), more = events.has_more(), "log events filtered");
            Ok(events)
        }
        .instrument(self.span.clone())
        .await
    }
}
