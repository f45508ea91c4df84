//! [`LogBackend`] over `aws-sdk-cloudwatchlogs`.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatchlogs::Client;
use awsfacade_core::{FacadeResult, Page, PageRequest, SdkResultExt};

use crate::backend::LogBackend;
use crate::types::{LogEvent, LogGroup, LogStream, TimeWindow, from_millis};

/// Log backend issuing real CloudWatch Logs requests.
#[derive(Debug, Clone)]
pub struct SdkLogs {
    client: Client,
}

impl SdkLogs {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from a shared SDK configuration.
    #[must_use]
    pub fn from_sdk_config(sdk_config: &SdkConfig) -> Self {
        Self::new(Client::new(sdk_config))
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl LogBackend for SdkLogs {
    async fn describe_log_groups(
        &self,
        name_prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogGroup>> {
        let resp = self
            .client
            .describe_log_groups()
            .set_log_group_name_prefix(name_prefix.map(ToOwned::to_owned))
            .set_next_token(page.token.clone())
            .set_limit(page.limit_i32())
            .send()
            .await
            .map_facade_err("describe log groups")?;

        let groups = resp
            .log_groups()
            .iter()
            .filter_map(|g| {
                Some(LogGroup {
                    name: g.log_group_name()?.to_owned(),
                    arn: g.arn().map(ToOwned::to_owned),
                    creation_time: g.creation_time().and_then(from_millis),
                    retention_days: g.retention_in_days(),
                    stored_bytes: g.stored_bytes().and_then(|b| u64::try_from(b).ok()),
                })
            })
            .collect();
        Ok(Page::new(groups, resp.next_token().map(ToOwned::to_owned)))
    }

    async fn describe_log_streams(
        &self,
        group: &str,
        stream_prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogStream>> {
        let resp = self
            .client
            .describe_log_streams()
            .log_group_name(group)
            .set_log_stream_name_prefix(stream_prefix.map(ToOwned::to_owned))
            .set_next_token(page.token.clone())
            .set_limit(page.limit_i32())
            .send()
            .await
            .map_facade_err(format!("describe log streams of {group}"))?;

        let streams = resp
            .log_streams()
            .iter()
            .filter_map(|s| {
                Some(LogStream {
                    name: s.log_stream_name()?.to_owned(),
                    creation_time: s.creation_time().and_then(from_millis),
                    first_event_time: s.first_event_timestamp().and_then(from_millis),
                    last_event_time: s.last_event_timestamp().and_then(from_millis),
                    last_ingestion_time: s.last_ingestion_time().and_then(from_millis),
                })
            })
            .collect();
        Ok(Page::new(streams, resp.next_token().map(ToOwned::to_owned)))
    }

    async fn filter_log_events(
        &self,
        group: &str,
        pattern: &str,
        window: &TimeWindow,
        page: &PageRequest,
    ) -> FacadeResult<Page<LogEvent>> {
        let resp = self
            .client
            .filter_log_events()
            .log_group_name(group)
            .set_filter_pattern((!pattern.is_empty()).then(|| pattern.to_owned()))
            .set_start_time(window.start_millis())
            .set_end_time(window.end_millis())
            .set_next_token(page.token.clone())
            .set_limit(page.limit_i32())
            .send()
            .await
            .map_facade_err(format!("filter events of {group}"))?;

        let events = resp
            .events()
            .iter()
            .map(|e| LogEvent {
                stream_name: e.log_stream_name().map(ToOwned::to_owned),
                timestamp: e.timestamp().and_then(from_millis),
                ingestion_time: e.ingestion_time().and_then(from_millis),
                message: e.message().unwrap_or_default().to_owned(),
                event_id: e.event_id().map(ToOwned::to_owned),
            })
            .collect();
        Ok(Page::new(events, resp.next_token().map(ToOwned::to_owned)))
    }
}
