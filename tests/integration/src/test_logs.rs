//! Log facade integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_cloudwatchlogs::types::InputLogEvent;
    use awsfacade_core::PageRequest;
    use awsfacade_logs::{LogFacade, SdkLogs, TimeWindow};
    use chrono::{Duration, Utc};

    use crate::{sdk_config, unique_name};

    async fn seeded_group(logs: &LogFacade<SdkLogs>, lines: &[&str]) -> String {
        let client = logs.backend().client();
        let group = unique_name("group");
        client.create_log_group().log_group_name(&group).send().await.unwrap();
        client
            .create_log_stream()
            .log_group_name(&group)
            .log_stream_name("app")
            .send()
            .await
            .unwrap();

        let now = Utc::now().timestamp_millis();
        let events = lines
            .iter()
            .zip(0_i64..)
            .map(|(line, i)| {
                InputLogEvent::builder()
                    .timestamp(now + i)
                    .message(*line)
                    .build()
                    .unwrap()
            })
            .collect::<Vec<_>>();
        client
            .put_log_events()
            .log_group_name(&group)
            .log_stream_name("app")
            .set_log_events(Some(events))
            .send()
            .await
            .unwrap();
        group
    }

    async fn cleanup(logs: &LogFacade<SdkLogs>, group: &str) {
        let _ = logs
            .backend()
            .client()
            .delete_log_group()
            .log_group_name(group)
            .send()
            .await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_list_groups_and_streams() {
        let logs = LogFacade::new(SdkLogs::from_sdk_config(&sdk_config()));
        let group = seeded_group(&logs, &["boot"]).await;

        let groups = logs
            .list_log_groups(Some(&group), &PageRequest::first())
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.items[0].name, group);

        let streams = logs
            .list_log_streams(&group, None, &PageRequest::first())
            .await
            .unwrap();
        assert_eq!(streams.items[0].name, "app");

        cleanup(&logs, &group).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_filter_events_in_window() {
        let logs = LogFacade::new(SdkLogs::from_sdk_config(&sdk_config()));
        let group = seeded_group(&logs, &["ERROR disk full", "INFO ok", "ERROR timeout"]).await;

        let window = TimeWindow::since(Utc::now() - Duration::minutes(5));
        let mut page = PageRequest::first();
        let mut found = Vec::new();
        loop {
            let events = logs
                .filter_log_events(&group, "ERROR", &window, &page)
                .await
                .unwrap();
            found.extend(events.items.into_iter().map(|e| e.message));
            match events.next_token {
                Some(token) => page = page.after(token),
                None => break,
            }
        }
        assert_eq!(found, vec!["ERROR disk full", "ERROR timeout"]);

        cleanup(&logs, &group).await;
    }
}
