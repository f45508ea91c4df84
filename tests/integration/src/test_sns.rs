//! Topic facade integration tests.

#[cfg(test)]
mod tests {
    use awsfacade_sns::{Protocol, SdkTopics, TopicFacade};

    use crate::{sdk_config, sns_client, unique_name};

    fn topics() -> TopicFacade<SdkTopics> {
        TopicFacade::new(SdkTopics::from_sdk_config(&sdk_config()))
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_list_and_delete_topic() {
        let sns = topics();
        let name = unique_name("topic");
        let topic = sns.create_topic(&name).await.unwrap();
        assert_eq!(topic.name(), name);

        let mut token: Option<String> = None;
        let mut seen = false;
        loop {
            let page = sns.list_topics(token.as_deref()).await.unwrap();
            seen |= page.items.iter().any(|t| t.arn == topic.arn);
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        assert!(seen);

        let attrs = sns_client()
            .get_topic_attributes()
            .topic_arn(&topic.arn)
            .send()
            .await
            .unwrap();
        assert_eq!(
            attrs.attributes().and_then(|a| a.get("TopicArn")),
            Some(&topic.arn)
        );

        sns.delete_topic(&topic.arn).await.unwrap();
        assert!(
            sns_client()
                .get_topic_attributes()
                .topic_arn(&topic.arn)
                .send()
                .await
                .is_err()
        );
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_subscribe_publish_and_unsubscribe() {
        let sns = topics();
        let topic = sns.create_topic(&unique_name("pub")).await.unwrap();

        let sub = sns
            .subscribe(&topic.arn, "+15555550100", Protocol::default())
            .await
            .unwrap();
        assert_eq!(sub.protocol, Protocol::Sms);

        let listed = sns
            .list_subscriptions_by_topic(&topic.arn, None)
            .await
            .unwrap();
        assert!(listed.items.iter().any(|s| s.arn == sub.arn));

        let receipt = sns
            .publish(&topic.arn, "deploy finished", Some("ci"))
            .await
            .unwrap();
        assert!(!receipt.message_id.is_empty());

        let sub_attrs = sns_client()
            .get_subscription_attributes()
            .subscription_arn(&sub.arn)
            .send()
            .await
            .unwrap();
        assert_eq!(
            sub_attrs.attributes().and_then(|a| a.get("Protocol")).map(String::as_str),
            Some("sms")
        );

        sns.unsubscribe(&sub.arn).await.unwrap();
        sns.delete_topic(&topic.arn).await.unwrap();
    }
}
