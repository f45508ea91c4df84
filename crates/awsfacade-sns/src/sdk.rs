//! [`TopicBackend`] over `aws-sdk-sns`.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sns::Client;
use awsfacade_core::{FacadeError, FacadeResult, Page, SdkResultExt};

use crate::backend::TopicBackend;
use crate::types::{Protocol, PublishReceipt, Subscription, Topic};

/// Topic backend issuing real SNS requests.
#[derive(Debug, Clone)]
pub struct SdkTopics {
    client: Client,
}

impl SdkTopics {
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

fn to_subscription(s: &aws_sdk_sns::types::Subscription) -> Option<Subscription> {
    Some(Subscription {
        arn: s.subscription_arn()?.to_owned(),
        topic_arn: s.topic_arn().unwrap_or_default().to_owned(),
        protocol: s
            .protocol()
            .unwrap_or_default()
            .parse()
            .unwrap_or_default(),
        endpoint: s.endpoint().unwrap_or_default().to_owned(),
        owner: s.owner().map(ToOwned::to_owned),
    })
}

#[async_trait]
impl TopicBackend for SdkTopics {
    async fn create_topic(&self, name: &str) -> FacadeResult<String> {
        let resp = self
            .client
            .create_topic()
            .name(name)
            .send()
            .await
            .map_facade_err(format!("create topic {name}"))?;
        resp.topic_arn().map(ToOwned::to_owned).ok_or_else(|| FacadeError::Unknown {
            code: None,
            message: format!("create topic {name}: no ARN in response"),
        })
    }

    async fn delete_topic(&self, topic_arn: &str) -> FacadeResult<()> {
        self.client
            .delete_topic()
            .topic_arn(topic_arn)
            .send()
            .await
            .map_facade_err(format!("delete topic {topic_arn}"))?;
        Ok(())
    }

    async fn list_topics(&self, page_token: Option<&str>) -> FacadeResult<Page<Topic>> {
        let resp = self
            .client
            .list_topics()
            .set_next_token(page_token.map(ToOwned::to_owned))
            .send()
            .await
            .map_facade_err("list topics")?;
        let topics = resp
            .topics()
            .iter()
            .filter_map(|t| t.topic_arn().map(Topic::new))
            .collect();
        Ok(Page::new(topics, resp.next_token().map(ToOwned::to_owned)))
    }

    async fn list_subscriptions(&self, page_token: Option<&str>) -> FacadeResult<Page<Subscription>> {
        let resp = self
            .client
            .list_subscriptions()
            .set_next_token(page_token.map(ToOwned::to_owned))
            .send()
            .await
            .map_facade_err("list subscriptions")?;
        let subs = resp.subscriptions().iter().filter_map(to_subscription).collect();
        Ok(Page::new(subs, resp.next_token().map(ToOwned::to_owned)))
    }

    async fn list_subscriptions_by_topic(
        &self,
        topic_arn: &str,
        page_token: Option<&str>,
    ) -> FacadeResult<Page<Subscription>> {
        let resp = self
            .client
            .list_subscriptions_by_topic()
            .topic_arn(topic_arn)
            .set_next_token(page_token.map(ToOwned::to_owned))
            .send()
            .await
            .map_facade_err(format!("list subscriptions of {topic_arn}"))?;
        let subs = resp.subscriptions().iter().filter_map(to_subscription).collect();
        Ok(Page::new(subs, resp.next_token().map(ToOwned::to_owned)))
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        endpoint: &str,
        protocol: &Protocol,
    ) -> FacadeResult<String> {
        let resp = self
            .client
            .subscribe()
            .topic_arn(topic_arn)
            .protocol(protocol.as_str())
            .endpoint(endpoint)
            .return_subscription_arn(true)
            .send()
            .await
            .map_facade_err(format!("subscribe {protocol} endpoint to {topic_arn}"))?;
        resp.subscription_arn()
            .map(ToOwned::to_owned)
            .ok_or_else(|| FacadeError::Unknown {
                code: None,
                message: format!("subscribe to {topic_arn}: no subscription ARN in response"),
            })
    }

    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> FacadeResult<PublishReceipt> {
        let resp = self
            .client
            .publish()
            .topic_arn(topic_arn)
            .message(message)
            .set_subject(subject.map(ToOwned::to_owned))
            .send()
            .await
            .map_facade_err(format!("publish to {topic_arn}"))?;
        Ok(PublishReceipt {
            message_id: resp.message_id().unwrap_or_default().to_owned(),
            sequence_number: resp.sequence_number().map(ToOwned::to_owned),
        })
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> FacadeResult<()> {
        self.client
            .unsubscribe()
            .subscription_arn(subscription_arn)
            .send()
            .await
            .map_facade_err(format!("unsubscribe {subscription_arn}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_convert_sdk_subscription() {
        let sdk = aws_sdk_sns::types::Subscription::builder()
            .subscription_arn("arn:aws:sns:us-east-1:000000000000:alerts:abc")
            .topic_arn("arn:aws:sns:us-east-1:000000000000:alerts")
            .protocol("email")
            .endpoint("ops@example.com")
            .build();
        let sub = to_subscription(&sdk).unwrap();
        assert_eq!(sub.protocol, Protocol::Email);
        assert_eq!(sub.endpoint, "ops@example.com");
        assert!(sub.owner.is_none());
    }
}
