//! In-memory topics.

use std::collections::BTreeMap;

use async_trait::async_trait;
use awsfacade_core::{AccountId, AwsRegion, FacadeError, FacadeResult, Page, PageRequest, paginate};
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::backend::TopicBackend;
use crate::types::{LIST_PAGE_SIZE, Protocol, PublishReceipt, PublishedMessage, Subscription, Topic};

const MAX_TOPIC_NAME_LEN: usize = 256;
const MAX_SUBJECT_LEN: usize = 100;

fn invalid(message: impl Into<String>) -> FacadeError {
    FacadeError::from_code(Some("InvalidParameter"), message)
}

fn not_found(what: impl Into<String>) -> FacadeError {
    FacadeError::from_code(Some("NotFound"), what)
}

fn validate_topic_name(name: &str) -> FacadeResult<()> {
    let base = name.strip_suffix(".fifo").unwrap_or(name);
    let valid = !base.is_empty()
        && name.len() <= MAX_TOPIC_NAME_LEN
        && base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(invalid(format!("invalid topic name: {name}")))
    }
}

fn validate_endpoint(protocol: &Protocol, endpoint: &str) -> FacadeResult<()> {
    let valid = match protocol {
        Protocol::Sms => endpoint
            .strip_prefix('+')
            .unwrap_or(endpoint)
            .chars()
            .all(|c| c.is_ascii_digit())
            && endpoint.chars().filter(char::is_ascii_digit).count() >= 7,
        Protocol::Email | Protocol::EmailJson => endpoint.contains('@'),
        Protocol::Http => endpoint.starts_with("http://"),
        Protocol::Https => endpoint.starts_with("https://"),
        Protocol::Sqs | Protocol::Lambda | Protocol::Application | Protocol::Firehose => {
            endpoint.starts_with("arn:")
        }
        Protocol::Other(_) => !endpoint.is_empty(),
    };
    if valid {
        Ok(())
    } else {
        Err(invalid(format!("invalid {protocol} endpoint: {endpoint}")))
    }
}

#[derive(Debug, Default)]
struct State {
    /// Topic ARN to topic.
    topics: BTreeMap<String, Topic>,
    /// Subscription ARN to subscription.
    subscriptions: BTreeMap<String, Subscription>,
    published: Vec<PublishedMessage>,
}

/// In-memory [`TopicBackend`].
///
/// Accepted messages are recorded instead of delivered; see
/// [`MemoryTopics::published`].
#[derive(Debug, Default)]
pub struct MemoryTopics {
    state: RwLock<State>,
    region: AwsRegion,
    account: AccountId,
}

impl MemoryTopics {
    /// No topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages accepted so far, oldest first.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.read().published.clone()
    }

    fn topic_arn(&self, name: &str) -> String {
        format!("arn:aws:sns:{}:{}:{name}", self.region, self.account)
    }

    fn page_of<T>(entries: Vec<T>, page_token: Option<&str>) -> FacadeResult<Page<T>> {
        let request = PageRequest {
            token: page_token.map(ToOwned::to_owned),
            limit: Some(LIST_PAGE_SIZE),
        };
        paginate(entries, &request, LIST_PAGE_SIZE)
    }
}

#[async_trait]
impl TopicBackend for MemoryTopics {
    async fn create_topic(&self, name: &str) -> FacadeResult<String> {
        validate_topic_name(name)?;
        let arn = self.topic_arn(name);
        self.state
            .write()
            .topics
            .entry(arn.clone())
            .or_insert_with(|| Topic::new(arn.clone()));
        Ok(arn)
    }

    async fn delete_topic(&self, topic_arn: &str) -> FacadeResult<()> {
        let mut state = self.state.write();
        // Deleting an absent topic succeeds, as it does against the provider.
        if state.topics.remove(topic_arn).is_some() {
            state.subscriptions.retain(|_, s| s.topic_arn != topic_arn);
            debug!(topic = topic_arn, "memory topic deleted");
        }
        Ok(())
    }

    async fn list_topics(&self, page_token: Option<&str>) -> FacadeResult<Page<Topic>> {
        let topics = self.state.read().topics.values().cloned().collect();
        Self::page_of(topics, page_token)
    }

    async fn list_subscriptions(&self, page_token: Option<&str>) -> FacadeResult<Page<Subscription>> {
        let subs = self.state.read().subscriptions.values().cloned().collect();
        Self::page_of(subs, page_token)
    }

    async fn list_subscriptions_by_topic(
        &self,
        topic_arn: &str,
        page_token: Option<&str>,
    ) -> FacadeResult<Page<Subscription>> {
        let subs = {
            let state = self.state.read();
            if !state.topics.contains_key(topic_arn) {
                return Err(not_found(format!("topic {topic_arn}")));
            }
            state
                .subscriptions
                .values()
                .filter(|s| s.topic_arn == topic_arn)
                .cloned()
                .collect()
        };
        Self::page_of(subs, page_token)
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        endpoint: &str,
        protocol: &Protocol,
    ) -> FacadeResult<String> {
        validate_endpoint(protocol, endpoint)?;
        let mut state = self.state.write();
        if !state.topics.contains_key(topic_arn) {
            return Err(not_found(format!("topic {topic_arn}")));
        }
        // Re-subscribing the same endpoint returns the existing subscription.
        if let Some(existing) = state
            .subscriptions
            .values()
            .find(|s| s.topic_arn == topic_arn && s.endpoint == endpoint && &s.protocol == protocol)
        {
            return Ok(existing.arn.clone());
        }
        let arn = format!("{topic_arn}:{}", uuid::Uuid::new_v4());
        state.subscriptions.insert(
            arn.clone(),
            Subscription {
                arn: arn.clone(),
                topic_arn: topic_arn.to_owned(),
                protocol: protocol.clone(),
                endpoint: endpoint.to_owned(),
                owner: Some(self.account.to_string()),
            },
        );
        Ok(arn)
    }

    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> FacadeResult<PublishReceipt> {
        if message.is_empty() {
            return Err(invalid("message must not be empty"));
        }
        if subject.is_some_and(|s| s.is_empty() || s.chars().count() > MAX_SUBJECT_LEN) {
            return Err(invalid(format!(
                "subject must be 1 to {MAX_SUBJECT_LEN} characters"
            )));
        }
        let mut state = self.state.write();
        if !state.topics.contains_key(topic_arn) {
            return Err(not_found(format!("topic {topic_arn}")));
        }
        let message_id = uuid::Uuid::new_v4().to_string();
        state.published.push(PublishedMessage {
            message_id: message_id.clone(),
            topic_arn: topic_arn.to_owned(),
            message: message.to_owned(),
            subject: subject.map(ToOwned::to_owned),
            published_at: Utc::now(),
        });
        Ok(PublishReceipt {
            message_id,
            sequence_number: None,
        })
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> FacadeResult<()> {
        if self
            .state
            .write()
            .subscriptions
            .remove(subscription_arn)
            .is_none()
        {
            return Err(not_found(format!("subscription {subscription_arn}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_validate_topic_names() {
        assert!(validate_topic_name("alerts-prod_1").is_ok());
        assert!(validate_topic_name("orders.fifo").is_ok());
        assert!(validate_topic_name("").is_err());
        assert!(validate_topic_name("has space").is_err());
        assert!(validate_topic_name(&"x".repeat(257)).is_err());
    }

    #[test]
    fn test_should_validate_endpoints_by_protocol() {
        assert!(validate_endpoint(&Protocol::Sms, "+15555550100").is_ok());
        assert!(validate_endpoint(&Protocol::Sms, "call me").is_err());
        assert!(validate_endpoint(&Protocol::Email, "ops@example.com").is_ok());
        assert!(validate_endpoint(&Protocol::Https, "http://insecure").is_err());
        assert!(validate_endpoint(&Protocol::Sqs, "arn:aws:sqs:us-east-1:000000000000:q").is_ok());
    }
}
