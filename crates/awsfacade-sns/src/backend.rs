//! The seam between [`TopicFacade`](crate::TopicFacade) and a provider.

use async_trait::async_trait;
use awsfacade_core::{FacadeResult, Page};

use crate::types::{Protocol, PublishReceipt, Subscription, Topic};

/// Pub/sub operations, one provider request each. Listings are paged by the
/// provider at [`LIST_PAGE_SIZE`](crate::LIST_PAGE_SIZE).
#[async_trait]
pub trait TopicBackend: Send + Sync + std::fmt::Debug {
    /// Create a topic (or return the existing one) and return its ARN.
    async fn create_topic(&self, name: &str) -> FacadeResult<String>;

    /// Delete a topic and its subscriptions.
    async fn delete_topic(&self, topic_arn: &str) -> FacadeResult<()>;

    /// One page of topics.
    async fn list_topics(&self, page_token: Option<&str>) -> FacadeResult<Page<Topic>>;

    /// One page of all subscriptions.
    async fn list_subscriptions(&self, page_token: Option<&str>) -> FacadeResult<Page<Subscription>>;

    /// One page of the subscriptions of a topic.
    async fn list_subscriptions_by_topic(
        &self,
        topic_arn: &str,
        page_token: Option<&str>,
    ) -> FacadeResult<Page<Subscription>>;

    /// Subscribe an endpoint; returns the subscription ARN.
    async fn subscribe(
        &self,
        topic_arn: &str,
        endpoint: &str,
        protocol: &Protocol,
    ) -> FacadeResult<String>;

    /// Publish a message.
    async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> FacadeResult<PublishReceipt>;

    /// Remove a subscription.
    async fn unsubscribe(&self, subscription_arn: &str) -> FacadeResult<()>;
}
