//! Topic and subscription management and publishing.

use awsfacade_core::logging::service_span;
use awsfacade_core::{FacadeResult, Page};
use tracing::{Instrument, Span, debug, info};

use crate::backend::TopicBackend;
use crate::types::{Protocol, PublishReceipt, Subscription, Topic};

/// Facade over a pub/sub backend.
///
/// Listings return one provider page per call; pass the returned
/// `next_token` back in to continue.
#[derive(Debug)]
pub struct TopicFacade<B> {
    backend: B,
    span: Span,
}

impl<B: TopicBackend> TopicFacade<B> {
    /// Wrap a backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            span: service_span("sns"),
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

    /// Create a topic; creating an existing name returns the same topic.
    ///
    /// # Errors
    /// Invalid names, or any provider failure.
    pub async fn create_topic(&self, name: &str) -> FacadeResult<Topic> {
        async {
            let arn = self.backend.create_topic(name).await?;
            info!(topic = %arn, "topic created");
            Ok(Topic::new(arn))
        }
        .instrument(self.span.clone())
        .await
    }

    /// Delete a topic together with its subscriptions.
    ///
    /// # Errors
    /// Any provider failure.
    pub async fn delete_topic(&self, topic_arn: &str) -> FacadeResult<()> {
        async {
            self.backend.delete_topic(topic_arn).await?;
            info!(topic = topic_arn, "topic deleted");
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// One page of topics.
    ///
    /// # Errors
    /// Any provider failure.
    pub async fn list_topics(&self, page_token: Option<&str>) -> FacadeResult<Page<Topic>> {
        async {
            let page = self.backend.list_topics(page_token).await?;
            debug!(count = page.len(), more = page.has_more(), "topics listed");
            Ok(page)
        }
        .instrument(self.span.clone())
        .await
    }

    /// One page of all subscriptions.
    ///
    /// # Errors
    /// Any provider failure.
    pub async fn list_subscriptions(&self, page_token: Option<&str>) -> FacadeResult<Page<Subscription>> {
        async {
            let page = self.backend.list_subscriptions(page_token).await?;
            debug!(count = page.len(), more = page.has_more(), "subscriptions listed");
            Ok(page)
        }
        .instrument(self.span.clone())
        .await
    }

    /// One page of the subscriptions of one topic.
    ///
    /// # Errors
    /// A missing topic, or any provider failure.
    pub async fn list_subscriptions_by_topic(
        &self,
        topic_arn: &str,
        page_token: Option<&str>,
    ) -> FacadeResult<Page<Subscription>> {
        self.backend
            .list_subscriptions_by_topic(topic_arn, page_token)
            .instrument(self.span.clone())
            .await
    }

    /// Subscribe `endpoint` to a topic. [`Protocol::default`] is SMS.
    ///
    /// # Errors
    /// A missing topic, an endpoint invalid for the protocol, or any
    /// provider failure.
    pub async fn subscribe(
        &self,
        topic_arn: &str,
        endpoint: &str,
        protocol: Protocol,
    ) -> FacadeResult<Subscription> {
        async {
            let arn = self.backend.subscribe(topic_arn, endpoint, &protocol).await?;
            info!(topic = topic_arn, %protocol, subscription = %arn, "endpoint subscribed");
            Ok(Subscription {
                arn,
                topic_arn: topic_arn.to_owned(),
                protocol,
                endpoint: endpoint.to_owned(),
                owner: None,
            })
        }
        .instrument(self.span.clone())
        .await
    }

    /// Publish a message to every subscriber of a topic.
    ///
    /// # Errors
    /// A missing topic, an empty message, or any provider failure.
    pub async fn publish(
        &self,
        topic_arn: &str,
        message: &str,
        subject: Option<&str>,
    ) -> FacadeResult<PublishReceipt> {
        async {
            let receipt = self.backend.publish(topic_arn, message, subject).await?;
            info!(topic = topic_arn, message_id = %receipt.message_id, "message published");
            Ok(receipt)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Remove a subscription.
    ///
    /// # Errors
    /// A missing subscription, or any provider failure.
    pub async fn unsubscribe(&self, subscription_arn: &str) -> FacadeResult<()> {
        async {
            self.backend.unsubscribe(subscription_arn).await?;
            info!(subscription = subscription_arn, "unsubscribed");
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }
}
