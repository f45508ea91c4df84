//! Topic, subscription and publish types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topics and subscriptions per list page.
pub const LIST_PAGE_SIZE: usize = 100;

/// A topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Topic ARN.
    pub arn: String,
}

impl Topic {
    /// Wrap an ARN.
    #[must_use]
    pub fn new(arn: impl Into<String>) -> Self {
        Self { arn: arn.into() }
    }

    /// Topic name: the last `:`-separated ARN segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.arn.rsplit(':').next().unwrap_or(&self.arn)
    }
}

/// Delivery protocol of a subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Text message to a phone number.
    #[default]
    Sms,
    /// Email.
    Email,
    /// Email with a JSON body.
    EmailJson,
    /// HTTP POST.
    Http,
    /// HTTPS POST.
    Https,
    /// Queue.
    Sqs,
    /// Function.
    Lambda,
    /// Mobile push endpoint.
    Application,
    /// Delivery stream.
    Firehose,
    /// Any protocol not listed above.
    Other(String),
}

impl Protocol {
    /// Provider spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
            Self::EmailJson => "email-json",
            Self::Http => "http",
            Self::Https => "https",
            Self::Sqs => "sqs",
            Self::Lambda => "lambda",
            Self::Application => "application",
            Self::Firehose => "firehose",
            Self::Other(other) => other,
        }
    }
}

impl FromStr for Protocol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "sms" => Self::Sms,
            "email" => Self::Email,
            "email-json" => Self::EmailJson,
            "http" => Self::Http,
            "https" => Self::Https,
            "sqs" => Self::Sqs,
            "lambda" => Self::Lambda,
            "application" => Self::Application,
            "firehose" => Self::Firehose,
            other => Self::Other(other.to_owned()),
        })
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A subscription of an endpoint to a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Subscription ARN (`PendingConfirmation` until the endpoint confirms,
    /// for protocols that require it).
    pub arn: String,
    /// Topic ARN.
    pub topic_arn: String,
    /// Delivery protocol.
    pub protocol: Protocol,
    /// Delivery endpoint.
    pub endpoint: String,
    /// Owning account.
    pub owner: Option<String>,
}

/// Receipt of a published message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    /// Provider message id.
    pub message_id: String,
    /// Sequence number (FIFO topics only).
    pub sequence_number: Option<String>,
}

/// A message accepted by the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Message id returned to the publisher.
    pub message_id: String,
    /// Target topic ARN.
    pub topic_arn: String,
    /// Body.
    pub message: String,
    /// Subject line.
    pub subject: Option<String>,
    /// Acceptance time.
    pub published_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_take_topic_name_from_arn() {
        let topic = Topic::new("arn:aws:sns:us-east-1:000000000000:alerts");
        assert_eq!(topic.name(), "alerts");
    }

    #[test]
    fn test_should_parse_protocols() {
        assert_eq!("sms".parse::<Protocol>().unwrap(), Protocol::Sms);
        assert_eq!("email-json".parse::<Protocol>().unwrap(), Protocol::EmailJson);
        assert_eq!(
            "carrier-pigeon".parse::<Protocol>().unwrap(),
            Protocol::Other("carrier-pigeon".into())
        );
        assert_eq!(Protocol::default().as_str(), "sms");
    }
}
