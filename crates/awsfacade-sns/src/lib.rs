//! Pub/sub facade.
//!
//! [`TopicFacade`] manages topics and subscriptions and publishes messages,
//! over [`SdkTopics`] (`aws-sdk-sns`) or [`MemoryTopics`], which records
//! messages instead of delivering them.

mod backend;
mod facade;
mod memory;
mod sdk;
mod types;

pub use backend::TopicBackend;
pub use facade::TopicFacade;
pub use memory::MemoryTopics;
pub use sdk::SdkTopics;
pub use types::{LIST_PAGE_SIZE, Protocol, PublishReceipt, PublishedMessage, Subscription, Topic};
