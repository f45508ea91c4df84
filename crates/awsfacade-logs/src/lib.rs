//! Log aggregation facade.
//!
//! [`LogFacade`] lists log groups and streams and filters events, over
//! [`SdkLogs`] (`aws-sdk-cloudwatchlogs`) or the seedable [`MemoryLogs`].

mod backend;
mod facade;
mod memory;
pub mod pattern;
mod sdk;
mod types;

pub use backend::LogBackend;
pub use facade::LogFacade;
pub use memory::MemoryLogs;
pub use pattern::FilterPattern;
pub use sdk::SdkLogs;
pub use types::{LogEvent, LogGroup, LogStream, TimeWindow, from_millis};
