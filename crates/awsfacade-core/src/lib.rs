//! Core types, configuration, and error handling for awsfacade.
//!
//! This crate provides the building blocks shared by the service facades:
//! the [`FacadeError`] taxonomy and SDK error mapping, [`FacadeConfig`],
//! pagination types, and tracing setup.

mod config;
mod error;
pub mod logging;
pub mod sdk;
mod types;

pub use config::{DEFAULT_BUCKET_REGION, DEFAULT_MAX_WAIT_SECS, FacadeConfig};
pub use error::{ErrorKind, FacadeError, FacadeResult};
pub use sdk::{SdkResultExt, from_sdk_error};
pub use types::{AccountId, AwsRegion, Page, PageRequest, paginate};
