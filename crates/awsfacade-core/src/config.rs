//! Facade configuration.
//!
//! Credentials are never configured here: they are resolved by `aws-config`
//! from the usual provider chain. This only carries the knobs the facades
//! themselves need, plus optional region / endpoint overrides (for pointing
//! the SDK at a local emulator).

use std::time::Duration;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::types::AwsRegion;

/// Region used by `create_bucket` when the caller does not pass one.
pub const DEFAULT_BUCKET_REGION: &str = "us-east-2";

/// Default upper bound on waiter polling (table active/absent, bucket absent).
pub const DEFAULT_MAX_WAIT_SECS: u64 = 300;

/// Configuration shared by all facades.
///
/// # Examples
///
/// ```
/// use awsfacade_core::FacadeConfig;
///
/// let config = FacadeConfig::builder().endpoint_url(Some("http://localhost:4566".to_owned())).build();
/// assert_eq!(config.region.as_str(), "us-east-1");
/// assert_eq!(config.bucket_region, "us-east-2");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct FacadeConfig {
    /// Region for SDK clients.
    #[builder(default)]
    pub region: AwsRegion,

    /// Region used for bucket creation when none is given.
    #[builder(default = String::from(DEFAULT_BUCKET_REGION))]
    pub bucket_region: String,

    /// Endpoint override (e.g. a local emulator).
    #[builder(default)]
    pub endpoint_url: Option<String>,

    /// Use path-style S3 addressing (required by most emulators).
    #[builder(default = false)]
    pub force_path_style: bool,

    /// Upper bound for waiter polling, in seconds.
    #[builder(default = DEFAULT_MAX_WAIT_SECS)]
    pub max_wait_secs: u64,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FacadeConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `AWS_REGION` / `DEFAULT_REGION` | `us-east-1` |
    /// | `S3_BUCKET_REGION` | `us-east-2` |
    /// | `AWS_ENDPOINT_URL` | *(unset)* |
    /// | `S3_FORCE_PATH_STYLE` | `false` |
    /// | `FACADE_MAX_WAIT_SECS` | `300` |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("AWS_REGION").or_else(|_| std::env::var("DEFAULT_REGION")) {
            config.region = AwsRegion::new(v);
        }
        if let Ok(v) = std::env::var("S3_BUCKET_REGION") {
            config.bucket_region = v;
        }
        if let Ok(v) = std::env::var("AWS_ENDPOINT_URL") {
            if !v.is_empty() {
                config.endpoint_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("S3_FORCE_PATH_STYLE") {
            config.force_path_style = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("FACADE_MAX_WAIT_SECS") {
            if let Ok(secs) = v.parse() {
                config.max_wait_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Maximum time a waiter may poll.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    /// Resolve an [`SdkConfig`] through the default provider chain, applying
    /// this configuration's region and endpoint overrides.
    pub async fn load_sdk_config(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.as_str().to_owned()));
        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        loader.load().await
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v, "1" | "true" | "yes" | "TRUE" | "YES")
}
