//! Integration tests for the SDK-backed facades.
//!
//! These tests require an AWS-compatible server at `localhost:4566`.
//! They are marked `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p awsfacade-integration -- --ignored
//! ```

mod test_dynamodb;
mod test_logs;
mod test_s3;
mod test_sns;

use std::sync::Once;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_credential_types::provider::SharedCredentialsProvider;
use awsfacade_core::{AwsRegion, FacadeConfig};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Endpoint URL for the server.
fn endpoint_url() -> String {
    std::env::var("AWS_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// Facade configuration pointing at the local server.
#[must_use]
pub fn facade_config() -> FacadeConfig {
    FacadeConfig::builder()
        .region(AwsRegion::new("us-east-1"))
        .bucket_region("us-east-1".to_owned())
        .endpoint_url(Some(endpoint_url()))
        .force_path_style(true)
        .max_wait_secs(30)
        .build()
}

/// Shared SDK configuration with static test credentials.
#[must_use]
pub fn sdk_config() -> SdkConfig {
    init_tracing();

    let creds = Credentials::new("test", "test", None, None, "integration-test");

    SdkConfig::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(SharedCredentialsProvider::new(creds))
        .endpoint_url(endpoint_url())
        .build()
}

/// Raw S3 client, for checking provider state behind the facade.
#[must_use]
pub fn s3_client() -> aws_sdk_s3::Client {
    let config = aws_sdk_s3::config::Builder::from(&sdk_config())
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(config)
}

/// Raw DynamoDB client.
#[must_use]
pub fn dynamodb_client() -> aws_sdk_dynamodb::Client {
    aws_sdk_dynamodb::Client::new(&sdk_config())
}

/// Raw SNS client.
#[must_use]
pub fn sns_client() -> aws_sdk_sns::Client {
    aws_sdk_sns::Client::new(&sdk_config())
}

/// Generate a unique resource name for a test.
#[must_use]
pub fn unique_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}
