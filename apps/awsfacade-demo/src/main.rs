//! awsfacade demo - walks a bucket through its whole lifecycle.
//!
//! Creates a bucket, uploads a temporary file, downloads it back, writes a
//! second version, lists by prefix, then deletes every version and finally
//! the bucket.
//!
//! # Usage
//!
//! ```text
//! DEMO_BACKEND=memory awsfacade-demo
//! AWS_ENDPOINT_URL=http://localhost:4566 S3_FORCE_PATH_STYLE=true awsfacade-demo
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DEMO_BACKEND` | `sdk` | `sdk` or `memory` |
//! | `DEMO_BUCKET` | `awsfacade-demo-<random>` | Bucket to create and remove |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//!
//! Region, endpoint and path-style settings are read by
//! [`FacadeConfig::from_env`].

use std::path::Path;

use anyhow::{Context, Result, bail};
use awsfacade_core::logging::init_tracing;
use awsfacade_core::{FacadeConfig, PageRequest};
use awsfacade_s3::{MemoryStorage, SdkStorage, StorageBackend, StorageFacade};
use tracing::info;

const DEMO_FILE: &str = "hello.txt";
const DEMO_PREFIX: &str = "demo/";

#[tokio::main]
async fn main() -> Result<()> {
    let config = FacadeConfig::from_env();
    init_tracing(&config.log_level)?;

    let bucket = std::env::var("DEMO_BUCKET").unwrap_or_else(|_| {
        let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
        format!("awsfacade-demo-{id}")
    });

    let backend = std::env::var("DEMO_BACKEND").unwrap_or_else(|_| "sdk".to_owned());
    info!(backend = %backend, bucket = %bucket, region = %config.region, "starting demo");

    match backend.as_str() {
        "memory" => run(StorageFacade::new(MemoryStorage::new(), &config), &bucket).await,
        "sdk" => {
            let sdk_config = config.load_sdk_config().await;
            let backend = SdkStorage::from_sdk_config(&sdk_config, config.force_path_style);
            run(StorageFacade::new(backend, &config), &bucket).await
        }
        other => bail!("unknown DEMO_BACKEND {other:?}, expected \"sdk\" or \"memory\""),
    }
}

async fn run<B: StorageBackend>(s3: StorageFacade<B>, bucket: &str) -> Result<()> {
    let workdir = tempfile::tempdir().context("failed to create working directory")?;
    // Keys are built from the path as given, so upload from a relative path.
    std::env::set_current_dir(workdir.path())
        .with_context(|| format!("failed to enter {}", workdir.path().display()))?;

    let handle = s3
        .get_bucket(bucket, true, None)
        .await
        .with_context(|| format!("failed to get or create bucket {bucket}"))?
        .with_context(|| format!("bucket {bucket} still missing after creation"))?;
    info!(
        bucket = %handle.name,
        created = ?handle.creation_date,
        region = ?handle.region,
        "bucket ready"
    );

    let names: Vec<String> = s3
        .list_buckets()
        .await
        .context("failed to list buckets")?
        .into_iter()
        .map(|b| b.name)
        .collect();
    info!(buckets = ?names, "buckets listed");

    s3.enable_versioning(bucket)
        .await
        .context("failed to enable versioning")?;

    write_file(DEMO_FILE, "first revision\n").await?;
    let first = s3
        .upload_object(bucket, Path::new(DEMO_FILE), Some(DEMO_PREFIX))
        .await
        .context("failed to upload first revision")?;
    info!(key = %first.key, version_id = ?first.version_id, "uploaded");

    let downloads = workdir.path().join("downloads");
    tokio::fs::create_dir_all(&downloads)
        .await
        .context("failed to create download directory")?;
    let downloaded = s3
        .download_object(bucket, &first.key, Some(&downloads), None)
        .await
        .context("failed to download object")?;
    let body = tokio::fs::read_to_string(&downloaded.path)
        .await
        .context("failed to read downloaded file")?;
    info!(path = %downloaded.path.display(), body = body.trim_end(), "downloaded");

    write_file(DEMO_FILE, "second revision\n").await?;
    let second = s3
        .upload_object(bucket, Path::new(DEMO_FILE), Some(DEMO_PREFIX))
        .await
        .context("failed to upload second revision")?;
    info!(key = %second.key, version_id = ?second.version_id, "uploaded new version");

    write_file("other.txt", "outside the prefix\n").await?;
    s3.upload_object(bucket, Path::new("other.txt"), None)
        .await
        .context("failed to upload unprefixed object")?;

    let prefixed = s3
        .list_objects(bucket, Some(DEMO_PREFIX), &PageRequest::first())
        .await
        .context("failed to list objects")?;
    info!(
        prefix = DEMO_PREFIX,
        keys = ?prefixed.items.iter().map(|o| o.key.as_str()).collect::<Vec<_>>(),
        "objects under prefix"
    );

    let versions = s3
        .list_object_versions(bucket, Some(DEMO_PREFIX), &PageRequest::first())
        .await
        .context("failed to list object versions")?;
    info!(count = versions.len(), "versions under prefix");

    let deleted = s3
        .delete_all_object_versions(bucket, None, 100)
        .await
        .context("failed to empty bucket")?;
    info!(deleted, "bucket emptied");

    let removed = s3
        .delete_buckets(Some(bucket))
        .await
        .context("failed to delete bucket")?;
    info!(removed, "demo finished");
    Ok(())
}

async fn write_file(path: &str, contents: &str) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write {path}"))
}
