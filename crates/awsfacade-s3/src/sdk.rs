//! [`StorageBackend`] over `aws-sdk-s3`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::client::Waiters;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::{ByteStream, DateTime as SmithyDateTime};
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration, Delete,
    ObjectIdentifier, VersioningConfiguration,
};
use awsfacade_core::{FacadeError, FacadeResult, Page, PageRequest, SdkResultExt};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::backend::StorageBackend;
use crate::types::{BucketHandle, ObjectHandle, ObjectVersionRef, VersioningStatus};

/// The one region where `CreateBucket` must not carry a location constraint.
const LEGACY_GLOBAL_REGION: &str = "us-east-1";

/// Storage backend issuing real S3 requests.
#[derive(Debug, Clone)]
pub struct SdkStorage {
    client: Client,
}

impl SdkStorage {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from a shared SDK configuration.
    ///
    /// Path-style addressing is needed by most local emulators.
    #[must_use]
    pub fn from_sdk_config(sdk_config: &SdkConfig, force_path_style: bool) -> Self {
        let config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(force_path_style)
            .build();
        Self::new(Client::from_conf(config))
    }

    /// The underlying client.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn to_chrono(dt: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn io_error(err: impl std::error::Error + Send + Sync + 'static) -> FacadeError {
    FacadeError::Io(std::io::Error::other(err))
}

/// Version listings resume from a (key, version-id) marker pair; the pair is
/// carried to the caller as one opaque token.
fn encode_version_token(key: &str, version_id: Option<&str>) -> String {
    let raw = serde_json::json!([key, version_id]).to_string();
    URL_SAFE_NO_PAD.encode(raw)
}

fn decode_version_token(token: &str) -> FacadeResult<(String, Option<String>)> {
    let invalid = || FacadeError::invalid_input(format!("invalid version page token: {token}"));
    let raw = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
    serde_json::from_slice::<(String, Option<String>)>(&raw).map_err(|_| invalid())
}

fn object_size(len: Option<i64>) -> Option<u64> {
    len.and_then(|l| u64::try_from(l).ok())
}

#[async_trait]
impl StorageBackend for SdkStorage {
    async fn create_bucket(&self, name: &str, region: &str) -> FacadeResult<()> {
        let mut req = self.client.create_bucket().bucket(name);
        if region != LEGACY_GLOBAL_REGION {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        req.customize()
            .config_override(
                aws_sdk_s3::config::Builder::default().region(Region::new(region.to_owned())),
            )
            .send()
            .await
            .map_facade_err(format!("create bucket {name} in {region}"))?;
        Ok(())
    }

    async fn list_buckets(&self) -> FacadeResult<Vec<BucketHandle>> {
        let resp = self
            .client
            .list_buckets()
            .send()
            .await
            .map_facade_err("list buckets")?;
        Ok(resp
            .buckets()
            .iter()
            .filter_map(|b| {
                Some(BucketHandle {
                    name: b.name()?.to_owned(),
                    region: b.bucket_region().map(ToOwned::to_owned),
                    creation_date: b.creation_date().and_then(to_chrono),
                })
            })
            .collect())
    }

    async fn delete_bucket(&self, name: &str) -> FacadeResult<()> {
        self.client
            .delete_bucket()
            .bucket(name)
            .send()
            .await
            .map_facade_err(format!("delete bucket {name}"))?;
        Ok(())
    }

    async fn wait_bucket_absent(&self, name: &str, max_wait: Duration) -> FacadeResult<()> {
        self.client
            .wait_until_bucket_not_exists()
            .bucket(name)
            .wait(max_wait)
            .await
            .map_err(|e| FacadeError::wait(format!("bucket {name} removal"), e))?;
        Ok(())
    }

    async fn put_versioning(&self, bucket: &str, status: VersioningStatus) -> FacadeResult<()> {
        let sdk_status = match status {
            VersioningStatus::Enabled => BucketVersioningStatus::Enabled,
            VersioningStatus::Suspended => BucketVersioningStatus::Suspended,
            VersioningStatus::Disabled => {
                return Err(FacadeError::invalid_input(
                    "versioning cannot be returned to Disabled, suspend it instead",
                ));
            }
        };
        self.client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(
                VersioningConfiguration::builder().status(sdk_status).build(),
            )
            .send()
            .await
            .map_facade_err(format!("put versioning on {bucket}"))?;
        Ok(())
    }

    async fn get_versioning(&self, bucket: &str) -> FacadeResult<VersioningStatus> {
        let resp = self
            .client
            .get_bucket_versioning()
            .bucket(bucket)
            .send()
            .await
            .map_facade_err(format!("get versioning of {bucket}"))?;
        Ok(match resp.status() {
            Some(BucketVersioningStatus::Enabled) => VersioningStatus::Enabled,
            Some(BucketVersioningStatus::Suspended) => VersioningStatus::Suspended,
            _ => VersioningStatus::Disabled,
        })
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
    ) -> FacadeResult<ObjectHandle> {
        let size = tokio::fs::metadata(source).await?.len();
        let body = ByteStream::from_path(source).await.map_err(io_error)?;
        let resp = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_facade_err(format!("upload s3://{bucket}/{key}"))?;

        Ok(ObjectHandle {
            version_id: resp.version_id().map(ToOwned::to_owned),
            size: Some(size),
            e_tag: resp.e_tag().map(ToOwned::to_owned),
            ..ObjectHandle::new(bucket, key)
        })
    }

    async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        dest: &Path,
    ) -> FacadeResult<ObjectHandle> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(ToOwned::to_owned))
            .send()
            .await
            .map_facade_err(format!("download s3://{bucket}/{key}"))?;

        let handle = ObjectHandle {
            version_id: resp.version_id().map(ToOwned::to_owned),
            size: object_size(resp.content_length()),
            e_tag: resp.e_tag().map(ToOwned::to_owned),
            last_modified: resp.last_modified().and_then(to_chrono),
            ..ObjectHandle::new(bucket, key)
        };

        let mut body = resp.body;
        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = body.try_next().await.map_err(io_error)? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        debug!(bucket, key, dest = %dest.display(), "object written to disk");

        Ok(handle)
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<ObjectHandle>> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(prefix.map(ToOwned::to_owned))
            .set_continuation_token(page.token.clone())
            .set_max_keys(page.limit_i32())
            .send()
            .await
            .map_facade_err(format!("list objects in {bucket}"))?;

        let items = resp
            .contents()
            .iter()
            .filter_map(|o| {
                Some(ObjectHandle {
                    size: object_size(o.size()),
                    e_tag: o.e_tag().map(ToOwned::to_owned),
                    last_modified: o.last_modified().and_then(to_chrono),
                    ..ObjectHandle::new(bucket, o.key()?)
                })
            })
            .collect();
        let next_token = if resp.is_truncated() == Some(true) {
            resp.next_continuation_token().map(ToOwned::to_owned)
        } else {
            None
        };
        Ok(Page::new(items, next_token))
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<ObjectVersionRef>> {
        let (key_marker, version_marker) = match page.token.as_deref() {
            Some(token) => {
                let (key, version) = decode_version_token(token)?;
                (Some(key), version)
            }
            None => (None, None),
        };

        let resp = self
            .client
            .list_object_versions()
            .bucket(bucket)
            .set_prefix(prefix.map(ToOwned::to_owned))
            .set_key_marker(key_marker)
            .set_version_id_marker(version_marker)
            .set_max_keys(page.limit_i32())
            .send()
            .await
            .map_facade_err(format!("list object versions in {bucket}"))?;

        let versions = resp.versions().iter().filter_map(|v| {
            Some(ObjectVersionRef {
                key: v.key()?.to_owned(),
                version_id: v.version_id().unwrap_or("null").to_owned(),
                is_delete_marker: false,
                is_latest: v.is_latest().unwrap_or(false),
            })
        });
        let markers = resp.delete_markers().iter().filter_map(|m| {
            Some(ObjectVersionRef {
                key: m.key()?.to_owned(),
                version_id: m.version_id().unwrap_or("null").to_owned(),
                is_delete_marker: true,
                is_latest: m.is_latest().unwrap_or(false),
            })
        });
        let mut items: Vec<ObjectVersionRef> = versions.chain(markers).collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));

        let next_token = match (resp.is_truncated(), resp.next_key_marker()) {
            (Some(true), Some(key)) => Some(encode_version_token(key, resp.next_version_id_marker())),
            _ => None,
        };
        Ok(Page::new(items, next_token))
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> FacadeResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(ToOwned::to_owned))
            .send()
            .await
            .map_facade_err(format!("delete s3://{bucket}/{key}"))?;
        Ok(())
    }

    async fn delete_object_versions(
        &self,
        bucket: &str,
        targets: &[ObjectVersionRef],
    ) -> FacadeResult<usize> {
        if targets.is_empty() {
            return Ok(0);
        }
        let objects = targets
            .iter()
            .map(|t| {
                ObjectIdentifier::builder()
                    .key(&t.key)
                    .version_id(&t.version_id)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FacadeError::invalid_input(e.to_string()))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| FacadeError::invalid_input(e.to_string()))?;

        let resp = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_facade_err(format!("batch delete in {bucket}"))?;

        for failure in resp.errors() {
            warn!(
                bucket,
                key = ?failure.key(),
                version_id = ?failure.version_id(),
                code = ?failure.code(),
                message = ?failure.message(),
                "version not deleted"
            );
        }
        Ok(targets.len().saturating_sub(resp.errors().len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_round_trip_version_token() {
        let token = encode_version_token("temp/a b.txt", Some("3HL4kqtJlcpXroDTDmJ+rmSpXd3dIbrHY"));
        let (key, version) = decode_version_token(&token).unwrap();
        assert_eq!(key, "temp/a b.txt");
        assert_eq!(version.as_deref(), Some("3HL4kqtJlcpXroDTDmJ+rmSpXd3dIbrHY"));
    }

    #[test]
    fn test_should_reject_garbage_version_token() {
        let err = decode_version_token("not-a-token!").unwrap_err();
        assert_eq!(err.kind(), awsfacade_core::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_should_convert_smithy_timestamps() {
        let dt = SmithyDateTime::from_secs(1_700_000_000);
        assert_eq!(to_chrono(&dt).map(|d| d.timestamp()), Some(1_700_000_000));
    }
}
