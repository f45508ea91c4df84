//! The seam between [`StorageFacade`](crate::StorageFacade) and a provider.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use awsfacade_core::{FacadeResult, Page, PageRequest};

use crate::types::{BucketHandle, ObjectHandle, ObjectVersionRef, VersioningStatus};

/// Object storage operations, one provider request each.
///
/// Implemented by [`SdkStorage`](crate::SdkStorage) over `aws-sdk-s3` and by
/// [`MemoryStorage`](crate::MemoryStorage) for tests and offline use.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Create a bucket in `region`.
    async fn create_bucket(&self, name: &str, region: &str) -> FacadeResult<()>;

    /// All buckets visible to the credential.
    async fn list_buckets(&self) -> FacadeResult<Vec<BucketHandle>>;

    /// Delete an (empty) bucket.
    async fn delete_bucket(&self, name: &str) -> FacadeResult<()>;

    /// Block until the provider no longer reports the bucket.
    async fn wait_bucket_absent(&self, name: &str, max_wait: Duration) -> FacadeResult<()>;

    /// Set the bucket versioning status.
    async fn put_versioning(&self, bucket: &str, status: VersioningStatus) -> FacadeResult<()>;

    /// Read the bucket versioning status.
    async fn get_versioning(&self, bucket: &str) -> FacadeResult<VersioningStatus>;

    /// Stream a local file into `key`.
    async fn upload_file(&self, bucket: &str, key: &str, source: &Path)
    -> FacadeResult<ObjectHandle>;

    /// Stream `key` (optionally a specific version) into the local file `dest`.
    async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        dest: &Path,
    ) -> FacadeResult<ObjectHandle>;

    /// One page of latest-version objects, optionally under `prefix`.
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<ObjectHandle>>;

    /// One page of version records (objects and delete markers).
    async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<ObjectVersionRef>>;

    /// Delete one key, or one version of it.
    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> FacadeResult<()>;

    /// Delete the given version records in a single batch request.
    ///
    /// Returns how many the provider confirmed deleted. Callers must not pass
    /// more than [`MAX_DELETE_BATCH`](crate::MAX_DELETE_BATCH) records.
    async fn delete_object_versions(
        &self,
        bucket: &str,
        targets: &[ObjectVersionRef],
    ) -> FacadeResult<usize>;
}
