//! Bucket, object and version lifecycle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use awsfacade_core::logging::service_span;
use awsfacade_core::{FacadeConfig, FacadeError, FacadeResult, Page, PageRequest};
use tracing::{Instrument, Span, debug, error, info, warn};

use crate::backend::StorageBackend;
use crate::types::{
    BucketHandle, DeleteOutcome, DeletePage, DownloadedObject, MAX_DELETE_BATCH, ObjectHandle,
    ObjectVersionRef, VersioningStatus,
};

/// Facade over an object storage backend.
///
/// Holds no cached provider state: every method forwards to the backend and
/// reshapes the answer.
#[derive(Debug)]
pub struct StorageFacade<B> {
    backend: B,
    default_region: String,
    max_wait: Duration,
    span: Span,
}

impl<B: StorageBackend> StorageFacade<B> {
    /// Create a facade that creates buckets in `config.bucket_region` by default.
    pub fn new(backend: B, config: &FacadeConfig) -> Self {
        Self {
            backend,
            default_region: config.bucket_region.clone(),
            max_wait: config.max_wait(),
            span: service_span("s3"),
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

    /// Create a bucket in `region`, or in the configured bucket region.
    ///
    /// # Errors
    /// Any provider failure; it is also logged with the request parameters.
    pub async fn create_bucket(&self, name: &str, region: Option<&str>) -> FacadeResult<BucketHandle> {
        let region = region.unwrap_or(&self.default_region);
        async {
            match self.backend.create_bucket(name, region).await {
                Ok(()) => {
                    info!(bucket = name, region, "bucket created");
                    Ok(BucketHandle {
                        name: name.to_owned(),
                        region: Some(region.to_owned()),
                        creation_date: None,
                    })
                }
                Err(err) => {
                    error!(bucket = name, region, kind = %err.kind(), error = %err, "failed to create bucket");
                    Err(err)
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// All buckets visible to the credential.
    ///
    /// # Errors
    /// Any provider failure.
    pub async fn list_buckets(&self) -> FacadeResult<Vec<BucketHandle>> {
        async {
            let buckets = self.backend.list_buckets().await?;
            debug!(count = buckets.len(), "buckets listed");
            Ok(buckets)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Look a bucket up, optionally creating it when absent.
    ///
    /// A bucket exists when the listing reports it with a creation date. When
    /// it is missing and `create_if_missing` is set, it is created and probed
    /// exactly once more.
    ///
    /// # Errors
    /// Listing or creation failures. A bucket that already exists when the
    /// create call lands is not an error.
    pub async fn get_bucket(
        &self,
        name: &str,
        create_if_missing: bool,
        region: Option<&str>,
    ) -> FacadeResult<Option<BucketHandle>> {
        async {
            let mut may_create = create_if_missing;
            loop {
                if let Some(found) = self.probe_bucket(name).await? {
                    return Ok(Some(found));
                }
                if !may_create {
                    warn!(bucket = name, "bucket does not exist");
                    return Ok(None);
                }
                may_create = false;
                let region = region.unwrap_or(&self.default_region);
                match self.backend.create_bucket(name, region).await {
                    Ok(()) => info!(bucket = name, region, "bucket created"),
                    Err(FacadeError::AlreadyExists(_)) => {
                        debug!(bucket = name, "bucket appeared concurrently");
                    }
                    Err(err) => {
                        error!(bucket = name, region, kind = %err.kind(), error = %err, "failed to create bucket");
                        return Err(err);
                    }
                }
            }
        }
        .instrument(self.span.clone())
        .await
    }

    async fn probe_bucket(&self, name: &str) -> FacadeResult<Option<BucketHandle>> {
        Ok(self
            .backend
            .list_buckets()
            .await?
            .into_iter()
            .find(|b| b.name == name && b.creation_date.is_some()))
    }

    /// Upload a local file.
    ///
    /// The key is `key_prefix` followed by `local_path` as written, with no
    /// separator handling: `("logs/", "a.txt")` becomes `logs/a.txt`.
    ///
    /// # Errors
    /// Unreadable source file, or any provider failure.
    pub async fn upload_object(
        &self,
        bucket: &str,
        local_path: &Path,
        key_prefix: Option<&str>,
    ) -> FacadeResult<ObjectHandle> {
        let key = format!("{}{}", key_prefix.unwrap_or_default(), local_path.to_string_lossy());
        async {
            let handle = self.backend.upload_file(bucket, &key, local_path).await?;
            info!(bucket, key = %handle.key, version_id = ?handle.version_id, "object uploaded");
            Ok(handle)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Download an object (the latest version unless `version_id` is given).
    ///
    /// The file lands in `dest_dir` (default: the working directory) under
    /// the key's base name.
    ///
    /// # Errors
    /// A key with an empty base name is invalid input; otherwise provider or
    /// local write failures.
    pub async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        dest_dir: Option<&Path>,
        version_id: Option<&str>,
    ) -> FacadeResult<DownloadedObject> {
        let base_name = key.rsplit('/').next().unwrap_or_default();
        if base_name.is_empty() {
            return Err(FacadeError::invalid_input(format!(
                "key {key} has no base name to download to"
            )));
        }
        let path: PathBuf = dest_dir.unwrap_or(Path::new(".")).join(base_name);
        async {
            let object = self
                .backend
                .download_file(bucket, key, version_id, &path)
                .await?;
            debug!(bucket, key, path = %path.display(), "object downloaded");
            Ok(DownloadedObject { object, path })
        }
        .instrument(self.span.clone())
        .await
    }

    /// Turn versioning on. Idempotent.
    ///
    /// # Errors
    /// Any provider failure.
    pub async fn enable_versioning(&self, bucket: &str) -> FacadeResult<VersioningStatus> {
        async {
            self.backend
                .put_versioning(bucket, VersioningStatus::Enabled)
                .await?;
            let status = self.backend.get_versioning(bucket).await?;
            info!(bucket, %status, "versioning enabled");
            Ok(status)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Current versioning status.
    ///
    /// # Errors
    /// Any provider failure.
    pub async fn versioning_status(&self, bucket: &str) -> FacadeResult<VersioningStatus> {
        self.backend
            .get_versioning(bucket)
            .instrument(self.span.clone())
            .await
    }

    /// One page of latest-version objects.
    ///
    /// # Errors
    /// Any provider failure.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<ObjectHandle>> {
        self.backend
            .list_objects(bucket, prefix, page)
            .instrument(self.span.clone())
            .await
    }

    /// One page of version records, delete markers included.
    ///
    /// # Errors
    /// Any provider failure.
    pub async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<ObjectVersionRef>> {
        self.backend
            .list_object_versions(bucket, prefix, page)
            .instrument(self.span.clone())
            .await
    }

    /// Delete a key (leaving a delete marker on versioned buckets) or one
    /// specific version of it.
    ///
    /// # Errors
    /// Any provider failure.
    pub async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> FacadeResult<()> {
        async {
            self.backend.delete_object(bucket, key, version_id).await?;
            info!(bucket, key, version_id, "object deleted");
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    /// List one page of version records under `prefix` and delete them in a
    /// single batch.
    ///
    /// The page limit defaults to [`MAX_DELETE_BATCH`] and may not exceed it.
    ///
    /// # Errors
    /// Returns [`FacadeError::InvalidInput`] for a zero or oversized limit,
    /// otherwise any provider failure.
    pub async fn delete_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<DeletePage> {
        let limit = page.limit.unwrap_or(MAX_DELETE_BATCH);
        if limit == 0 || limit > MAX_DELETE_BATCH {
            return Err(FacadeError::invalid_input(format!(
                "batch delete size must be between 1 and {MAX_DELETE_BATCH}, got {limit}"
            )));
        }
        let page = PageRequest {
            token: page.token.clone(),
            limit: Some(limit),
        };
        async {
            let listed = self
                .backend
                .list_object_versions(bucket, prefix, &page)
                .await?;
            let deleted = self
                .backend
                .delete_object_versions(bucket, &listed.items)
                .await?;
            info!(bucket, prefix, listed = listed.len(), deleted, "object versions deleted");
            Ok(DeletePage {
                outcome: DeleteOutcome {
                    listed: listed.len(),
                    deleted,
                },
                next_token: listed.next_token,
            })
        }
        .instrument(self.span.clone())
        .await
    }

    /// Delete every version record under `prefix`, `batch_size` at a time.
    ///
    /// Each batch restarts the listing from the beginning, since the previous
    /// batch removed what preceded it. Returns the total removed.
    ///
    /// # Errors
    /// Any failure of [`Self::delete_object_versions`], or a batch that lists
    /// records but deletes none of them.
    pub async fn delete_all_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        batch_size: usize,
    ) -> FacadeResult<usize> {
        let page = PageRequest::with_limit(batch_size);
        let mut total = 0;
        loop {
            let DeletePage { outcome, .. } = self.delete_object_versions(bucket, prefix, &page).await?;
            if outcome.listed == 0 {
                return Ok(total);
            }
            if outcome.deleted == 0 {
                return Err(FacadeError::Unknown {
                    code: None,
                    message: format!(
                        "{} version records under {bucket}/{} could not be deleted",
                        outcome.listed,
                        prefix.unwrap_or_default()
                    ),
                });
            }
            total += outcome.deleted;
        }
    }

    /// Delete the named bucket, or every visible bucket when `name` is
    /// `None`, waiting for each removal to be confirmed.
    ///
    /// A named bucket that does not exist is logged and counts as zero. In
    /// the unnamed sweep, individual failures are logged and skipped.
    ///
    /// # Errors
    /// For a named bucket: any failure other than absence. For the sweep:
    /// only a failure to list buckets.
    pub async fn delete_buckets(&self, name: Option<&str>) -> FacadeResult<usize> {
        async {
            if let Some(name) = name {
                return match self.delete_bucket_and_wait(name).await {
                    Ok(()) => Ok(1),
                    Err(err) if err.is_not_found() => {
                        warn!(bucket = name, "bucket to delete does not exist");
                        Ok(0)
                    }
                    Err(err) => Err(err),
                };
            }

            let mut deleted = 0;
            for bucket in self.backend.list_buckets().await? {
                match self.delete_bucket_and_wait(&bucket.name).await {
                    Ok(()) => deleted += 1,
                    Err(err) => {
                        warn!(bucket = %bucket.name, kind = %err.kind(), error = %err, "skipping bucket");
                    }
                }
            }
            Ok(deleted)
        }
        .instrument(self.span.clone())
        .await
    }

    async fn delete_bucket_and_wait(&self, name: &str) -> FacadeResult<()> {
        self.backend.delete_bucket(name).await?;
        self.backend.wait_bucket_absent(name, self.max_wait).await?;
        info!(bucket = name, "bucket deleted");
        Ok(())
    }
}
