//! In-memory object storage.
//!
//! Buckets live in a [`DashMap`]; each bucket keeps its keys in a `BTreeMap`
//! so listings come back in key order. Every key holds a stack of versions,
//! newest first. Writes while versioning is off replace the `"null"` version;
//! deletes while versioning is on push a delete marker.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use awsfacade_core::{FacadeError, FacadeResult, Page, PageRequest};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use md5::{Digest, Md5};
use parking_lot::RwLock;
use tracing::debug;

use crate::backend::StorageBackend;
use crate::types::{BucketHandle, ObjectHandle, ObjectVersionRef, VersioningStatus};

/// Version id of objects written while versioning is not enabled.
const NULL_VERSION_ID: &str = "null";

/// Page size used when a listing request carries no limit.
const DEFAULT_LIST_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
struct StoredVersion {
    version_id: String,
    /// Monotonic write sequence; larger is newer.
    seq: u64,
    /// `None` for delete markers.
    body: Option<Bytes>,
    last_modified: DateTime<Utc>,
}

impl StoredVersion {
    fn is_delete_marker(&self) -> bool {
        self.body.is_none()
    }

    fn e_tag(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| format!("\"{}\"", hex::encode(Md5::digest(b))))
    }
}

#[derive(Debug)]
struct MemoryBucket {
    region: String,
    creation_date: DateTime<Utc>,
    versioning: RwLock<VersioningStatus>,
    /// Key to versions, newest first.
    objects: RwLock<BTreeMap<String, Vec<StoredVersion>>>,
}

impl MemoryBucket {
    fn new(region: &str) -> Self {
        Self {
            region: region.to_owned(),
            creation_date: Utc::now(),
            versioning: RwLock::new(VersioningStatus::Disabled),
            objects: RwLock::new(BTreeMap::new()),
        }
    }
}

/// In-memory [`StorageBackend`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    buckets: DashMap<String, MemoryBucket>,
    seq: AtomicU64,
    create_calls: AtomicUsize,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `create_bucket` calls served so far.
    #[must_use]
    pub fn bucket_creations(&self) -> usize {
        self.create_calls.load(Ordering::Relaxed)
    }

    /// Total version records (objects and delete markers) in a bucket.
    #[must_use]
    pub fn version_count(&self, bucket: &str) -> usize {
        self.buckets
            .get(bucket)
            .map_or(0, |b| b.objects.read().values().map(Vec::len).sum())
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn bucket(
        &self,
        name: &str,
    ) -> FacadeResult<dashmap::mapref::one::Ref<'_, String, MemoryBucket>> {
        self.buckets
            .get(name)
            .ok_or_else(|| FacadeError::from_code(Some("NoSuchBucket"), format!("bucket {name}")))
    }

    fn put_body(&self, bucket: &str, key: &str, body: Bytes) -> FacadeResult<ObjectHandle> {
        let b = self.bucket(bucket)?;
        let status = *b.versioning.read();
        let version = StoredVersion {
            version_id: match status {
                VersioningStatus::Enabled => uuid::Uuid::new_v4().simple().to_string(),
                _ => NULL_VERSION_ID.to_owned(),
            },
            seq: self.next_seq(),
            body: Some(body),
            last_modified: Utc::now(),
        };
        let handle = to_handle(bucket, key, &version, status);

        let mut objects = b.objects.write();
        let versions = objects.entry(key.to_owned()).or_default();
        if status != VersioningStatus::Enabled {
            versions.retain(|v| v.version_id != NULL_VERSION_ID);
        }
        versions.insert(0, version);
        Ok(handle)
    }
}

fn to_handle(
    bucket: &str,
    key: &str,
    version: &StoredVersion,
    status: VersioningStatus,
) -> ObjectHandle {
    ObjectHandle {
        version_id: (status != VersioningStatus::Disabled).then(|| version.version_id.clone()),
        size: version.body.as_ref().map(|b| b.len() as u64),
        e_tag: version.e_tag(),
        last_modified: Some(version.last_modified),
        ..ObjectHandle::new(bucket, key)
    }
}

/// Version listings resume after the `(key, seq)` of the last record returned.
fn parse_version_token(token: &str) -> FacadeResult<(u64, &str)> {
    token
        .split_once(':')
        .and_then(|(seq, key)| seq.parse().ok().map(|seq| (seq, key)))
        .ok_or_else(|| FacadeError::invalid_input(format!("invalid version page token: {token}")))
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn create_bucket(&self, name: &str, region: &str) -> FacadeResult<()> {
        use dashmap::mapref::entry::Entry;
        match self.buckets.entry(name.to_owned()) {
            Entry::Occupied(_) => Err(FacadeError::from_code(
                Some("BucketAlreadyOwnedByYou"),
                format!("bucket {name}"),
            )),
            Entry::Vacant(slot) => {
                slot.insert(MemoryBucket::new(region));
                self.create_calls.fetch_add(1, Ordering::Relaxed);
                debug!(bucket = name, region, "memory bucket created");
                Ok(())
            }
        }
    }

    async fn list_buckets(&self) -> FacadeResult<Vec<BucketHandle>> {
        let mut buckets: Vec<BucketHandle> = self
            .buckets
            .iter()
            .map(|entry| BucketHandle {
                name: entry.key().clone(),
                region: Some(entry.region.clone()),
                creation_date: Some(entry.creation_date),
            })
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn delete_bucket(&self, name: &str) -> FacadeResult<()> {
        let removed = self
            .buckets
            .remove_if(name, |_, b| b.objects.read().is_empty());
        if removed.is_some() {
            return Ok(());
        }
        if self.buckets.contains_key(name) {
            Err(FacadeError::from_code(
                Some("BucketNotEmpty"),
                format!("bucket {name} still holds objects"),
            ))
        } else {
            Err(FacadeError::from_code(Some("NoSuchBucket"), format!("bucket {name}")))
        }
    }

    async fn wait_bucket_absent(&self, name: &str, _max_wait: Duration) -> FacadeResult<()> {
        if self.buckets.contains_key(name) {
            return Err(FacadeError::wait(format!("bucket {name} removal"), "bucket still exists"));
        }
        Ok(())
    }

    async fn put_versioning(&self, bucket: &str, status: VersioningStatus) -> FacadeResult<()> {
        if status == VersioningStatus::Disabled {
            return Err(FacadeError::invalid_input(
                "versioning cannot be returned to Disabled, suspend it instead",
            ));
        }
        *self.bucket(bucket)?.versioning.write() = status;
        Ok(())
    }

    async fn get_versioning(&self, bucket: &str) -> FacadeResult<VersioningStatus> {
        Ok(*self.bucket(bucket)?.versioning.read())
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
    ) -> FacadeResult<ObjectHandle> {
        // Fail on a missing bucket before touching the disk.
        self.bucket(bucket)?;
        let body = Bytes::from(tokio::fs::read(source).await?);
        self.put_body(bucket, key, body)
    }

    async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        dest: &Path,
    ) -> FacadeResult<ObjectHandle> {
        let (handle, body) = {
            let b = self.bucket(bucket)?;
            let status = *b.versioning.read();
            let objects = b.objects.read();
            let versions = objects
                .get(key)
                .ok_or_else(|| FacadeError::from_code(Some("NoSuchKey"), format!("s3://{bucket}/{key}")))?;
            let version = match version_id {
                Some(id) => versions.iter().find(|v| v.version_id == id).ok_or_else(|| {
                    FacadeError::from_code(
                        Some("NoSuchVersion"),
                        format!("s3://{bucket}/{key} version {id}"),
                    )
                })?,
                None => versions.first().ok_or_else(|| {
                    FacadeError::from_code(Some("NoSuchKey"), format!("s3://{bucket}/{key}"))
                })?,
            };
            let body = version.body.clone().ok_or_else(|| {
                FacadeError::from_code(Some("NoSuchKey"), format!("s3://{bucket}/{key} is deleted"))
            })?;
            (to_handle(bucket, key, version, status), body)
        };
        tokio::fs::write(dest, &body).await?;
        Ok(handle)
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<ObjectHandle>> {
        let b = self.bucket(bucket)?;
        let status = *b.versioning.read();
        let limit = page.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(1);
        let objects = b.objects.read();

        let mut items = Vec::new();
        let mut truncated = false;
        let live = objects
            .iter()
            .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
            .filter(|(key, _)| page.token.as_deref().is_none_or(|after| key.as_str() > after))
            .filter_map(|(key, versions)| {
                versions
                    .first()
                    .filter(|v| !v.is_delete_marker())
                    .map(|v| (key, v))
            });
        for (key, version) in live {
            if items.len() == limit {
                truncated = true;
                break;
            }
            items.push(to_handle(bucket, key, version, status));
        }
        let next_token = truncated
            .then(|| items.last().map(|o: &ObjectHandle| o.key.clone()))
            .flatten();
        Ok(Page::new(items, next_token))
    }

    async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        page: &PageRequest,
    ) -> FacadeResult<Page<ObjectVersionRef>> {
        let resume = page.token.as_deref().map(parse_version_token).transpose()?;
        let b = self.bucket(bucket)?;
        let limit = page.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(1);
        let objects = b.objects.read();

        let records = objects
            .iter()
            .filter(|(key, _)| prefix.is_none_or(|p| key.starts_with(p)))
            .flat_map(|(key, versions)| {
                versions
                    .iter()
                    .enumerate()
                    .map(move |(idx, v)| (key.as_str(), idx == 0, v))
            })
            .filter(|(key, _, v)| match resume {
                None => true,
                Some((seq, after)) => *key > after || (*key == after && v.seq < seq),
            });

        let mut items = Vec::new();
        let mut last = None;
        let mut truncated = false;
        for (key, is_latest, v) in records {
            if items.len() == limit {
                truncated = true;
                break;
            }
            last = Some(format!("{}:{key}", v.seq));
            items.push(ObjectVersionRef {
                key: key.to_owned(),
                version_id: v.version_id.clone(),
                is_delete_marker: v.is_delete_marker(),
                is_latest,
            });
        }
        Ok(Page::new(items, if truncated { last } else { None }))
    }

    async fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> FacadeResult<()> {
        let b = self.bucket(bucket)?;
        let status = *b.versioning.read();
        let mut objects = b.objects.write();

        if let Some(id) = version_id {
            if let Some(versions) = objects.get_mut(key) {
                versions.retain(|v| v.version_id != id);
                if versions.is_empty() {
                    objects.remove(key);
                }
            }
            return Ok(());
        }

        match status {
            VersioningStatus::Disabled => {
                objects.remove(key);
            }
            VersioningStatus::Enabled | VersioningStatus::Suspended => {
                let marker = StoredVersion {
                    version_id: match status {
                        VersioningStatus::Enabled => uuid::Uuid::new_v4().simple().to_string(),
                        _ => NULL_VERSION_ID.to_owned(),
                    },
                    seq: self.next_seq(),
                    body: None,
                    last_modified: Utc::now(),
                };
                let versions = objects.entry(key.to_owned()).or_default();
                if status == VersioningStatus::Suspended {
                    versions.retain(|v| v.version_id != NULL_VERSION_ID);
                }
                versions.insert(0, marker);
            }
        }
        Ok(())
    }

    async fn delete_object_versions(
        &self,
        bucket: &str,
        targets: &[ObjectVersionRef],
    ) -> FacadeResult<usize> {
        let b = self.bucket(bucket)?;
        let mut objects = b.objects.write();
        let mut deleted = 0;
        for target in targets {
            let Some(versions) = objects.get_mut(&target.key) else {
                continue;
            };
            let before = versions.len();
            versions.retain(|v| v.version_id != target.version_id);
            deleted += before - versions.len();
            if versions.is_empty() {
                objects.remove(&target.key);
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use awsfacade_core::ErrorKind;

    use super::*;

    async fn write_temp(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, body).await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_should_reject_duplicate_bucket() {
        let storage = MemoryStorage::new();
        storage.create_bucket("b", "us-east-2").await.unwrap();
        let err = storage.create_bucket("b", "us-east-2").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(storage.bucket_creations(), 1);
    }

    #[tokio::test]
    async fn test_should_refuse_to_delete_non_empty_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::new();
        storage.create_bucket("b", "us-east-2").await.unwrap();
        let src = write_temp(&dir, "f.txt", "x").await;
        storage.upload_file("b", "k", &src).await.unwrap();

        let err = storage.delete_bucket("b").await.unwrap_err();
        assert!(matches!(err, FacadeError::Unknown { ref code, .. } if code.as_deref() == Some("BucketNotEmpty")));

        let err = storage.delete_bucket("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_should_replace_null_version_when_unversioned() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::new();
        storage.create_bucket("b", "us-east-2").await.unwrap();
        let src = write_temp(&dir, "f.txt", "one").await;
        storage.upload_file("b", "k", &src).await.unwrap();
        storage.upload_file("b", "k", &src).await.unwrap();
        assert_eq!(storage.version_count("b"), 1);
    }

    #[tokio::test]
    async fn test_should_leave_delete_marker_when_versioned() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::new();
        storage.create_bucket("b", "us-east-2").await.unwrap();
        storage.put_versioning("b", VersioningStatus::Enabled).await.unwrap();
        let src = write_temp(&dir, "f.txt", "one").await;
        storage.upload_file("b", "k", &src).await.unwrap();
        storage.delete_object("b", "k", None).await.unwrap();

        let listed = storage.list_objects("b", None, &PageRequest::first()).await.unwrap();
        assert!(listed.is_empty());

        let versions = storage
            .list_object_versions("b", None, &PageRequest::first())
            .await
            .unwrap();
        assert_eq!(versions.len(), 2);
        assert!(versions.items[0].is_delete_marker);
        assert!(versions.items[0].is_latest);
        assert!(!versions.items[1].is_delete_marker);
    }

    #[tokio::test]
    async fn test_should_page_versions_without_skipping() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::new();
        storage.create_bucket("b", "us-east-2").await.unwrap();
        storage.put_versioning("b", VersioningStatus::Enabled).await.unwrap();
        let src = write_temp(&dir, "f.txt", "v").await;
        for key in ["a", "b", "c"] {
            storage.upload_file("b", key, &src).await.unwrap();
            storage.upload_file("b", key, &src).await.unwrap();
        }

        let mut req = PageRequest::with_limit(4);
        let mut seen = Vec::new();
        loop {
            let page = storage.list_object_versions("b", None, &req).await.unwrap();
            seen.extend(page.items.iter().map(|v| v.version_id.clone()));
            match page.next_token {
                Some(token) => req = req.after(token),
                None => break,
            }
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 6);
    }

    #[tokio::test]
    async fn test_should_fail_download_of_missing_version() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::new();
        storage.create_bucket("b", "us-east-2").await.unwrap();
        let src = write_temp(&dir, "f.txt", "v").await;
        storage.upload_file("b", "k", &src).await.unwrap();

        let err = storage
            .download_file("b", "k", Some("nope"), &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_should_tag_objects_with_md5_etag() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::new();
        storage.create_bucket("b", "us-east-2").await.unwrap();
        let src = write_temp(&dir, "f.txt", "hello").await;
        let handle = storage.upload_file("b", "k", &src).await.unwrap();
        assert_eq!(
            handle.e_tag.as_deref(),
            Some("\"5d41402abc4b2a76b9719d911017c592\"")
        );

        let listed = storage.list_objects("b", None, &PageRequest::first()).await.unwrap();
        assert_eq!(listed.items[0].e_tag, handle.e_tag);
    }

    #[tokio::test]
    async fn test_should_page_objects_by_token() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::new();
        storage.create_bucket("b", "us-east-2").await.unwrap();
        let src = write_temp(&dir, "f.txt", "v").await;
        for key in ["logs/a", "logs/b", "logs/c", "logs/d", "logs/e", "other"] {
            storage.upload_file("b", key, &src).await.unwrap();
        }

        let first = storage
            .list_objects("b", Some("logs/"), &PageRequest::with_limit(2))
            .await
            .unwrap();
        let keys: Vec<_> = first.items.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["logs/a", "logs/b"]);
        assert_eq!(first.next_token.as_deref(), Some("logs/b"));

        let mut req = PageRequest::with_limit(2).after("logs/b");
        let mut rest = Vec::new();
        loop {
            let page = storage.list_objects("b", Some("logs/"), &req).await.unwrap();
            rest.extend(page.items.into_iter().map(|o| o.key));
            match page.next_token {
                Some(token) => req = req.after(token),
                None => break,
            }
        }
        assert_eq!(rest, ["logs/c", "logs/d", "logs/e"]);
    }

    #[tokio::test]
    async fn test_should_not_report_more_when_page_is_exactly_full() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::new();
        storage.create_bucket("b", "us-east-2").await.unwrap();
        let src = write_temp(&dir, "f.txt", "v").await;
        for key in ["a", "b"] {
            storage.upload_file("b", key, &src).await.unwrap();
        }

        let page = storage
            .list_objects("b", None, &PageRequest::with_limit(2))
            .await
            .unwrap();
        assert_eq!(page.len(), 2);
        assert!(!page.has_more());
    }
}
