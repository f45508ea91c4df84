//! Handle types returned by the storage facade.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of version records a single batch delete may carry.
///
/// This is a provider limit; callers of
/// [`StorageFacade::delete_object_versions`](crate::StorageFacade::delete_object_versions)
/// must keep their page size at or below it.
pub const MAX_DELETE_BATCH: usize = 1000;

/// Lightweight reference to a bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketHandle {
    /// Bucket name.
    pub name: String,
    /// Region the bucket lives in, when the provider reports it.
    pub region: Option<String>,
    /// Creation timestamp; its presence is what marks the bucket as existing.
    pub creation_date: Option<DateTime<Utc>>,
}

/// Reference to a stored object (one version of one key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectHandle {
    /// Containing bucket.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Version id, if the bucket is (or was) versioned.
    pub version_id: Option<String>,
    /// Object size in bytes.
    pub size: Option<u64>,
    /// Entity tag as reported by the provider.
    pub e_tag: Option<String>,
    /// Last-modified timestamp.
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectHandle {
    /// Handle with only bucket and key known.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            version_id: None,
            size: None,
            e_tag: None,
            last_modified: None,
        }
    }
}

/// One version record of a key: either an object version or a delete marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectVersionRef {
    /// Object key.
    pub key: String,
    /// Version id (`"null"` for objects written while versioning was off).
    pub version_id: String,
    /// Whether this record is a delete marker.
    pub is_delete_marker: bool,
    /// Whether this is the newest record for its key.
    pub is_latest: bool,
}

/// Bucket versioning status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersioningStatus {
    /// Versioning has never been enabled on this bucket.
    #[default]
    Disabled,
    /// Versioning is currently enabled.
    Enabled,
    /// Versioning was previously enabled but is now suspended.
    Suspended,
}

impl VersioningStatus {
    /// Provider spelling of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "Disabled",
            Self::Enabled => "Enabled",
            Self::Suspended => "Suspended",
        }
    }
}

impl fmt::Display for VersioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a download: the object that was fetched and where it landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedObject {
    /// The fetched object version.
    pub object: ObjectHandle,
    /// Local file the content was written to.
    pub path: PathBuf,
}

/// Result of deleting one page of version records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Version records listed on the page.
    pub listed: usize,
    /// Version records the provider confirmed deleted.
    pub deleted: usize,
}

/// [`DeleteOutcome`] plus the listing cursor following the deleted page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletePage {
    /// Counts for this page.
    pub outcome: DeleteOutcome,
    /// Token for the next page of the version listing.
    pub next_token: Option<String>,
}
