//! Object storage facade.
//!
//! [`StorageFacade`] wraps a [`StorageBackend`]: [`SdkStorage`] talks to S3
//! through `aws-sdk-s3`, [`MemoryStorage`] keeps buckets in process memory.
//!
//! ```no_run
//! # async fn demo() -> awsfacade_core::FacadeResult<()> {
//! use awsfacade_core::FacadeConfig;
//! use awsfacade_s3::{SdkStorage, StorageFacade};
//!
//! let config = FacadeConfig::from_env();
//! let sdk_config = config.load_sdk_config().await;
//! let s3 = StorageFacade::new(
//!     SdkStorage::from_sdk_config(&sdk_config, config.force_path_style),
//!     &config,
//! );
//! let bucket = s3.get_bucket("my-bucket", true, None).await?;
//! # let _ = bucket;
//! # Ok(())
//! # }
//! ```

mod backend;
mod facade;
mod memory;
mod sdk;
mod types;

pub use backend::StorageBackend;
pub use facade::StorageFacade;
pub use memory::MemoryStorage;
pub use sdk::SdkStorage;
pub use types::{
    BucketHandle, DeleteOutcome, DeletePage, DownloadedObject, MAX_DELETE_BATCH, ObjectHandle,
    ObjectVersionRef, VersioningStatus,
};
