//! Storage facade integration tests.

#[cfg(test)]
mod tests {
    use std::path::Path;

    use awsfacade_core::PageRequest;
    use awsfacade_s3::{SdkStorage, StorageFacade, VersioningStatus};

    use crate::{facade_config, s3_client, sdk_config, unique_name};

    fn storage() -> StorageFacade<SdkStorage> {
        let config = facade_config();
        StorageFacade::new(SdkStorage::from_sdk_config(&sdk_config(), true), &config)
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_get_or_create_bucket() {
        let s3 = storage();
        let bucket = unique_name("get");

        assert!(s3.get_bucket(&bucket, false, None).await.unwrap().is_none());
        let handle = s3.get_bucket(&bucket, true, None).await.unwrap().unwrap();
        assert_eq!(handle.name, bucket);
        assert!(handle.creation_date.is_some());
        s3_client().head_bucket().bucket(&bucket).send().await.unwrap();

        assert_eq!(s3.delete_buckets(Some(&bucket)).await.unwrap(), 1);
        assert!(s3.get_bucket(&bucket, false, None).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_round_trip_file_through_bucket() {
        let s3 = storage();
        let bucket = unique_name("file");
        s3.create_bucket(&bucket, None).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("report.txt");
        tokio::fs::write(&source, b"quarterly numbers").await.unwrap();

        let uploaded = s3.upload_object(&bucket, &source, None).await.unwrap();
        assert_eq!(uploaded.key, source.to_string_lossy());

        let head = s3_client()
            .head_object()
            .bucket(&bucket)
            .key(&uploaded.key)
            .send()
            .await
            .unwrap();
        assert_eq!(head.content_length(), Some(17));
        assert_eq!(head.e_tag(), uploaded.e_tag.as_deref());

        let out = tempfile::tempdir().unwrap();
        let downloaded = s3
            .download_object(&bucket, &uploaded.key, Some(out.path()), None)
            .await
            .unwrap();
        assert_eq!(downloaded.path, out.path().join("report.txt"));
        let body = tokio::fs::read(&downloaded.path).await.unwrap();
        assert_eq!(body, b"quarterly numbers");

        s3.delete_all_object_versions(&bucket, None, 100).await.unwrap();
        s3.delete_buckets(Some(&bucket)).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_delete_every_version_in_batches() {
        let s3 = storage();
        let bucket = unique_name("ver");
        s3.create_bucket(&bucket, None).await.unwrap();
        assert_eq!(
            s3.enable_versioning(&bucket).await.unwrap(),
            VersioningStatus::Enabled
        );

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("v.txt");
        for rev in 0..3 {
            tokio::fs::write(&source, format!("rev {rev}")).await.unwrap();
            s3.upload_object(&bucket, &source, Some("p/")).await.unwrap();
        }
        s3.upload_object(&bucket, Path::new(&source), Some("q/"))
            .await
            .unwrap();

        let versions = s3
            .list_object_versions(&bucket, Some("p/"), &PageRequest::first())
            .await
            .unwrap();
        assert_eq!(versions.len(), 3);

        let deleted = s3.delete_all_object_versions(&bucket, Some("p/"), 2).await.unwrap();
        assert_eq!(deleted, 3);
        let remaining = s3
            .list_objects(&bucket, None, &PageRequest::first())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);

        s3.delete_all_object_versions(&bucket, None, 100).await.unwrap();
        s3.delete_buckets(Some(&bucket)).await.unwrap();
    }
}
