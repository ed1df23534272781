//! Upload handling for avatars: process once, store both variants.

use crate::avatar::AvatarService;
use crate::models::{AvatarKeys, AvatarOwner, StoredAvatar};
use crate::storage::ObjectStore;
use crate::Result;
use std::sync::Arc;
use tokio_retry::{strategy::FixedInterval, Retry};
use tracing::{error, info, warn};

const WEBP_CONTENT_TYPE: &str = "image/webp";

/// Runs the avatar processor and manages the stored variants of an owner.
pub struct AvatarUploader {
    processor: Arc<dyn AvatarService>,
    store: Arc<dyn ObjectStore>,
    retry_interval_ms: u64,
    max_retries: usize,
}

impl AvatarUploader {
    pub fn new(processor: Arc<dyn AvatarService>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            processor,
            store,
            retry_interval_ms: 500,
            max_retries: 3,
        }
    }

    pub fn with_retry(mut self, interval_ms: u64, max_retries: usize) -> Self {
        self.retry_interval_ms = interval_ms;
        self.max_retries = max_retries;
        self
    }

    /// Process `raw` and upload both variants under `name`.
    ///
    /// Nothing is stored when processing fails, and a variant that was stored
    /// is removed again when the other one could not be.
    pub async fn upload(&self, owner: AvatarOwner, name: &str, raw: &[u8]) -> Result<StoredAvatar> {
        let keys = AvatarKeys::new(&owner, name)?;

        let variants = self.processor.process_avatar(raw).await.map_err(|e| {
            if e.is_validation() {
                info!("[{}] Rejected avatar upload: {}", owner, e);
            } else {
                error!("[{}] Avatar processing failed", owner);
            }
            e
        })?;

        let (thumbnail_url, full_url) = match tokio::join!(
            self.put_with_retry(&keys.thumbnail, &variants.thumbnail),
            self.put_with_retry(&keys.full, &variants.full)
        ) {
            (Ok(thumbnail_url), Ok(full_url)) => (thumbnail_url, full_url),
            (Ok(_), Err(e)) => {
                self.discard(&keys.thumbnail).await;
                return Err(e);
            }
            (Err(e), Ok(_)) => {
                self.discard(&keys.full).await;
                return Err(e);
            }
            (Err(e), Err(_)) => return Err(e),
        };
        info!("[{}] Uploaded avatar {}", owner, name);

        Ok(StoredAvatar {
            owner,
            name: name.to_string(),
            thumbnail_key: keys.thumbnail,
            full_key: keys.full,
            thumbnail_url,
            full_url,
        })
    }

    pub async fn delete(&self, owner: AvatarOwner, name: &str) -> Result<()> {
        let keys = AvatarKeys::new(&owner, name)?;

        self.store.delete_object(&keys.thumbnail).await?;
        self.store.delete_object(&keys.full).await?;
        info!("[{}] Deleted avatar {}", owner, name);
        Ok(())
    }

    /// Move both variants from `old_name` to `new_name`.
    pub async fn rename(&self, owner: AvatarOwner, old_name: &str, new_name: &str) -> Result<()> {
        let old = AvatarKeys::new(&owner, old_name)?;
        let new = AvatarKeys::new(&owner, new_name)?;
        if old == new {
            return Ok(());
        }

        // Copy both before deleting anything so a failed copy leaves the old avatar intact.
        self.store.copy_object(&old.thumbnail, &new.thumbnail).await?;
        if let Err(e) = self.store.copy_object(&old.full, &new.full).await {
            self.discard(&new.thumbnail).await;
            return Err(e);
        }
        self.store.delete_object(&old.thumbnail).await?;
        self.store.delete_object(&old.full).await?;

        info!("[{}] Renamed avatar {} to {}", owner, old_name, new_name);
        Ok(())
    }

    /// Best-effort removal of a half-written avatar.
    async fn discard(&self, key: &str) {
        if let Err(e) = self.store.delete_object(key).await {
            warn!("Failed to clean up {}: {}", key, e);
        }
    }

    async fn put_with_retry(&self, key: &str, data: &[u8]) -> Result<String> {
        let retry_strategy = FixedInterval::from_millis(self.retry_interval_ms).take(self.max_retries);

        Retry::spawn(retry_strategy, || async move {
            self.store
                .put_object(key, data, WEBP_CONTENT_TYPE)
                .await
                .map_err(|e| {
                    warn!("Upload of {} failed: {}. Will retry...", key, e);
                    e
                })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::{AvatarVariants, MockAvatarProcessor};
    use crate::error::{AvatarError, Error};
    use crate::storage::MockObjectStore;
    use pretty_assertions::assert_eq;

    fn build_uploader(processor: MockAvatarProcessor, store: MockObjectStore) -> AvatarUploader {
        AvatarUploader::new(Arc::new(processor), Arc::new(store)).with_retry(1, 3)
    }

    #[tokio::test]
    async fn test_upload_stores_both_variants() {
        let processor = MockAvatarProcessor::new().with_variants(AvatarVariants {
            thumbnail: vec![6, 4],
            full: vec![5, 1, 2],
        });
        let store = MockObjectStore::new().with_base_url("https://cdn.test".to_string());
        let uploader = build_uploader(processor.clone(), store.clone());

        let stored = uploader
            .upload(AvatarOwner::User(9), "me", b"raw")
            .await
            .unwrap();

        assert_eq!(stored.thumbnail_key, "avatars/users/9/me_64.webp");
        assert_eq!(stored.full_key, "avatars/users/9/me_512.webp");
        assert_eq!(stored.thumbnail_url, "https://cdn.test/avatars/users/9/me_64.webp");
        assert_eq!(stored.full_url, "https://cdn.test/avatars/users/9/me_512.webp");

        let thumbnail = store.get_object(&stored.thumbnail_key).unwrap();
        assert_eq!(thumbnail.data, vec![6, 4]);
        assert_eq!(thumbnail.content_type, "image/webp");
        assert_eq!(store.get_object(&stored.full_key).unwrap().data, vec![5, 1, 2]);
        assert_eq!(processor.get_process_count(), 1);
    }

    #[tokio::test]
    async fn test_upload_validation_failure_stores_nothing() {
        let store = MockObjectStore::new();
        let uploader = build_uploader(
            MockAvatarProcessor::new().with_failure(AvatarError::InvalidType),
            store.clone(),
        );

        let err = uploader
            .upload(AvatarOwner::Actor(1), "headshot", b"raw")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Avatar(AvatarError::InvalidType)));
        assert!(err.client_message().starts_with("invalid type avatar"));
        assert!(store.get_keys().is_empty());
        assert_eq!(store.get_put_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_name_before_processing() {
        let processor = MockAvatarProcessor::new();
        let uploader = build_uploader(processor.clone(), MockObjectStore::new());

        let err = uploader
            .upload(AvatarOwner::User(1), "../../etc", b"raw")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidName(_)));
        assert_eq!(processor.get_process_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_retries_transient_storage_failures() {
        let store = MockObjectStore::new().with_put_failures(2);
        let uploader = build_uploader(MockAvatarProcessor::new(), store.clone());

        uploader
            .upload(AvatarOwner::User(2), "avatar", b"raw")
            .await
            .unwrap();

        assert_eq!(store.get_put_count(), 4);
        assert_eq!(store.get_keys().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_gives_up_after_retries() {
        let store = MockObjectStore::new().with_put_failures(100);
        let uploader = build_uploader(MockAvatarProcessor::new(), store.clone());

        let err = uploader
            .upload(AvatarOwner::User(2), "avatar", b"raw")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(err.client_message(), "internal server error");
    }

    #[tokio::test]
    async fn test_delete_removes_both_variants() {
        let store = MockObjectStore::new()
            .with_object("avatars/users/3/old_64.webp".to_string(), vec![1], "image/webp")
            .with_object("avatars/users/3/old_512.webp".to_string(), vec![2], "image/webp")
            .with_object("avatars/users/4/old_64.webp".to_string(), vec![3], "image/webp");
        let uploader = build_uploader(MockAvatarProcessor::new(), store.clone());

        uploader.delete(AvatarOwner::User(3), "old").await.unwrap();

        assert_eq!(store.get_keys(), vec!["avatars/users/4/old_64.webp".to_string()]);
    }

    #[tokio::test]
    async fn test_rename_moves_both_variants() {
        let store = MockObjectStore::new()
            .with_object("avatars/actors/5/a_64.webp".to_string(), vec![1], "image/webp")
            .with_object("avatars/actors/5/a_512.webp".to_string(), vec![2], "image/webp");
        let uploader = build_uploader(MockAvatarProcessor::new(), store.clone());

        uploader.rename(AvatarOwner::Actor(5), "a", "b").await.unwrap();

        assert_eq!(
            store.get_keys(),
            vec![
                "avatars/actors/5/b_512.webp".to_string(),
                "avatars/actors/5/b_64.webp".to_string(),
            ]
        );
        assert_eq!(store.get_object("avatars/actors/5/b_64.webp").unwrap().data, vec![1]);
    }

    #[tokio::test]
    async fn test_rename_missing_avatar_keeps_store_untouched() {
        let store = MockObjectStore::new()
            .with_object("avatars/actors/5/a_64.webp".to_string(), vec![1], "image/webp");
        let uploader = build_uploader(MockAvatarProcessor::new(), store.clone());

        let result = uploader.rename(AvatarOwner::Actor(5), "a", "b").await;

        assert!(result.is_err());
        assert_eq!(store.get_keys(), vec!["avatars/actors/5/a_64.webp".to_string()]);
    }

    #[tokio::test]
    async fn test_rename_failed_full_copy_removes_new_thumbnail() {
        let store = MockObjectStore::new()
            .with_object("avatars/actors/5/a_64.webp".to_string(), vec![1], "image/webp")
            .with_object("avatars/actors/5/a_512.webp".to_string(), vec![2], "image/webp")
            .with_failing_key("avatars/actors/5/b_512.webp");
        let uploader = build_uploader(MockAvatarProcessor::new(), store.clone());

        let err = uploader
            .rename(AvatarOwner::Actor(5), "a", "b")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(
            store.get_keys(),
            vec![
                "avatars/actors/5/a_512.webp".to_string(),
                "avatars/actors/5/a_64.webp".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_upload_permanent_failure_of_one_variant_stores_nothing() {
        let store = MockObjectStore::new().with_failing_key("avatars/users/2/avatar_512.webp");
        let uploader = build_uploader(MockAvatarProcessor::new(), store.clone());

        let err = uploader
            .upload(AvatarOwner::User(2), "avatar", b"raw")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Storage(_)));
        // One thumbnail put, then the initial full put plus three retries.
        assert_eq!(store.get_put_count(), 5);
        assert!(store.get_keys().is_empty());
    }

    #[tokio::test]
    async fn test_upload_permanent_failure_of_thumbnail_stores_nothing() {
        let store = MockObjectStore::new().with_failing_key("avatars/users/2/avatar_64.webp");
        let uploader = build_uploader(MockAvatarProcessor::new(), store.clone());

        assert!(uploader
            .upload(AvatarOwner::User(2), "avatar", b"raw")
            .await
            .is_err());
        assert!(store.get_keys().is_empty());
    }
}
