use super::ObjectStore;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// In-memory [`ObjectStore`] used for dry runs and tests.
#[derive(Clone)]
pub struct MockObjectStore {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
    base_url: String,
    put_count: Arc<Mutex<usize>>,
    put_failures: Arc<Mutex<usize>>,
    failing_keys: Arc<Mutex<HashSet<String>>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(Mutex::new(HashMap::new())),
            base_url: "https://mock-storage.example.com".to_string(),
            put_count: Arc::new(Mutex::new(0)),
            put_failures: Arc::new(Mutex::new(0)),
            failing_keys: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_object(self, key: String, data: Vec<u8>, content_type: &str) -> Self {
        self.objects.lock().unwrap().insert(
            key,
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        self
    }

    /// Make the next `count` puts fail.
    pub fn with_put_failures(self, count: usize) -> Self {
        *self.put_failures.lock().unwrap() = count;
        self
    }

    /// Make every put or copy that writes `key` fail.
    pub fn with_failing_key(self, key: &str) -> Self {
        self.failing_keys.lock().unwrap().insert(key.to_string());
        self
    }

    fn check_writable(&self, key: &str) -> Result<()> {
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(Error::Storage(format!("Mock failure writing {}", key)));
        }
        Ok(())
    }

    pub fn get_put_count(&self) -> usize {
        *self.put_count.lock().unwrap()
    }

    pub fn get_object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn get_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<String> {
        *self.put_count.lock().unwrap() += 1;

        {
            let mut failures = self.put_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Storage(format!("Mock failure uploading {}", key)));
            }
        }
        self.check_writable(key)?;

        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("{}/{}", self.base_url, key))
    }

    async fn copy_object(&self, from_key: &str, to_key: &str) -> Result<()> {
        self.check_writable(to_key)?;
        let mut objects = self.objects.lock().unwrap();
        let object = objects
            .get(from_key)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("Object not found: {}", from_key)))?;
        objects.insert(to_key.to_string(), object);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_store_put_and_get() {
        let store = MockObjectStore::new();

        let url = store
            .put_object("avatars/a.webp", b"webp", "image/webp")
            .await
            .unwrap();

        assert_eq!(url, "https://mock-storage.example.com/avatars/a.webp");
        assert_eq!(store.get_put_count(), 1);

        let object = store.get_object("avatars/a.webp").unwrap();
        assert_eq!(object.data, b"webp".to_vec());
        assert_eq!(object.content_type, "image/webp");
    }

    #[tokio::test]
    async fn test_mock_store_object_exists() {
        let store = MockObjectStore::new().with_object(
            "existing.webp".to_string(),
            b"content".to_vec(),
            "image/webp",
        );

        assert!(store.object_exists("existing.webp").await.unwrap());
        assert!(!store.object_exists("missing.webp").await.unwrap());
    }

    #[tokio::test]
    async fn test_mock_store_copy_and_delete() {
        let store =
            MockObjectStore::new().with_object("old.webp".to_string(), vec![7], "image/webp");

        store.copy_object("old.webp", "new.webp").await.unwrap();
        store.delete_object("old.webp").await.unwrap();

        assert_eq!(store.get_keys(), vec!["new.webp".to_string()]);
        assert_eq!(store.get_object("new.webp").unwrap().data, vec![7]);
    }

    #[tokio::test]
    async fn test_mock_store_copy_missing_object() {
        let store = MockObjectStore::new();
        let result = store.copy_object("missing.webp", "new.webp").await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Object not found"));
    }

    #[tokio::test]
    async fn test_mock_store_put_failures() {
        let store = MockObjectStore::new().with_put_failures(1);

        assert!(store.put_object("a", b"1", "image/webp").await.is_err());
        assert!(store.put_object("a", b"1", "image/webp").await.is_ok());
        assert_eq!(store.get_put_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_store_failing_key() {
        let store = MockObjectStore::new()
            .with_object("src.webp".to_string(), vec![1], "image/webp")
            .with_failing_key("broken.webp");

        for _ in 0..3 {
            assert!(store.put_object("broken.webp", b"1", "image/webp").await.is_err());
        }
        assert!(store.copy_object("src.webp", "broken.webp").await.is_err());
        assert!(store.put_object("fine.webp", b"1", "image/webp").await.is_ok());

        assert_eq!(
            store.get_keys(),
            vec!["fine.webp".to_string(), "src.webp".to_string()]
        );
    }

    #[tokio::test]
    async fn test_mock_store_with_custom_base_url() {
        let store = MockObjectStore::new().with_base_url("https://cdn.test".to_string());

        let url = store.put_object("x.webp", b"data", "image/webp").await.unwrap();
        assert_eq!(url, "https://cdn.test/x.webp");
    }
}
