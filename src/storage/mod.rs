//! Object storage for rendered avatars
//!
//! Uploads, copies and deletes objects in S3-compatible storage. The avatar
//! uploader receives an [`ObjectStore`] explicitly rather than reaching for a
//! global client.

pub mod client;
pub mod mock;

pub use client::S3ObjectStore;
pub use mock::MockObjectStore;

use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key` and return its public URL.
    async fn put_object(&self, key: &str, data: &[u8], content_type: &str) -> Result<String>;
    async fn copy_object(&self, from_key: &str, to_key: &str) -> Result<()>;
    async fn delete_object(&self, key: &str) -> Result<()>;
    async fn object_exists(&self, key: &str) -> Result<bool>;
}
