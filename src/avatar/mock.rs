use super::{AvatarService, AvatarVariants};
use crate::error::AvatarError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Stand-in processor returning canned buffers without decoding anything.
#[derive(Clone)]
pub struct MockAvatarProcessor {
    process_count: Arc<Mutex<usize>>,
    variants: AvatarVariants,
    failure: Arc<Mutex<Option<AvatarError>>>,
}

impl MockAvatarProcessor {
    pub fn new() -> Self {
        Self {
            process_count: Arc::new(Mutex::new(0)),
            variants: AvatarVariants {
                thumbnail: b"thumbnail-webp".to_vec(),
                full: b"full-webp".to_vec(),
            },
            failure: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_variants(mut self, variants: AvatarVariants) -> Self {
        self.variants = variants;
        self
    }

    pub fn with_failure(self, error: AvatarError) -> Self {
        *self.failure.lock().unwrap() = Some(error);
        self
    }

    pub fn get_process_count(&self) -> usize {
        *self.process_count.lock().unwrap()
    }
}

impl Default for MockAvatarProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AvatarService for MockAvatarProcessor {
    async fn process_avatar(&self, _raw: &[u8]) -> Result<AvatarVariants, AvatarError> {
        *self.process_count.lock().unwrap() += 1;

        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.variants.clone())
    }
}
