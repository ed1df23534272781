//! Avatar ingestion pipeline
//!
//! Turns an arbitrary uploaded image into a 64×64 thumbnail and a 512×512
//! full-size WebP, rejecting anything that is not a square PNG, JPEG, WebP or
//! single-frame GIF.

pub mod decode;
pub mod mock;
pub mod processor;
pub mod sniff;

pub use decode::DecodeLimits;
pub use mock::MockAvatarProcessor;
pub use processor::{AvatarLimits, AvatarProcessor};
pub use sniff::{sniff_format, AvatarFormat};

use crate::error::AvatarError;
use async_trait::async_trait;

/// WebP quality used for every variant.
pub const WEBP_QUALITY: f32 = 80.0;

pub const FULL_SIZE: u32 = 512;
pub const THUMBNAIL_SIZE: u32 = 64;

/// One square output rendered from the decoded upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSpec {
    pub name: &'static str,
    pub size: u32,
}

/// Variants rendered for every avatar. Order is the error priority order.
pub const AVATAR_VARIANTS: [VariantSpec; 2] = [
    VariantSpec {
        name: "full",
        size: FULL_SIZE,
    },
    VariantSpec {
        name: "thumbnail",
        size: THUMBNAIL_SIZE,
    },
];

/// Encoded WebP outputs of one processing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarVariants {
    /// 64×64
    pub thumbnail: Vec<u8>,
    /// 512×512
    pub full: Vec<u8>,
}

#[async_trait]
pub trait AvatarService: Send + Sync {
    async fn process_avatar(&self, raw: &[u8]) -> Result<AvatarVariants, AvatarError>;
}
