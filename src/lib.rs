//! Avatar ingestion for the profile and actor APIs
//!
//! Validates uploaded images (square PNG, JPEG, WebP or single-frame GIF),
//! renders a 64×64 thumbnail and a 512×512 full-size WebP in parallel, and
//! stores both in S3-compatible object storage.

pub mod avatar;
pub mod error;
pub mod models;
pub mod storage;
pub mod uploader;

pub use error::{AvatarError, Error, Result};
