//! Data models and structures
//!
//! Avatar ownership, storage keys, the result of an upload, and the
//! environment-driven configuration.

use crate::avatar::{AvatarLimits, FULL_SIZE, THUMBNAIL_SIZE};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Entity an avatar belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum AvatarOwner {
    User(u64),
    Actor(u64),
}

impl AvatarOwner {
    pub fn kind(&self) -> &'static str {
        match self {
            AvatarOwner::User(_) => "users",
            AvatarOwner::Actor(_) => "actors",
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            AvatarOwner::User(id) | AvatarOwner::Actor(id) => *id,
        }
    }
}

impl fmt::Display for AvatarOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind(), self.id())
    }
}

/// Object keys of both variants of one named avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarKeys {
    pub thumbnail: String,
    pub full: String,
}

impl AvatarKeys {
    /// Keys for `name`, which must be non-empty ASCII alphanumerics, `-` or `_`.
    pub fn new(owner: &AvatarOwner, name: &str) -> Result<Self> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::InvalidName(name.to_string()));
        }

        let prefix = format!("avatars/{}/{}", owner, name);
        Ok(Self {
            thumbnail: format!("{}_{}.webp", prefix, THUMBNAIL_SIZE),
            full: format!("{}_{}.webp", prefix, FULL_SIZE),
        })
    }
}

/// Where an uploaded avatar ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAvatar {
    pub owner: AvatarOwner,
    pub name: String,
    pub thumbnail_key: String,
    pub full_key: String,
    pub thumbnail_url: String,
    pub full_url: String,
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub max_upload_bytes: usize,
    pub max_dimension: u32,
    pub encode_timeout: Duration,
    pub dry_run: bool,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_bucket: String,
    pub s3_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AvatarLimits::default();

        let dry_run = lookup("DRY_RUN")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            max_upload_bytes: parse_var(&lookup, "AVATAR_MAX_UPLOAD_BYTES")?
                .unwrap_or(defaults.max_upload_bytes),
            max_dimension: parse_var(&lookup, "AVATAR_MAX_DIMENSION")?
                .unwrap_or(defaults.max_dimension),
            encode_timeout: parse_var(&lookup, "AVATAR_ENCODE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.encode_timeout),
            dry_run,
            s3_access_key_id: lookup("S3_ACCESS_KEY_ID"),
            s3_secret_access_key: lookup("S3_SECRET_ACCESS_KEY"),
            s3_endpoint: lookup("S3_ENDPOINT")
                .unwrap_or_else(|| "https://s3.amazonaws.com".to_string()),
            s3_region: lookup("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            s3_bucket: lookup("S3_BUCKET").unwrap_or_else(|| "avatars".to_string()),
            s3_base_url: lookup("S3_BASE_URL")
                .unwrap_or_else(|| "https://avatars.s3.amazonaws.com".to_string()),
        })
    }

    /// Access key pair, required whenever real storage is used.
    pub fn s3_credentials(&self) -> Result<(String, String)> {
        let access_key_id = self
            .s3_access_key_id
            .clone()
            .ok_or_else(|| Error::Config("S3_ACCESS_KEY_ID not set".to_string()))?;
        let secret_access_key = self
            .s3_secret_access_key
            .clone()
            .ok_or_else(|| Error::Config("S3_SECRET_ACCESS_KEY not set".to_string()))?;
        Ok((access_key_id, secret_access_key))
    }

    pub fn avatar_limits(&self) -> AvatarLimits {
        AvatarLimits {
            max_upload_bytes: self.max_upload_bytes,
            max_dimension: self.max_dimension,
            encode_timeout: self.encode_timeout,
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("{} is invalid ({:?}): {}", key, raw, e)))
        })
        .transpose()
}
