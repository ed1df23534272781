use super::decode::{decode_avatar, DecodeLimits};
use super::sniff::sniff_format;
use super::{AvatarService, AvatarVariants, VariantSpec, AVATAR_VARIANTS, WEBP_QUALITY};
use crate::error::AvatarError;
use async_trait::async_trait;
use futures::future::join_all;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

/// Hard bounds for a single processing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvatarLimits {
    pub max_upload_bytes: usize,
    pub max_dimension: u32,
    /// Deadline for the whole resize/encode task group.
    pub encode_timeout: Duration,
}

impl Default for AvatarLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            max_dimension: DecodeLimits::default().max_dimension,
            encode_timeout: Duration::from_secs(30),
        }
    }
}

/// Decodes, validates and renders avatar uploads.
#[derive(Debug, Clone, Default)]
pub struct AvatarProcessor {
    limits: AvatarLimits,
}

impl AvatarProcessor {
    pub fn new(limits: AvatarLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &AvatarLimits {
        &self.limits
    }

    /// Buffer an upload stream and process it.
    pub async fn process_reader<R>(&self, reader: R) -> Result<AvatarVariants, AvatarError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let raw = self.buffer_upload(reader).await?;
        self.process_owned(raw).await
    }

    async fn buffer_upload<R>(&self, reader: R) -> Result<Vec<u8>, AvatarError>
    where
        R: AsyncRead + Unpin + Send,
    {
        // One byte past the limit is enough to tell an oversized upload apart.
        let cap = self.limits.max_upload_bytes as u64 + 1;
        let mut raw = Vec::new();
        reader
            .take(cap)
            .read_to_end(&mut raw)
            .await
            .map_err(|e| {
                warn!("Failed to read avatar upload: {}", e);
                AvatarError::Internal
            })?;
        self.check_size(raw.len())?;
        Ok(raw)
    }

    fn check_size(&self, len: usize) -> Result<(), AvatarError> {
        if len > self.limits.max_upload_bytes {
            debug!(
                "Rejecting avatar upload over {} bytes",
                self.limits.max_upload_bytes
            );
            return Err(AvatarError::TooLarge {
                limit: self.limits.max_upload_bytes,
            });
        }
        Ok(())
    }

    async fn process_owned(&self, raw: Vec<u8>) -> Result<AvatarVariants, AvatarError> {
        let decode_limits = DecodeLimits {
            max_dimension: self.limits.max_dimension,
        };
        let image = tokio::task::spawn_blocking(move || prepare_avatar(&raw, &decode_limits))
            .await
            .map_err(|e| {
                warn!("Avatar decode task join error: {}", e);
                AvatarError::Internal
            })??;

        let results = tokio::time::timeout(
            self.limits.encode_timeout,
            render_variants(Arc::new(image), &AVATAR_VARIANTS),
        )
        .await
        .map_err(|_| {
            warn!(
                "Avatar variants not ready after {:?}, giving up",
                self.limits.encode_timeout
            );
            AvatarError::Internal
        })?;

        let [full, thumbnail]: [Vec<u8>; 2] = collect_variants(results)?;
        info!(
            "Processed avatar: full {} bytes, thumbnail {} bytes",
            full.len(),
            thumbnail.len()
        );
        Ok(AvatarVariants { thumbnail, full })
    }
}

#[async_trait]
impl AvatarService for AvatarProcessor {
    async fn process_avatar(&self, raw: &[u8]) -> Result<AvatarVariants, AvatarError> {
        self.check_size(raw.len())?;
        self.process_owned(raw.to_vec()).await
    }
}

/// Sniff, decode and validate an upload into a square raster.
pub fn prepare_avatar(raw: &[u8], limits: &DecodeLimits) -> Result<DynamicImage, AvatarError> {
    let format = sniff_format(raw).ok_or(AvatarError::InvalidType)?;
    let image = decode_avatar(raw, format, limits)?;

    let (width, height) = image.dimensions();
    if width != height {
        debug!("Rejecting {}x{} {} avatar", width, height, format.mime_type());
        return Err(AvatarError::InvalidResolution);
    }
    Ok(image)
}

/// Render every variant in parallel from one shared raster.
///
/// Waits for all tasks. Result `i` always belongs to `specs[i]`.
pub async fn render_variants(
    image: Arc<DynamicImage>,
    specs: &[VariantSpec],
) -> Vec<Result<Vec<u8>, AvatarError>> {
    let tasks = specs.iter().map(|spec| {
        let image = Arc::clone(&image);
        let spec = *spec;
        tokio::task::spawn_blocking(move || encode_variant(&image, spec))
    });

    join_all(tasks)
        .await
        .into_iter()
        .zip(specs)
        .map(|(joined, spec)| {
            joined.unwrap_or_else(|e| {
                warn!("Avatar variant {} task join error: {}", spec.name, e);
                Err(AvatarError::Internal)
            })
        })
        .collect()
}

/// Resize to `spec.size` square with Lanczos3 and encode lossy WebP.
pub fn encode_variant(image: &DynamicImage, spec: VariantSpec) -> Result<Vec<u8>, AvatarError> {
    let resized = image.resize_exact(spec.size, spec.size, FilterType::Lanczos3);
    let rgba = DynamicImage::ImageRgba8(resized.to_rgba8());

    let encoder = webp::Encoder::from_image(&rgba).map_err(|e| {
        warn!("Failed to prepare {} WebP encoder: {}", spec.name, e);
        AvatarError::Internal
    })?;
    let encoded = encoder.encode_simple(false, WEBP_QUALITY).map_err(|e| {
        warn!("Failed to encode {} avatar variant: {:?}", spec.name, e);
        AvatarError::Internal
    })?;
    Ok(encoded.to_vec())
}

/// All-or-nothing: the first failure in table order wins.
fn collect_variants<const N: usize>(
    results: Vec<Result<Vec<u8>, AvatarError>>,
) -> Result<[Vec<u8>; N], AvatarError> {
    let buffers = results
        .into_iter()
        .map(|result| result.map_err(|_| AvatarError::Internal))
        .collect::<Result<Vec<_>, _>>()?;
    buffers.try_into().map_err(|_| AvatarError::Internal)
}
