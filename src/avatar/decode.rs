//! Format-specific decoding of sniffed uploads.
//!
//! Every decoder failure is reported as [`AvatarError::InvalidType`]; the
//! underlying cause only reaches the logs.

use super::sniff::AvatarFormat;
use crate::error::AvatarError;
use image::{DynamicImage, ImageReader, Limits, RgbaImage};
use std::io::Cursor;

/// Resource bounds applied to every decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_dimension: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_dimension: 8192,
        }
    }
}

impl DecodeLimits {
    fn to_image_limits(self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_dimension);
        limits.max_image_height = Some(self.max_dimension);
        limits
    }
}

/// Decode `bytes` as `format` into a raster.
///
/// GIFs must contain exactly one frame; the raster is that frame at its own
/// size, not the logical screen it is placed on.
pub fn decode_avatar(
    bytes: &[u8],
    format: AvatarFormat,
    limits: &DecodeLimits,
) -> Result<DynamicImage, AvatarError> {
    match format {
        AvatarFormat::Gif => decode_single_frame_gif(bytes, limits),
        AvatarFormat::Png | AvatarFormat::Jpeg | AvatarFormat::WebP => {
            let mut reader = ImageReader::with_format(Cursor::new(bytes), format.image_format());
            reader.limits(limits.to_image_limits());
            reader.decode().map_err(|e| {
                tracing::debug!("Failed to decode {} avatar: {}", format.mime_type(), e);
                AvatarError::InvalidType
            })
        }
    }
}

/// Decodes every frame, holding at most the first frame and one scratch
/// buffer in memory.
fn decode_single_frame_gif(
    bytes: &[u8],
    limits: &DecodeLimits,
) -> Result<DynamicImage, AvatarError> {
    let invalid = |e: gif::DecodingError| {
        tracing::debug!("Failed to decode GIF avatar: {}", e);
        AvatarError::InvalidType
    };

    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options.read_info(Cursor::new(bytes)).map_err(invalid)?;

    let mut first: Option<RgbaImage> = None;
    let mut scratch = Vec::new();
    let mut frame_count = 0usize;

    loop {
        let Some(frame) = decoder.next_frame_info().map_err(invalid)? else {
            break;
        };
        let (width, height) = (u32::from(frame.width), u32::from(frame.height));
        if width == 0
            || height == 0
            || width > limits.max_dimension
            || height > limits.max_dimension
        {
            tracing::debug!("Rejecting GIF avatar frame of {}x{}", width, height);
            return Err(AvatarError::InvalidType);
        }
        frame_count += 1;

        if first.is_none() {
            let mut pixels = vec![0u8; decoder.buffer_size()];
            decoder.read_into_buffer(&mut pixels).map_err(invalid)?;
            let raster =
                RgbaImage::from_raw(width, height, pixels).ok_or(AvatarError::InvalidType)?;
            first = Some(raster);
        } else {
            scratch.resize(decoder.buffer_size(), 0);
            decoder.read_into_buffer(&mut scratch).map_err(invalid)?;
        }
    }

    if frame_count != 1 {
        tracing::debug!("Rejecting GIF avatar with {} frames", frame_count);
        return Err(AvatarError::InvalidType);
    }
    first
        .map(DynamicImage::ImageRgba8)
        .ok_or(AvatarError::InvalidType)
}
