use image::ImageFormat;

/// Number of leading bytes considered when sniffing.
pub const SNIFF_LEN: usize = 512;

/// Image encodings accepted as avatar input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
}

impl AvatarFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            AvatarFormat::Png => "image/png",
            AvatarFormat::Jpeg => "image/jpeg",
            AvatarFormat::Gif => "image/gif",
            AvatarFormat::WebP => "image/webp",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            AvatarFormat::Png => ImageFormat::Png,
            AvatarFormat::Jpeg => ImageFormat::Jpeg,
            AvatarFormat::Gif => ImageFormat::Gif,
            AvatarFormat::WebP => ImageFormat::WebP,
        }
    }
}

/// Classify an upload by its content signature.
///
/// Only the first [`SNIFF_LEN`] bytes are looked at. Returns `None` for
/// anything outside the accepted set, including empty input.
pub fn sniff_format(bytes: &[u8]) -> Option<AvatarFormat> {
    let head = &bytes[..bytes.len().min(SNIFF_LEN)];
    match head {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(AvatarFormat::Png),
        [0xFF, 0xD8, 0xFF, ..] => Some(AvatarFormat::Jpeg),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(AvatarFormat::Gif),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', b'V', b'P', ..] => {
            Some(AvatarFormat::WebP)
        }
        _ => {
            tracing::debug!(
                "Unrecognized avatar signature (first bytes: {:02X?})",
                &head[..head.len().min(8)]
            );
            None
        }
    }
}
