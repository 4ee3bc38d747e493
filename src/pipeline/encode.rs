//! Portrait encoding: raw image bytes ⇄ base64 `data:` URL.
//!
//! A profile stores its portrait as a data URL so the whole profile stays a
//! self-contained JSON value. Only PNG and JPEG are accepted; the format is
//! sniffed from the bytes rather than trusted from a file name.

use crate::error::BioCraftError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use tracing::debug;

/// A decoded portrait ready to embed in a document package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub format: PortraitFormat,
}

/// Supported portrait formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortraitFormat {
    Png,
    Jpeg,
}

impl PortraitFormat {
    pub fn mime(self) -> &'static str {
        match self {
            PortraitFormat::Png => "image/png",
            PortraitFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            PortraitFormat::Png => "png",
            PortraitFormat::Jpeg => "jpeg",
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(PortraitFormat::Png),
            "image/jpeg" | "image/jpg" => Some(PortraitFormat::Jpeg),
            _ => None,
        }
    }
}

/// Sniff the image format of `bytes`.
pub fn sniff_format(bytes: &[u8]) -> Result<PortraitFormat, BioCraftError> {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Ok(PortraitFormat::Png),
        Ok(ImageFormat::Jpeg) => Ok(PortraitFormat::Jpeg),
        Ok(other) => Err(BioCraftError::InvalidImage {
            detail: format!("unsupported format {other:?}, use PNG or JPEG"),
        }),
        Err(e) => Err(BioCraftError::InvalidImage {
            detail: e.to_string(),
        }),
    }
}

/// Encode image bytes as a `data:image/...;base64,` URL.
pub fn to_data_url(bytes: &[u8]) -> Result<String, BioCraftError> {
    let format = sniff_format(bytes)?;
    debug!("Encoding {} byte {} portrait", bytes.len(), format.mime());
    Ok(format!("data:{};base64,{}", format.mime(), STANDARD.encode(bytes)))
}

/// Decode a data URL produced by [`to_data_url`].
pub fn from_data_url(url: &str) -> Result<DecodedImage, BioCraftError> {
    let invalid = |detail: &str| BioCraftError::InvalidImage {
        detail: detail.to_string(),
    };

    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| invalid("not a data URL"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("data URL has no payload"))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| invalid("data URL is not base64 encoded"))?;
    let declared =
        PortraitFormat::from_mime(mime).ok_or_else(|| invalid("data URL is not PNG or JPEG"))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| BioCraftError::InvalidImage {
            detail: format!("base64: {e}"),
        })?;
    let format = sniff_format(&bytes)?;
    if format != declared {
        debug!(
            "Portrait declared as {} but sniffed as {}",
            declared.mime(),
            format.mime()
        );
    }
    Ok(DecodedImage { bytes, format })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0";

    #[test]
    fn png_and_jpeg_are_accepted() {
        assert_eq!(sniff_format(PNG_MAGIC).unwrap(), PortraitFormat::Png);
        assert_eq!(sniff_format(JPEG_MAGIC).unwrap(), PortraitFormat::Jpeg);
    }

    #[test]
    fn other_bytes_are_rejected() {
        let err = sniff_format(b"GIF89a\0\0\0\0").unwrap_err();
        assert!(matches!(err, BioCraftError::InvalidImage { .. }));
        assert!(sniff_format(b"hello").is_err());
    }

    #[test]
    fn data_url_carries_mime_and_decodes() {
        let url = to_data_url(PNG_MAGIC).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        let decoded = from_data_url(&url).unwrap();
        assert_eq!(decoded.bytes, PNG_MAGIC);
        assert_eq!(decoded.format, PortraitFormat::Png);
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert!(from_data_url("image/png;base64,AAAA").is_err());
        assert!(from_data_url("data:image/png;base64").is_err());
        assert!(from_data_url("data:image/gif;base64,R0lG").is_err());
        assert!(from_data_url("data:image/png,plain").is_err());
    }
}
