pub mod export;
pub mod intake;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Serialize, Serializer};

pub use intake::IntakeError;

const DATA_URL_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Self-describing encoded image: `data:<media-type>;base64,<payload>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    data_url: String,
    header_len: usize,
}

impl EncodedImage {
    pub fn from_data_url(raw: &str) -> Result<Self, IntakeError> {
        let trimmed = raw.trim();
        let (media_type, payload) = split_data_url(trimmed).ok_or(IntakeError::InvalidMedia)?;
        if !is_image_media_type(media_type) || payload.is_empty() {
            return Err(IntakeError::InvalidMedia);
        }
        Ok(Self::from_parts(media_type.to_ascii_lowercase().as_str(), payload))
    }

    pub fn from_bytes(media_type: &str, bytes: &[u8]) -> Result<Self, IntakeError> {
        let media_type = media_type.trim().to_ascii_lowercase();
        if !is_image_media_type(media_type.as_str()) || bytes.is_empty() {
            return Err(IntakeError::InvalidMedia);
        }
        Ok(Self::from_parts(
            media_type.as_str(),
            BASE64_STANDARD.encode(bytes).as_str(),
        ))
    }

    /// Wraps an already base64-encoded payload. Used for provider output, whose
    /// declared format is fixed regardless of what was sent.
    pub(crate) fn from_parts(media_type: &str, payload: &str) -> Self {
        let header = format!("{DATA_URL_PREFIX}{media_type}{BASE64_MARKER}");
        Self {
            header_len: header.len(),
            data_url: format!("{header}{payload}"),
        }
    }

    pub fn as_data_url(&self) -> &str {
        self.data_url.as_str()
    }

    pub fn media_type(&self) -> &str {
        &self.data_url[DATA_URL_PREFIX.len()..self.header_len - BASE64_MARKER.len()]
    }

    pub fn payload(&self) -> &str {
        &self.data_url[self.header_len..]
    }

    pub fn is_empty(&self) -> bool {
        self.payload().is_empty()
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(self.payload().as_bytes())
    }
}

impl Serialize for EncodedImage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_data_url())
    }
}

/// Removes a leading `data:image/<fmt>;base64,` declaration if present, leaving
/// the raw encoded bytes. Anything without such a header is returned unchanged.
pub fn strip_format_header(raw: &str) -> &str {
    match split_data_url(raw) {
        Some((media_type, payload)) if is_image_media_type(media_type) => payload,
        _ => raw,
    }
}

/// Media types compare case-insensitively, so `Image/PNG` counts.
pub fn is_image_media_type(value: &str) -> bool {
    const IMAGE_PREFIX: &str = "image/";
    value
        .get(..IMAGE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(IMAGE_PREFIX))
        && !value[IMAGE_PREFIX.len()..].trim().is_empty()
}

fn split_data_url(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix(DATA_URL_PREFIX)?;
    let (media_type, payload) = rest.split_once(BASE64_MARKER)?;
    Some((media_type, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_data_url_components() {
        let image = EncodedImage::from_data_url("data:image/png;base64,aGVsbG8=")
            .expect("png data url should parse");
        assert_eq!(image.media_type(), "image/png");
        assert_eq!(image.payload(), "aGVsbG8=");
        assert_eq!(image.decode_bytes().expect("payload decodes"), b"hello");
    }

    #[test]
    fn rejects_non_image_data_urls() {
        let err = EncodedImage::from_data_url("data:text/plain;base64,aGVsbG8=")
            .expect_err("text should be rejected");
        assert_eq!(err, IntakeError::InvalidMedia);

        let err = EncodedImage::from_data_url("not a data url").expect_err("garbage rejected");
        assert_eq!(err, IntakeError::InvalidMedia);
    }

    #[test]
    fn rejects_empty_payload() {
        let err = EncodedImage::from_data_url("data:image/jpeg;base64,")
            .expect_err("empty payload should be rejected");
        assert_eq!(err, IntakeError::InvalidMedia);

        let err = EncodedImage::from_bytes("image/png", &[]).expect_err("no bytes");
        assert_eq!(err, IntakeError::InvalidMedia);
    }

    #[test]
    fn media_type_prefix_is_case_insensitive() {
        let image = EncodedImage::from_data_url("data:Image/PNG;base64,aGVsbG8=")
            .expect("mixed-case image type should parse");
        assert_eq!(image.media_type(), "image/png");
        assert_eq!(image.as_data_url(), "data:image/png;base64,aGVsbG8=");
        assert_eq!(strip_format_header("data:IMAGE/jpeg;base64,QUJD"), "QUJD");
        assert!(!is_image_media_type("imag"));
        assert!(!is_image_media_type("IMAGE/"));
    }

    #[test]
    fn from_bytes_builds_data_url() {
        let image = EncodedImage::from_bytes("Image/JPEG", b"hello").expect("bytes encode");
        assert_eq!(image.as_data_url(), "data:image/jpeg;base64,aGVsbG8=");
    }

    #[test]
    fn strip_format_header_only_touches_image_headers() {
        assert_eq!(strip_format_header("data:image/webp;base64,QUJD"), "QUJD");
        assert_eq!(strip_format_header("QUJD"), "QUJD");
        assert_eq!(
            strip_format_header("data:text/plain;base64,QUJD"),
            "data:text/plain;base64,QUJD"
        );
    }
}
