use std::fs;
use std::path::Path;

use image::ImageFormat;
use thiserror::Error;

use super::EncodedImage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Please upload an image file")]
    InvalidMedia,
    #[error("failed to read image '{path}': {message}")]
    Read { path: String, message: String },
}

/// Accepts browser-style uploads (FileReader data URLs).
pub fn accept_data_url(raw: &str) -> Result<EncodedImage, IntakeError> {
    EncodedImage::from_data_url(raw)
}

pub fn read_image_file(path: &Path) -> Result<EncodedImage, IntakeError> {
    let bytes = fs::read(path).map_err(|e| IntakeError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let media_type = media_type_for(path, bytes.as_slice()).ok_or(IntakeError::InvalidMedia)?;
    EncodedImage::from_bytes(media_type, bytes.as_slice())
}

fn media_type_for(path: &Path, bytes: &[u8]) -> Option<&'static str> {
    ImageFormat::from_path(path)
        .or_else(|_| image::guess_format(bytes))
        .ok()
        .map(|format| format.to_mime_type())
}
