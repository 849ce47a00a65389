use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::EncodedImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportTarget {
    Single,
    CountrySlot(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("result image payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("export filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn build_export(
    target: ExportTarget,
    result: &EncodedImage,
    unix_ms: i64,
) -> Result<ExportArtifact, ExportError> {
    let bytes = result.decode_bytes()?;
    let ext = extension_for_media_type(result.media_type());
    let file_name = match target {
        ExportTarget::Single => format!("reverse-ai-{unix_ms}.{ext}"),
        ExportTarget::CountrySlot(index) => {
            format!("country-transform-{}-{unix_ms}.{ext}", index + 1)
        }
    };
    Ok(ExportArtifact {
        file_name,
        media_type: result.media_type().to_string(),
        bytes,
    })
}

pub fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Writes the artifact under `dir`. Never overwrites: a name collision gets a
/// `-<n>` suffix before the extension.
pub fn write_export(dir: &Path, artifact: &ExportArtifact) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;
    let (stem, ext) = artifact
        .file_name
        .rsplit_once('.')
        .unwrap_or((artifact.file_name.as_str(), ""));
    let mut candidate = dir.join(artifact.file_name.as_str());
    let mut n = 1u32;
    while candidate.exists() {
        let name = if ext.is_empty() {
            format!("{stem}-{n}")
        } else {
            format!("{stem}-{n}.{ext}")
        };
        candidate = dir.join(name);
        n += 1;
    }
    fs::write(candidate.as_path(), artifact.bytes.as_slice())?;
    Ok(candidate)
}

fn extension_for_media_type(media_type: &str) -> &str {
    match media_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/svg+xml" => "svg",
        other => other
            .strip_prefix("image/")
            .filter(|v| !v.is_empty())
            .unwrap_or("img"),
    }
}
