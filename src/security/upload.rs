//! Avatar upload validation.
//!
//! Declared metadata (filename, MIME type) is untrusted. It is whitelisted
//! first, then the leading bytes are sniffed; the detected format, not the
//! declared one, decides acceptance.

use std::fmt;

use thiserror::Error;

use crate::config::UploadConfig;

/// 2 MiB.
pub const DEFAULT_MAX_BYTES: usize = 2 * 1024 * 1024;

pub const ALLOWED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg", "image/webp"];
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: [u8; 3] = [0xFF, 0xD8, 0xFF];
const RIFF_TAG: &[u8; 4] = b"RIFF";
const WEBP_TAG: &[u8; 4] = b"WEBP";

/// Shortest input the sniffer will classify.
const MIN_SNIFF_LEN: usize = 8;

/// Image format detected from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    /// Classify `bytes` by signature. Inputs shorter than 8 bytes never match.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < MIN_SNIFF_LEN {
            return None;
        }
        if bytes.starts_with(&PNG_SIGNATURE) {
            return Some(ImageFormat::Png);
        }
        if bytes.starts_with(&JPEG_SIGNATURE) {
            return Some(ImageFormat::Jpeg);
        }
        if bytes.len() >= 12 && &bytes[0..4] == RIFF_TAG && &bytes[8..12] == WEBP_TAG {
            return Some(ImageFormat::Webp);
        }
        None
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Webp => "WEBP",
        })
    }
}

/// Reason an upload was rejected. Messages are shown to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileValidationError {
    #[error("File is empty")]
    Empty,

    #[error("File size exceeds {} limit", human_size(.max))]
    TooLarge { size: usize, max: usize },

    #[error("Only PNG, JPG, JPEG, and WEBP files are allowed")]
    UnsupportedMimeType(String),

    #[error("Only PNG, JPG, JPEG, and WEBP files are allowed")]
    UnsupportedExtension(String),

    #[error("File content is not a valid PNG, JPEG, or WEBP image")]
    SignatureMismatch,
}

impl FileValidationError {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileValidationError::Empty => "empty",
            FileValidationError::TooLarge { .. } => "too_large",
            FileValidationError::UnsupportedMimeType(_) => "unsupported_mime_type",
            FileValidationError::UnsupportedExtension(_) => "unsupported_extension",
            FileValidationError::SignatureMismatch => "signature_mismatch",
        }
    }
}

fn human_size(bytes: &usize) -> String {
    let bytes = *bytes;
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{}MB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{}KB", bytes / 1024)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Result of validating one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Accepted(ImageFormat),
    Rejected(FileValidationError),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }

    pub fn into_result(self) -> Result<ImageFormat, FileValidationError> {
        match self {
            ValidationOutcome::Accepted(format) => Ok(format),
            ValidationOutcome::Rejected(reason) => Err(reason),
        }
    }
}

/// Lowercased text after the last `.`, or empty if there is none.
pub fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Stateless validator; pure computation over already-buffered bytes.
#[derive(Debug, Clone, Copy)]
pub struct FileValidator {
    max_bytes: usize,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

impl FileValidator {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.max_bytes)
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Checks run in order and stop at the first failure:
    /// empty, size, MIME whitelist, extension whitelist, signature.
    pub fn validate(&self, bytes: &[u8], filename: &str, mime_type: &str) -> ValidationOutcome {
        match self.check(bytes, filename, mime_type) {
            Ok(format) => {
                tracing::debug!(filename = %filename, format = %format, size = bytes.len(), "Upload accepted");
                ValidationOutcome::Accepted(format)
            }
            Err(reason) => {
                tracing::warn!(
                    filename = %filename,
                    mime_type = %mime_type,
                    size = bytes.len(),
                    reason = reason.as_str(),
                    "Upload rejected"
                );
                ValidationOutcome::Rejected(reason)
            }
        }
    }

    fn check(&self, bytes: &[u8], filename: &str, mime_type: &str) -> Result<ImageFormat, FileValidationError> {
        if bytes.is_empty() {
            return Err(FileValidationError::Empty);
        }

        if bytes.len() > self.max_bytes {
            return Err(FileValidationError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }

        let mime = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
            return Err(FileValidationError::UnsupportedMimeType(mime_type.to_string()));
        }

        let extension = file_extension(filename);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(FileValidationError::UnsupportedExtension(extension));
        }

        let format = ImageFormat::sniff(bytes).ok_or(FileValidationError::SignatureMismatch)?;
        if format.mime_type() != mime && !(format == ImageFormat::Jpeg && mime == "image/jpg") {
            tracing::warn!(
                filename = %filename,
                declared = %mime,
                detected = %format,
                "Declared type differs from file content"
            );
        }
        Ok(format)
    }
}
