//! Core image types: formats, the uploaded source image and the edited result.

use crate::error::{EditError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Extension used when a media type has no usable subtype.
const FALLBACK_EXTENSION: &str = "png";

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the conventional file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Parses one of the accepted MIME types.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Returns the file extension for a media type: its subtype.
///
/// `image/webp` gives `webp`, `image/jpeg` gives `jpeg`. Parameters after `;`
/// are ignored. Anything unparsable gives `png`.
pub fn extension_for_media_type(media_type: &str) -> &str {
    let essence = media_type.split(';').next().unwrap_or_default().trim();
    let Some((kind, subtype)) = essence.split_once('/') else {
        return FALLBACK_EXTENSION;
    };
    let valid = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    };
    if valid(kind) && valid(subtype) {
        subtype
    } else {
        FALLBACK_EXTENSION
    }
}

/// Returns true for any `image/*` media type. Used to filter dropped files.
pub fn is_image_media_type(media_type: &str) -> bool {
    media_type.trim().to_lowercase().starts_with("image/")
}

/// The image selected by the user, ready for preview and transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    data: Vec<u8>,
    media_type: String,
    encoded: String,
    name: Option<String>,
}

impl UploadedImage {
    pub(crate) fn new(data: Vec<u8>, format: ImageFormat, name: Option<String>) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&data);
        Self {
            data,
            media_type: format.mime_type().to_string(),
            encoded,
            name,
        }
    }

    /// Raw image bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Media type of the image, e.g. `image/png`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Base64 payload for embedding in a JSON request.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// File name the image was read from, if known.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Renderable preview as a data URL.
    pub fn preview(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.encoded)
    }

    /// Size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// An edited image returned by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "edited image should be presented or exported"]
pub struct EditedImage {
    data: Vec<u8>,
    media_type: String,
    encoded: String,
}

impl EditedImage {
    /// Decodes a base64 payload returned by the model.
    pub fn from_base64(encoded: impl Into<String>, media_type: impl Into<String>) -> Result<Self> {
        let encoded = encoded.into();
        let data = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| EditError::Decode(e.to_string()))?;
        Ok(Self {
            data,
            media_type: media_type.into(),
            encoded,
        })
    }

    /// Raw image bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Media type reported for the image.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Base64 payload as returned by the model.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// File extension derived from the media type.
    pub fn extension(&self) -> &str {
        extension_for_media_type(&self.media_type)
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.encoded)
    }

    /// Size of the image data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Saves the image to a new file at `path`. An existing file is left
    /// alone and reported as an `AlreadyExists` I/O error.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(&self.data)?;
        Ok(())
    }
}
