//! Image acquisition: turning a user-selected file into an [`UploadedImage`].

use crate::error::{EditError, Result};
use crate::image::types::{is_image_media_type, ImageFormat, UploadedImage};
use std::path::Path;

/// Media types accepted as edit sources.
pub const ACCEPTED_MEDIA_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

impl UploadedImage {
    /// Builds an uploaded image from raw bytes.
    ///
    /// The format is sniffed from magic bytes; `declared_media_type` is only
    /// trusted when sniffing fails and it names an accepted type. Input
    /// declared as something other than `image/*` is turned away unread, the
    /// way a drop target ignores non-image files.
    pub fn from_bytes(data: Vec<u8>, declared_media_type: Option<&str>) -> Result<Self> {
        Self::acquire(data, declared_media_type, None)
    }

    /// Reads an image file, declaring its type from the file extension.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let declared = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension)
            .map(|f| f.mime_type());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());
        Self::acquire(data, declared, name)
    }

    fn acquire(
        data: Vec<u8>,
        declared_media_type: Option<&str>,
        name: Option<String>,
    ) -> Result<Self> {
        if let Some(declared) = declared_media_type.filter(|mt| !is_image_media_type(mt)) {
            return Err(EditError::UnsupportedImage(format!("{declared} is not an image")));
        }
        if data.is_empty() {
            return Err(EditError::UnsupportedImage("file is empty".into()));
        }

        let format = ImageFormat::from_magic_bytes(&data)
            .or_else(|| declared_media_type.and_then(ImageFormat::from_mime_type))
            .ok_or_else(|| {
                EditError::UnsupportedImage(format!(
                    "expected one of {}",
                    ACCEPTED_MEDIA_TYPES.join(", ")
                ))
            })?;

        tracing::debug!(
            media_type = format.mime_type(),
            size = data.len(),
            name = name.as_deref().unwrap_or("<bytes>"),
            "image acquired"
        );
        Ok(Self::new(data, format, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_BYTES: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
    const JPEG_BYTES: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    #[test]
    fn test_magic_bytes_win_over_declared_type() {
        let image = UploadedImage::from_bytes(PNG_BYTES.to_vec(), Some("image/jpeg")).unwrap();
        assert_eq!(image.media_type(), "image/png");
    }

    #[test]
    fn test_declared_type_used_when_sniffing_fails() {
        let image = UploadedImage::from_bytes(vec![1, 2, 3], Some("image/webp")).unwrap();
        assert_eq!(image.media_type(), "image/webp");
    }

    #[test]
    fn test_rejects_unsupported_and_empty() {
        let gif = b"GIF89a\x01\x00\x01\x00".to_vec();
        let err = UploadedImage::from_bytes(gif, Some("image/gif")).unwrap_err();
        assert!(matches!(err, EditError::UnsupportedImage(_)));

        let err = UploadedImage::from_bytes(Vec::new(), Some("image/png")).unwrap_err();
        assert!(matches!(err, EditError::UnsupportedImage(_)));

        assert!(UploadedImage::from_bytes(vec![1, 2, 3], None).is_err());
    }

    #[test]
    fn test_non_image_declared_type_is_dropped() {
        let err =
            UploadedImage::from_bytes(PNG_BYTES.to_vec(), Some("application/pdf")).unwrap_err();
        assert!(
            matches!(err, EditError::UnsupportedImage(ref m) if m.contains("application/pdf"))
        );

        // Any image/* declaration still reaches sniffing.
        let image = UploadedImage::from_bytes(PNG_BYTES.to_vec(), Some("image/gif")).unwrap();
        assert_eq!(image.media_type(), "image/png");
    }

    #[test]
    fn test_open_reads_file() {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(&JPEG_BYTES).unwrap();

        let image = UploadedImage::open(file.path()).unwrap();
        assert_eq!(image.media_type(), "image/jpeg");
        assert_eq!(image.data(), &JPEG_BYTES);
        assert!(image.name().unwrap().ends_with(".jpg"));
        assert!(image.preview().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = UploadedImage::open("/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, EditError::Io(_)));
    }
}
