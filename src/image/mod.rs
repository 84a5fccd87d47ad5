//! Image acquisition, edit client and Gemini provider.

mod client;
pub mod providers;
mod types;
mod upload;

pub use client::EditClient;
pub use types::{
    extension_for_media_type, is_image_media_type, EditedImage, ImageFormat, UploadedImage,
};
pub use upload::ACCEPTED_MEDIA_TYPES;
