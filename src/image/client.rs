//! Edit client trait.

use crate::error::Result;
use crate::image::types::EditedImage;
use async_trait::async_trait;

/// Sends an image and an instruction to a generative model.
///
/// Implementations hold no state between calls; each invocation is independent.
#[async_trait]
pub trait EditClient: Send + Sync {
    /// Asks the model to edit `image_payload` (base64) according to `instruction`.
    ///
    /// Returns `Ok(None)` when the model answered without an image. Any other
    /// failure is reported as [`EditError::Generation`](crate::EditError::Generation).
    async fn submit_edit(
        &self,
        image_payload: &str,
        media_type: &str,
        instruction: &str,
    ) -> Result<Option<EditedImage>>;

    /// Returns the name of this client for display.
    fn name(&self) -> &str;
}
