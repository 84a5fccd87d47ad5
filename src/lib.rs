#![warn(missing_docs)]
//! genedit - edit an image with a natural-language instruction.
//!
//! The user selects an image, describes an edit, and the Gemini image model
//! returns an edited version. The original and the result are then shown side
//! by side and the result can be downloaded or shared.
//!
//! # Quick Start
//!
//! ```no_run
//! use genedit::{render, Config, EditSession, GeminiEditClient, UploadedImage};
//!
//! #[tokio::main]
//! async fn main() -> genedit::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = GeminiEditClient::new(&config)?;
//!
//!     let mut session = EditSession::new();
//!     session.select_image(UploadedImage::open("photo.png")?);
//!     session.set_instruction("Add a cat wearing a wizard hat");
//!
//!     if session.generate(&client).await.is_ok() {
//!         println!("{}", render(&session));
//!         if let Some(edited) = session.result() {
//!             genedit::present::download(edited, ".")?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`image`]: acquisition, the [`EditClient`] trait and the Gemini client
//! - [`session`]: the request lifecycle state machine
//! - [`present`]: views, download and share
//! - [`config`]: startup configuration

pub mod config;
mod error;
pub mod image;
pub mod present;
pub mod session;

// Re-export error types at crate root
pub use error::{EditError, Result, GENERATION_FAILED_MESSAGE};

pub use config::Config;
pub use image::providers::{GeminiEditClient, GeminiModel};
pub use image::{EditClient, EditedImage, ImageFormat, UploadedImage};
pub use present::{render, View};
pub use session::{EditSession, Rejected, RequestStatus, SessionHandle};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{EditError, Result};
    pub use crate::image::providers::GeminiEditClient;
    pub use crate::image::{EditClient, EditedImage, UploadedImage};
    pub use crate::present::{render, View};
    pub use crate::session::{EditSession, RequestStatus, SessionHandle};
}
