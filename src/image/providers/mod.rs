//! Image editing providers.

mod gemini;

pub use gemini::{GeminiEditClient, GeminiModel, DEFAULT_BASE_URL};
