pub mod gemini;
pub mod inference;
pub mod upload;

pub use gemini::GeminiClient;
pub use inference::{InferenceClient, InferenceOutput, OCR_INSTRUCTION};
pub use upload::{decode_image, load_image, ImagePayload, UploadedImage};
