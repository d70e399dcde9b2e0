// ABOUTME: InferenceClient trait abstraction for the remote OCR model
// Lets the run controller work against Gemini or a test double

use crate::data::upload::ImagePayload;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Fixed instruction sent with every OCR request
pub const OCR_INSTRUCTION: &str = "Extract all text visible in this image as literally as possible, \
preserving the original line breaks and layout, with full accuracy.";

/// What one inference call returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceOutput {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Trait for the external multimodal model.
///
/// Implementations make exactly one attempt per call. Any transport,
/// authentication, quota or model failure is returned as
/// `OcrError::Inference`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn infer(&self, model_id: &str, instruction: &str, image: &ImagePayload) -> Result<InferenceOutput>;
}
