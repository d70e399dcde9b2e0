// ABOUTME: Gemini generateContent client used for OCR
// Sends the instruction plus inline image data and reads back text and token usage

use crate::app::config::AppConfig;
use crate::data::inference::{InferenceClient, InferenceOutput};
use crate::data::upload::ImagePayload;
use crate::utils::error::{OcrError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    // Thinking tokens are billed at the output rate
    #[serde(default)]
    thoughts_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, config: &AppConfig) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(OcrError::Config("Gemini API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model_id: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model_id)
    }
}

fn build_request<'a>(instruction: &'a str, image: &'a ImagePayload) -> GenerateContentRequest<'a> {
    GenerateContentRequest {
        contents: vec![RequestContent {
            parts: vec![
                RequestPart::Text { text: instruction },
                RequestPart::InlineData {
                    inline_data: InlineData {
                        mime_type: image.mime_type(),
                        data: STANDARD.encode(&image.bytes),
                    },
                },
            ],
        }],
    }
}

/// Turn a successful generateContent body into text and usage
fn parse_response(body: &str) -> Result<InferenceOutput> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| OcrError::Inference(format!("unexpected response from Gemini API: {}", e)))?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(OcrError::Inference(format!("request was blocked by the model ({})", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| OcrError::Inference("model returned no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
            return Err(OcrError::Inference(format!("model stopped without text ({})", reason)));
        }
    }

    let usage = response.usage_metadata.unwrap_or_default();

    Ok(InferenceOutput {
        text,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count + usage.thoughts_token_count,
    })
}

/// Best-effort readable message from an error body
fn parse_error(status: reqwest::StatusCode, body: &str) -> OcrError {
    let detail = match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(kind) => format!("{}: {}", kind, envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.trim().chars().take(200).collect(),
    };
    OcrError::Inference(format!("HTTP {} - {}", status.as_u16(), detail))
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn infer(&self, model_id: &str, instruction: &str, image: &ImagePayload) -> Result<InferenceOutput> {
        let url = self.endpoint(model_id);
        debug!(url = %url, mime = image.mime_type(), bytes = image.len(), "sending generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request(instruction, image))
            .send()
            .await
            .map_err(|e| OcrError::Inference(format!("could not reach Gemini API: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OcrError::Inference(format!("could not read Gemini response: {}", e)))?;
        debug!(status = status.as_u16(), len = body.len(), "generateContent responded");

        if !status.is_success() {
            return Err(parse_error(status, &body));
        }

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;
    use std::sync::Arc;

    #[test]
    fn test_request_shape() {
        let image = ImagePayload {
            bytes: Arc::from(vec![1u8, 2, 3]),
            format: ImageFormat::Png,
        };
        let value = serde_json::to_value(build_request("read it", &image)).unwrap();

        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "read it");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
    }

    #[test]
    fn test_parse_text_and_usage() {
        let body = r#"{
            "candidates": [{
                "content": {"parts": [{"text": "Line one\n"}, {"text": "Line two"}], "role": "model"},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 1290, "candidatesTokenCount": 12, "thoughtsTokenCount": 30, "totalTokenCount": 1332}
        }"#;

        let output = parse_response(body).unwrap();
        assert_eq!(output.text, "Line one\nLine two");
        assert_eq!(output.input_tokens, 1290);
        assert_eq!(output.output_tokens, 42);
    }

    #[test]
    fn test_missing_usage_defaults_to_zero() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "hi"}]}}]}"#;
        let output = parse_response(body).unwrap();
        assert_eq!(output.input_tokens, 0);
        assert_eq!(output.output_tokens, 0);
    }

    #[test]
    fn test_blocked_prompt_is_error() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}, "usageMetadata": {"promptTokenCount": 10}}"#;
        let err = parse_response(body).unwrap_err();
        assert!(matches!(err, OcrError::Inference(ref msg) if msg.contains("SAFETY")));
    }

    #[test]
    fn test_no_candidates_is_error() {
        let err = parse_response(r#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, OcrError::Inference(_)));
    }

    #[test]
    fn test_empty_text_with_abnormal_finish_is_error() {
        let body = r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#;
        let err = parse_response(body).unwrap_err();
        assert!(matches!(err, OcrError::Inference(ref msg) if msg.contains("MAX_TOKENS")));
    }

    #[test]
    fn test_non_json_body_is_inference_error() {
        let err = parse_response("<html>proxy error</html>").unwrap_err();
        assert!(matches!(err, OcrError::Inference(ref msg) if msg.contains("unexpected response")));
    }

    #[test]
    fn test_error_body() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}}"#;
        let err = parse_error(reqwest::StatusCode::BAD_REQUEST, body);
        assert_eq!(
            err.to_string(),
            "OCR request failed: HTTP 400 - INVALID_ARGUMENT: API key not valid."
        );

        let err = parse_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.to_string(), "OCR request failed: HTTP 502 - upstream down");
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = GeminiClient::new("  ".to_string(), &AppConfig::default()).unwrap_err();
        assert!(matches!(err, OcrError::Config(_)));
    }

    #[test]
    fn test_endpoint() {
        let config = AppConfig {
            api_base_url: "http://localhost:8080/v1beta/models/".to_string(),
            ..AppConfig::default()
        };
        let client = GeminiClient::new("key".to_string(), &config).unwrap();
        assert_eq!(
            client.endpoint("gemini-2.5-flash-preview-05-20"),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash-preview-05-20:generateContent"
        );
    }
}
