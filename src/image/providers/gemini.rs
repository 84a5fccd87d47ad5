//! Gemini (Google) image editing client.

use crate::config::Config;
use crate::error::{parse_retry_after, sanitize_error_message, EditError, Result};
use crate::image::client::EditClient;
use crate::image::types::EditedImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Default Gemini API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini image model variants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    #[default]
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    NanoBananaPro,
    /// Any other model identifier.
    Custom(String),
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "nano-banana-pro-preview",
            Self::Custom(id) => id,
        }
    }
}

impl std::str::FromStr for GeminiModel {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "nano-banana" | "gemini-2.5-flash-image" => Ok(Self::NanoBanana),
            "nano-banana-pro" | "nano-banana-pro-preview" => Ok(Self::NanoBananaPro),
            "" => Err(EditError::Config("model name must not be empty".into())),
            other if other.contains(char::is_whitespace) || other.contains('/') => Err(
                EditError::Config(format!("invalid model name '{other}'")),
            ),
            other => Ok(Self::Custom(other.to_string())),
        }
    }
}

impl std::fmt::Display for GeminiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finish reasons that mean the model declined to produce an image.
const DECLINED_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "IMAGE_SAFETY",
    "IMAGE_PROHIBITED_CONTENT",
    "IMAGE_RECITATION",
    "RECITATION",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "IMAGE_OTHER",
    "NO_IMAGE",
];

/// Gemini image editing client.
pub struct GeminiEditClient {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
    request_timeout: Option<Duration>,
}

impl GeminiEditClient {
    /// Creates a client from resolved configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key: config.api_key().to_string(),
            model: config.model().clone(),
            base_url: config.base_url().to_string(),
            request_timeout: config.request_timeout(),
        })
    }

    /// Returns the model this client talks to.
    pub fn model(&self) -> &GeminiModel {
        &self.model
    }

    /// Checks that the API key is accepted and the model exists.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models/{}", self.base_url, self.model.as_str());

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(EditError::Auth("Invalid API key".into())),
            404 => Err(EditError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            s if !(200..300).contains(&s) => Err(EditError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }

    async fn edit_impl(
        &self,
        image_payload: &str,
        media_type: &str,
        instruction: &str,
    ) -> Result<Option<EditedImage>> {
        let start = Instant::now();

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );

        let body = GeminiRequest::edit(image_payload, media_type, instruction);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let text = response.text().await?;
        let gemini_response = parse_response(&text)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let Some(inline_data) = extract_first_image(gemini_response) else {
            tracing::info!(model = %self.model, elapsed_ms, "Gemini response contained no image");
            return Ok(None);
        };

        let media_type = if inline_data.mime_type.trim().is_empty() {
            media_type.to_string()
        } else {
            inline_data.mime_type
        };
        let image = EditedImage::from_base64(inline_data.data, media_type)?;

        tracing::debug!(
            model = %self.model,
            elapsed_ms,
            size = image.size(),
            media_type = image.media_type(),
            "Gemini edit complete"
        );
        Ok(Some(image))
    }

    fn classify_transport(&self, err: reqwest::Error) -> EditError {
        match self.request_timeout {
            Some(timeout) if err.is_timeout() => EditError::Timeout(timeout),
            _ => EditError::Network(err),
        }
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> EditError {
        let text = sanitize_error_message(text);
        if status == 402 {
            return EditError::Billing(
                "Gemini billing issue: enable billing at https://aistudio.google.com".into(),
            );
        }
        if status == 404 {
            return EditError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            );
        }
        if status == 429 {
            let retry_after = parse_retry_after(headers).map(Duration::from_secs);
            return EditError::RateLimited { retry_after };
        }
        if status == 401 || status == 403 {
            return EditError::Auth(text);
        }
        let lower = text.to_lowercase();
        if lower.contains("api key not valid") || lower.contains("api_key_invalid") {
            return EditError::Auth(text);
        }
        if lower.contains("safety") || lower.contains("blocked") || lower.contains("prohibited")
        {
            return EditError::ContentBlocked(text);
        }
        EditError::Api {
            status,
            message: text,
        }
    }
}

#[async_trait]
impl EditClient for GeminiEditClient {
    async fn submit_edit(
        &self,
        image_payload: &str,
        media_type: &str,
        instruction: &str,
    ) -> Result<Option<EditedImage>> {
        match self.edit_impl(image_payload, media_type, instruction).await {
            Ok(image) => Ok(image),
            Err(e) => {
                tracing::error!(model = %self.model, error = %e, "Gemini edit request failed");
                Err(EditError::Generation)
            }
        }
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }
}

/// Parses a successful response body.
///
/// Malformed JSON is a `Json` error; well-formed JSON of the wrong shape is
/// `UnexpectedResponse`.
fn parse_response(body: &str) -> Result<GeminiResponse> {
    serde_json::from_str(body).map_err(|e| {
        if e.is_data() {
            EditError::UnexpectedResponse(format!("{e}: {}", sanitize_error_message(body)))
        } else {
            EditError::Json(e)
        }
    })
}

/// Scans the first candidate's parts in order and returns the first image.
///
/// Blocks and declined finish reasons produce `None`, as does a response with
/// only text.
fn extract_first_image(response: GeminiResponse) -> Option<InlineData> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        tracing::warn!(reason, "Gemini blocked the prompt");
        return None;
    }

    let candidate = response.candidates.into_iter().next()?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if DECLINED_FINISH_REASONS.contains(&reason) {
            tracing::warn!(reason, "Gemini declined to produce an image");
        }
    }

    candidate.content?.parts.into_iter().find_map(|part| {
        if let Some(ref text) = part.text {
            tracing::debug!(text = %text, "Gemini text part");
        }
        part.inline_data
    })
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    fn edit(image_payload: &str, media_type: &str, instruction: &str) -> Self {
        // Image first, then the instruction.
        let parts = vec![
            GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: media_type.to_string(),
                    data: image_payload.to_string(),
                },
            },
            GeminiRequestPart::Text {
                text: instruction.to_string(),
            },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn parse(json: &str) -> GeminiResponse {
        serde_json::from_str(json).unwrap()
    }

    fn client() -> GeminiEditClient {
        GeminiEditClient::new(&Config::new("test-key")).unwrap()
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::NanoBanana.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::NanoBananaPro.as_str(),
            "nano-banana-pro-preview"
        );
        assert_eq!(GeminiModel::default(), GeminiModel::NanoBanana);
    }

    #[test]
    fn test_gemini_model_from_str() {
        assert_eq!(
            "nano-banana-pro".parse::<GeminiModel>().unwrap(),
            GeminiModel::NanoBananaPro
        );
        assert_eq!(
            "gemini-2.5-flash-image-preview".parse::<GeminiModel>().unwrap(),
            GeminiModel::Custom("gemini-2.5-flash-image-preview".into())
        );
        assert!("".parse::<GeminiModel>().is_err());
        assert!("models/../x".parse::<GeminiModel>().is_err());
    }

    #[test]
    fn test_client_uses_config() {
        let config = Config::new("k")
            .with_model(GeminiModel::NanoBananaPro)
            .with_base_url("http://localhost:9999/v1beta/");
        let client = GeminiEditClient::new(&config).unwrap();
        assert_eq!(client.model(), &GeminiModel::NanoBananaPro);
        assert_eq!(client.base_url, "http://localhost:9999/v1beta");
        assert_eq!(client.name(), "Gemini (Google)");
    }

    #[test]
    fn test_request_puts_image_before_instruction() {
        let req = GeminiRequest::edit("aGVsbG8=", "image/jpeg", "Add a hat");
        let json = serde_json::to_value(&req).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "aGVsbG8=");
        assert_eq!(parts[1]["text"], "Add a hat");
    }

    #[test]
    fn test_request_asks_for_image_and_text() {
        let req = GeminiRequest::edit("x", "image/png", "y");
        let json = serde_json::to_value(&req).unwrap();

        assert!(json.get("generation_config").is_none());
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn test_first_image_part_wins() {
        let resp = parse(
            r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your edit."},
                        {"inlineData": {"mimeType": "image/png", "data": "Zmlyc3Q="}},
                        {"text": "Anything else?"},
                        {"inlineData": {"mimeType": "image/png", "data": "c2Vjb25k"}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#,
        );
        let inline = extract_first_image(resp).unwrap();
        assert_eq!(inline.data, "Zmlyc3Q=");
        assert_eq!(inline.mime_type, "image/png");
    }

    #[test]
    fn test_text_only_response_has_no_image() {
        let resp = parse(
            r#"{
            "candidates": [{
                "content": {"parts": [{"text": "I cannot do that."}]}
            }]
        }"#,
        );
        assert!(extract_first_image(resp).is_none());
    }

    #[test]
    fn test_empty_responses_have_no_image() {
        assert!(extract_first_image(parse(r#"{}"#)).is_none());
        assert!(extract_first_image(parse(r#"{"candidates": []}"#)).is_none());
        assert!(extract_first_image(parse(r#"{"candidates": [{}]}"#)).is_none());
        assert!(extract_first_image(parse(r#"{"candidates": [{"content": {}}]}"#)).is_none());
    }

    #[test]
    fn test_blocked_prompt_has_no_image() {
        let resp = parse(
            r#"{
            "candidates": [],
            "promptFeedback": {"blockReason": "SAFETY"}
        }"#,
        );
        assert!(extract_first_image(resp).is_none());
    }

    #[test]
    fn test_safety_finish_reason_has_no_image() {
        let resp = parse(r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#);
        assert!(extract_first_image(resp).is_none());
    }

    #[test]
    fn test_parse_error_classification() {
        let client = client();
        let headers = HeaderMap::new();

        assert!(matches!(
            client.parse_error(401, "nope", &headers),
            EditError::Auth(_)
        ));
        assert!(matches!(
            client.parse_error(400, "API key not valid. Please pass a valid API key.", &headers),
            EditError::Auth(_)
        ));
        assert!(matches!(
            client.parse_error(402, "", &headers),
            EditError::Billing(_)
        ));
        assert!(matches!(
            client.parse_error(404, "", &headers),
            EditError::InvalidRequest(_)
        ));
        assert!(matches!(
            client.parse_error(429, "", &headers),
            EditError::RateLimited { retry_after: None }
        ));
        assert!(matches!(
            client.parse_error(500, "boom", &headers),
            EditError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_parse_response_errors() {
        let missing_data = r#"{"candidates": [{"content": {"parts": [
            {"inlineData": {"mimeType": "image/png"}}
        ]}}]}"#;
        assert!(matches!(
            parse_response(missing_data),
            Err(EditError::UnexpectedResponse(_))
        ));
        assert!(matches!(
            parse_response("<html>bad gateway</html>"),
            Err(EditError::Json(_))
        ));
        assert!(parse_response(r#"{"candidates": []}"#).is_ok());
    }

    /// Reads one HTTP request: headers, then `Content-Length` bytes of body.
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serves a single canned response on localhost. Returns a client pointed
    /// at it and a handle yielding the request it received.
    async fn serve_once(status: &str, body: &str) -> (GeminiEditClient, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        let config = Config::new("test-key").with_base_url(format!("http://{addr}"));
        (GeminiEditClient::new(&config).unwrap(), server)
    }

    #[tokio::test]
    async fn test_submit_edit_posts_generate_content() {
        let (client, server) = serve_once("200 OK", r#"{"candidates": []}"#).await;

        let result = client
            .submit_edit("aGVsbG8=", "image/png", "Add a hat")
            .await
            .unwrap();
        assert!(result.is_none());

        let request = server.await.unwrap();
        let lower = request.to_lowercase();
        assert!(request.starts_with("POST /models/gemini-2.5-flash-image:generateContent "));
        assert!(lower.contains("x-goog-api-key: test-key"));
        assert!(request.contains(r#""data":"aGVsbG8=""#));
        assert!(request.contains(r#""text":"Add a hat""#));
    }

    #[tokio::test]
    async fn test_submit_edit_server_error_is_generation() {
        let (client, _server) =
            serve_once("500 Internal Server Error", r#"{"error": {"message": "boom"}}"#).await;

        let err = client
            .submit_edit("aGVsbG8=", "image/png", "Add a hat")
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::Generation));
        assert_eq!(err.to_string(), crate::GENERATION_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_submit_edit_text_only_is_none() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "I cannot do that."}]}}]}"#;
        let (client, _server) = serve_once("200 OK", body).await;

        let result = client
            .submit_edit("aGVsbG8=", "image/png", "Add a hat")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_submit_edit_returns_first_image() {
        let body = r#"{"candidates": [{"content": {"parts": [
            {"text": "Here you go."},
            {"inlineData": {"mimeType": "image/webp", "data": "Zmlyc3Q="}},
            {"text": "Enjoy."}
        ]}}]}"#;
        let (client, _server) = serve_once("200 OK", body).await;

        let image = client
            .submit_edit("aGVsbG8=", "image/png", "Add a hat")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(image.data(), b"first");
        assert_eq!(image.media_type(), "image/webp");
    }

    #[tokio::test]
    async fn test_submit_edit_empty_mime_type_uses_request_type() {
        let body = r#"{"candidates": [{"content": {"parts": [
            {"inlineData": {"mimeType": "", "data": "Zmlyc3Q="}}
        ]}}]}"#;
        let (client, _server) = serve_once("200 OK", body).await;

        let image = client
            .submit_edit("aGVsbG8=", "image/jpeg", "Add a hat")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(image.media_type(), "image/jpeg");
        assert_eq!(image.extension(), "jpeg");
    }

    #[tokio::test]
    async fn test_image_part_without_data_is_unexpected() {
        let body = r#"{"candidates": [{"content": {"parts": [
            {"inlineData": {"mimeType": "image/png"}}
        ]}}]}"#;

        let (client, _server) = serve_once("200 OK", body).await;
        let err = client
            .edit_impl("aGVsbG8=", "image/png", "Add a hat")
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::UnexpectedResponse(_)));

        let (client, _server) = serve_once("200 OK", body).await;
        let err = client
            .submit_edit("aGVsbG8=", "image/png", "Add a hat")
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::Generation));
    }
}
