use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::prompt::user_message;
use crate::{BackendError, CompletionRequest, LanguageModel};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini `generateContent` backend.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiClient {
    pub const DEFAULT_MODEL: &'static str = "gemini-2.5-flash";
    pub const DEFAULT_BASE_URL: &'static str = "https://generativelanguage.googleapis.com/v1beta";

    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model: Self::DEFAULT_MODEL.to_string(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Reads `GEMINI_API_KEY` and `GEMINI_MODEL`.
    pub fn from_env() -> Self {
        let client = Self::new(std::env::var("GEMINI_API_KEY").ok());
        match std::env::var("GEMINI_MODEL") {
            Ok(model) if !model.trim().is_empty() => client.with_model(model),
            _ => client,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, BackendError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(BackendError::MissingCredentials)?;

        debug!(model = %self.model, "sending generateContent request");
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| {
                BackendError::Transport(format!("HTTP request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| {
                BackendError::Transport(format!("failed to read response: {}", e.without_url()))
            })?;
        if !status.is_success() {
            return Err(error_from_body(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::Backend(format!("failed to parse response: {e}")))?;
        response_text(parsed)
    }
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Few-shot examples become alternating user/model turns ahead of the
/// real prompt.
fn request_body(request: &CompletionRequest<'_>) -> Value {
    let mut contents = Vec::with_capacity(request.examples.len() * 2 + 1);
    for example in request.examples {
        contents.push(json!({
            "role": "user",
            "parts": [{ "text": user_message(example.prompt) }],
        }));
        contents.push(json!({
            "role": "model",
            "parts": [{ "text": format!("```cad\n{}\n```", example.script) }],
        }));
    }
    contents.push(json!({
        "role": "user",
        "parts": [{ "text": request.user_prompt }],
    }));

    json!({
        "systemInstruction": { "parts": [{ "text": request.system_prompt }] },
        "contents": contents,
        "generationConfig": { "temperature": 0.2 },
    })
}

fn response_text(response: GenerateContentResponse) -> Result<String, BackendError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect::<String>())
        .unwrap_or_default();
    if text.trim().is_empty() {
        Err(BackendError::EmptyResponse)
    } else {
        Ok(text)
    }
}

fn error_from_body(status: StatusCode, body: &str) -> BackendError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!(
            "{} {}: {}",
            status.as_u16(),
            envelope.error.status,
            envelope.error.message
        ),
        Err(_) => format!("{} {}", status.as_u16(), body.trim()),
    };
    match BackendError::classify(message) {
        BackendError::Backend(message) if status == StatusCode::TOO_MANY_REQUESTS => {
            BackendError::QuotaExhausted(message)
        }
        BackendError::Backend(message) if status == StatusCode::FORBIDDEN => {
            BackendError::PermissionDenied(message)
        }
        classified => classified,
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{GeminiClient, GenerateContentResponse, error_from_body, request_body, response_text};
    use crate::prompt::FEW_SHOT_EXAMPLES;
    use crate::{BackendError, CompletionRequest, LanguageModel};

    fn request() -> CompletionRequest<'static> {
        CompletionRequest {
            system_prompt: "system",
            examples: &FEW_SHOT_EXAMPLES[..1],
            user_prompt: "Create a 3D model for: \"a cube\"",
        }
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let client = GeminiClient::new(None).with_base_url("http://127.0.0.1:9");
        assert_eq!(
            client.complete(&request()).await,
            Err(BackendError::MissingCredentials)
        );
        assert!(!GeminiClient::new(Some("  ".into())).has_credentials());
    }

    #[tokio::test]
    async fn transport_errors_do_not_carry_the_key() {
        let client =
            GeminiClient::new(Some("SECRET123".into())).with_base_url("http://127.0.0.1:1");
        match client.complete(&request()).await {
            Err(err @ BackendError::Transport(_)) => {
                let message = err.to_string();
                assert!(!message.contains("SECRET123"), "got: {message}");
                assert!(!message.contains("127.0.0.1"), "got: {message}");
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn request_body_interleaves_examples() {
        let body = request_body(&request());
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "system");
        let contents = body["contents"].as_array().expect("contents array");
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert!(
            contents[1]["parts"][0]["text"]
                .as_str()
                .is_some_and(|text| text.starts_with("```cad\nuse cad"))
        );
        assert_eq!(
            contents[2]["parts"][0]["text"],
            "Create a 3D model for: \"a cube\""
        );
    }

    #[test]
    fn response_text_joins_first_candidate_parts() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"use cad\n"},{"text":"model = cube(1)"}]}},{"content":{"parts":[{"text":"ignored"}]}}]}"#,
        )
        .expect("valid response json");
        assert_eq!(response_text(parsed), Ok("use cad\nmodel = cube(1)".into()));

        let empty: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[]}"#).expect("valid response json");
        assert_eq!(response_text(empty), Err(BackendError::EmptyResponse));
    }

    #[test]
    fn error_bodies_are_classified() {
        let quota = error_from_body(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(matches!(quota, BackendError::QuotaExhausted(ref m) if m.contains("RESOURCE_EXHAUSTED")));

        let denied = error_from_body(StatusCode::FORBIDDEN, "forbidden");
        assert!(matches!(denied, BackendError::PermissionDenied(_)));

        let other = error_from_body(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(other, BackendError::Backend("502 upstream down".into()));
    }

    #[test]
    fn debug_output_redacts_key() {
        let client = GeminiClient::new(Some("secret-key".into()));
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("[REDACTED]"));
        assert!(rendered.contains(GeminiClient::DEFAULT_MODEL));
    }
}
