// =============================================================================
// GEMINI MODERATION CLIENT - Google AI Studio API Integration
// =============================================================================
//
// Implements the `ModerationClassifier` port by asking a Gemini model to
// classify a message and reply with a small JSON verdict.
//
// **Request:** `POST {base}/v1beta/models/{model}:generateContent?key=API_KEY`
// with a single user turn holding the prompt.
//
// **Response:** the verdict text lives at `candidates[0].content.parts[0].text`.
// The model is asked for bare JSON but regularly wraps it in a Markdown
// code fence, so fences are stripped before parsing.
//
// Everything after the request succeeds is fail-open: an empty or
// unparseable reply is reported as clean. Only transport failures and
// non-2xx statuses come back as errors.
//
// **Environment Variables:**
// - `GEMINI_API_KEY` - Your API key from https://aistudio.google.com/apikey
// - `GEMINI_MODEL` - Model name (default `gemini-2.5-flash`)
// - `MODERATION_TIMEOUT_MS` - Request timeout (default 5000)

use crate::core::moderation::{
    ClassifierError, ModerationClassifier, ModerationProvider, ModerationResult,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================
//
// Only the subset of https://ai.google.dev/api/generate-content we use.

/// A single part of content. We only ever send and read text.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// One conversation turn.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

/// The request body sent to the generateContent endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

/// A candidate response from the model.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    /// Missing when the candidate was blocked by safety filters.
    #[serde(default)]
    content: Option<Content>,

    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate, if any.
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

/// Error response from the Gemini API.
#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

/// Loose truthiness for verdict fields: models do not always emit
/// `true`/`false`, so `"true"`, `1` and similar count as set.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The verdict's reason as text, if it carries one.
fn reason_text(value: &Value) -> Option<String> {
    if !is_truthy(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Moderation classifier backed by Google's Gemini API.
///
/// # Example
/// ```ignore
/// let client = GeminiModerationClient::new(
///     std::env::var("GEMINI_API_KEY")?,
///     DEFAULT_MODEL.to_string(),
///     DEFAULT_BASE_URL.to_string(),
///     Duration::from_millis(5000),
/// )?;
/// let verdict = client.classify("Thanks, great support!").await?;
/// ```
pub struct GeminiModerationClient {
    /// HTTP client carrying the request timeout.
    client: Client,

    /// API key for authentication. Never logged.
    api_key: String,

    model: String,
    base_url: String,
}

impl GeminiModerationClient {
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Request {
                status: None,
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    fn build_prompt(text: &str) -> String {
        format!(
            r#"Analyze the following user message for safety, toxicity, and harmful content
(insults, hate speech, spam, etc.).
Your response must ONLY be a valid JSON object with the following keys:
{{
  "flagged": true or false,
  "reason": "A concise explanation of why it is flagged, or 'Clean' if not flagged."
}}

Message to analyze: """{text}""""#
        )
    }

    fn build_request(text: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(Self::build_prompt(text)),
                }],
            }],
        }
    }

    /// Turn the model's free-form reply into a verdict. Never fails.
    fn interpret_reply(raw: Option<&str>) -> ModerationResult {
        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => {
                return ModerationResult::clean(
                    ModerationProvider::Gemini,
                    "Gemini response empty, treated as clean",
                )
            }
        };

        let verdict: Value = match serde_json::from_str(strip_code_fence(raw)) {
            Ok(Value::Null) | Err(_) => {
                tracing::error!("Gemini output parsing failed: {:?}", raw);
                return ModerationResult::clean(
                    ModerationProvider::Gemini,
                    "Parsing error, treated as clean",
                );
            }
            Ok(verdict) => verdict,
        };

        // Non-object JSON has no fields, so it reads as an unflagged verdict
        let flagged = verdict.get("flagged").is_some_and(is_truthy);
        let reason = verdict
            .get("reason")
            .and_then(reason_text)
            .unwrap_or_else(|| "Clean (No specific reason provided)".to_string());

        if flagged {
            ModerationResult::flagged(ModerationProvider::Gemini, reason)
        } else {
            ModerationResult::clean(ModerationProvider::Gemini, reason)
        }
    }

    fn request_error(e: reqwest::Error) -> ClassifierError {
        ClassifierError::Request {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Remove a surrounding Markdown code fence, if there is one.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.trim();
    text.strip_suffix("```").unwrap_or(text).trim()
}

#[async_trait]
impl ModerationClassifier for GeminiModerationClient {
    async fn classify(&self, text: &str) -> Result<ModerationResult, ClassifierError> {
        tracing::debug!(
            "Gemini moderation request to model {}: {} chars",
            self.model,
            text.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&Self::build_request(text))
            .send()
            .await
            .map_err(Self::request_error)?;

        let status = response.status();
        let body = response.text().await.map_err(Self::request_error)?;

        if !status.is_success() {
            // Prefer the API's own error message when the body has one
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            return Err(ClassifierError::Request {
                status: Some(status.as_u16()),
                message,
            });
        }

        // A 2xx body that is not the expected shape carries no signal
        let parsed = serde_json::from_str::<GenerateContentResponse>(&body).ok();
        let result = Self::interpret_reply(parsed.as_ref().and_then(|r| r.first_text()));

        tracing::debug!(
            flagged = result.flagged,
            reason = %result.reason,
            "Gemini moderation response received"
        );

        Ok(result)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode, Uri};
    use axum::Router;
    use std::sync::{Arc, Mutex};

    fn gemini_body(text: &str) -> String {
        serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
        .to_string()
    }

    /// Starts a local stand-in for the Gemini endpoint that answers every
    /// request with `status`/`body` after `delay`, recording what it received.
    async fn spawn_fake_gemini(
        status: StatusCode,
        body: String,
        delay: Duration,
    ) -> (String, Arc<Mutex<Vec<(String, String)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);

        let app = Router::new().fallback(move |uri: Uri, request_body: String| {
            let body = body.clone();
            let recorder = Arc::clone(&recorder);
            async move {
                recorder
                    .lock()
                    .unwrap()
                    .push((uri.to_string(), request_body));
                tokio::time::sleep(delay).await;
                (status, [(header::CONTENT_TYPE, "application/json")], body)
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), seen)
    }

    fn client(base_url: String, timeout: Duration) -> GeminiModerationClient {
        GeminiModerationClient::new(
            "test-key".to_string(),
            DEFAULT_MODEL.to_string(),
            base_url,
            timeout,
        )
        .unwrap()
    }

    #[test]
    fn test_fenced_and_plain_json_parse_identically() {
        let plain = r#"{"flagged": true, "reason": "toxic"}"#;
        let fenced = "```json\n{\"flagged\": true, \"reason\": \"toxic\"}\n```";
        let bare_fence = "```\n{\"flagged\": true, \"reason\": \"toxic\"}\n```";

        let expected = ModerationResult::flagged(ModerationProvider::Gemini, "toxic");
        assert_eq!(GeminiModerationClient::interpret_reply(Some(plain)), expected);
        assert_eq!(GeminiModerationClient::interpret_reply(Some(fenced)), expected);
        assert_eq!(
            GeminiModerationClient::interpret_reply(Some(bare_fence)),
            expected
        );
    }

    #[test]
    fn test_empty_reply_is_clean() {
        for raw in [None, Some("")] {
            let result = GeminiModerationClient::interpret_reply(raw);
            assert!(!result.flagged);
            assert_eq!(result.reason, "Gemini response empty, treated as clean");
        }
    }

    #[test]
    fn test_unparseable_reply_is_clean() {
        for raw in ["I think this is fine", "{\"flagged\": ", "null", "   \n"] {
            let result = GeminiModerationClient::interpret_reply(Some(raw));
            assert!(!result.flagged);
            assert_eq!(result.provider, ModerationProvider::Gemini);
            assert_eq!(result.reason, "Parsing error, treated as clean");
        }
    }

    #[test]
    fn test_missing_reason_gets_default() {
        let result = GeminiModerationClient::interpret_reply(Some(r#"{"flagged": false}"#));
        assert!(!result.flagged);
        assert_eq!(result.reason, "Clean (No specific reason provided)");

        let blank = GeminiModerationClient::interpret_reply(Some(r#"{"flagged": true, "reason": ""}"#));
        assert!(blank.flagged);
        assert_eq!(blank.reason, "Clean (No specific reason provided)");
    }

    #[test]
    fn test_loosely_typed_verdicts() {
        let quoted = GeminiModerationClient::interpret_reply(Some(
            r#"{"flagged": "true", "reason": "insult"}"#,
        ));
        assert_eq!(
            quoted,
            ModerationResult::flagged(ModerationProvider::Gemini, "insult")
        );

        let numeric =
            GeminiModerationClient::interpret_reply(Some(r#"{"flagged": 1, "reason": "spam"}"#));
        assert!(numeric.flagged);
        assert_eq!(numeric.reason, "spam");

        let numeric_reason =
            GeminiModerationClient::interpret_reply(Some(r#"{"flagged": true, "reason": 42}"#));
        assert!(numeric_reason.flagged);
        assert_eq!(numeric_reason.reason, "42");

        for raw in [
            r#"{"flagged": 0}"#,
            r#"{"flagged": ""}"#,
            r#"{"flagged": null}"#,
            "true",
        ] {
            let result = GeminiModerationClient::interpret_reply(Some(raw));
            assert!(!result.flagged, "{} should be clean", raw);
            assert_eq!(result.reason, "Clean (No specific reason provided)");
        }
    }

    #[test]
    fn test_strip_code_fence_is_noop_without_fence() {
        assert_eq!(strip_code_fence(r#"{"a":1}"#), r#"{"a":1}"#);
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), r#"{"a":1}"#);
    }

    #[test]
    fn test_prompt_embeds_message() {
        let prompt = GeminiModerationClient::build_prompt("hello there");
        assert!(prompt.contains(r#"Message to analyze: """hello there""""#));
        assert!(prompt.contains("\"flagged\": true or false"));

        let request = serde_json::to_value(GeminiModerationClient::build_request("hi")).unwrap();
        assert_eq!(request["contents"][0]["role"], "user");
        assert!(request["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("\"\"\"hi\"\"\""));
    }

    #[test]
    fn test_first_text_handles_blocked_candidates() {
        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(blocked.first_text(), None);

        let none: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(none.first_text(), None);
    }

    #[tokio::test]
    async fn test_classify_round_trip() {
        let body = gemini_body("```json\n{\"flagged\": true, \"reason\": \"toxic\"}\n```");
        let (base_url, seen) = spawn_fake_gemini(StatusCode::OK, body, Duration::ZERO).await;

        let result = client(base_url, Duration::from_secs(5))
            .classify("some message")
            .await
            .unwrap();

        assert_eq!(
            result,
            ModerationResult::flagged(ModerationProvider::Gemini, "toxic")
        );

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (uri, request_body) = &seen[0];
        assert!(uri.starts_with("/v1beta/models/gemini-2.5-flash:generateContent"));
        assert!(uri.contains("key=test-key"));
        assert!(request_body.contains("some message"));
    }

    #[tokio::test]
    async fn test_classify_unexpected_body_is_clean() {
        let (base_url, _) =
            spawn_fake_gemini(StatusCode::OK, "not json".to_string(), Duration::ZERO).await;

        let result = client(base_url, Duration::from_secs(5))
            .classify("some message")
            .await
            .unwrap();

        assert!(!result.flagged);
        assert_eq!(result.reason, "Gemini response empty, treated as clean");
    }

    #[tokio::test]
    async fn test_classify_http_error_carries_status() {
        let body = r#"{"error":{"code":429,"message":"Resource exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        let (base_url, _) = spawn_fake_gemini(
            StatusCode::TOO_MANY_REQUESTS,
            body.to_string(),
            Duration::ZERO,
        )
        .await;

        let err = client(base_url, Duration::from_secs(5))
            .classify("some message")
            .await
            .unwrap_err();

        match err {
            ClassifierError::Request { status, message } => {
                assert_eq!(status, Some(429));
                assert_eq!(message, "Resource exhausted");
            }
        }
    }

    #[tokio::test]
    async fn test_classify_times_out() {
        let (base_url, _) = spawn_fake_gemini(
            StatusCode::OK,
            gemini_body(r#"{"flagged": false, "reason": "Clean"}"#),
            Duration::from_millis(500),
        )
        .await;

        let err = client(base_url, Duration::from_millis(50))
            .classify("some message")
            .await
            .unwrap_err();

        let ClassifierError::Request { status, .. } = &err;
        assert_eq!(*status, None);
        assert!(err.to_string().contains("status code N/A"));
    }
}
