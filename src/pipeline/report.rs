//! Narrative report generation via the Gemini generative-language API.
//!
//! The classifier verdict is turned into a fixed prompt; the model's text is
//! returned verbatim. The expected section layout is requested, not checked.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::AnalysisError;
use crate::config::{ConfigError, GeminiConfig};
use crate::models::ClassificationResult;

/// Build the report prompt for a classification.
pub fn build_report_prompt(result: &ClassificationResult) -> String {
    let class = result.predicted.as_str();
    let percent = result.top_confidence() * 100.0;

    format!(
        "Generate a detailed medical analysis report for an MRI brain scan with the following structure:

MRI Brain Scan Analysis Report

First paragraph: Summarize the findings mentioning that the AI analysis indicates a diagnosis of {class} with a confidence score of {percent:.1}%. Explain what this means and emphasize this is a preliminary AI assessment requiring professional confirmation.

1. Explanation of Diagnosis
[Explain what {class} means in terms of cognitive abilities and daily life impact]

2. Key Observations Associated with {class}
[List typical MRI findings and characteristics associated with this condition]

3. Recommended Next Steps
[Provide actionable recommendations for medical follow-up and care]

4. Lifestyle and Care Considerations
[Suggest lifestyle modifications and care strategies]

Important: Format the response with proper headings and paragraphs, but DO NOT include any HTML tags or markdown. Use plain text formatting only.
Keep the tone professional but compassionate.
"
    )
}

/// External text generator used for the narrative part of a response.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AnalysisError>;
}

// ═══════════════════════════════════════════════════════════
// Gemini wire types
// ═══════════════════════════════════════════════════════════

/// Request body for `models/{model}:generateContent`
#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Response body from `generateContent`
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Error envelope returned on non-2xx statuses.
#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, AnalysisError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AnalysisError::ExternalService(format!(
            "prompt blocked: {reason}"
        )));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AnalysisError::ExternalService("response has no candidates".into()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".into());
        return Err(AnalysisError::ExternalService(format!(
            "response has no text (finish reason {reason})"
        )));
    }

    Ok(text)
}

// ═══════════════════════════════════════════════════════════
// Gemini client
// ═══════════════════════════════════════════════════════════

/// Async HTTP client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl ReportGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AnalysisError> {
        let body = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AnalysisError::ExternalService(format!("cannot reach {}", self.base_url))
                } else if e.is_timeout() {
                    AnalysisError::ExternalService(format!(
                        "request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    AnalysisError::ExternalService(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|env| env.error.message)
                .unwrap_or(body);
            return Err(AnalysisError::ExternalService(format!(
                "status {}: {detail}",
                status.as_u16()
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ExternalService(format!("malformed response: {e}")))?;

        extract_text(parsed)
    }
}

/// Mock report generator for testing: canned text or simulated failure.
pub struct MockReportGenerator {
    outcome: Result<String, String>,
    last_prompt: Mutex<Option<String>>,
}

impl MockReportGenerator {
    pub fn new(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
            last_prompt: Mutex::new(None),
        }
    }

    /// Simulates a network failure on every call.
    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl ReportGenerator for MockReportGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, AnalysisError> {
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }
        self.outcome
            .clone()
            .map_err(AnalysisError::ExternalService)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DementiaClass;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::net::SocketAddr;

    fn gemini_config(base_url: &str) -> GeminiConfig {
        GeminiConfig {
            api_key: "test-key".into(),
            model: "gemini-1.5-flash".into(),
            base_url: base_url.into(),
            timeout_secs: 5,
        }
    }

    /// Serve a fake Gemini endpoint on an ephemeral port.
    async fn fake_gemini(status: StatusCode, body: serde_json::Value) -> SocketAddr {
        let app = Router::new().route(
            "/v1beta/models/:model_action",
            post(move |headers: HeaderMap, Json(req): Json<serde_json::Value>| {
                let body = body.clone();
                async move {
                    // Reject calls that don't carry the key or the prompt
                    if headers.get("x-goog-api-key").map(|v| v.as_bytes()) != Some(&b"test-key"[..]) {
                        return (StatusCode::FORBIDDEN, Json(serde_json::json!({})));
                    }
                    if req["contents"][0]["parts"][0]["text"].as_str().is_none() {
                        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({})));
                    }
                    (status, Json(body))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    // ── Prompt ──

    #[test]
    fn prompt_names_class_and_percentage() {
        let result = ClassificationResult::from_probabilities([0.1, 0.05, 0.05, 0.8]);
        let prompt = build_report_prompt(&result);
        assert!(prompt.contains("diagnosis of Very Mild Dementia with a confidence score of 80.0%"));
        assert!(prompt.contains("2. Key Observations Associated with Very Mild Dementia"));
    }

    #[test]
    fn prompt_has_all_sections_and_plain_text_rule() {
        let result = ClassificationResult::from_probabilities([0.7, 0.1, 0.1, 0.1]);
        let prompt = build_report_prompt(&result);
        for heading in [
            "MRI Brain Scan Analysis Report",
            "1. Explanation of Diagnosis",
            "3. Recommended Next Steps",
            "4. Lifestyle and Care Considerations",
            "DO NOT include any HTML tags or markdown",
        ] {
            assert!(prompt.contains(heading), "missing {heading}");
        }
        assert!(prompt.contains("Mild Dementia with a confidence score of 70.0%"));
    }

    #[test]
    fn percentage_has_one_decimal() {
        let result = ClassificationResult::from_probabilities([0.12345, 0.5678, 0.2, 0.10875]);
        assert_eq!(result.predicted, DementiaClass::ModerateDementia);
        assert!(build_report_prompt(&result).contains("56.8%"));
    }

    // ── Response parsing ──

    fn parse(json: serde_json::Value) -> Result<String, AnalysisError> {
        extract_text(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn text_parts_are_concatenated() {
        let text = parse(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Part one. "}, {"text": "Part two."}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(text, "Part one. Part two.");
    }

    #[test]
    fn blocked_prompt_is_error() {
        let err = parse(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn no_candidates_is_error() {
        let err = parse(serde_json::json!({"candidates": []})).unwrap_err();
        assert_eq!(err.kind(), "external_service");
    }

    #[test]
    fn empty_candidate_reports_finish_reason() {
        let err = parse(serde_json::json!({
            "candidates": [{"finishReason": "RECITATION"}]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("RECITATION"));
    }

    // ── Client ──

    #[test]
    fn client_trims_trailing_slash() {
        let client = GeminiClient::new(&gemini_config("https://example.test/")).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert_eq!(client.model(), "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn client_returns_text_verbatim() {
        let addr = fake_gemini(
            StatusCode::OK,
            serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "MRI Brain Scan Analysis Report\n..."}]}}]
            }),
        )
        .await;
        let client = GeminiClient::new(&gemini_config(&format!("http://{addr}"))).unwrap();
        let text = client.generate("prompt").await.unwrap();
        assert_eq!(text, "MRI Brain Scan Analysis Report\n...");
    }

    #[tokio::test]
    async fn client_surfaces_api_error_message() {
        let addr = fake_gemini(
            StatusCode::TOO_MANY_REQUESTS,
            serde_json::json!({"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}),
        )
        .await;
        let client = GeminiClient::new(&gemini_config(&format!("http://{addr}"))).unwrap();
        let err = client.generate("prompt").await.unwrap_err();
        assert_eq!(err.kind(), "external_service");
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Quota exceeded"));
    }

    #[tokio::test]
    async fn unreachable_service_is_external_error() {
        // Bind then drop to get a port with nothing listening
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GeminiClient::new(&gemini_config(&format!("http://{addr}"))).unwrap();
        let err = client.generate("prompt").await.unwrap_err();
        assert!(matches!(err, AnalysisError::ExternalService(_)));
    }

    // ── Mock ──

    #[tokio::test]
    async fn mock_records_prompt() {
        let mock = MockReportGenerator::new("report");
        assert_eq!(mock.generate("hello").await.unwrap(), "report");
        assert_eq!(mock.last_prompt().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn failing_mock_is_external_error() {
        let mock = MockReportGenerator::failing("connection reset");
        let err = mock.generate("hello").await.unwrap_err();
        assert!(matches!(err, AnalysisError::ExternalService(ref m) if m == "connection reset"));
    }
}
