use crate::LlmProvider;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tidal_core::{CoreError, LlmError};
use tracing::{debug, error, warn};

pub const GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const PROVIDER_NAME: &str = "Google Gemini";

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String, LlmError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::ContentFiltered { reason });
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponseFormat {
            provider: PROVIDER_NAME.to_string(),
        })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    let text = text.trim();

    if text.is_empty() {
        let finish_reason = candidate.finish_reason.unwrap_or_default();
        return match finish_reason.as_str() {
            "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST" => Err(LlmError::ContentFiltered {
                reason: finish_reason.clone(),
            }),
            _ => Err(LlmError::InvalidResponseFormat {
                provider: PROVIDER_NAME.to_string(),
            }),
        };
    }
    Ok(text.to_string())
}

fn status_error(status: StatusCode, retry_after: Option<u64>) -> LlmError {
    let provider = PROVIDER_NAME.to_string();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::AuthenticationFailed { provider }
        }
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimitExceeded {
            provider,
            retry_after: retry_after.unwrap_or(60),
        },
        status if status.is_server_error() => LlmError::ServiceUnavailable { provider },
        _ => LlmError::InvalidResponseFormat { provider },
    }
}

pub struct GeminiProvider {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CoreError> {
        Ok(Self {
            http_client: Client::builder().build()?,
            api_key: api_key.into(),
            base_url: GEMINI_API_URL.to_string(),
            model: GEMINI_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn generate(&self, prompt: &str) -> Result<String, CoreError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            error!("{} returned status {}", PROVIDER_NAME, status);
            return Err(CoreError::Llm(status_error(status, retry_after)));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            error!("Failed to parse {} response: {}", PROVIDER_NAME, e);
            CoreError::Llm(LlmError::InvalidResponseFormat {
                provider: PROVIDER_NAME.to_string(),
            })
        })?;

        Ok(extract_text(parsed)?)
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn get_response_text(
        &self,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, CoreError> {
        debug!("Sending prompt to {} ({} chars)", self.model, prompt.len());
        match tokio::time::timeout(timeout, self.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} did not answer within {:?}", PROVIDER_NAME, timeout);
                Err(CoreError::timeout(
                    format!("{} request", PROVIDER_NAME),
                    timeout,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_extracts_and_trims_text() {
        let response = parse(
            r#"{
                "candidates": [{
                    "content": {"parts": [{"text": "  Calm and "}, {"text": "focused\n"}], "role": "model"},
                    "finishReason": "STOP"
                }]
            }"#,
        );
        assert_eq!(extract_text(response).unwrap(), "Calm and focused");
    }

    #[test]
    fn test_blocked_prompt_is_filtered() {
        let response = parse(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#);
        assert_eq!(
            extract_text(response),
            Err(LlmError::ContentFiltered {
                reason: "SAFETY".to_string()
            })
        );
    }

    #[test]
    fn test_missing_text_is_invalid_format() {
        assert!(matches!(
            extract_text(parse(r#"{"candidates": []}"#)),
            Err(LlmError::InvalidResponseFormat { .. })
        ));
        assert!(matches!(
            extract_text(parse(r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#)),
            Err(LlmError::InvalidResponseFormat { .. })
        ));
        assert!(matches!(
            extract_text(parse(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#)),
            Err(LlmError::ContentFiltered { .. })
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, None),
            LlmError::AuthenticationFailed { .. }
        ));
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(12)),
            LlmError::RateLimitExceeded {
                provider: PROVIDER_NAME.to_string(),
                retry_after: 12
            }
        );
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, None),
            LlmError::ServiceUnavailable { .. }
        ));
    }

    #[test]
    fn test_endpoint() {
        let provider = GeminiProvider::new("key")
            .unwrap()
            .with_base_url("http://localhost:9999")
            .with_model("gemini-test");
        assert_eq!(
            provider.endpoint(),
            "http://localhost:9999/models/gemini-test:generateContent"
        );
    }
}
