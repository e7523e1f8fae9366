//! OpenAI-compatible chat-completions client.

use crate::error::CyoaError;
use crate::types::ChatMessage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sampling temperature for option generation; fixed, not configurable.
const TEMPERATURE: f64 = 0.8;

/// Thin client around one completions endpoint.
#[derive(Debug, Clone)]
pub struct CompletionsClient {
    url: String,
    api_key: String,
    http: reqwest::Client,
}

// -- Request/response types -------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Normalize a user-entered endpoint so it always targets
/// `.../v1/chat/completions`, with or without a trailing slash or `v1`
/// segment in the input.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let mut url = endpoint.trim().to_string();
    if !url.ends_with('/') {
        url.push('/');
    }
    if !url.ends_with("v1/") {
        url.push_str("v1/");
    }
    url.push_str("chat/completions");
    url
}

impl CompletionsClient {
    pub fn new(endpoint: &str, api_key: &str) -> Self {
        Self {
            url: normalize_endpoint(endpoint),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Request a completion and return the first choice's content.
    ///
    /// Any failure here is terminal for the generation attempt; there are
    /// no retries.
    pub async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String, CyoaError> {
        let request = ChatRequest {
            model,
            messages,
            temperature: TEMPERATURE,
            max_tokens,
        };

        debug!("Completion request to model: {}", model);

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CyoaError::Network(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CyoaError::Network(format!("{status}: {body}")));
        }

        let body: ChatResponse = resp
            .json()
            .await
            .map_err(|e| CyoaError::Parse(format!("malformed completion response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| CyoaError::Parse("empty response from API".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_normalization_handles_all_spellings() {
        let want = "https://api.example.com/v1/chat/completions";
        assert_eq!(normalize_endpoint("https://api.example.com"), want);
        assert_eq!(normalize_endpoint("https://api.example.com/"), want);
        assert_eq!(normalize_endpoint("https://api.example.com/v1"), want);
        assert_eq!(normalize_endpoint("https://api.example.com/v1/"), want);
        assert_eq!(normalize_endpoint("  https://api.example.com "), want);
    }
}
