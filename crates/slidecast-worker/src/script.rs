//! Script generation via the Gemini API.
//!
//! The service is treated as unreliable: callers degrade to an empty
//! overlay when generation fails, so nothing here is allowed to take a
//! render down with it.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const MODEL: &str = "gemini-1.5-flash";

/// Produces narration text for a topic.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// Generate roughly `word_target` words about `topic`.
    async fn generate(&self, topic: &str, word_target: u32) -> WorkerResult<String>;
}

/// Gemini REST client.
pub struct GeminiScript {
    api_key: String,
    client: Client,
    base_url: String,
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiScript {
    /// Create a client from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> WorkerResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| WorkerError::config_error("GEMINI_API_KEY not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, MODEL, self.api_key
        )
    }

    fn prompt(topic: &str, word_target: u32) -> String {
        format!(
            "Write a short narration script for a video overlay. \
             Concise style, about {word_target} words. Topic: {topic}"
        )
    }
}

#[async_trait]
impl ScriptGenerator for GeminiScript {
    async fn generate(&self, topic: &str, word_target: u32) -> WorkerResult<String> {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Self::prompt(topic, word_target),
                }],
            }],
        };

        debug!(topic = %topic, word_target, "requesting narration script");

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WorkerError::script_generation(format!(
                "Gemini returned HTTP {}",
                response.status()
            )));
        }

        let body: GeminiResponse = response.json().await?;
        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(WorkerError::script_generation("empty response"));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate_body(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [
                { "content": { "parts": [ { "text": text } ] } }
            ]
        })
    }

    #[tokio::test]
    async fn test_generate_returns_first_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/v1beta/models/{MODEL}:generateContent")))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body(
                "  A short narration about volcanoes.  ",
            )))
            .mount(&server)
            .await;

        let client = GeminiScript::new("test-key").with_base_url(server.uri());
        let text = client.generate("volcanoes", 80).await.unwrap();
        assert_eq!(text, "A short narration about volcanoes.");
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = GeminiScript::new("test-key").with_base_url(server.uri());
        let result = client.generate("volcanoes", 80).await;
        assert!(matches!(result, Err(WorkerError::ScriptGeneration(_))));
    }

    #[tokio::test]
    async fn test_empty_candidates_are_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let client = GeminiScript::new("test-key").with_base_url(server.uri());
        let result = client.generate("volcanoes", 80).await;
        assert!(matches!(result, Err(WorkerError::ScriptGeneration(_))));
    }

    #[test]
    fn test_prompt_includes_topic_and_length() {
        let prompt = GeminiScript::prompt("deep sea fish", 60);
        assert!(prompt.contains("deep sea fish"));
        assert!(prompt.contains("60 words"));
    }
}
