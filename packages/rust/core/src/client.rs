//! Completion-service boundary.
//!
//! [`EnrichmentClient`] is the single seam between the pipeline and the
//! outside world. [`ChatCompletionClient`] implements it against an
//! OpenAI-compatible `/chat/completions` endpoint; tests substitute stubs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use brandlex_shared::{BrandlexError, ClientConfig, EnrichmentRequest, Result};

/// User-Agent string for completion requests.
const USER_AGENT: &str = concat!("brandlex/", env!("CARGO_PKG_VERSION"));

/// Cap on how much of an error body is echoed into error messages.
const MAX_ERROR_BODY: usize = 300;

/// One external completion call.
///
/// Implementations must be shareable across concurrent tasks. Errors are
/// returned as [`BrandlexError::Network`] or [`BrandlexError::Enrichment`];
/// the returned text is the raw completion, not post-processed.
#[async_trait]
pub trait EnrichmentClient: Send + Sync {
    async fn complete(&self, request: &EnrichmentRequest) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
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
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

// ---------------------------------------------------------------------------
// Chat-completions client
// ---------------------------------------------------------------------------

/// Client for OpenAI-compatible chat-completions APIs.
///
/// Owns one pooled `reqwest::Client`; clone the `Arc` holding it rather than
/// building a second one.
pub struct ChatCompletionClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f64,
}

impl ChatCompletionClient {
    /// Build the client. Every request is bounded by `config.timeout_secs`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrandlexError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl EnrichmentClient for ChatCompletionClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, request: &EnrichmentRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system_instructions,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_content,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BrandlexError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BrandlexError::Network(format!("{}: body read failed: {e}", self.endpoint)))?;

        if !status.is_success() {
            return Err(BrandlexError::Enrichment(format!(
                "HTTP {status}: {}",
                error_message(&text)
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            BrandlexError::Enrichment(format!("invalid completion response: {e}"))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BrandlexError::Enrichment("response contained no choices".into()))?;
        let content = choice.message.content.ok_or_else(|| {
            BrandlexError::Enrichment("first choice has null message content".into())
        })?;

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }
}

/// Pull `error.message` out of an API error body, or fall back to the raw text.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => body.chars().take(MAX_ERROR_BODY).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: &str) -> ClientConfig {
        ClientConfig {
            api_key: "sk-test".into(),
            base_url: base_url.into(),
            model: "gpt-3.5-turbo".into(),
            temperature: 0.6,
            timeout_secs: 5,
        }
    }

    fn request() -> EnrichmentRequest {
        EnrichmentRequest {
            system_instructions: "List synonyms.".into(),
            user_content: "(Cisco) title:\nCatalyst".into(),
        }
    }

    #[tokio::test]
    async fn returns_first_choice_verbatim() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "temperature": 0.6,
                "messages": [
                    {"role": "system", "content": "List synonyms."},
                    {"role": "user", "content": "(Cisco) title:\nCatalyst"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "  Catalyst switch\nCat 9k \n"}},
                    {"message": {"role": "assistant", "content": "ignored"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(&config(&server.uri())).unwrap();
        let text = client.complete(&request()).await.unwrap();
        assert_eq!(text, "  Catalyst switch\nCat 9k \n");
    }

    #[tokio::test]
    async fn trailing_slash_in_base_url_is_tolerated() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .mount(&server)
            .await;

        let base = format!("{}/v1/", server.uri());
        let client = ChatCompletionClient::new(&config(&base)).unwrap();
        assert_eq!(client.complete(&request()).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn auth_failure_carries_service_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(&config(&server.uri())).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, BrandlexError::Enrichment(_)));
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("Incorrect API key provided"));
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(&config(&server.uri())).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn null_content_is_reported_as_such() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let client = ChatCompletionClient::new(&config(&server.uri())).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, BrandlexError::Enrichment(_)));
        assert!(err.to_string().contains("null message content"));
        assert!(!err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(3))
                    .set_body_json(serde_json::json!({"choices": [{"message": {"content": "late"}}]})),
            )
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.timeout_secs = 1;
        let client = ChatCompletionClient::new(&cfg).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, BrandlexError::Network(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP.
        let client = ChatCompletionClient::new(&config("http://127.0.0.1:9")).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn error_message_falls_back_to_raw_body() {
        assert_eq!(error_message("upstream exploded"), "upstream exploded");
        let long = "x".repeat(1000);
        assert_eq!(error_message(&long).len(), MAX_ERROR_BODY);
    }
}
