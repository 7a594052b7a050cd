//! Chat completion requests against the remote API

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::error::CompletionError;
use crate::models::{Preferences, Role, Turn};
use crate::paths::COMPLETIONS_URL;
use crate::prompts::NO_MARKDOWN_PROMPT;

/// Produces the assistant reply for a conversation
#[async_trait(?Send)]
pub trait Completer {
    /// `messages` ends with the new user turn; no synthetic system turn yet
    async fn complete(
        &self,
        messages: Vec<Turn>,
        prefs: &Preferences,
    ) -> Result<String, CompletionError>;
}

/// Request body of the completions endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub stream: bool,
}

/// Builds the request body, prepending the plain-text instruction when asked.
///
/// At most one system turn is added per request: if `messages` already has
/// one, it is left alone.
pub fn build_request(mut messages: Vec<Turn>, prefs: &Preferences) -> ChatRequest {
    if prefs.no_markdown && !messages.iter().any(|turn| turn.role == Role::System) {
        messages.insert(0, Turn::system(NO_MARKDOWN_PROMPT));
    }
    ChatRequest {
        model: prefs.model_or_default().to_string(),
        messages,
        stream: false,
    }
}

/// reqwest-backed client for OpenAI-compatible chat completion endpoints
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl Default for CompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionClient {
    pub fn new() -> Self {
        Self::with_endpoint(COMPLETIONS_URL)
    }

    /// Client for a custom endpoint (OpenAI-compatible servers)
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait(?Send)]
impl Completer for CompletionClient {
    async fn complete(
        &self,
        messages: Vec<Turn>,
        prefs: &Preferences,
    ) -> Result<String, CompletionError> {
        let api_key = prefs.api_key().ok_or(CompletionError::MissingApiKey)?;
        let request = build_request(messages, prefs);
        debug!(
            "[complete] model={} messages={}",
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        if !status.is_success() {
            let message = api_error_message(&body)
                .unwrap_or_else(|| format!("API request failed (HTTP {})", status.as_u16()));
            warn!("[complete] API error {}: {}", status.as_u16(), message);
            return Err(CompletionError::Api(message));
        }

        parse_reply(&body)
    }
}

/// Extracts `error.message` from an error body, if it has one
fn api_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json["error"]["message"]
        .as_str()
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

/// Extracts `choices[0].message.content` from a success body
fn parse_reply(body: &str) -> Result<String, CompletionError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            CompletionError::MalformedResponse("response contained no reply".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prefs(no_markdown: bool) -> Preferences {
        Preferences {
            api_key: Some("sk-test".to_string()),
            model_name: Some("gpt-4".to_string()),
            use_dropdown: Some(true),
            no_markdown,
        }
    }

    fn conversation() -> Vec<Turn> {
        vec![
            Turn::user("hi"),
            Turn::assistant("hello"),
            Turn::user("how are you?"),
        ]
    }

    #[test]
    fn request_keeps_turn_order_without_system_turn() {
        let request = build_request(conversation(), &prefs(false));
        assert_eq!(request.messages, conversation());
        assert_eq!(request.model, "gpt-4");
        assert!(!request.stream);
    }

    #[test]
    fn no_markdown_prepends_exactly_one_system_turn() {
        let request = build_request(conversation(), &prefs(true));
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0], Turn::system(NO_MARKDOWN_PROMPT));
        assert_eq!(&request.messages[1..], conversation().as_slice());
    }

    #[test]
    fn existing_system_turn_is_not_duplicated() {
        let mut messages = conversation();
        messages.insert(0, Turn::system("be brief"));
        let request = build_request(messages, &prefs(true));
        let system_turns = request
            .messages
            .iter()
            .filter(|turn| turn.role == Role::System)
            .count();
        assert_eq!(system_turns, 1);
        assert_eq!(request.messages[0].content, "be brief");
    }

    #[test]
    fn missing_model_uses_default() {
        let prefs = Preferences {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        assert_eq!(build_request(vec![], &prefs).model, "gpt-3.5-turbo");
    }

    #[test]
    fn request_serializes_to_wire_shape() {
        let request = build_request(vec![Turn::user("hi")], &prefs(false));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "gpt-4",
                "messages": [{ "role": "user", "content": "hi" }],
                "stream": false
            })
        );
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let client = CompletionClient::with_endpoint("http://127.0.0.1:9/unreachable");
        let err = client
            .complete(conversation(), &Preferences::default())
            .await
            .unwrap_err();
        assert_eq!(err, CompletionError::MissingApiKey);
        assert!(err.to_string().starts_with("Please set your API key"));
    }

    mod http_tests {
        use super::*;
        use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

        #[tokio::test]
        async fn returns_first_choice_content() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::path("/v1/chat/completions"))
                .and(matchers::header("authorization", "Bearer sk-test"))
                .and(matchers::body_json(json!({
                    "model": "gpt-4",
                    "messages": [
                        { "role": "user", "content": "hi" },
                        { "role": "assistant", "content": "hello" },
                        { "role": "user", "content": "how are you?" }
                    ],
                    "stream": false
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": "chatcmpl-1",
                    "choices": [{
                        "index": 0,
                        "message": { "role": "assistant", "content": "Doing well." },
                        "finish_reason": "stop"
                    }]
                })))
                .expect(1)
                .mount(&mock_server)
                .await;

            let client =
                CompletionClient::with_endpoint(format!("{}/v1/chat/completions", mock_server.uri()));
            let reply = client.complete(conversation(), &prefs(false)).await.unwrap();
            assert_eq!(reply, "Doing well.");
        }

        #[tokio::test]
        async fn surfaces_server_error_message() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                    "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
                })))
                .mount(&mock_server)
                .await;

            let client = CompletionClient::with_endpoint(mock_server.uri());
            let err = client.complete(conversation(), &prefs(false)).await.unwrap_err();
            assert_eq!(err, CompletionError::Api("Incorrect API key provided".to_string()));
        }

        #[tokio::test]
        async fn falls_back_to_generic_message_without_error_body() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
                .mount(&mock_server)
                .await;

            let client = CompletionClient::with_endpoint(mock_server.uri());
            let err = client.complete(conversation(), &prefs(false)).await.unwrap_err();
            assert_eq!(err, CompletionError::Api("API request failed (HTTP 502)".to_string()));
        }

        #[tokio::test]
        async fn success_without_choices_is_malformed() {
            let mock_server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
                .mount(&mock_server)
                .await;

            let client = CompletionClient::with_endpoint(mock_server.uri());
            let err = client.complete(conversation(), &prefs(false)).await.unwrap_err();
            assert!(matches!(err, CompletionError::MalformedResponse(_)));
        }

        #[tokio::test]
        async fn transport_failure_is_a_network_error() {
            // Reserve a free port, then release it so nothing is listening
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            let addr = listener.local_addr().unwrap();
            drop(listener);

            let client = CompletionClient::with_endpoint(format!("http://{}/v1/chat/completions", addr));
            let err = client.complete(conversation(), &prefs(false)).await.unwrap_err();
            assert!(matches!(err, CompletionError::Network(_)));
        }
    }
}
