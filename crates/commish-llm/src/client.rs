// Chat-completion streaming client using reqwest-eventsource.
//
// Speaks either the OpenAI chat completions API or the Anthropic Messages API
// with `stream: true`, collects the deltas into the full reply, and optionally
// forwards progress as `LlmEvent`s over an mpsc channel.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event::LlmEvent;
use crate::generator::{GenerationError, GenerationRequest, Generator};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Provider::OpenAi => OPENAI_API_URL,
            Provider::Anthropic => ANTHROPIC_API_URL,
        }
    }

    pub fn api_key_var(self) -> &'static str {
        match self {
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(format!("unknown provider '{other}' (expected openai or anthropic)")),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        })
    }
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// Low-level streaming chat client.
pub struct ChatClient {
    http: reqwest::Client,
    provider: Provider,
    api_key: String,
    endpoint: String,
    events: Option<mpsc::Sender<LlmEvent>>,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ChatClient {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            provider,
            api_key: api_key.into(),
            endpoint: provider.default_endpoint().to_string(),
            events: None,
        }
    }

    /// Send requests to a different URL (used by tests and proxies).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Forward token and completion events to `tx` while streaming.
    pub fn with_events(mut self, tx: mpsc::Sender<LlmEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Request body for the configured provider.
    pub(crate) fn build_body(&self, request: &GenerationRequest) -> Value {
        let p = &request.params;
        match self.provider {
            Provider::OpenAi => json!({
                "model": p.model,
                "temperature": p.temperature,
                "max_tokens": p.max_tokens,
                "presence_penalty": p.presence_penalty,
                "frequency_penalty": p.frequency_penalty,
                "stream": true,
                "stream_options": { "include_usage": true },
                "messages": [
                    { "role": "system", "content": request.system },
                    { "role": "user", "content": request.user }
                ]
            }),
            // The Messages API has no penalty terms.
            Provider::Anthropic => json!({
                "model": p.model,
                "temperature": p.temperature,
                "max_tokens": p.max_tokens,
                "stream": true,
                "system": request.system,
                "messages": [{ "role": "user", "content": request.user }]
            }),
        }
    }

    fn event_source(&self, request: &GenerationRequest) -> Result<EventSource, GenerationError> {
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .json(&self.build_body(request));
        builder = match self.provider {
            Provider::OpenAi => builder.bearer_auth(&self.api_key),
            Provider::Anthropic => builder
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
        };

        let mut es = builder
            .eventsource()
            .map_err(|e| GenerationError::Stream(format!("failed to create event source: {e}")))?;
        es.set_retry_policy(Box::new(Never));
        Ok(es)
    }

    async fn emit(&self, event: LlmEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    /// Stream one request to completion and return the collected text.
    pub async fn stream(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut es = self.event_source(request)?;

        let mut full_text = String::new();
        let mut input_tokens: u32 = 0;
        let mut output_tokens: u32 = 0;
        let mut finished = false;

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => {
                    debug!(provider = %self.provider, "SSE connection opened");
                }
                Ok(Event::Message(msg)) => {
                    if let Some(message) = parse_error_message(&msg.data) {
                        es.close();
                        self.emit(LlmEvent::Error {
                            message: message.clone(),
                        })
                        .await;
                        return Err(GenerationError::Stream(message));
                    }

                    let delta = match self.provider {
                        Provider::OpenAi => {
                            if msg.data.trim() == "[DONE]" {
                                finished = true;
                                break;
                            }
                            if let Some((input, output)) = parse_openai_usage(&msg.data) {
                                input_tokens = input;
                                output_tokens = output;
                            }
                            parse_openai_delta(&msg.data)
                        }
                        Provider::Anthropic => match msg.event.as_str() {
                            "message_start" => {
                                match parse_input_tokens(&msg.data) {
                                    Some(n) => input_tokens = n,
                                    None => warn!("failed to parse input_tokens from message_start"),
                                }
                                None
                            }
                            "content_block_delta" => parse_delta_text(&msg.data),
                            "message_delta" => {
                                if let Some(n) = parse_output_tokens(&msg.data) {
                                    output_tokens = n;
                                }
                                None
                            }
                            "message_stop" => {
                                finished = true;
                                break;
                            }
                            // ping, content_block_start, content_block_stop
                            other => {
                                debug!(event_type = other, "ignoring SSE event");
                                None
                            }
                        },
                    };

                    if let Some(text) = delta {
                        full_text.push_str(&text);
                        self.emit(LlmEvent::Token { text }).await;
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(err) => {
                    warn!(?err, "SSE stream error");
                    es.close();
                    let error = into_generation_error(err).await;
                    self.emit(LlmEvent::Error {
                        message: error.to_string(),
                    })
                    .await;
                    return Err(error);
                }
            }
        }
        es.close();

        if !finished {
            debug!("stream ended without a stop marker");
        }
        if full_text.trim().is_empty() {
            self.emit(LlmEvent::Error {
                message: GenerationError::Empty.to_string(),
            })
            .await;
            return Err(GenerationError::Empty);
        }

        info!(
            provider = %self.provider,
            model = %request.params.model,
            input_tokens,
            output_tokens,
            "generation complete"
        );
        self.emit(LlmEvent::Complete {
            full_text: full_text.clone(),
            input_tokens,
            output_tokens,
        })
        .await;
        Ok(full_text)
    }
}

#[async_trait]
impl Generator for ChatClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.stream(request).await
    }
}

// ---------------------------------------------------------------------------
// LlmClient wrapper
// ---------------------------------------------------------------------------

/// Either a configured chat client or disabled (no API key).
#[derive(Debug)]
pub enum LlmClient {
    Active(ChatClient),
    Disabled,
}

impl LlmClient {
    /// `Active` when a non-blank key is present, otherwise `Disabled`.
    pub fn from_key(provider: Provider, api_key: Option<&str>) -> Self {
        match api_key.map(str::trim) {
            Some(key) if !key.is_empty() => LlmClient::Active(ChatClient::new(provider, key)),
            _ => LlmClient::Disabled,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, LlmClient::Active(_))
    }
}

#[async_trait]
impl Generator for LlmClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        match self {
            LlmClient::Active(client) => client.stream(request).await,
            LlmClient::Disabled => Err(GenerationError::NotConfigured),
        }
    }
}

// ---------------------------------------------------------------------------
// SSE JSON parsing helpers
// ---------------------------------------------------------------------------

/// Extract `choices[0].delta.content` from an OpenAI chunk.
///
/// Expected shape: `{ "choices": [ { "delta": { "content": "..." } } ] }`
pub(crate) fn parse_openai_delta(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Extract `(prompt_tokens, completion_tokens)` from the final OpenAI usage chunk.
pub(crate) fn parse_openai_usage(data: &str) -> Option<(u32, u32)> {
    let v: Value = serde_json::from_str(data).ok()?;
    let usage = v.get("usage")?;
    let input = usage.get("prompt_tokens")?.as_u64()? as u32;
    let output = usage.get("completion_tokens")?.as_u64()? as u32;
    Some((input, output))
}

/// Extract `input_tokens` from an Anthropic `message_start` event.
pub(crate) fn parse_input_tokens(data: &str) -> Option<u32> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("message")?
        .get("usage")?
        .get("input_tokens")?
        .as_u64()
        .map(|n| n as u32)
}

/// Extract `delta.text` from an Anthropic `content_block_delta` event.
pub(crate) fn parse_delta_text(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("delta")?
        .get("text")?
        .as_str()
        .map(|s| s.to_string())
}

/// Extract `usage.output_tokens` from an Anthropic `message_delta` event.
pub(crate) fn parse_output_tokens(data: &str) -> Option<u32> {
    let v: Value = serde_json::from_str(data).ok()?;
    v.get("usage")?
        .get("output_tokens")?
        .as_u64()
        .map(|n| n as u32)
}

/// Extract `error.message` from an error payload (both providers use it).
pub(crate) fn parse_error_message(data: &str) -> Option<String> {
    let v: Value = serde_json::from_str(data).ok()?;
    let error = v.get("error")?;
    match error.get("message").and_then(Value::as_str) {
        Some(message) => Some(message.to_string()),
        None => error.as_str().map(|s| s.to_string()),
    }
}

async fn into_generation_error(err: reqwest_eventsource::Error) -> GenerationError {
    match err {
        reqwest_eventsource::Error::InvalidStatusCode(status, response) => {
            let body = response.text().await.unwrap_or_default();
            let message = parse_error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            GenerationError::Status {
                status: status.as_u16(),
                message,
            }
        }
        reqwest_eventsource::Error::Transport(e) => GenerationError::Transport(e.to_string()),
        other => GenerationError::Stream(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerationParams;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn request() -> GenerationRequest {
        GenerationRequest {
            system: "be brief".into(),
            user: "{\"week\":3}".into(),
            params: GenerationParams::quotes("gpt-4o-mini"),
        }
    }

    // -- SSE JSON parsing tests --

    #[test]
    fn parse_openai_delta_content() {
        let data = r#"{"id":"c1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(parse_openai_delta(data), Some("Hello".to_string()));
    }

    #[test]
    fn parse_openai_delta_role_only_chunk() {
        let data = r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#;
        assert_eq!(parse_openai_delta(data), None);
    }

    #[test]
    fn parse_openai_usage_chunk() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":120,"completion_tokens":48,"total_tokens":168}}"#;
        assert_eq!(parse_openai_usage(data), Some((120, 48)));
        assert_eq!(parse_openai_usage(r#"{"choices":[]}"#), None);
    }

    #[test]
    fn parse_anthropic_events() {
        let start = r#"{"type":"message_start","message":{"usage":{"input_tokens":42}}}"#;
        assert_eq!(parse_input_tokens(start), Some(42));
        let delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        assert_eq!(parse_delta_text(delta), Some("Hi".to_string()));
        let end = r#"{"type":"message_delta","usage":{"output_tokens":7}}"#;
        assert_eq!(parse_output_tokens(end), Some(7));
    }

    #[test]
    fn parse_error_payloads() {
        let openai = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(
            parse_error_message(openai),
            Some("Incorrect API key provided".to_string())
        );
        let anthropic = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(parse_error_message(anthropic), Some("Overloaded".to_string()));
        assert_eq!(parse_error_message(r#"{"choices":[]}"#), None);
        assert_eq!(parse_error_message("[DONE]"), None);
    }

    #[test]
    fn provider_parsing() {
        assert_eq!("OpenAI".parse::<Provider>(), Ok(Provider::OpenAi));
        assert_eq!("anthropic".parse::<Provider>(), Ok(Provider::Anthropic));
        assert!("gemini".parse::<Provider>().is_err());
        assert_eq!(Provider::default(), Provider::OpenAi);
    }

    // -- Request body --

    #[test]
    fn openai_body_carries_penalties_and_usage_option() {
        let body = ChatClient::new(Provider::OpenAi, "sk-test").build_body(&request());
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 900);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "{\"week\":3}");
        assert!(body.get("presence_penalty").is_some());
    }

    #[test]
    fn anthropic_body_uses_top_level_system() {
        let body = ChatClient::new(Provider::Anthropic, "key").build_body(&request());
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert!(body.get("presence_penalty").is_none());
    }

    #[test]
    fn debug_output_hides_key() {
        let client = ChatClient::new(Provider::OpenAi, "sk-secret-123");
        assert!(!format!("{client:?}").contains("sk-secret-123"));
    }

    #[test]
    fn llm_client_from_key() {
        assert!(LlmClient::from_key(Provider::OpenAi, Some("sk")).is_active());
        assert!(!LlmClient::from_key(Provider::OpenAi, Some("  ")).is_active());
        assert!(!LlmClient::from_key(Provider::OpenAi, None).is_active());
    }

    #[tokio::test]
    async fn disabled_client_reports_not_configured() {
        let err = LlmClient::Disabled.generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::NotConfigured));
    }

    // -- Integration-style tests with mock TCP server --

    /// Read one full HTTP request (headers plus Content-Length body).
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = vec![0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&data).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if data.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&data).to_string()
    }

    async fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            // Keep connection alive briefly so the client can read everything.
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            request
        });
        (format!("http://{addr}/v1/chat"), handle)
    }

    #[tokio::test]
    async fn openai_stream_full_flow() {
        let response = concat!(
            "HTTP/1.1 200 OK\r\n",
            "Content-Type: text/event-stream\r\n",
            "Cache-Control: no-cache\r\n",
            "\r\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Kickoff\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\" time\"}}]}\n\n",
            "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":30,\"completion_tokens\":2}}\n\n",
            "data: [DONE]\n\n",
        );
        let (endpoint, server) = serve_once(response).await;

        let (tx, mut rx) = mpsc::channel(16);
        let client = ChatClient::new(Provider::OpenAi, "sk-test")
            .with_endpoint(endpoint)
            .with_events(tx);

        let text = client.stream(&request()).await.unwrap();
        assert_eq!(text, "Kickoff time");

        let raw_request = server.await.unwrap();
        assert!(raw_request.starts_with("POST /v1/chat"));
        assert!(raw_request.contains("Bearer sk-test") || raw_request.contains("bearer sk-test"));
        assert!(raw_request.contains("\"stream\":true"));

        drop(client);
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                LlmEvent::Token {
                    text: "Kickoff".into()
                },
                LlmEvent::Token {
                    text: " time".into()
                },
                LlmEvent::Complete {
                    full_text: "Kickoff time".into(),
                    input_tokens: 30,
                    output_tokens: 2,
                },
            ]
        );
    }

    #[tokio::test]
    async fn anthropic_stream_full_flow() {
        let response = concat!(
            "HTTP/1.1 200 OK\r\n",
            "Content-Type: text/event-stream\r\n",
            "\r\n",
            "event: message_start\r\n",
            "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":15}}}\r\n",
            "\r\n",
            "event: content_block_delta\r\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Game\"}}\r\n",
            "\r\n",
            "event: ping\r\n",
            "data: {\"type\":\"ping\"}\r\n",
            "\r\n",
            "event: content_block_delta\r\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" on\"}}\r\n",
            "\r\n",
            "event: message_delta\r\n",
            "data: {\"type\":\"message_delta\",\"usage\":{\"output_tokens\":7}}\r\n",
            "\r\n",
            "event: message_stop\r\n",
            "data: {\"type\":\"message_stop\"}\r\n",
            "\r\n",
        );
        let (endpoint, server) = serve_once(response).await;

        let client = ChatClient::new(Provider::Anthropic, "ak-test").with_endpoint(endpoint);
        let text = client.generate(&request()).await.unwrap();
        assert_eq!(text, "Game on");

        let raw_request = server.await.unwrap();
        assert!(raw_request.contains("x-api-key: ak-test"));
        assert!(raw_request.contains("anthropic-version"));
    }

    #[tokio::test]
    async fn error_status_carries_service_message() {
        let response = concat!(
            "HTTP/1.1 401 Unauthorized\r\n",
            "Content-Type: application/json\r\n",
            "Content-Length: 50\r\n",
            "\r\n",
            "{\"error\":{\"message\":\"Invalid API key\",\"type\":\"x\"}}",
        );
        let (endpoint, server) = serve_once(response).await;

        let (tx, mut rx) = mpsc::channel(4);
        let client = ChatClient::new(Provider::OpenAi, "bad")
            .with_endpoint(endpoint)
            .with_events(tx);
        let err = client.stream(&request()).await.unwrap_err();
        let _ = server.await;

        match err {
            GenerationError::Status { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid API key");
            }
            other => panic!("expected status error, got: {other:?}"),
        }
        match rx.recv().await {
            Some(LlmEvent::Error { message }) => assert!(message.contains("401")),
            other => panic!("expected error event, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_without_content_is_empty_error() {
        let response = concat!(
            "HTTP/1.1 200 OK\r\n",
            "Content-Type: text/event-stream\r\n",
            "\r\n",
            "data: [DONE]\n\n",
        );
        let (endpoint, server) = serve_once(response).await;
        let client = ChatClient::new(Provider::OpenAi, "sk").with_endpoint(endpoint);
        let err = client.stream(&request()).await.unwrap_err();
        let _ = server.await;
        assert!(matches!(err, GenerationError::Empty));
    }

    #[tokio::test]
    async fn in_stream_error_payload_fails_request() {
        let response = concat!(
            "HTTP/1.1 200 OK\r\n",
            "Content-Type: text/event-stream\r\n",
            "\r\n",
            "event: error\r\n",
            "data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\r\n",
            "\r\n",
        );
        let (endpoint, server) = serve_once(response).await;
        let client = ChatClient::new(Provider::Anthropic, "ak").with_endpoint(endpoint);
        let err = client.stream(&request()).await.unwrap_err();
        let _ = server.await;
        assert!(matches!(err, GenerationError::Stream(ref m) if m == "Overloaded"));
    }
}
