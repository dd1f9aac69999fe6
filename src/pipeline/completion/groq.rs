use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::rate_limit::parse_wait_duration;
use super::types::{ChatMessage, CompletionBackend};
use super::BackendError;
use crate::config::AppConfig;

/// Wait used when a 429 carries neither a wait phrase nor `retry-after`.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Groq chat-completion client (OpenAI-compatible API).
pub struct GroqClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GroqClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BackendError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, BackendError> {
        Self::new(&config.base_url, &config.api_key, config.timeout_secs)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Request body for POST /chat/completions
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

/// Response body from POST /chat/completions
#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error envelope: `{"error": {"message": "...", "type": "..."}}`
#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Human-readable message of an error body, or the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.to_string())
}

/// Build a rate-limit error from a 429 body and optional `retry-after` header.
pub(crate) fn rate_limit_error(body: &str, retry_after: Option<&str>) -> BackendError {
    let message = error_message(body);
    let wait = parse_wait_duration(&message)
        .or_else(|| {
            retry_after
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64)
        })
        .unwrap_or(DEFAULT_RATE_LIMIT_WAIT);
    BackendError::RateLimited { wait, message }
}

impl CompletionBackend for GroqClient {
    fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest { model, messages };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::HttpClient(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    BackendError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().unwrap_or_default();
            return Err(rate_limit_error(&body, retry_after.as_deref()));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body: error_message(&body),
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|e| BackendError::ResponseParsing(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::ResponseParsing("No choices in response".into()))?;

        Ok(choice.message.content.unwrap_or_default())
    }
}

/// Mock backend for testing — replays a script of results and records models.
pub struct MockBackend {
    script: Mutex<VecDeque<Result<String, BackendError>>>,
    repeat: Option<Result<String, BackendError>>,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Replay `results` in order; calls past the end fail as transient errors.
    pub fn scripted(results: Vec<Result<String, BackendError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            repeat: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Return `result` on every call.
    pub fn always(result: Result<String, BackendError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(result),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Models requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

impl CompletionBackend for MockBackend {
    fn complete(&self, model: &str, _messages: &[ChatMessage]) -> Result<String, BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(model.to_string());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match (next, &self.repeat) {
            (Some(result), _) => result,
            (None, Some(result)) => result.clone(),
            (None, None) => Err(BackendError::HttpClient("mock script exhausted".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    /// Serve one canned HTTP response on a local port.
    ///
    /// Returns the base URL and a receiver yielding the raw request text.
    fn serve_once(status_line: &str, headers: &[&str], body: &str) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut response = format!("HTTP/1.1 {status_line}\r\n");
        for header in headers {
            response.push_str(header);
            response.push_str("\r\n");
        }
        response.push_str(&format!(
            "Content-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ));

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            stream.write_all(response.as_bytes()).unwrap();
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
        });

        (format!("http://{addr}"), rx)
    }

    /// Client pointed at `base_url`, bypassing any proxy from the environment.
    fn local_client(base_url: &str) -> GroqClient {
        GroqClient {
            base_url: base_url.to_string(),
            api_key: "test-key".into(),
            client: reqwest::blocking::Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
            timeout_secs: 5,
        }
    }

    fn user_turn() -> Vec<ChatMessage> {
        vec![ChatMessage::user("label this")]
    }

    #[test]
    fn complete_posts_chat_request_and_returns_content() {
        let (base, request) = serve_once(
            "200 OK",
            &[],
            r#"{"choices":[{"message":{"role":"assistant","content":"safe"}}]}"#,
        );
        let out = local_client(&base).complete("llama3-70b", &user_turn()).unwrap();
        assert_eq!(out, "safe");

        let request = request.recv().unwrap();
        assert!(request.starts_with("POST /chat/completions "));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer test-key"));
        assert!(request.contains(r#""model":"llama3-70b""#));
    }

    #[test]
    fn too_many_requests_reads_wait_from_message() {
        let (base, _request) = serve_once(
            "429 Too Many Requests",
            &["Retry-After: 7"],
            r#"{"error":{"message":"Rate limit reached. Please try again in 1m20s.","type":"tokens"}}"#,
        );
        let err = local_client(&base).complete("a", &user_turn()).unwrap_err();
        assert_eq!(err.rate_limit_wait(), Some(Duration::from_secs(80)));
        assert!(matches!(err, BackendError::RateLimited { ref message, .. } if message.starts_with("Rate limit reached")));
    }

    #[test]
    fn too_many_requests_falls_back_to_retry_after_header() {
        let (base, _request) = serve_once(
            "429 Too Many Requests",
            &["Retry-After: 7"],
            r#"{"error":{"message":"Too many requests"}}"#,
        );
        let err = local_client(&base).complete("a", &user_turn()).unwrap_err();
        assert_eq!(err.rate_limit_wait(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn server_error_maps_to_api_error() {
        let (base, _request) = serve_once(
            "500 Internal Server Error",
            &[],
            r#"{"error":{"message":"upstream failure"}}"#,
        );
        let err = local_client(&base).complete("a", &user_turn()).unwrap_err();
        assert_eq!(
            err,
            BackendError::Api { status: 500, body: "upstream failure".into() }
        );
    }

    #[test]
    fn missing_choices_is_parse_error() {
        let (base, _request) = serve_once("200 OK", &[], r#"{"choices":[]}"#);
        let err = local_client(&base).complete("a", &user_turn()).unwrap_err();
        assert!(matches!(err, BackendError::ResponseParsing(_)));
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = GroqClient::new("https://api.groq.com/openai/v1/", "key", 30).unwrap();
        assert_eq!(client.base_url(), "https://api.groq.com/openai/v1");
        assert_eq!(client.timeout_secs, 30);
    }

    #[test]
    fn client_from_config() {
        let config = AppConfig {
            api_key: "key".into(),
            base_url: "http://localhost:8080".into(),
            primary_model: "a".into(),
            alternate_model: None,
            dataset: "HuggingFaceFW/fineweb".into(),
            data_dir: "data".into(),
            timeout_secs: 5,
        };
        let client = GroqClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.api_key, "key");
    }

    #[test]
    fn request_body_shape() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let body = ChatCompletionRequest { model: "m", messages: &messages };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "m");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "u");
    }

    #[test]
    fn response_content_decodes() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hello"}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
    }

    #[test]
    fn null_content_decodes_as_none() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, None);
    }

    #[test]
    fn rate_limit_wait_from_message() {
        let body = r#"{"error":{"message":"Rate limit reached for model `llama3-70b-8192`. Please try again in 1m20s. Visit https://console.groq.com/docs/rate-limits","type":"tokens","code":"rate_limit_exceeded"}}"#;
        let err = rate_limit_error(body, Some("7"));
        match err {
            BackendError::RateLimited { wait, message } => {
                assert_eq!(wait.as_secs(), 80);
                assert!(message.starts_with("Rate limit reached"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rate_limit_wait_falls_back_to_header() {
        let err = rate_limit_error("too many requests", Some("7"));
        assert_eq!(err.rate_limit_wait(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn rate_limit_wait_default() {
        let err = rate_limit_error("", None);
        assert_eq!(err.rate_limit_wait(), Some(DEFAULT_RATE_LIMIT_WAIT));
    }

    #[test]
    fn error_message_falls_back_to_body() {
        assert_eq!(error_message("plain"), "plain");
        assert_eq!(error_message(r#"{"error":{"message":"bad model"}}"#), "bad model");
    }

    #[test]
    fn mock_replays_script_then_fails() {
        let mock = MockBackend::scripted(vec![Ok("one".into()), Err(BackendError::EmptyResponse)]);
        assert_eq!(mock.complete("a", &[]).unwrap(), "one");
        assert_eq!(mock.complete("b", &[]).unwrap_err(), BackendError::EmptyResponse);
        assert!(matches!(mock.complete("c", &[]), Err(BackendError::HttpClient(_))));
        assert_eq!(mock.calls(), vec!["a", "b", "c"]);
    }

    #[test]
    fn mock_always_repeats() {
        let mock = MockBackend::always(Ok("same".into()));
        for _ in 0..3 {
            assert_eq!(mock.complete("m", &[]).unwrap(), "same");
        }
        assert_eq!(mock.call_count(), 3);
    }
}
