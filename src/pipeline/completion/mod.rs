//! Resilient chat-completion calls.
//!
//! ```text
//! caller → CompletionInvoker → CompletionBackend (Groq / mock)
//!              │
//!              └─ ModelSelection (primary ⇄ alternate, all-tried flag)
//! ```
//! Backend failures are retried locally; only exhaustion, cancellation and
//! delimited-payload parse faults reach the caller.

pub mod types;
pub mod rate_limit;
pub mod delimited;
pub mod selection;
pub mod groq;
pub mod invoker;

pub use types::*;
pub use rate_limit::parse_wait_duration;
pub use delimited::extract_delimited;
pub use selection::{ModelSelection, RateLimitAction, SelectionPhase};
pub use groq::{GroqClient, MockBackend};
pub use invoker::{CompletionInvoker, ResponseOptions};

use std::time::Duration;

use thiserror::Error;

/// Failure of a single backend exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Rate limited, retry in {}s: {message}", wait.as_secs())]
    RateLimited { wait: Duration, message: String },

    #[error("Backend returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Empty response from the model")]
    EmptyResponse,
}

/// Coarse classification driving the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    RateLimited,
    Transient,
}

impl BackendError {
    pub fn kind(&self) -> BackendErrorKind {
        match self {
            Self::RateLimited { .. } => BackendErrorKind::RateLimited,
            _ => BackendErrorKind::Transient,
        }
    }

    /// Server-suggested wait, for rate-limit errors only.
    pub fn rate_limit_wait(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { wait, .. } => Some(*wait),
            _ => None,
        }
    }
}

/// Terminal outcome of [`CompletionInvoker::get_response`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("No response from the model after {attempts} attempts")]
    ExhaustedRetries {
        attempts: u32,
        last_error: Option<BackendError>,
    },

    #[error("Malformed delimited payload: {0}")]
    MalformedDelimitedPayload(String),

    #[error("Completion cancelled")]
    Cancelled,
}
