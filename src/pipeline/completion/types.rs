use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::BackendError;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Chat-completion backend abstraction (allows mocking)
pub trait CompletionBackend {
    /// Run one completion with `model` and return the raw content text.
    fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, BackendError>;
}

impl<B: CompletionBackend + ?Sized> CompletionBackend for &B {
    fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, BackendError> {
        (**self).complete(model, messages)
    }
}

/// Blocking wait between rate-limited attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
