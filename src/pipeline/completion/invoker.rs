//! Retry loop around a single chat completion.
//!
//! Each attempt produces an `AttemptOutcome`; the loop only counts attempts
//! and acts on the outcome. Every outcome except `Success` consumes one
//! attempt, including model switches and rate-limit sleeps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::delimited::extract_delimited;
use super::selection::{ModelSelection, RateLimitAction};
use super::types::{ChatMessage, CompletionBackend, Sleeper, ThreadSleeper};
use super::{BackendError, BackendErrorKind, CompletionError};
use crate::config::{AppConfig, DEFAULT_MAX_RETRIES};

/// Per-call knobs for [`CompletionInvoker::get_response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseOptions {
    /// Return only the payload of the first fenced block.
    pub extract_delimited: bool,
    pub max_retries: u32,
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            extract_delimited: false,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ResponseOptions {
    pub fn delimited() -> Self {
        Self {
            extract_delimited: true,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptOutcome {
    Success(String),
    RetryWithModel { model: String, cause: BackendError },
    RetryAfterSleep { wait: Duration, cause: BackendError },
    RetryTransient(BackendError),
}

/// Makes a completion call reliable across transient errors and rate limits.
///
/// Owns the [`ModelSelection`]; `&mut self` keeps one call in flight per
/// invoker. Share across threads behind a `Mutex` or use one per worker.
pub struct CompletionInvoker<B: CompletionBackend, S: Sleeper = ThreadSleeper> {
    backend: B,
    sleeper: S,
    selection: ModelSelection,
    cancel: Option<Arc<AtomicBool>>,
}

impl<B: CompletionBackend> CompletionInvoker<B> {
    pub fn new(backend: B, selection: ModelSelection) -> Self {
        Self::with_sleeper(backend, selection, ThreadSleeper)
    }

    /// Primary and alternate models taken from the environment config.
    pub fn from_config(backend: B, config: &AppConfig) -> Self {
        Self::new(
            backend,
            ModelSelection::new(config.primary_model.clone(), config.alternate_model.clone()),
        )
    }
}

impl<B: CompletionBackend, S: Sleeper> CompletionInvoker<B, S> {
    pub fn with_sleeper(backend: B, selection: ModelSelection, sleeper: S) -> Self {
        Self {
            backend,
            sleeper,
            selection,
            cancel: None,
        }
    }

    /// Abort between attempts once `flag` is raised.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn selection(&self) -> &ModelSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut ModelSelection {
        &mut self.selection
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Model the next request will use.
    pub fn current_model(&self) -> &str {
        self.selection.current()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Run `conversation` until a non-empty response or `max_retries` attempts.
    pub fn get_response(
        &mut self,
        conversation: &[ChatMessage],
        options: &ResponseOptions,
    ) -> Result<String, CompletionError> {
        let mut last_error = None;

        for attempt in 1..=options.max_retries {
            if self.is_cancelled() {
                return Err(CompletionError::Cancelled);
            }

            match self.attempt(conversation, options)? {
                AttemptOutcome::Success(text) => {
                    tracing::debug!(model = self.current_model(), attempt, "Completion succeeded");
                    return Ok(text);
                }
                AttemptOutcome::RetryWithModel { model, cause } => {
                    tracing::info!(
                        model = %model,
                        attempt,
                        phase = ?self.selection.phase(),
                        "Rate limit reached, switching model"
                    );
                    last_error = Some(cause);
                }
                AttemptOutcome::RetryAfterSleep { wait, cause } => {
                    last_error = Some(cause);
                    if attempt == options.max_retries {
                        tracing::debug!(attempt, "Rate limited on final attempt, not waiting");
                        continue;
                    }
                    tracing::info!(
                        model = self.current_model(),
                        attempt,
                        phase = ?self.selection.phase(),
                        wait_secs = wait.as_secs_f64(),
                        "Rate limit reached, waiting"
                    );
                    self.sleeper.sleep(wait);
                    if self.is_cancelled() {
                        return Err(CompletionError::Cancelled);
                    }
                }
                AttemptOutcome::RetryTransient(err) => {
                    tracing::warn!(
                        model = self.current_model(),
                        attempt,
                        error = %err,
                        "Completion failed, retrying"
                    );
                    last_error = Some(err);
                }
            }
        }

        tracing::error!(attempts = options.max_retries, "No response from the model");
        Err(CompletionError::ExhaustedRetries {
            attempts: options.max_retries,
            last_error,
        })
    }

    /// Shorthand for a delimited-payload request with default retries.
    pub fn get_delimited_response(
        &mut self,
        conversation: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        self.get_response(conversation, &ResponseOptions::delimited())
    }

    /// One backend exchange. Only payload extraction faults escape as errors.
    fn attempt(
        &mut self,
        conversation: &[ChatMessage],
        options: &ResponseOptions,
    ) -> Result<AttemptOutcome, CompletionError> {
        let result = self
            .backend
            .complete(self.selection.current(), conversation)
            .and_then(|text| {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Err(BackendError::EmptyResponse)
                } else {
                    Ok(trimmed.to_string())
                }
            });

        match result {
            Ok(text) if options.extract_delimited => {
                extract_delimited(&text).map(AttemptOutcome::Success)
            }
            Ok(text) => Ok(AttemptOutcome::Success(text)),
            Err(cause) => Ok(match cause.kind() {
                BackendErrorKind::RateLimited => {
                    let wait = cause.rate_limit_wait().unwrap_or_default();
                    tracing::debug!(
                        model = self.current_model(),
                        phase = ?self.selection.phase(),
                        error = %cause,
                        "Rate limited"
                    );
                    match self.selection.on_rate_limited() {
                        RateLimitAction::SwitchTo(model) => {
                            AttemptOutcome::RetryWithModel { model, cause }
                        }
                        RateLimitAction::Wait => AttemptOutcome::RetryAfterSleep { wait, cause },
                    }
                }
                BackendErrorKind::Transient => AttemptOutcome::RetryTransient(cause),
            }),
        }
    }
}
