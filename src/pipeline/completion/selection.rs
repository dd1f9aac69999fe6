//! Model selection under rate limiting.
//!
//! ```text
//! USING_PRIMARY ──429──► USING_ALTERNATE ──429──► ALL_TRIED (back on primary)
//!       │                                              │
//!       └─429, no alternate──► WAITING ◄──────429──────┘
//! ```
//! Once every model has been tried, rate limits are waited out on the
//! primary model instead of bouncing between models.

use serde::Serialize;

/// What the retry loop should do after a rate-limited attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitAction {
    /// Retry immediately with this (newly selected) model.
    SwitchTo(String),
    /// Sleep for the server-suggested wait, then retry the same model.
    Wait,
}

/// Coarse state for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPhase {
    UsingPrimary,
    UsingAlternate,
    AllTried,
}

/// Which model serves the next request, and whether all models are throttled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSelection {
    current: String,
    primary: String,
    alternate: Option<String>,
    all_tried: bool,
}

impl ModelSelection {
    /// Start on the primary model. A blank alternate counts as none.
    pub fn new(primary: impl Into<String>, alternate: Option<String>) -> Self {
        let primary = primary.into();
        Self {
            current: primary.clone(),
            primary,
            alternate: alternate.filter(|m| !m.trim().is_empty()),
            all_tried: false,
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn alternate(&self) -> Option<&str> {
        self.alternate.as_deref()
    }

    pub fn all_tried(&self) -> bool {
        self.all_tried
    }

    pub fn phase(&self) -> SelectionPhase {
        if self.all_tried {
            SelectionPhase::AllTried
        } else if self.current == self.primary {
            SelectionPhase::UsingPrimary
        } else {
            SelectionPhase::UsingAlternate
        }
    }

    /// Return to the initial state (primary model, nothing tried).
    pub fn reset(&mut self) {
        self.current = self.primary.clone();
        self.all_tried = false;
    }

    /// An alternate distinct from the primary, if configured.
    fn usable_alternate(&self) -> Option<&str> {
        self.alternate
            .as_deref()
            .filter(|alt| *alt != self.primary)
    }

    /// Advance the state after a rate-limited attempt.
    ///
    /// Switching back to the primary marks all models as tried but does not
    /// wait; the wait happens on the next rate-limited attempt.
    pub fn on_rate_limited(&mut self) -> RateLimitAction {
        if self.all_tried {
            return RateLimitAction::Wait;
        }

        let Some(alternate) = self.usable_alternate().map(str::to_string) else {
            return RateLimitAction::Wait;
        };

        if self.current != alternate {
            self.current = alternate;
            self.all_tried = false;
        } else {
            self.current = self.primary.clone();
            self.all_tried = true;
        }
        RateLimitAction::SwitchTo(self.current.clone())
    }
}
