//! Feedback processor: the one mutation entry point into the learning store
//! from outside the detection path.

use std::sync::Arc;

use tracing::{info, warn};

use crate::StoreError;
use crate::insights::generate_insights;
use crate::learning::{FeedbackOutcome, LearningStore, Verdict};

/// Acknowledgement returned to the human who sent feedback.
pub const RECEIPT_MESSAGE: &str =
    "Thank you for your feedback! This will help improve our compliance detection.";

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("unknown verdict {0:?}: expected correct, incorrect, or needs_review")]
    UnknownVerdict(String),

    #[error("feedback rejected: {0}")]
    Rejected(#[from] StoreError),
}

/// One human verdict on a recorded example.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackEvent {
    pub example_id: String,
    pub verdict: Verdict,
    pub notes: Option<String>,
}

impl FeedbackEvent {
    pub fn new(example_id: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            example_id: example_id.into(),
            verdict,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Build from the wire shape `(example_id, "correct"|"incorrect"|"needs_review", notes?)`.
    pub fn parse(
        example_id: &str,
        verdict: &str,
        notes: Option<&str>,
    ) -> Result<Self, FeedbackError> {
        let verdict =
            Verdict::parse(verdict).ok_or_else(|| FeedbackError::UnknownVerdict(verdict.into()))?;
        Ok(Self {
            example_id: example_id.to_string(),
            verdict,
            notes: notes.filter(|n| !n.trim().is_empty()).map(str::to_string),
        })
    }

    /// Build from a chat button press: the button's `action_id` picks the
    /// verdict and its `value` carries the example id.
    pub fn from_action(action_id: &str, value: &str) -> Self {
        Self::new(value, Verdict::from_action_id(action_id))
    }
}

/// Successful feedback: what changed plus the message to show the human.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackReceipt {
    pub outcome: FeedbackOutcome,
    pub message: &'static str,
}

pub struct FeedbackProcessor {
    store: Arc<LearningStore>,
}

impl FeedbackProcessor {
    pub fn new(store: Arc<LearningStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<LearningStore> {
        &self.store
    }

    /// Apply one verdict. A rejected update (unknown id, conflicting verdict)
    /// comes back as [`FeedbackError::Rejected`] so the caller can tell the
    /// human their feedback was not recorded.
    pub fn submit(&self, event: &FeedbackEvent) -> Result<FeedbackReceipt, FeedbackError> {
        let outcome = self
            .store
            .update_example_feedback(&event.example_id, event.verdict, event.notes.as_deref())
            .inspect_err(|e| {
                warn!(example_id = %event.example_id, verdict = %event.verdict, error = %e, "feedback rejected");
            })?;

        info!(
            example_id = %outcome.example_id,
            verdict = %outcome.verdict,
            repeated = outcome.repeated,
            "feedback recorded"
        );
        Ok(FeedbackReceipt {
            outcome,
            message: RECEIPT_MESSAGE,
        })
    }

    /// Insights over the store's current performance table.
    pub fn insights(&self) -> Vec<String> {
        generate_insights(&self.store.policy_performance())
    }
}
