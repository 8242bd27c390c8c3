//! Generative reviewer adapter.
//!
//! The model boundary is the [`ReviewModel`] trait: one chat completion, raw
//! text out. Everything after that is local validation. [`normalize_review`]
//! turns the raw text into a typed [`NormalizedReview`] or a
//! [`ReviewError::Malformed`], and applies the default substitutions only on
//! the success path:
//!
//! - missing or empty subject name → [`UNKNOWN_SUBJECT`]
//! - missing or unrecognised decision → `needs_review`
//! - `violations` not an array → no violations
//! - non-numeric confidence → `0.5`
//!
//! Any violation without a quote downgrades the decision to `needs_review`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use copyguard_core::model::clamp_unit;
use copyguard_core::{Decision, RuleCatalog, Severity};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::ReviewError;
use crate::prompt::{page_prompt, system_prompt};

pub const UNKNOWN_SUBJECT: &str = "Unknown Company";
pub const DEFAULT_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_MAX_CHARS: usize = 30_000;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// One chat completion against an external text model.
#[async_trait]
pub trait ReviewModel: Send + Sync {
    /// Send a system and user turn; return the assistant's raw content.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ReviewError>;

    /// Model identifier for logs.
    fn name(&self) -> &str;
}

/// Settings for the reviewer and its model client.
#[derive(Debug, Clone)]
pub struct ReviewerConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Bound on one model call, enforced by the screening pipeline.
    pub timeout: Duration,
    /// Page text beyond this many characters is not sent.
    pub max_chars: usize,
}

impl Default for ReviewerConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

/// A violation as reported by the model, before catalog enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewedViolation {
    pub rule_id: String,
    /// The model's severity, if it gave a recognisable one.
    pub severity: Option<Severity>,
    pub quote: Option<String>,
    pub rationale: String,
}

/// Validated model output.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReview {
    pub subject_name: String,
    pub overall_decision: Decision,
    pub confidence: f64,
    pub violations: Vec<ReviewedViolation>,
    /// The decision was forced to `needs_review` by an unquoted violation.
    pub downgraded: bool,
}

impl NormalizedReview {
    /// A review with every field at its default.
    pub fn empty() -> Self {
        Self {
            subject_name: UNKNOWN_SUBJECT.to_string(),
            overall_decision: Decision::NeedsReview,
            confidence: DEFAULT_CONFIDENCE,
            violations: Vec::new(),
            downgraded: false,
        }
    }
}

/// Validate raw model content.
///
/// Empty content is treated as `{}`. Content that is not a JSON object is
/// [`ReviewError::Malformed`].
pub fn normalize_review(raw: &str) -> Result<NormalizedReview, ReviewError> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ReviewError::malformed(format!("response is not JSON: {e}")))?;
    let Value::Object(obj) = value else {
        return Err(ReviewError::malformed("response is not a JSON object"));
    };

    let subject_name = string_field(&obj, &["subject_name", "merchant_name"])
        .unwrap_or(UNKNOWN_SUBJECT)
        .to_string();

    let mut overall_decision = obj
        .get("overall_decision")
        .and_then(Value::as_str)
        .and_then(|s| Decision::parse(s.trim()))
        .unwrap_or(Decision::NeedsReview);

    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .map(clamp_unit)
        .unwrap_or(DEFAULT_CONFIDENCE);

    let items: &[Value] = match obj.get("violations") {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    };

    let mut unquoted = false;
    let mut violations = Vec::with_capacity(items.len());
    for item in items {
        let Value::Object(v) = item else {
            unquoted = true;
            debug!(item = %item, "dropping non-object violation");
            continue;
        };
        let quote = string_field(v, &["quote"]).map(str::to_string);
        if quote.is_none() {
            unquoted = true;
        }
        let Some(rule_id) = string_field(v, &["rule_id", "policy_id"]) else {
            debug!("dropping violation without a rule id");
            continue;
        };
        violations.push(ReviewedViolation {
            rule_id: rule_id.to_string(),
            severity: v.get("severity").and_then(Value::as_str).and_then(Severity::parse),
            quote,
            rationale: v
                .get("rationale")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    let downgraded = unquoted && overall_decision != Decision::NeedsReview;
    if unquoted {
        overall_decision = Decision::NeedsReview;
    }

    Ok(NormalizedReview {
        subject_name,
        overall_decision,
        confidence,
        violations,
        downgraded,
    })
}

/// First key in `keys` holding a non-blank string.
fn string_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
}

/// Sends page text with the rulebook to a [`ReviewModel`] and validates the reply.
pub struct GenerativeReviewer {
    model: Arc<dyn ReviewModel>,
    system_prompt: String,
    max_chars: usize,
}

impl GenerativeReviewer {
    pub fn new(model: Arc<dyn ReviewModel>, catalog: &RuleCatalog, max_chars: usize) -> Self {
        Self {
            model,
            system_prompt: system_prompt(catalog),
            max_chars,
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub async fn review(&self, text: &str) -> Result<NormalizedReview, ReviewError> {
        let user = page_prompt(text, self.max_chars);
        info!(
            model = self.model.name(),
            chars = text.chars().count().min(self.max_chars),
            "requesting generative review"
        );
        let raw = self.model.complete(&self.system_prompt, &user).await?;
        let review = normalize_review(&raw)?;
        if review.downgraded {
            warn!(
                subject = %review.subject_name,
                "unquoted violation reported; decision downgraded to needs_review"
            );
        }
        info!(
            subject = %review.subject_name,
            decision = %review.overall_decision,
            confidence = review.confidence,
            violations = review.violations.len(),
            "generative review complete"
        );
        Ok(review)
    }
}
