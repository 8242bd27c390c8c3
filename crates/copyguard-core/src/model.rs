//! Shared detection types passed between the detectors, the merger, and the learning store.

use serde::{Deserialize, Serialize};

/// Rule severity. Drives prioritisation in summaries, never detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Buckets in summary order.
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parse a case-insensitive severity label.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Overall verdict for one reviewed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Violation,
    NeedsReview,
    Clean,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Violation => "violation",
            Self::NeedsReview => "needs_review",
            Self::Clean => "clean",
        }
    }

    /// Parse an exact decision label (`violation`, `needs_review`, `clean`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "violation" => Some(Self::Violation),
            "needs_review" => Some(Self::NeedsReview),
            "clean" => Some(Self::Clean),
            _ => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected instance of a rule being broken.
///
/// A violation without a `quote` cannot be defended on its own and never
/// supports a strict `violation` verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_id: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_title: Option<String>,
}

impl Violation {
    /// De-duplication key: exact `(rule_id, quote)` tuple.
    pub fn dedup_key(&self) -> (&str, Option<&str>) {
        (self.rule_id.as_str(), self.quote.as_deref())
    }
}

/// Final, merged outcome of reviewing one text.
///
/// Built once by the merger and never mutated afterwards, so fields are
/// only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    subject_name: String,
    overall_decision: Decision,
    confidence: f64,
    violations: Vec<Violation>,
    summary: String,
    recommendations: Vec<String>,
}

impl ComplianceResult {
    /// Assemble a result. `confidence` is clamped into `[0, 1]`.
    pub fn new(
        subject_name: String,
        overall_decision: Decision,
        confidence: f64,
        violations: Vec<Violation>,
        summary: String,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            subject_name,
            overall_decision,
            confidence: clamp_unit(confidence),
            violations,
            summary,
            recommendations,
        }
    }

    pub fn subject_name(&self) -> &str {
        &self.subject_name
    }

    pub fn overall_decision(&self) -> Decision {
        self.overall_decision
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    /// Distinct rule ids of the final violations, in detection order.
    pub fn rule_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(self.violations.len());
        for v in &self.violations {
            if !ids.contains(&v.rule_id) {
                ids.push(v.rule_id.clone());
            }
        }
        ids
    }

    /// Number of violations in a severity bucket.
    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    }
}

/// Clamp into `[0, 1]`, mapping NaN to the neutral 0.5.
pub fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() { 0.5 } else { x.clamp(0.0, 1.0) }
}
