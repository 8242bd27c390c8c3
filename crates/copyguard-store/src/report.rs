//! Periodic learning report and full data export.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::insights::generate_insights;
use crate::learning::{Feedback, LearningExample, LearningStore, PolicyPerformance};

/// Rules listed in the report's "top performing" section.
pub const TOP_RULES: usize = 3;

/// Snapshot of learning progress for a reporting collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct LearningReport {
    pub generated_at: DateTime<Utc>,
    pub rules_tracked: usize,
    pub pending_examples: usize,
    /// Mean F1 across tracked rules; absent when nothing is tracked yet.
    pub average_f1: Option<f64>,
    pub insights: Vec<String>,
    pub top_rules: Vec<PolicyPerformance>,
}

impl LearningReport {
    pub fn build(store: &LearningStore) -> Self {
        let performance = store.policy_performance();
        let average_f1 = if performance.is_empty() {
            None
        } else {
            Some(performance.iter().map(|p| p.f1_score).sum::<f64>() / performance.len() as f64)
        };
        Self {
            generated_at: Utc::now(),
            rules_tracked: performance.len(),
            pending_examples: store.pending_count(),
            average_f1,
            insights: generate_insights(&performance),
            top_rules: performance.into_iter().take(TOP_RULES).collect(),
        }
    }
}

/// Everything the store knows, for offline analysis.
#[derive(Debug, Clone, Serialize)]
pub struct LearningExport {
    pub examples: Vec<LearningExample>,
    pub performance: Vec<PolicyPerformance>,
    pub export_date: DateTime<Utc>,
    pub total_examples: usize,
    pub reviewed_examples: usize,
}

impl LearningExport {
    pub fn build(store: &LearningStore) -> Self {
        let examples = store.examples();
        let reviewed_examples = examples
            .iter()
            .filter(|e| e.human_feedback != Feedback::Pending)
            .count();
        Self {
            total_examples: examples.len(),
            reviewed_examples,
            performance: store.policy_performance(),
            export_date: Utc::now(),
            examples,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl LearningStore {
    pub fn report(&self) -> LearningReport {
        LearningReport::build(self)
    }

    pub fn export(&self) -> LearningExport {
        LearningExport::build(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::Verdict;
    use copyguard_core::Decision;

    fn resolve(store: &LearningStore, rule: &str, decision: Decision, verdict: Verdict) {
        let id = store.record_example("u", "s", decision, 0.8, &[rule.to_string()]);
        store.update_example_feedback(&id, verdict, None).unwrap();
    }

    #[test]
    fn empty_store_report() {
        let report = LearningStore::open().report();
        assert_eq!(report.rules_tracked, 0);
        assert_eq!(report.pending_examples, 0);
        assert_eq!(report.average_f1, None);
        assert!(report.insights.is_empty());
        assert!(report.top_rules.is_empty());
    }

    #[test]
    fn report_averages_and_ranks() {
        let store = LearningStore::open();
        resolve(&store, "a", Decision::Violation, Verdict::Correct);
        resolve(&store, "b", Decision::Violation, Verdict::Incorrect);
        resolve(&store, "c", Decision::Violation, Verdict::Correct);
        resolve(&store, "d", Decision::Violation, Verdict::Incorrect);
        store.record_example("u", "s", Decision::Clean, 0.6, &[]);

        let report = store.report();
        assert_eq!(report.rules_tracked, 4);
        assert_eq!(report.pending_examples, 1);
        assert_eq!(report.average_f1, Some(0.5));
        let top: Vec<&str> = report.top_rules.iter().map(|p| p.rule_id.as_str()).collect();
        assert_eq!(top, vec!["a", "c", "b"]);
        assert!(!report.insights.is_empty());
    }

    #[test]
    fn export_counts_reviewed() {
        let store = LearningStore::open();
        resolve(&store, "a", Decision::Violation, Verdict::Correct);
        store.record_example("u", "s", Decision::Clean, 0.6, &[]);

        let export = store.export();
        assert_eq!(export.total_examples, 2);
        assert_eq!(export.reviewed_examples, 1);
        assert_eq!(export.performance.len(), 1);

        let json: serde_json::Value = serde_json::from_str(&export.to_json().unwrap()).unwrap();
        assert_eq!(json["total_examples"], 2);
        assert_eq!(json["examples"].as_array().unwrap().len(), 2);
        assert!(json["export_date"].is_string());
    }
}
