//! Detection pipeline: phrase scan and model review, merged into one result.

use std::sync::Arc;
use std::time::Duration;

use copyguard_core::{CatalogError, ComplianceResult, PatternDetector, RuleCatalog};
use copyguard_store::LearningStore;
use tracing::{info, warn};

use crate::merge::merge;
use crate::reviewer::{GenerativeReviewer, ReviewModel, ReviewerConfig};
use crate::{ReviewError, ScreenError};

/// A screened page and the learning example recorded for it.
#[derive(Debug, Clone)]
pub struct Screened {
    pub result: ComplianceResult,
    pub example_id: String,
}

pub struct Screener {
    catalog: Arc<RuleCatalog>,
    detector: PatternDetector,
    reviewer: GenerativeReviewer,
    timeout: Duration,
}

impl Screener {
    pub fn new(
        catalog: Arc<RuleCatalog>,
        model: Arc<dyn ReviewModel>,
        config: &ReviewerConfig,
    ) -> Result<Self, CatalogError> {
        let detector = PatternDetector::new(&catalog)?;
        let reviewer = GenerativeReviewer::new(model, &catalog, config.max_chars);
        Ok(Self {
            catalog,
            detector,
            reviewer,
            timeout: config.timeout,
        })
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Review `text`. A model failure or timeout fails the whole screen; no
    /// partial result is produced.
    pub async fn screen(&self, text: &str) -> Result<ComplianceResult, ScreenError> {
        let pattern = self.detector.detect(text);

        let review = tokio::time::timeout(self.timeout, self.reviewer.review(text))
            .await
            .map_err(|_| ReviewError::Timeout(self.timeout))??;

        let result = merge(&review, pattern, &self.catalog);
        info!(
            subject = %result.subject_name(),
            decision = %result.overall_decision(),
            violations = result.violations().len(),
            "screen complete"
        );
        Ok(result)
    }

    /// Screen `text` and record it as a pending learning example.
    ///
    /// Nothing is recorded when screening fails.
    pub async fn screen_and_record(
        &self,
        source_ref: &str,
        text: &str,
        store: &LearningStore,
    ) -> Result<Screened, ScreenError> {
        let result = self.screen(text).await.inspect_err(|e| {
            warn!(source_ref, error = %e, "screen failed; no example recorded");
        })?;
        let example_id = store.record_example(
            source_ref,
            result.summary(),
            result.overall_decision(),
            result.confidence(),
            &result.rule_ids(),
        );
        Ok(Screened { result, example_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reviewer::tests::ScriptedModel;
    use copyguard_core::Decision;
    use copyguard_store::{Feedback, Verdict};

    fn screener(model: ScriptedModel, timeout: Duration) -> Screener {
        let config = ReviewerConfig {
            timeout,
            ..ReviewerConfig::default()
        };
        Screener::new(Arc::new(RuleCatalog::builtin()), Arc::new(model), &config).unwrap()
    }

    const PAGE: &str = "Use your HSA/FSA dollars today. A doctor will approve your order.";

    #[tokio::test]
    async fn phrase_findings_survive_a_clean_model() {
        let s = screener(
            ScriptedModel::replying(
                r#"{"subject_name": "Acme", "overall_decision": "clean", "confidence": 0.9, "violations": []}"#,
            ),
            Duration::from_secs(5),
        );
        let result = s.screen(PAGE).await.unwrap();
        assert_eq!(result.subject_name(), "Acme");
        assert_eq!(result.overall_decision(), Decision::Clean);
        assert!(result.violations().iter().filter(|v| v.quote.is_some()).count() >= 2);
        assert!(!result.recommendations().is_empty());
    }

    #[tokio::test]
    async fn downgraded_review_never_yields_violation() {
        let s = screener(
            ScriptedModel::replying(
                r#"{"overall_decision": "violation",
                    "violations": [{"rule_id": "tax_savings_qualified", "rationale": "implied"}]}"#,
            ),
            Duration::from_secs(5),
        );
        let result = s.screen("Plain copy.").await.unwrap();
        assert_eq!(result.overall_decision(), Decision::NeedsReview);
        assert_eq!(result.violations().len(), 1);
        assert!(result.violations()[0].quote.is_none());
    }

    #[tokio::test]
    async fn malformed_response_is_a_failure() {
        let s = screener(ScriptedModel::replying("I think it is fine."), Duration::from_secs(5));
        assert!(matches!(
            s.screen(PAGE).await,
            Err(ScreenError::Review(ReviewError::Malformed { .. }))
        ));
    }

    #[tokio::test]
    async fn slow_model_times_out() {
        let s = screener(
            ScriptedModel::replying("{}").delayed(Duration::from_secs(30)),
            Duration::from_millis(20),
        );
        assert!(matches!(
            s.screen(PAGE).await,
            Err(ScreenError::Review(ReviewError::Timeout(_)))
        ));
    }

    #[tokio::test]
    async fn screen_and_record_stores_pending_example() {
        let store = LearningStore::open();
        let s = screener(
            ScriptedModel::replying(r#"{"subject_name": "Acme", "overall_decision": "violation",
                "violations": [{"rule_id": "terminology_medical_professionals",
                                "quote": "A doctor will approve", "rationale": "MD only"}]}"#),
            Duration::from_secs(5),
        );
        let screened = s.screen_and_record("https://acme.test", PAGE, &store).await.unwrap();

        let example = store.example(&screened.example_id).unwrap();
        assert_eq!(example.human_feedback, Feedback::Pending);
        assert_eq!(example.source_ref, "https://acme.test");
        assert_eq!(example.text_snippet, screened.result.summary());
        assert_eq!(example.ai_decision, Decision::Violation);
        assert_eq!(example.violations_found, screened.result.rule_ids());
        assert_eq!(example.violations_found[0], "terminology_medical_professionals");

        store
            .update_example_feedback(&screened.example_id, Verdict::Correct, None)
            .unwrap();
        let perf = store.policy_performance();
        assert!(perf.iter().all(|p| p.true_positives == 1));
    }

    #[tokio::test]
    async fn failed_screen_records_nothing() {
        let store = LearningStore::open();
        let s = screener(ScriptedModel::failing(500), Duration::from_secs(5));
        assert!(s.screen_and_record("https://acme.test", PAGE, &store).await.is_err());
        assert_eq!(store.example_count(), 0);
    }
}
