//! Result merger: one de-duplicated [`ComplianceResult`] from the model review
//! and the phrase detector.

use std::collections::HashSet;

use copyguard_core::{
    ComplianceResult, Decision, RuleCatalog, Severity, Violation, recommendations_for,
};
use tracing::{debug, warn};

use crate::reviewer::{NormalizedReview, ReviewedViolation};

/// Merge model and phrase findings.
///
/// Model violations come first, enriched from the catalog; phrase violations
/// follow. The first occurrence of each `(rule_id, quote)` pair is kept. Model
/// violations naming a rule the catalog does not know are dropped.
///
/// The decision is the review's, except that a `violation` verdict becomes
/// `needs_review` when a model finding was dropped or nothing is left to
/// back it.
pub fn merge(
    review: &NormalizedReview,
    pattern: Vec<Violation>,
    catalog: &RuleCatalog,
) -> ComplianceResult {
    let enriched: Vec<Violation> = review
        .violations
        .iter()
        .filter_map(|v| enrich(v, catalog))
        .collect();
    let dropped = review.violations.len() - enriched.len();

    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    let mut violations = Vec::new();
    let mut duplicates = 0usize;
    for v in enriched.into_iter().chain(pattern) {
        let key = (v.rule_id.clone(), v.quote.clone());
        if seen.insert(key) {
            violations.push(v);
        } else {
            duplicates += 1;
        }
    }
    debug!(kept = violations.len(), duplicates, dropped, "merged violations");

    let decision = match review.overall_decision {
        Decision::Violation if dropped > 0 || violations.is_empty() => {
            warn!(dropped, kept = violations.len(), "violation verdict unsupported; needs review");
            Decision::NeedsReview
        }
        decision => decision,
    };

    let summary = summarize(&review.subject_name, &violations);
    let recommendations = recommendations_for(
        violations
            .iter()
            .filter_map(|v| catalog.rule(&v.rule_id))
            .map(|r| r.category.as_str()),
    );

    ComplianceResult::new(
        review.subject_name.clone(),
        decision,
        review.confidence,
        violations,
        summary,
        recommendations,
    )
}

fn enrich(v: &ReviewedViolation, catalog: &RuleCatalog) -> Option<Violation> {
    let Some(rule) = catalog.rule(&v.rule_id) else {
        warn!(rule_id = %v.rule_id, "model cited an unknown rule; dropping violation");
        return None;
    };
    let suggested_fix = match rule.compliant_examples.first() {
        Some(example) => format!("Suggested fix: \"{example}\""),
        None => format!("Review {} guidelines for proper terminology", rule.title),
    };
    Some(Violation {
        rule_id: rule.id.clone(),
        severity: v.severity.unwrap_or(rule.severity),
        quote: v.quote.clone(),
        rationale: v.rationale.clone(),
        suggested_fix: Some(suggested_fix),
        rule_title: Some(rule.title.clone()),
    })
}

/// Human-readable one-liner, counting violations by severity.
///
/// `"Acme's website has 3 compliance issue(s): 2 high-priority, 1 low-priority."`
pub fn summarize(subject_name: &str, violations: &[Violation]) -> String {
    if violations.is_empty() {
        return format!("{subject_name}'s website appears compliant with HSA/FSA marketing guidelines.");
    }
    let clauses: Vec<String> = Severity::ALL
        .iter()
        .filter_map(|&severity| {
            let n = violations.iter().filter(|v| v.severity == severity).count();
            (n > 0).then(|| format!("{n} {}-priority", severity.as_str()))
        })
        .collect();
    format!(
        "{subject_name}'s website has {} compliance issue(s): {}.",
        violations.len(),
        clauses.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use copyguard_core::PatternDetector;

    use crate::reviewer::normalize_review;

    const TERMINOLOGY: &str = "terminology_medical_professionals";
    const ELIGIBILITY: &str = "eligibility_conditional_language";

    fn review(decision: Decision, violations: Vec<ReviewedViolation>) -> NormalizedReview {
        NormalizedReview {
            subject_name: "Acme".into(),
            overall_decision: decision,
            confidence: 0.8,
            violations,
            downgraded: false,
        }
    }

    fn reviewed(rule_id: &str, severity: Option<Severity>, quote: Option<&str>) -> ReviewedViolation {
        ReviewedViolation {
            rule_id: rule_id.into(),
            severity,
            quote: quote.map(str::to_string),
            rationale: "model says so".into(),
        }
    }

    fn pattern(rule_id: &str, severity: Severity, quote: Option<&str>) -> Violation {
        Violation {
            rule_id: rule_id.into(),
            severity,
            quote: quote.map(str::to_string),
            rationale: "pattern".into(),
            suggested_fix: None,
            rule_title: None,
        }
    }

    #[test]
    fn enriches_model_violations() {
        let catalog = RuleCatalog::builtin();
        let result = merge(
            &review(Decision::Violation, vec![reviewed(TERMINOLOGY, None, Some("a doctor"))]),
            vec![],
            &catalog,
        );
        let v = &result.violations()[0];
        assert_eq!(v.severity, Severity::High);
        assert_eq!(v.rule_title.as_deref(), Some("Medical Professional Terminology"));
        assert_eq!(
            v.suggested_fix.as_deref(),
            Some("Suggested fix: \"An independent licensed practitioner will review your clinical intake form\"")
        );
        assert_eq!(result.overall_decision(), Decision::Violation);
    }

    #[test]
    fn model_severity_wins_over_catalog() {
        let catalog = RuleCatalog::builtin();
        let result = merge(
            &review(Decision::Violation, vec![reviewed(TERMINOLOGY, Some(Severity::Low), Some("q"))]),
            vec![],
            &catalog,
        );
        assert_eq!(result.violations()[0].severity, Severity::Low);
    }

    #[test]
    fn fix_falls_back_to_title_without_examples() {
        let mut rules = RuleCatalog::builtin().rules().to_vec();
        rules[0].compliant_examples.clear();
        let catalog = RuleCatalog::new("t", rules, vec![]).unwrap();
        let result = merge(
            &review(Decision::Violation, vec![reviewed(TERMINOLOGY, None, Some("q"))]),
            vec![],
            &catalog,
        );
        assert_eq!(
            result.violations()[0].suggested_fix.as_deref(),
            Some("Review Medical Professional Terminology guidelines for proper terminology")
        );
    }

    #[test]
    fn unknown_rules_are_dropped() {
        let result = merge(
            &review(Decision::Violation, vec![reviewed("made_up", None, Some("q"))]),
            vec![],
            &RuleCatalog::builtin(),
        );
        assert!(result.violations().is_empty());
        assert_eq!(result.overall_decision(), Decision::NeedsReview);
    }

    #[test]
    fn unknown_rule_cannot_carry_violation_verdict() {
        let review = normalize_review(
            r#"{"subject_name": "Acme", "overall_decision": "violation",
                "violations": [{"rule_id": "made_up_rule", "quote": "guaranteed cure"}]}"#,
        )
        .unwrap();
        assert_eq!(review.overall_decision, Decision::Violation);
        let result = merge(&review, vec![], &RuleCatalog::builtin());
        assert_eq!(result.overall_decision(), Decision::NeedsReview);
        assert!(result.violations().is_empty());
    }

    #[test]
    fn partly_unknown_findings_still_need_review() {
        let result = merge(
            &review(
                Decision::Violation,
                vec![reviewed(TERMINOLOGY, None, Some("a doctor")), reviewed("made_up", None, Some("q"))],
            ),
            vec![],
            &RuleCatalog::builtin(),
        );
        assert_eq!(result.rule_ids(), vec![TERMINOLOGY.to_string()]);
        assert_eq!(result.overall_decision(), Decision::NeedsReview);
    }

    #[test]
    fn bare_violation_verdict_needs_review() {
        let catalog = RuleCatalog::builtin();
        let result = merge(&review(Decision::Violation, vec![]), vec![], &catalog);
        assert_eq!(result.overall_decision(), Decision::NeedsReview);

        let backed = merge(
            &review(Decision::Violation, vec![]),
            vec![pattern(TERMINOLOGY, Severity::High, Some("doctor"))],
            &catalog,
        );
        assert_eq!(backed.overall_decision(), Decision::Violation);
    }

    #[test]
    fn dedup_on_exact_rule_and_quote() {
        let result = merge(
            &review(
                Decision::Violation,
                vec![
                    reviewed(TERMINOLOGY, None, Some("doctor")),
                    reviewed(ELIGIBILITY, None, None),
                ],
            ),
            vec![
                pattern(TERMINOLOGY, Severity::High, Some("doctor")),
                pattern(TERMINOLOGY, Severity::High, Some("Doctor")),
                pattern(ELIGIBILITY, Severity::High, None),
                pattern(TERMINOLOGY, Severity::High, None),
            ],
            &RuleCatalog::builtin(),
        );
        let keys: Vec<_> = result.violations().iter().map(|v| v.dedup_key()).collect();
        assert_eq!(
            keys,
            vec![
                (TERMINOLOGY, Some("doctor")),
                (ELIGIBILITY, None),
                (TERMINOLOGY, Some("Doctor")),
                (TERMINOLOGY, None),
            ]
        );
        // The model's copy wins.
        assert_eq!(result.violations()[0].rationale, "model says so");
    }

    #[test]
    fn summary_counts_by_severity() {
        let vs = vec![
            pattern("a", Severity::Low, Some("1")),
            pattern("b", Severity::High, Some("2")),
            pattern("c", Severity::High, Some("3")),
        ];
        assert_eq!(
            summarize("Acme", &vs),
            "Acme's website has 3 compliance issue(s): 2 high-priority, 1 low-priority."
        );
        assert_eq!(
            summarize("Acme", &vs[1..2]),
            "Acme's website has 1 compliance issue(s): 1 high-priority."
        );
        assert_eq!(
            summarize("Acme", &[]),
            "Acme's website appears compliant with HSA/FSA marketing guidelines."
        );
    }

    #[test]
    fn recommendations_per_distinct_category() {
        let result = merge(
            &review(Decision::Violation, vec![]),
            vec![
                pattern(ELIGIBILITY, Severity::High, Some("is eligible")),
                pattern(TERMINOLOGY, Severity::High, Some("doctor")),
                pattern(ELIGIBILITY, Severity::High, Some("is approved")),
            ],
            &RuleCatalog::builtin(),
        );
        assert_eq!(
            result.recommendations(),
            [
                "Add conditional language to all HSA/FSA eligibility statements",
                "Review and update terminology to use precise medical language",
            ]
        );
    }

    #[test]
    fn patterns_survive_silent_model() {
        let catalog = RuleCatalog::builtin();
        let text = "Use your HSA/FSA dollars today. A doctor will approve your order.";
        let found = PatternDetector::new(&catalog).unwrap().detect(text);
        let result = merge(&review(Decision::Clean, vec![]), found, &catalog);

        let quoted: Vec<_> = result.violations().iter().filter(|v| v.quote.is_some()).collect();
        assert!(quoted.len() >= 2);
        let ids = result.rule_ids();
        assert!(ids.contains(&ELIGIBILITY.to_string()));
        assert!(ids.contains(&TERMINOLOGY.to_string()));
        assert!(result.summary().starts_with("Acme's website has"));
    }

    fn rule_strategy() -> impl proptest::strategy::Strategy<Value = String> {
        proptest::sample::select(vec![TERMINOLOGY.to_string(), ELIGIBILITY.to_string()])
    }

    fn quote_strategy() -> impl proptest::strategy::Strategy<Value = Option<String>> {
        proptest::option::of(proptest::sample::select(vec![
            "doctor".to_string(),
            "is eligible".to_string(),
        ]))
    }

    proptest::proptest! {
        #[test]
        fn merged_violations_have_unique_keys(
            llm in proptest::collection::vec((rule_strategy(), quote_strategy()), 0..8),
            pat in proptest::collection::vec((rule_strategy(), quote_strategy()), 0..8),
        ) {
            let review = review(
                Decision::NeedsReview,
                llm.iter().map(|(r, q)| reviewed(r, None, q.as_deref())).collect(),
            );
            let pattern = pat
                .iter()
                .map(|(r, q)| pattern(r, Severity::High, q.as_deref()))
                .collect();
            let result = merge(&review, pattern, &RuleCatalog::builtin());
            let mut keys = HashSet::new();
            for v in result.violations() {
                proptest::prop_assert!(keys.insert(v.dedup_key()));
            }
        }
    }
}
