//! Deterministic phrase detection against the rule catalog.
//!
//! Every prohibited phrase is compiled to a case-insensitive regex. Word
//! boundaries are only asserted at phrase ends that are word characters, so
//! phrases like `"save 30% now!"` still match when followed by whitespace.
//!
//! High-severity rules that declare required phrases and trigger terms also
//! produce a "missing required qualifying language" finding when a trigger
//! term appears but none of the required phrases do.

use regex::Regex;
use tracing::debug;

use crate::catalog::{CatalogError, Rule, RuleCatalog};
use crate::model::{Severity, Violation};

pub const PROHIBITED_FIX: &str = "Replace with approved terminology from policy guidelines";

struct CompiledPhrase {
    phrase: String,
    regex: Regex,
}

struct CompiledRule {
    rule_id: String,
    title: String,
    severity: Severity,
    prohibited: Vec<CompiledPhrase>,
    /// Lowercased required phrases, matched as plain substrings.
    required: Vec<String>,
    triggers: Vec<Regex>,
}

/// Phrase matcher compiled from a [`RuleCatalog`]. No I/O, no shared state.
pub struct PatternDetector {
    rules: Vec<CompiledRule>,
}

impl PatternDetector {
    pub fn new(catalog: &RuleCatalog) -> Result<Self, CatalogError> {
        let rules = catalog
            .rules()
            .iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Scan `text` and return one violation per prohibited-phrase match, plus
    /// missing-qualifier findings, in catalog order.
    pub fn detect(&self, text: &str) -> Vec<Violation> {
        let mut found = Vec::new();
        let lower = text.to_lowercase();

        for rule in &self.rules {
            for p in &rule.prohibited {
                for m in p.regex.find_iter(text) {
                    found.push(Violation {
                        rule_id: rule.rule_id.clone(),
                        severity: rule.severity,
                        quote: Some(m.as_str().to_string()),
                        rationale: format!("contains prohibited phrase: \"{}\"", p.phrase),
                        suggested_fix: Some(PROHIBITED_FIX.to_string()),
                        rule_title: Some(rule.title.clone()),
                    });
                }
            }

            if rule.severity == Severity::High
                && !rule.required.is_empty()
                && rule.triggers.iter().any(|t| t.is_match(text))
                && !rule.required.iter().any(|r| lower.contains(r.as_str()))
            {
                found.push(Violation {
                    rule_id: rule.rule_id.clone(),
                    severity: rule.severity,
                    quote: None,
                    rationale: "missing required qualifying language".to_string(),
                    suggested_fix: rule
                        .required
                        .first()
                        .map(|r| format!("Add qualifying language such as \"{r}\"")),
                    rule_title: Some(rule.title.clone()),
                });
            }
        }

        debug!(violations = found.len(), "pattern scan complete");
        found
    }
}

/// Convenience wrapper: compile `catalog` and scan `text` once.
pub fn detect(text: &str, catalog: &RuleCatalog) -> Result<Vec<Violation>, CatalogError> {
    Ok(PatternDetector::new(catalog)?.detect(text))
}

fn compile_rule(rule: &Rule) -> Result<CompiledRule, CatalogError> {
    let compile = |phrase: &str| {
        Regex::new(&phrase_pattern(phrase)).map_err(|source| CatalogError::Pattern {
            rule_id: rule.id.clone(),
            source,
        })
    };

    let prohibited = rule
        .prohibited_phrases
        .iter()
        .map(|phrase| {
            Ok(CompiledPhrase {
                phrase: phrase.clone(),
                regex: compile(phrase)?,
            })
        })
        .collect::<Result<Vec<_>, CatalogError>>()?;

    let triggers = rule
        .trigger_terms
        .iter()
        .map(|t| compile(t))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledRule {
        rule_id: rule.id.clone(),
        title: rule.title.clone(),
        severity: rule.severity,
        prohibited,
        required: rule
            .required_phrases
            .iter()
            .map(|r| r.to_lowercase())
            .collect(),
        triggers,
    })
}

/// Build a case-insensitive, boundary-aware pattern for a literal phrase.
///
/// `"doctor"` → `(?i)\bdoctor\b`, `"save 30% now!"` → `(?i)\bsave 30% now!`
fn phrase_pattern(phrase: &str) -> String {
    let phrase = phrase.trim();
    let mut pattern = String::from("(?i)");
    if phrase.chars().next().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(phrase));
    if phrase.chars().last().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PatternDetector {
        PatternDetector::new(&RuleCatalog::builtin()).unwrap()
    }

    fn rule_ids(vs: &[Violation]) -> Vec<&str> {
        vs.iter().map(|v| v.rule_id.as_str()).collect()
    }

    #[test]
    fn pattern_escapes_and_bounds() {
        assert_eq!(phrase_pattern("doctor"), r"(?i)\bdoctor\b");
        assert_eq!(phrase_pattern("save 30% now!"), r"(?i)\bsave 30% now!");
        assert_eq!(phrase_pattern("  wellness "), r"(?i)\bwellness\b");
    }

    #[test]
    fn matches_case_insensitively_with_verbatim_quote() {
        let found = detector().detect("Ask your DOCTOR today.");
        let v = found
            .iter()
            .find(|v| v.quote.is_some())
            .expect("prohibited match");
        assert_eq!(v.rule_id, "terminology_medical_professionals");
        assert_eq!(v.quote.as_deref(), Some("DOCTOR"));
        assert_eq!(v.rationale, "contains prohibited phrase: \"doctor\"");
        assert_eq!(v.suggested_fix.as_deref(), Some(PROHIBITED_FIX));
        assert_eq!(
            v.rule_title.as_deref(),
            Some("Medical Professional Terminology")
        );
    }

    #[test]
    fn respects_word_boundaries() {
        let found = detector().detect("Our doctorate program and unwellness index.");
        assert!(found.is_empty(), "unexpected: {found:?}");
    }

    #[test]
    fn each_match_yields_a_violation() {
        let found = detector().detect("Pure wellness. More wellness. Look radiant!");
        let medical: Vec<_> = found
            .iter()
            .filter(|v| v.rule_id == "medical_focus_required")
            .collect();
        assert_eq!(medical.len(), 3);
    }

    #[test]
    fn trailing_punctuation_phrase_matches() {
        let found = detector().detect("Huge sale: save 30% now! Limited time.");
        assert!(found.iter().any(|v| v.quote.as_deref() == Some("save 30% now!")));
    }

    #[test]
    fn hsa_fsa_scenario_surfaces_two_rules() {
        let text = "Use your HSA/FSA dollars today. A doctor will approve your order.";
        let found = detector().detect(text);
        let quoted: Vec<_> = found.iter().filter(|v| v.quote.is_some()).collect();
        assert!(quoted.len() >= 2);
        let ids = rule_ids(&found);
        assert!(ids.contains(&"eligibility_conditional_language"));
        assert!(ids.contains(&"terminology_medical_professionals"));
    }

    #[test]
    fn missing_required_language_when_triggered() {
        let found = detector().detect("Pay with your HSA card at checkout.");
        let missing: Vec<_> = found.iter().filter(|v| v.quote.is_none()).collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].rule_id, "eligibility_conditional_language");
        assert_eq!(missing[0].rationale, "missing required qualifying language");
        assert_eq!(
            missing[0].suggested_fix.as_deref(),
            Some("Add qualifying language such as \"may be eligible\"")
        );
    }

    #[test]
    fn required_phrase_suppresses_missing_finding() {
        let found = detector().detect("You may be eligible to pay with HSA/FSA funds.");
        assert!(found.iter().all(|v| v.quote.is_some()), "{found:?}");
    }

    #[test]
    fn medium_rules_never_emit_missing_findings() {
        let mut catalog_rules = RuleCatalog::builtin().rules().to_vec();
        for r in &mut catalog_rules {
            r.trigger_terms = vec!["widget".into()];
        }
        let catalog = RuleCatalog::new("t", catalog_rules, vec![]).unwrap();
        let found = PatternDetector::new(&catalog)
            .unwrap()
            .detect("A widget page.");
        assert!(found.iter().all(|v| v.severity == Severity::High));
    }

    #[test]
    fn clean_text_has_no_findings() {
        let text = "An independent licensed practitioner will review your clinical intake form.";
        assert!(detector().detect(text).is_empty());
    }

    #[test]
    fn everyday_save_is_not_a_tax_claim() {
        assert!(detector().detect("Save your cart and come back later.").is_empty());
    }

    #[test]
    fn tax_vocabulary_needs_qualifier() {
        let found = detector().detect("Buy with tax-free dollars.");
        assert_eq!(rule_ids(&found), vec!["tax_savings_qualified"]);
        assert!(found[0].quote.is_none());

        let qualified = detector().detect("Tax savings are approximately ~30%.");
        assert!(qualified.is_empty(), "{qualified:?}");
    }

    #[test]
    fn detect_wrapper_compiles_catalog() {
        let found = detect("Truemed is free!", &RuleCatalog::builtin()).unwrap();
        assert_eq!(rule_ids(&found), vec!["truemed_cost_transparency"]);
    }

    proptest::proptest! {
        #[test]
        fn quotes_are_verbatim_excerpts(text in "[a-zA-Z/%!' .]{0,120}") {
            for v in detector().detect(&text) {
                if let Some(q) = &v.quote {
                    proptest::prop_assert!(text.contains(q.as_str()));
                }
            }
        }
    }
}
