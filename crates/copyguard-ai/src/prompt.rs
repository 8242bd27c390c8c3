//! Prompt construction for the generative reviewer.
//!
//! The system prompt is rendered from the rule catalog so the model and the
//! phrase detector always judge against the same rulebook.

use copyguard_core::{Rule, RuleCatalog};

// ── Prompt templates ──

const PREAMBLE: &str = "\
You are a compliance reviewer for HSA/FSA marketing copy. Review the page text \
against every rule below and report each passage that breaks a rule.";

const RESPONSE_CONTRACT: &str = "\
Also identify the company name from the page content.

Respond ONLY with a JSON object. No markdown fences, no explanation, just raw JSON:
{
  \"subject_name\": \"company name from the page\",
  \"overall_decision\": \"violation|needs_review|clean\",
  \"confidence\": 0..1,
  \"violations\": [{\"rule_id\": \"id\", \"severity\": \"high|medium|low\", \"quote\": \"exact text\", \"rationale\": \"brief why\"}]
}
Every quote must be copied verbatim from the page text.
If you cannot quote exact offending text, set overall_decision=\"needs_review\".";

/// Render the rulebook system prompt for `catalog`.
pub fn system_prompt(catalog: &RuleCatalog) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(PREAMBLE);
    out.push_str(&format!("\n\nRulebook version {}:\n", catalog.version()));
    for rule in catalog.rules() {
        render_rule(&mut out, rule, catalog.category_description(&rule.category));
    }
    out.push('\n');
    out.push_str(RESPONSE_CONTRACT);
    out
}

fn render_rule(out: &mut String, rule: &Rule, category_note: Option<&str>) {
    out.push_str(&format!(
        "\n## {} [{}] ({}, {} severity)\n",
        rule.title,
        rule.id,
        rule.category,
        rule.severity.as_str()
    ));
    if let Some(note) = category_note.filter(|n| !n.is_empty()) {
        out.push_str(&format!("Category: {note}\n"));
    }
    if !rule.description.is_empty() {
        out.push_str(&rule.description);
        out.push('\n');
    }
    if !rule.rationale.is_empty() {
        out.push_str(&format!("Why: {}\n", rule.rationale));
    }
    list(out, "Never say", &rule.prohibited_phrases);
    list(out, "Qualify with", &rule.required_phrases);
    list(out, "Compliant", &rule.compliant_examples);
    list(out, "Non-compliant", &rule.non_compliant_examples);
}

fn list(out: &mut String, label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let quoted: Vec<String> = items.iter().map(|i| format!("\"{i}\"")).collect();
    out.push_str(&format!("{label}: {}\n", quoted.join(", ")));
}

/// Wrap page text for the user turn, keeping at most `max_chars` characters.
pub fn page_prompt(text: &str, max_chars: usize) -> String {
    format!("PAGE_TEXT:\n\"\"\"{}\"\"\"", truncate_chars(text, max_chars))
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_every_rule() {
        let catalog = RuleCatalog::builtin();
        let prompt = system_prompt(&catalog);
        for rule in catalog.rules() {
            assert!(prompt.contains(&format!("[{}]", rule.id)), "{}", rule.id);
        }
        assert!(prompt.contains("Never say: \"doctor\""));
        assert!(prompt.contains("\"rule_id\""));
        assert!(prompt.ends_with("set overall_decision=\"needs_review\"."));
    }

    #[test]
    fn rule_block_is_one_field_per_line() {
        let catalog = RuleCatalog::builtin();
        let prompt = system_prompt(&catalog);
        assert!(prompt.starts_with(PREAMBLE));
        assert!(prompt.contains(&format!("\n\nRulebook version {}:\n", catalog.version())));
        assert!(prompt.contains(
            "\nWhy: Reviewing professionals may be NPs or PAs, not just MDs/DOs\nNever say: "
        ));
        assert!(prompt.contains("\nMust use precise terms for medical professionals\n"));
    }

    #[test]
    fn page_prompt_wraps_text() {
        assert_eq!(page_prompt("hello", 100), "PAGE_TEXT:\n\"\"\"hello\"\"\"");
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
        assert_eq!(truncate_chars("", 5), "");
    }
}
