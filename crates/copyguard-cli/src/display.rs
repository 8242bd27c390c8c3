//! Human-readable terminal rendering for results, examples, and reports.

use copyguard_core::{ComplianceResult, RuleCatalog, Severity};
use copyguard_store::{FeedbackReceipt, LearningExample, LearningReport, PolicyPerformance};

const MAX_SNIPPET_CHARS: usize = 80;

// ── Detection ──

/// Print a screening result as a vertical card.
pub fn print_result(result: &ComplianceResult, example_id: Option<&str>) {
    println!("=== {} ===", result.subject_name());
    println!("{}", result.summary());
    println!();

    println!("Decision");
    println!("  {:<16} {}", "overall", result.overall_decision());
    println!("  {:<16} {:.2}", "confidence", result.confidence());
    if let Some(id) = example_id {
        println!("  {:<16} {}", "example_id", id);
    }
    println!();

    if !result.violations().is_empty() {
        println!("Violations");
        for severity in Severity::ALL {
            for v in result.violations().iter().filter(|v| v.severity == severity) {
                let title = v.rule_title.as_deref().unwrap_or(&v.rule_id);
                println!("  [{}] {}", severity.as_str(), title);
                match &v.quote {
                    Some(q) => println!("      quote: \"{q}\""),
                    None => println!("      quote: (none)"),
                }
                if !v.rationale.is_empty() {
                    println!("      why:   {}", v.rationale);
                }
                if let Some(fix) = &v.suggested_fix {
                    println!("      fix:   {fix}");
                }
            }
        }
        println!();
    }

    if !result.recommendations().is_empty() {
        println!("Recommendations");
        for r in result.recommendations() {
            println!("  - {r}");
        }
        println!();
    }
}

pub fn print_rules(catalog: &RuleCatalog) {
    println!("Rule catalog {} ({} rules)", catalog.version(), catalog.len());
    println!();
    for category in catalog.categories() {
        println!("{} - {}", category.name, category.description);
        for rule in catalog.by_category(&category.name) {
            println!("  {:<36} {:<6} {}", rule.id, rule.severity.as_str(), rule.title);
        }
    }
    let uncategorised: Vec<_> = catalog
        .rules()
        .iter()
        .filter(|r| catalog.category_description(&r.category).is_none())
        .collect();
    for rule in uncategorised {
        println!("  {:<36} {:<6} {}", rule.id, rule.severity.as_str(), rule.title);
    }
}

// ── Learning ──

pub fn print_receipt(receipt: &FeedbackReceipt) {
    let outcome = &receipt.outcome;
    if outcome.repeated {
        println!("Feedback already recorded for {} ({}).", outcome.example_id, outcome.verdict);
        if outcome.notes_ignored {
            println!("The earlier notes were kept; new notes were not saved.");
        }
    } else {
        match outcome.counter {
            Some(counter) => println!(
                "Recorded {} for {}: {:?} on {}.",
                outcome.verdict,
                outcome.example_id,
                counter,
                outcome.rules.join(", ")
            ),
            None => println!(
                "Recorded {} for {} (no counters changed).",
                outcome.verdict, outcome.example_id
            ),
        }
    }
    println!("{}", receipt.message);
}

pub fn print_pending(examples: &[LearningExample], total: usize) {
    println!("{} of {} pending examples", examples.len(), total);
    println!();
    for e in examples {
        println!(
            "{}  {}  {:<12} {:.2}  {}",
            e.id,
            e.timestamp.format("%Y-%m-%d %H:%M"),
            e.ai_decision.as_str(),
            e.ai_confidence,
            e.source_ref
        );
        println!("    {}", snippet(&e.text_snippet));
        if !e.violations_found.is_empty() {
            println!("    rules: {}", e.violations_found.join(", "));
        }
    }
}

pub fn print_performance(performance: &[PolicyPerformance]) {
    if performance.is_empty() {
        println!("No rules have received feedback yet.");
        return;
    }
    println!(
        "{:<36} {:>4} {:>4} {:>4} {:>9} {:>6} {:>5}",
        "rule", "tp", "fp", "fn", "precision", "recall", "f1"
    );
    for p in performance {
        println!(
            "{:<36} {:>4} {:>4} {:>4} {:>9.2} {:>6.2} {:>5.2}",
            p.rule_id,
            p.true_positives,
            p.false_positives,
            p.false_negatives,
            p.precision,
            p.recall,
            p.f1_score
        );
    }
}

pub fn print_report(report: &LearningReport) {
    println!("=== Compliance Learning Report ===");
    println!("{}", report.generated_at.format("%Y-%m-%d %H:%M UTC"));
    println!();

    println!("Performance Summary");
    println!("  {:<26} {}", "policies tracked", report.rules_tracked);
    println!("  {:<26} {}", "examples pending review", report.pending_examples);
    match report.average_f1 {
        Some(f1) => println!("  {:<26} {:.2}", "average F1", f1),
        None => println!("  {:<26} n/a", "average F1"),
    }
    println!();

    if !report.insights.is_empty() {
        println!("Key Insights");
        for i in &report.insights {
            println!("  - {i}");
        }
        println!();
    }

    if !report.top_rules.is_empty() {
        println!("Top Performing Policies");
        for p in &report.top_rules {
            println!(
                "  - {}: F1={:.2} (P={:.2}, R={:.2})",
                p.rule_id, p.f1_score, p.precision, p.recall
            );
        }
        println!();
    }
}

fn snippet(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(MAX_SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
