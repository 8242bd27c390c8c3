//! Natural-language insights over per-rule performance.

use crate::learning::PolicyPerformance;

/// F1 below which the weakest rule is flagged.
pub const ATTENTION_F1: f64 = 0.7;
/// Precision below which an over-firing rule counts as noisy.
pub const NOISY_PRECISION: f64 = 0.6;
/// Recall below which an under-firing rule counts as leaky.
pub const LEAKY_RECALL: f64 = 0.6;

/// Derive insights from `performance`. Every applicable insight is emitted;
/// empty input yields none.
pub fn generate_insights(performance: &[PolicyPerformance]) -> Vec<String> {
    let mut insights = Vec::new();

    // First minimum wins on ties, so callers passing f1-sorted rows get a
    // stable pick.
    let worst = performance.iter().reduce(|worst, p| {
        if p.f1_score < worst.f1_score { p } else { worst }
    });
    if let Some(worst) = worst
        && worst.f1_score < ATTENTION_F1
    {
        insights.push(format!(
            "Policy \"{}\" needs attention (F1: {:.2})",
            worst.rule_id, worst.f1_score
        ));
    }

    let noisy = performance
        .iter()
        .filter(|p| p.false_positives > p.true_positives && p.precision < NOISY_PRECISION)
        .count();
    if noisy > 0 {
        insights.push(format!(
            "{noisy} policies have high false positive rates - consider refining detection criteria"
        ));
    }

    let leaky = performance
        .iter()
        .filter(|p| p.false_negatives > p.true_positives && p.recall < LEAKY_RECALL)
        .count();
    if leaky > 0 {
        insights.push(format!(
            "{leaky} policies missing violations - consider strengthening detection patterns"
        ));
    }

    insights
}
