//! Category → remediation text lookup.

/// One recommendation per rule category. Categories missing here yield none.
pub const CATEGORY_RECOMMENDATIONS: &[(&str, &str)] = &[
    (
        "Terminology",
        "Review and update terminology to use precise medical language",
    ),
    (
        "Eligibility Claims",
        "Add conditional language to all HSA/FSA eligibility statements",
    ),
    (
        "Tax Claims",
        "Qualify all tax savings claims with appropriate disclaimers",
    ),
    (
        "Medical Focus",
        "Reframe product benefits in terms of medical conditions, not general wellness",
    ),
    (
        "Cost Transparency",
        "Clarify that service costs are included in product pricing",
    ),
];

pub fn recommendation_for(category: &str) -> Option<&'static str> {
    CATEGORY_RECOMMENDATIONS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, text)| *text)
}

/// One recommendation per distinct category, in first-seen order.
pub fn recommendations_for<'a, I>(categories: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen: Vec<&str> = Vec::new();
    let mut out = Vec::new();
    for category in categories {
        if seen.contains(&category) {
            continue;
        }
        seen.push(category);
        if let Some(text) = recommendation_for(category) {
            out.push(text.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuleCatalog;

    #[test]
    fn every_builtin_category_has_a_recommendation() {
        for cat in RuleCatalog::builtin().categories() {
            assert!(recommendation_for(&cat.name).is_some(), "{}", cat.name);
        }
    }

    #[test]
    fn distinct_in_first_seen_order() {
        let recs = recommendations_for(["Tax Claims", "Terminology", "Tax Claims"]);
        assert_eq!(
            recs,
            vec![
                "Qualify all tax savings claims with appropriate disclaimers",
                "Review and update terminology to use precise medical language",
            ]
        );
    }

    #[test]
    fn unknown_categories_are_skipped() {
        assert!(recommendations_for(["Nope"]).is_empty());
        assert!(recommendations_for(std::iter::empty()).is_empty());
    }
}
