//! Versioned compliance rulebook.
//!
//! The built-in catalog covers HSA/FSA marketing copy: terminology, eligibility
//! framing, tax savings claims, medical focus, and cost transparency. Custom
//! catalogs can be loaded from JSON with the same shape.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Severity;

pub const BUILTIN_VERSION: &str = "2025.1";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("duplicate rule id: {0}")]
    DuplicateRule(String),

    #[error("rule {0} has an empty id or title")]
    IncompleteRule(String),

    #[error("rule {rule_id}: empty phrase in {field}")]
    EmptyPhrase { rule_id: String, field: &'static str },

    #[error("invalid phrase pattern for rule {rule_id}: {source}")]
    Pattern {
        rule_id: String,
        #[source]
        source: regex::Error,
    },

    #[error("catalog file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One named compliance requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prohibited_phrases: Vec<String>,
    #[serde(default)]
    pub required_phrases: Vec<String>,
    /// Domain keywords that make the required phrases mandatory.
    #[serde(default)]
    pub trigger_terms: Vec<String>,
    #[serde(default)]
    pub compliant_examples: Vec<String>,
    #[serde(default)]
    pub non_compliant_examples: Vec<String>,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub name: String,
    pub description: String,
}

/// Immutable, validated set of rules. Rule ids are unique.
#[derive(Debug, Clone, Serialize)]
pub struct RuleCatalog {
    version: String,
    rules: Vec<Rule>,
    categories: Vec<CategoryInfo>,
}

#[derive(Deserialize)]
struct CatalogFile {
    version: String,
    rules: Vec<Rule>,
    #[serde(default)]
    categories: Vec<CategoryInfo>,
}

impl RuleCatalog {
    /// Build a catalog, rejecting duplicate ids and empty phrases.
    pub fn new(
        version: impl Into<String>,
        rules: Vec<Rule>,
        categories: Vec<CategoryInfo>,
    ) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if rule.id.trim().is_empty() || rule.title.trim().is_empty() {
                return Err(CatalogError::IncompleteRule(rule.id.clone()));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(CatalogError::DuplicateRule(rule.id.clone()));
            }
            for (field, phrases) in [
                ("prohibited_phrases", &rule.prohibited_phrases),
                ("required_phrases", &rule.required_phrases),
                ("trigger_terms", &rule.trigger_terms),
            ] {
                if phrases.iter().any(|p| p.trim().is_empty()) {
                    return Err(CatalogError::EmptyPhrase {
                        rule_id: rule.id.clone(),
                        field,
                    });
                }
            }
        }
        Ok(Self {
            version: version.into(),
            rules,
            categories,
        })
    }

    /// Parse a catalog from JSON: `{"version": "...", "rules": [...], "categories": [...]}`.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.version, file.rules, file.categories)
    }

    /// Load a catalog from a JSON file on disk.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.display(),
            version = %catalog.version,
            rules = catalog.rules.len(),
            "loaded rule catalog"
        );
        Ok(catalog)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn categories(&self) -> &[CategoryInfo] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.category == category)
    }

    pub fn high_severity(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|r| r.severity == Severity::High)
    }

    pub fn category_description(&self, category: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.description.as_str())
    }

    /// The built-in HSA/FSA marketing rulebook.
    pub fn builtin() -> Self {
        Self {
            version: BUILTIN_VERSION.to_string(),
            rules: builtin_rules(),
            categories: builtin_categories(),
        }
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ── Built-in rulebook ──

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn builtin_categories() -> Vec<CategoryInfo> {
    [
        ("Terminology", "Language precision requirements"),
        ("Eligibility Claims", "How to properly frame HSA/FSA eligibility"),
        ("Tax Claims", "Requirements for tax savings statements"),
        ("Medical Focus", "Medical condition vs wellness language"),
        ("Cost Transparency", "Service cost disclosure"),
    ]
    .iter()
    .map(|&(name, description)| CategoryInfo {
        name: name.to_string(),
        description: description.to_string(),
    })
    .collect()
}

fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule {
            id: "terminology_medical_professionals".into(),
            category: "Terminology".into(),
            severity: Severity::High,
            title: "Medical Professional Terminology".into(),
            description: "Must use precise terms for medical professionals".into(),
            prohibited_phrases: strings(&["doctor", "doctor's note", "quick questions"]),
            required_phrases: strings(&[
                "practitioner",
                "clinician",
                "healthcare provider",
                "independent",
                "licensed",
            ]),
            trigger_terms: strings(&["doctor", "lmn", "letter of medical necessity"]),
            compliant_examples: strings(&[
                "An independent licensed practitioner will review your clinical intake form",
                "Our healthcare providers are licensed partners",
            ]),
            non_compliant_examples: strings(&[
                "A doctor will approve your LMN",
                "Just answer a few quick questions",
            ]),
            rationale: "Reviewing professionals may be NPs or PAs, not just MDs/DOs".into(),
        },
        Rule {
            id: "eligibility_conditional_language".into(),
            category: "Eligibility Claims".into(),
            severity: Severity::High,
            title: "Conditional Eligibility Language".into(),
            description: "Eligibility must be presented as conditional, never guaranteed".into(),
            prohibited_phrases: strings(&[
                "is eligible",
                "is approved",
                "guaranteed approval",
                "use your HSA/FSA dollars",
            ]),
            required_phrases: strings(&[
                "may be eligible",
                "if you qualify",
                "with a Truemed LMN",
                "qualified customers",
            ]),
            trigger_terms: strings(&["hsa", "fsa"]),
            compliant_examples: strings(&[
                "HSA/FSA eligible with a Truemed LMN",
                "You may be eligible to pay with HSA/FSA",
                "This item may be HSA/FSA-eligible when used to address a specific health condition",
            ]),
            non_compliant_examples: strings(&[
                "Use your HSA/FSA dollars",
                "Your purchase is now HSA/FSA eligible",
                "We're eligible for payment from HSA/FSA providers",
            ]),
            rationale: "Eligibility is determined by licensed practitioners, not automatic".into(),
        },
        Rule {
            id: "tax_savings_qualified".into(),
            category: "Tax Claims".into(),
            severity: Severity::High,
            title: "Qualified Tax Savings Claims".into(),
            description: "Tax savings must be approximate and explained".into(),
            prohibited_phrases: strings(&["save up to", "save 30% now!", "unlocks 30% savings"]),
            required_phrases: strings(&[
                "~30%",
                "approximately",
                "individual tax rates vary",
                "checkout the TrueSavings Estimator",
            ]),
            trigger_terms: strings(&["tax savings", "pre-tax", "tax-free"]),
            compliant_examples: strings(&[
                "Customers who qualify save ~30%*",
                "When you qualify to use HSA/FSA funds, you can save about ~30%, depending on your individual tax bracket",
            ]),
            non_compliant_examples: strings(&[
                "Save up to 40%",
                "Save 30% now!",
                "Your HSA/FSA unlocks 30% savings on products you were going to purchase anyway",
            ]),
            rationale: "Actual tax benefits vary with individual circumstances and state regulations"
                .into(),
        },
        Rule {
            id: "medical_focus_required".into(),
            category: "Medical Focus".into(),
            severity: Severity::Medium,
            title: "Medical Condition Focus".into(),
            description:
                "Products must be described in terms of medical conditions, not general wellness"
                    .into(),
            prohibited_phrases: strings(&[
                "wellness",
                "look radiant",
                "feel energized",
                "health journey",
                "general health",
            ]),
            required_phrases: strings(&[
                "medical condition",
                "health condition",
                "chronic",
                "treat",
                "prevent",
                "manage",
            ]),
            trigger_terms: Vec::new(),
            compliant_examples: strings(&[
                "This item may be eligible when used to address a specific health condition",
                "Effective way to manage chronic health conditions like diabetes, obesity, and hypertension",
            ]),
            non_compliant_examples: strings(&[
                "Look radiant and feel energized by incorporating this into your daily workout routine",
                "Perfect for your health and wellness journey",
            ]),
            rationale: "Only products that cure, treat, mitigate, or prevent diagnosed medical conditions are HSA/FSA eligible".into(),
        },
        Rule {
            id: "truemed_cost_transparency".into(),
            category: "Cost Transparency".into(),
            severity: Severity::Medium,
            title: "Service Cost Disclosure".into(),
            description: "Must not imply the qualification service is free".into(),
            prohibited_phrases: strings(&[
                "Truemed is free",
                "no charge",
                "covers the cost",
                "makes Truemed available at no charge",
            ]),
            required_phrases: strings(&[
                "included in the price",
                "costs are built into",
                "no additional cost",
            ]),
            trigger_terms: Vec::new(),
            compliant_examples: strings(&[
                "The cost of Truemed's services are included in your purchase price",
                "Truemed's costs are built into the purchase price, so you do not have to pay extra",
            ]),
            non_compliant_examples: strings(&[
                "Truemed is free for all customers",
                "We cover the cost of Truemed for qualified customers",
            ]),
            rationale: "Customers pay for their own healthcare services; third-party payment could create compliance issues".into(),
        },
    ]
}
