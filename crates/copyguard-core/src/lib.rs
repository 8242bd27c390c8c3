//! Core types, the versioned rule catalog, and the deterministic phrase detector.

pub mod catalog;
pub mod model;
pub mod pattern;
pub mod recommendations;

pub use catalog::{CatalogError, CategoryInfo, Rule, RuleCatalog};
pub use model::{ComplianceResult, Decision, Severity, Violation};
pub use pattern::PatternDetector;
pub use recommendations::{recommendation_for, recommendations_for};
