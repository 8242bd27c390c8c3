//! Learning layer: recorded examples, per-rule confusion matrices, human
//! feedback, and the insights derived from them.

mod error;
pub use error::StoreError;

pub mod feedback;
pub mod insights;
pub mod learning;
pub mod report;

pub use feedback::{FeedbackError, FeedbackEvent, FeedbackProcessor, FeedbackReceipt};
pub use insights::generate_insights;
pub use learning::{
    CounterUpdate, Feedback, FeedbackOutcome, LearningExample, LearningStore, PolicyPerformance,
    Verdict,
};
pub use report::{LearningExport, LearningReport};
