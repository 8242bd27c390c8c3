//! Generative review layer: the model adapter, response validation, the
//! merger that combines model and phrase findings, and the screening pipeline.

mod error;
pub use error::{ReviewError, ScreenError};

pub mod merge;
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod reviewer;

pub use merge::{merge, summarize};
pub use openai::OpenAiChatModel;
pub use pipeline::{Screened, Screener};
pub use reviewer::{
    GenerativeReviewer, NormalizedReview, ReviewModel, ReviewedViolation, ReviewerConfig,
    normalize_review,
};
