use thiserror::Error;

use crate::learning::Feedback;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("learning example not found: {0}")]
    NotFound(String),

    #[error("learning example {id} already resolved as {feedback}")]
    AlreadyResolved { id: String, feedback: Feedback },

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
