use std::time::Duration;

use copyguard_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("review service returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("malformed review response: {reason}")]
    Malformed { reason: String },

    #[error("review timed out after {0:?}")]
    Timeout(Duration),
}

impl ReviewError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Failure of the detection pipeline. Never carries a partial result.
#[derive(Error, Debug)]
pub enum ScreenError {
    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("failed to record example: {0}")]
    Store(#[from] StoreError),
}
