//! Failure taxonomy for the upload pipeline.
//!
//! Every failure is terminal for the upload that triggered it and is
//! rendered as an error banner; nothing here is fatal to the process.

use thiserror::Error;

/// Errors that can end an upload early.
///
/// A missing required column is deliberately *not* represented here: the
/// schema check is an ordinary branch of the pipeline (see
/// [`crate::pipeline::Outcome::MissingColumns`]), so the uploaded-data
/// preview can still accompany its banner.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The uploaded bytes are not valid CSV (empty, non-UTF-8, ragged rows,
    /// duplicate headers, and so on).
    #[error("the uploaded file could not be read as CSV: {0}")]
    Parse(String),

    /// The scaler or model cannot score the parsed table, typically because
    /// a required column holds text, missing values, or non-finite numbers.
    #[error("the data could not be scored: {0}")]
    Model(String),

    /// Chart rendering or CSV serialization failed. Not actionable by the
    /// uploader; surfaced as a generic banner.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type used by the pipeline modules.
pub type Result<T> = std::result::Result<T, PipelineError>;

// Plotters drawing errors carry the backend error type as a generic
// parameter; folding them all into `Internal` lets the viz code use `?`.
impl<E: std::error::Error + Send + Sync> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for PipelineError
{
    fn from(err: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        PipelineError::Internal(format!("chart rendering failed: {err}"))
    }
}
