//! Error taxonomy for generation attempts and preset uploads.
//!
//! Every failure is local to one generation attempt or one upload; nothing
//! here is retried automatically.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CyoaError {
    /// Missing or unusable configuration. Generation is skipped and the
    /// problem is logged; nothing is surfaced to the host.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed preset document. The upload is aborted and any previously
    /// stored preset is left untouched.
    #[error("invalid preset format: {0}")]
    Format(String),

    /// The completions endpoint could not be reached or returned a
    /// non-success status.
    #[error("API error: {0}")]
    Network(String),

    /// The model response could not be decoded into an option list.
    #[error("failed to parse options: {0}")]
    Parse(String),
}
