//! Error types for the loan pipeline

use crate::validation::FieldError;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {

    // =============================
    // Pipeline Taxonomy
    // =============================

    /// Field-level problems found before a run starts. Never enters pipeline state.
    #[error("Validation failed: {}", summarize_fields(.0))]
    Validation(Vec<FieldError>),

    /// Any external collaborator returning non-success. The message is shown verbatim.
    #[error("{0}")]
    Collaborator(String),

    /// The run was aborted by reset or by a newer run.
    #[error("Pipeline run cancelled")]
    Cancelled,

    // =============================
    // Settlement & Wallet
    // =============================

    #[error("Invalid Cardano wallet address: {0}")]
    InvalidWalletAddress(String),

    #[error("Settlement unavailable: {0}")]
    SettlementUnavailable(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }
}

fn summarize_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}
