//! Loan Pipeline Orchestrator
//!
//! Drives a confidential loan application through a fixed sequence of
//! collaborators:
//! - encrypts the application and pins the ciphertext to content storage
//! - proves eligibility without revealing the raw figures
//! - scores risk and underwrites a decision with deterministic rules
//! - settles approved amounts to a Cardano wallet on confirmation
//!
//! PIPELINE:
//! ENCRYPT → UPLOAD → PROVE → ASSESS → DECIDE → (confirm) → SETTLE

pub mod agents;
pub mod api;
pub mod audit;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod fake_data;
pub mod models;
pub mod pipeline;
pub mod proof;
pub mod scheduler;
pub mod services;
pub mod validation;
pub mod wallet;

pub use error::{PipelineError, Result};

// Re-export common types
pub use models::*;
pub use pipeline::{PipelineOrchestrator, RunOutcome};
