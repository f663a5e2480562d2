//! Risk scoring and underwriting agents
//!
//! Both are deterministic rule engines. Only their descriptive metadata
//! comes from the fake-data generator.

pub mod risk;
pub mod underwriting;

pub use risk::{assess, calculate_risk_score};
pub use underwriting::decide;
