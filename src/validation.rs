//! Field-level validation of loan applications
//!
//! Runs before a pipeline starts. Failures never reach pipeline state.

use crate::error::PipelineError;
use crate::models::LoanApplication;
use crate::Result;
use serde::{Deserialize, Serialize};

pub const MIN_TENURE_MONTHS: u32 = 6;
pub const MAX_TENURE_MONTHS: u32 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Collect every field error in the application, in form order
pub fn validate_loan_application(input: &LoanApplication) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if input.full_name.trim().chars().count() < 2 {
        errors.push(FieldError::new("fullName", "Full name is required"));
    }

    if !input.email.contains('@') {
        errors.push(FieldError::new("email", "Valid email is required"));
    }

    // Zero income would divide by zero in the debt-to-income ratio
    if !input.monthly_income.is_finite() || input.monthly_income <= 0.0 {
        errors.push(FieldError::new(
            "monthlyIncome",
            "Monthly income is required and must be positive",
        ));
    }

    if !input.existing_debt.is_finite() || input.existing_debt < 0.0 {
        errors.push(FieldError::new(
            "existingDebt",
            "Existing debt must be non-negative",
        ));
    }

    if !input.requested_amount.is_finite() || input.requested_amount <= 0.0 {
        errors.push(FieldError::new(
            "requestedAmount",
            "Requested amount must be positive",
        ));
    }

    if !(MIN_TENURE_MONTHS..=MAX_TENURE_MONTHS).contains(&input.tenure_months) {
        errors.push(FieldError::new(
            "tenureMonths",
            "Tenure must be between 6 and 60 months",
        ));
    }

    if input.purpose.trim().chars().count() < 3 {
        errors.push(FieldError::new("purpose", "Purpose is required"));
    }

    errors
}

/// Same as [`validate_loan_application`] but as a `Result`
pub fn ensure_valid(input: &LoanApplication) -> Result<()> {
    let errors = validate_loan_application(input);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Validation(errors))
    }
}
