//! Aura risk scoring agent

use crate::fake_data::FakeDataGenerator;
use crate::models::{AssessmentMetadata, ProofRecord, Recommendation, RiskAssessment};

pub const MODEL_VERSION: &str = "aura-v2.1.0";

const BASE_SCORE: i32 = 50;
const INCOME_PENALTY: i32 = 20;
const DEBT_PENALTY: i32 = 15;
const RED_FLAG_PENALTY: i32 = 25;

/// Scores above this are rejected
pub const REJECT_ABOVE: u32 = 80;
/// Scores above this (and not rejected) get a reduced amount
pub const REDUCE_ABOVE: u32 = 60;
pub const REDUCED_AMOUNT_FACTOR: f64 = 0.7;

/// Base 50 plus additive penalties, clamped to `[0, 100]`
pub fn calculate_risk_score(
    proof: &ProofRecord,
    monthly_income: f64,
    requested_amount: f64,
    tenure_months: u32,
) -> u32 {
    let mut score = BASE_SCORE;

    if !proof.conditions.income_to_repayment_ratio_ok {
        score += INCOME_PENALTY;
    }
    if !proof.conditions.debt_to_income_ok {
        score += DEBT_PENALTY;
    }
    if !proof.conditions.no_red_flags {
        score += RED_FLAG_PENALTY;
    }

    // Only one of the two tiers ever applies
    let income_to_loan_ratio = (monthly_income * f64::from(tenure_months)) / requested_amount;
    if income_to_loan_ratio < 10.0 {
        score += 10;
    } else if income_to_loan_ratio < 20.0 {
        score += 5;
    }

    score.clamp(0, 100) as u32
}

pub fn assess(
    proof: &ProofRecord,
    monthly_income: f64,
    requested_amount: f64,
    tenure_months: u32,
    fake: &dyn FakeDataGenerator,
) -> RiskAssessment {
    let risk_score = calculate_risk_score(proof, monthly_income, requested_amount, tenure_months);

    let mut notes = Vec::new();
    let mut max_recommended_amount = requested_amount;

    let recommendation = if !proof.valid {
        notes.push("Proof validation failed".to_string());
        Recommendation::Reject
    } else if risk_score > REJECT_ABOVE {
        notes.push(format!(
            "High risk score: {}. Conditions not met for approval.",
            risk_score
        ));
        Recommendation::Reject
    } else if risk_score > REDUCE_ABOVE {
        max_recommended_amount = requested_amount * REDUCED_AMOUNT_FACTOR;
        notes.push(format!(
            "Moderate risk score: {}. Consider reducing loan amount.",
            risk_score
        ));
        notes.push(format!("Recommended max: {:.2} ADA", max_recommended_amount));
        Recommendation::ReduceAmount
    } else {
        notes.push(format!(
            "Low risk score: {}. Conditions met for approval.",
            risk_score
        ));
        Recommendation::Approve
    };

    if !proof.conditions.income_to_repayment_ratio_ok {
        notes.push("Income may be insufficient relative to repayment obligation.".to_string());
    }
    if !proof.conditions.debt_to_income_ok {
        notes.push("Debt-to-income ratio is elevated.".to_string());
    }

    let evaluation_id: String = fake
        .derived_hash(&format!("eval-{}", proof.proof_id))
        .chars()
        .take(32)
        .collect();

    RiskAssessment {
        proof_id: proof.proof_id.clone(),
        risk_score,
        recommendation,
        max_recommended_amount,
        notes,
        metadata: AssessmentMetadata {
            model_version: MODEL_VERSION.to_string(),
            evaluation_id,
            confidence_score: fake.jitter(85, 10),
            processing_time: fake.jitter(180, 120),
            factors_analyzed: fake.jitter(12, 5),
        },
    }
}
