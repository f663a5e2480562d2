//! Lender underwriting agent

use crate::agents::risk::{REDUCE_ABOVE, REJECT_ABOVE};
use crate::fake_data::FakeDataGenerator;
use crate::models::{DecisionMetadata, DecisionStatus, LoanDecision, RiskAssessment, RiskTier};

pub const POLICY_VERSION: &str = "lender-policy-v1.4.2";

pub const CONDITIONAL_RATE_PERCENT: f64 = 8.5;
pub const STANDARD_RATE_PERCENT: f64 = 5.0;

/// Collateral is required above this score, whatever the status
pub const COLLATERAL_ABOVE: u32 = 70;

pub fn decide(
    assessment: &RiskAssessment,
    requested_amount: f64,
    tenure_months: u32,
    fake: &dyn FakeDataGenerator,
) -> LoanDecision {
    let score = assessment.risk_score;

    let (status, risk_tier, approved_amount, rate, requires_user_confirmation, explanation) =
        if score > REJECT_ABOVE {
            (
                DecisionStatus::Rejected,
                RiskTier::High,
                0.0,
                0.0,
                false,
                format!(
                    "Application rejected due to high risk score ({}/100). {}",
                    score,
                    assessment.notes.join(" ")
                ),
            )
        } else if score > REDUCE_ABOVE {
            let amount = assessment.max_recommended_amount.min(requested_amount);
            (
                DecisionStatus::Conditional,
                RiskTier::Elevated,
                amount,
                CONDITIONAL_RATE_PERCENT,
                true,
                format!(
                    "Conditional approval: {:.2} ADA at {}% annual interest. Please confirm the reduced amount.",
                    amount, CONDITIONAL_RATE_PERCENT
                ),
            )
        } else {
            (
                DecisionStatus::Approved,
                RiskTier::Low,
                requested_amount,
                STANDARD_RATE_PERCENT,
                false,
                format!(
                    "Approved: {:.2} ADA at {:.1}% annual interest for {} months.",
                    requested_amount, STANDARD_RATE_PERCENT, tenure_months
                ),
            )
        };

    LoanDecision {
        decision_id: fake.uuid().to_string(),
        proof_id: assessment.proof_id.clone(),
        status,
        approved_amount,
        interest_rate_annual_percent: rate,
        tenure_months,
        explanation,
        requires_user_confirmation,
        metadata: DecisionMetadata {
            policy_version: POLICY_VERSION.to_string(),
            underwriting_time: fake.jitter(95, 60),
            risk_tier,
            collateral_required: score > COLLATERAL_ABOVE,
        },
    }
}
