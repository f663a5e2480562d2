//! Eligibility rule evaluation
//!
//! Pure and deterministic. Income must already be validated as positive.

use crate::models::{EligibilityEvaluation, LoanApplication};

/// Flat annual interest folded into the repayment estimate
pub const FLAT_ANNUAL_INTEREST: f64 = 0.05;

/// Income must cover this many monthly repayments
pub const INCOME_COVERAGE_MULTIPLE: f64 = 3.0;

/// Debt-to-income ratio must stay strictly below this
pub const MAX_DEBT_TO_INCOME: f64 = 0.4;

/// Principal installment plus the flat interest component amortized monthly
pub fn monthly_repayment(requested_amount: f64, tenure_months: u32) -> f64 {
    let tenure = f64::from(tenure_months);
    requested_amount / tenure + (requested_amount * FLAT_ANNUAL_INTEREST) / (tenure * 12.0)
}

pub fn evaluate_conditions(input: &LoanApplication) -> EligibilityEvaluation {
    let monthly_repayment = monthly_repayment(input.requested_amount, input.tenure_months);

    let income_to_repayment_ratio_ok =
        input.monthly_income >= monthly_repayment * INCOME_COVERAGE_MULTIPLE;

    let total_monthly_debt = input.existing_debt / 12.0 + monthly_repayment;
    let debt_to_income_ratio = total_monthly_debt / input.monthly_income;
    // NaN and infinity both fail the comparison
    let debt_to_income_ok = debt_to_income_ratio < MAX_DEBT_TO_INCOME;

    EligibilityEvaluation {
        income_to_repayment_ratio_ok,
        debt_to_income_ok,
        no_red_flags: !input.has_red_flags,
        monthly_repayment,
        debt_to_income_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application(income: f64, debt: f64, requested: f64, tenure: u32, red_flags: bool) -> LoanApplication {
        LoanApplication {
            full_name: "Test Applicant".to_string(),
            email: "applicant@example.com".to_string(),
            monthly_income: income,
            existing_debt: debt,
            requested_amount: requested,
            tenure_months: tenure,
            purpose: "Equipment".to_string(),
            has_red_flags: red_flags,
        }
    }

    #[test]
    fn test_scenario_a_all_conditions_hold() {
        let eval = evaluate_conditions(&application(3000.0, 0.0, 10000.0, 12, false));

        let expected = 10000.0 / 12.0 + 500.0 / 144.0;
        assert!((eval.monthly_repayment - expected).abs() < 1e-9);
        assert!(eval.income_to_repayment_ratio_ok);
        assert!((eval.debt_to_income_ratio - expected / 3000.0).abs() < 1e-9);
        assert!(eval.debt_to_income_ok);
        assert!(eval.no_red_flags);
        assert!(eval.conditions().all_hold());
    }

    #[test]
    fn test_scenario_c_income_too_low() {
        let eval = evaluate_conditions(&application(500.0, 0.0, 20000.0, 12, false));

        let expected = 20000.0 / 12.0 + 1000.0 / 144.0;
        assert!((eval.monthly_repayment - expected).abs() < 1e-9);
        assert!(!eval.income_to_repayment_ratio_ok);
        assert!(eval.debt_to_income_ratio > 3.0);
        assert!(!eval.debt_to_income_ok);
        assert!(eval.no_red_flags);
    }

    #[test]
    fn test_red_flags_only_affect_flag_condition() {
        let eval = evaluate_conditions(&application(3000.0, 0.0, 10000.0, 12, true));

        assert!(eval.income_to_repayment_ratio_ok);
        assert!(eval.debt_to_income_ok);
        assert!(!eval.no_red_flags);
    }

    #[test]
    fn test_existing_debt_counts_monthly() {
        // 1000 of monthly debt on top of the repayment
        let eval = evaluate_conditions(&application(3000.0, 12000.0, 10000.0, 12, false));
        let expected = (1000.0 + eval.monthly_repayment) / 3000.0;

        assert!((eval.debt_to_income_ratio - expected).abs() < 1e-12);
        assert!(!eval.debt_to_income_ok);
        assert!(eval.income_to_repayment_ratio_ok);
    }

    #[test]
    fn test_income_coverage_boundary_is_inclusive() {
        let repayment = monthly_repayment(10000.0, 12);
        let eval = evaluate_conditions(&application(repayment * 3.0, 0.0, 10000.0, 12, false));
        assert!(eval.income_to_repayment_ratio_ok);
    }

    #[test]
    fn test_zero_income_fails_without_panicking() {
        let eval = evaluate_conditions(&application(0.0, 0.0, 10000.0, 12, false));
        assert!(eval.debt_to_income_ratio.is_infinite());
        assert!(!eval.debt_to_income_ok);
        assert!(!eval.income_to_repayment_ratio_ok);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let app = application(4321.5, 987.25, 15555.0, 37, false);
        let first = evaluate_conditions(&app);
        let second = evaluate_conditions(&app);

        assert_eq!(first, second);
        assert_eq!(first.monthly_repayment.to_bits(), second.monthly_repayment.to_bits());
        assert_eq!(
            first.debt_to_income_ratio.to_bits(),
            second.debt_to_income_ratio.to_bits()
        );
    }
}
