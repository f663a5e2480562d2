//! Core data models for the loan pipeline
//!
//! Field names serialize in camelCase to match the REST surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Application =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoanApplication {
    pub full_name: String,
    pub email: String,
    pub monthly_income: f64,
    pub existing_debt: f64,
    pub requested_amount: f64,
    pub tenure_months: u32,
    pub purpose: String,
    #[serde(default)]
    pub has_red_flags: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityEvaluation {
    pub income_to_repayment_ratio_ok: bool,
    pub debt_to_income_ok: bool,
    pub no_red_flags: bool,
    pub monthly_repayment: f64,
    pub debt_to_income_ratio: f64,
}

impl EligibilityEvaluation {
    pub fn conditions(&self) -> ProofConditions {
        ProofConditions {
            income_to_repayment_ratio_ok: self.income_to_repayment_ratio_ok,
            debt_to_income_ok: self.debt_to_income_ok,
            no_red_flags: self.no_red_flags,
        }
    }
}

//
// ================= Encryption & Storage =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedPayload {
    pub nonce: String,
    pub ciphertext: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoredContent {
    #[serde(rename = "cid")]
    pub content_reference: String,
    pub size: usize,
}

//
// ================= Proof =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProofConditions {
    pub income_to_repayment_ratio_ok: bool,
    pub debt_to_income_ok: bool,
    pub no_red_flags: bool,
}

impl ProofConditions {
    pub fn all_hold(&self) -> bool {
        self.income_to_repayment_ratio_ok && self.debt_to_income_ok && self.no_red_flags
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProofRecord {
    pub proof_id: String,
    #[serde(rename = "cid")]
    pub storage_reference: String,
    pub conditions: ProofConditions,
    #[serde(rename = "hash")]
    pub integrity_hash: String,
    pub valid: bool,
    pub generated_at: DateTime<Utc>,
    pub metadata: ProofMetadata,
}

/// Descriptive only. Nothing downstream reads these values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProofMetadata {
    pub circuit_name: String,
    pub constraint_count: u32,
    /// bytes
    pub proof_size: u32,
    /// ms
    pub verification_time: u32,
    /// ms
    pub proving_time: u32,
    pub curve_type: String,
    pub protocol: String,
    pub public_inputs_hash: String,
    pub witness_hash: String,
}

//
// ================= Risk Assessment =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Approve,
    ReduceAmount,
    Reject,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Approve => "approve",
            Recommendation::ReduceAmount => "reduce_amount",
            Recommendation::Reject => "reject",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub proof_id: String,
    pub risk_score: u32,
    pub recommendation: Recommendation,
    pub max_recommended_amount: f64,
    pub notes: Vec<String>,
    pub metadata: AssessmentMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentMetadata {
    pub model_version: String,
    pub evaluation_id: String,
    pub confidence_score: u32,
    /// ms
    pub processing_time: u32,
    pub factors_analyzed: u32,
}

//
// ================= Decision =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionStatus {
    Approved,
    Conditional,
    Rejected,
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionStatus::Approved => "APPROVED",
            DecisionStatus::Conditional => "CONDITIONAL",
            DecisionStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Elevated,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoanDecision {
    pub decision_id: String,
    pub proof_id: String,
    pub status: DecisionStatus,
    pub approved_amount: f64,
    pub interest_rate_annual_percent: f64,
    pub tenure_months: u32,
    pub explanation: String,
    pub requires_user_confirmation: bool,
    pub metadata: DecisionMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecisionMetadata {
    pub policy_version: String,
    /// ms
    pub underwriting_time: u32,
    pub risk_tier: RiskTier,
    pub collateral_required: bool,
}

//
// ================= Settlement =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementResult {
    #[serde(rename = "txHash")]
    pub transaction_reference: String,
    #[serde(rename = "toAddress")]
    pub recipient_address: String,
    pub amount: f64,
    pub network: String,
    pub metadata: DisbursementMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementMetadata {
    pub block_height: u64,
    pub slot_number: u64,
    pub epoch: u64,
    /// ADA
    pub fees: f64,
    pub confirmations: u32,
    pub plutus_script_hash: String,
    pub datum_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionVerification {
    pub tx_hash: String,
    pub verified: bool,
    pub timestamp: DateTime<Utc>,
}

//
// ================= Pipeline State =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Encrypting,
    Uploading,
    GeneratingProof,
    RiskAssessment,
    LenderDecision,
    SettlementPending,
    SettlementConfirmed,
    Error,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Encrypting => "encrypting",
            PipelineStage::Uploading => "uploading",
            PipelineStage::GeneratingProof => "generating_proof",
            PipelineStage::RiskAssessment => "risk_assessment",
            PipelineStage::LenderDecision => "lender_decision",
            PipelineStage::SettlementPending => "settlement_pending",
            PipelineStage::SettlementConfirmed => "settlement_confirmed",
            PipelineStage::Error => "error",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    pub current_stage: PipelineStage,
    pub completed_stages: Vec<PipelineStage>,
    /// Milliseconds on the scheduler clock
    pub stage_start_time: Option<u64>,
    pub error: Option<String>,
    pub can_retry: bool,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            current_stage: PipelineStage::Idle,
            completed_stages: Vec::new(),
            stage_start_time: None,
            error: None,
            can_retry: false,
        }
    }
}

/// Cached outputs of the current run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub proof: Option<ProofRecord>,
    pub assessment: Option<RiskAssessment>,
    pub decision: Option<LoanDecision>,
    pub disbursement: Option<DisbursementResult>,
}

//
// ================= Processing Log =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
    Debug,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// `HH:MM:SS.mmm` UTC
    pub timestamp: String,
    pub level: LogLevel,
    pub stage: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Read-only view handed to observers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    pub result: PipelineResult,
    pub logs: Vec<LogEntry>,
}
