//! Displayable stages in pipeline order

use crate::models::{PipelineStage, PipelineState};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StepInfo {
    pub id: PipelineStage,
    pub label: &'static str,
    pub description: &'static str,
    /// seconds
    pub estimated_duration: u32,
    pub technical_detail: &'static str,
}

pub const PIPELINE_STEPS: [StepInfo; 7] = [
    StepInfo {
        id: PipelineStage::Encrypting,
        label: "Encrypting Data",
        description: "Encrypting KYC payload with AES-256-GCM",
        estimated_duration: 3,
        technical_detail: "AES-256-GCM | 256-bit key derivation | PBKDF2",
    },
    StepInfo {
        id: PipelineStage::Uploading,
        label: "IPFS Storage",
        description: "Pinning encrypted blob to decentralized storage",
        estimated_duration: 4,
        technical_detail: "IPFS v0.1 | CIDv1 | Pinata Gateway",
    },
    StepInfo {
        id: PipelineStage::GeneratingProof,
        label: "ZK Proof Generation",
        description: "Computing zero-knowledge proof via Compact circuit",
        estimated_duration: 5,
        technical_detail: "Groth16 | BN254 curve | ~2048 constraints",
    },
    StepInfo {
        id: PipelineStage::RiskAssessment,
        label: "Aura Risk Analysis",
        description: "AI agent evaluating creditworthiness from proof",
        estimated_duration: 4,
        technical_detail: "Aura v2.1.0 | Multi-factor scoring | Privacy-preserving",
    },
    StepInfo {
        id: PipelineStage::LenderDecision,
        label: "Lender Underwriting",
        description: "Automated underwriting engine processing decision",
        estimated_duration: 3,
        technical_detail: "Policy Engine v1.4 | Risk-adjusted pricing",
    },
    StepInfo {
        id: PipelineStage::SettlementPending,
        label: "On-Chain Settlement",
        description: "Broadcasting transaction to Cardano network",
        estimated_duration: 8,
        technical_detail: "Plutus V2 | Preprod | ~0.2 ADA fees",
    },
    StepInfo {
        id: PipelineStage::SettlementConfirmed,
        label: "Confirmed",
        description: "Transaction confirmed on blockchain",
        estimated_duration: 0,
        technical_detail: "Finality achieved | Block confirmed",
    },
];

pub fn step_for(stage: PipelineStage) -> Option<&'static StepInfo> {
    PIPELINE_STEPS.iter().find(|step| step.id == stage)
}

pub fn stage_index(stage: PipelineStage) -> Option<usize> {
    PIPELINE_STEPS.iter().position(|step| step.id == stage)
}

/// Share of catalogue steps already completed, 0..=100
pub fn progress_percent(state: &PipelineState) -> u8 {
    let done = PIPELINE_STEPS
        .iter()
        .filter(|step| state.completed_stages.contains(&step.id))
        .count();
    ((done * 100) / PIPELINE_STEPS.len()) as u8
}
