//! Configuration loaded from the environment
//!
//! `.env` is read first via dotenv; unset variables fall back to defaults.

use crate::error::PipelineError;
use crate::models::PipelineStage;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_NETWORK: &str = "preprod";

/// Minimum time each stage stays visible, in milliseconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StageMinimums {
    pub encrypting: u64,
    pub uploading: u64,
    pub generating_proof: u64,
    pub risk_assessment: u64,
    pub lender_decision: u64,
    pub settlement_pending: u64,
}

impl Default for StageMinimums {
    fn default() -> Self {
        Self {
            encrypting: 2800,
            uploading: 3500,
            generating_proof: 5500,
            risk_assessment: 4000,
            lender_decision: 3000,
            settlement_pending: 8000,
        }
    }
}

impl StageMinimums {
    pub fn zero() -> Self {
        Self {
            encrypting: 0,
            uploading: 0,
            generating_proof: 0,
            risk_assessment: 0,
            lender_decision: 0,
            settlement_pending: 0,
        }
    }

    /// idle, settlement_confirmed and error have no minimum
    pub fn for_stage(&self, stage: PipelineStage) -> Duration {
        let ms = match stage {
            PipelineStage::Encrypting => self.encrypting,
            PipelineStage::Uploading => self.uploading,
            PipelineStage::GeneratingProof => self.generating_proof,
            PipelineStage::RiskAssessment => self.risk_assessment,
            PipelineStage::LenderDecision => self.lender_decision,
            PipelineStage::SettlementPending => self.settlement_pending,
            PipelineStage::Idle | PipelineStage::SettlementConfirmed | PipelineStage::Error => 0,
        };
        Duration::from_millis(ms)
    }

    fn slot_mut(&mut self, stage: PipelineStage) -> Option<&mut u64> {
        match stage {
            PipelineStage::Encrypting => Some(&mut self.encrypting),
            PipelineStage::Uploading => Some(&mut self.uploading),
            PipelineStage::GeneratingProof => Some(&mut self.generating_proof),
            PipelineStage::RiskAssessment => Some(&mut self.risk_assessment),
            PipelineStage::LenderDecision => Some(&mut self.lender_decision),
            PipelineStage::SettlementPending => Some(&mut self.settlement_pending),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub minimums: StageMinimums,
    /// Pause between progress messages inside a stage
    pub narration_pacing: bool,
    pub network: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            minimums: StageMinimums::default(),
            narration_pacing: true,
            network: DEFAULT_NETWORK.to_string(),
        }
    }
}

impl PipelineConfig {
    /// No minimums and no narration pauses
    pub fn instant() -> Self {
        Self {
            minimums: StageMinimums::zero(),
            narration_pacing: false,
            network: DEFAULT_NETWORK.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(network) = env::var("CARDANO_NETWORK") {
            config.network = network;
        }

        if let Ok(pacing) = env::var("PIPELINE_PACING") {
            config.narration_pacing = parse_switch("PIPELINE_PACING", &pacing)?;
        }

        for stage in [
            PipelineStage::Encrypting,
            PipelineStage::Uploading,
            PipelineStage::GeneratingProof,
            PipelineStage::RiskAssessment,
            PipelineStage::LenderDecision,
            PipelineStage::SettlementPending,
        ] {
            let key = format!("PIPELINE_MIN_{}_MS", stage.as_str().to_uppercase());
            if let Ok(raw) = env::var(&key) {
                let ms = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| PipelineError::Config(format!("{}: {}", key, e)))?;
                if let Some(slot) = config.minimums.slot_mut(stage) {
                    *slot = ms;
                }
            }
        }

        Ok(config)
    }
}

fn parse_switch(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        other => Err(PipelineError::Config(format!(
            "{}: expected on/off, got '{}'",
            key, other
        ))),
    }
}

/// Settings for the binaries
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// When set, collaborators are reached over HTTP instead of in-process
    pub collaborator_base_url: Option<String>,
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let port = match env::var("PORT").or_else(|_| env::var("API_PORT")) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|e| PipelineError::Config(format!("PORT: {}", e)))?,
            Err(_) => DEFAULT_PORT,
        };

        let collaborator_base_url = env::var("COLLABORATOR_BASE_URL")
            .ok()
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            port,
            collaborator_base_url,
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_minimums() {
        let minimums = StageMinimums::default();
        assert_eq!(minimums.for_stage(PipelineStage::Encrypting), Duration::from_millis(2800));
        assert_eq!(minimums.for_stage(PipelineStage::Uploading), Duration::from_millis(3500));
        assert_eq!(minimums.for_stage(PipelineStage::GeneratingProof), Duration::from_millis(5500));
        assert_eq!(minimums.for_stage(PipelineStage::RiskAssessment), Duration::from_millis(4000));
        assert_eq!(minimums.for_stage(PipelineStage::LenderDecision), Duration::from_millis(3000));
        assert_eq!(minimums.for_stage(PipelineStage::SettlementPending), Duration::from_millis(8000));
    }

    #[test]
    fn test_terminal_stages_have_no_minimum() {
        let minimums = StageMinimums::default();
        for stage in [
            PipelineStage::Idle,
            PipelineStage::SettlementConfirmed,
            PipelineStage::Error,
        ] {
            assert_eq!(minimums.for_stage(stage), Duration::ZERO);
        }
    }

    #[test]
    fn test_instant_config() {
        let config = PipelineConfig::instant();
        assert!(!config.narration_pacing);
        assert_eq!(config.minimums, StageMinimums::zero());
    }

    #[test]
    fn test_parse_switch() {
        assert!(parse_switch("K", "ON").unwrap());
        assert!(!parse_switch("K", "off").unwrap());
        assert!(matches!(parse_switch("K", "maybe"), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_config_roundtrips_through_json() {
        let json = r#"{
            "minimums": {
                "encrypting": 10, "uploading": 20, "generatingProof": 30,
                "riskAssessment": 40, "lenderDecision": 50, "settlementPending": 60
            },
            "narrationPacing": false,
            "network": "mainnet"
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.minimums.for_stage(PipelineStage::RiskAssessment), Duration::from_millis(40));
        assert_eq!(config.network, "mainnet");
    }
}
