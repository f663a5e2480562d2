//! External collaborators
//!
//! The orchestrator only sees these traits. `local` runs everything
//! in-process; `http` talks to a remote instance of the REST API.

use crate::models::{
    DisbursementResult, EncryptedPayload, LoanApplication, LoanDecision, ProofRecord,
    RiskAssessment, StoredContent, TransactionVerification,
};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub mod http;
pub mod local;

pub use http::HttpCollaborators;
pub use local::{
    LocalEncryption, LocalProver, LocalRiskService, LocalSettlement, LocalStorage,
    LocalUnderwriter,
};

#[async_trait]
pub trait EncryptionService: Send + Sync {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedPayload>;
}

#[async_trait]
pub trait StorageService: Send + Sync {
    async fn upload(&self, blob: &[u8]) -> Result<StoredContent>;
    async fn retrieve(&self, content_reference: &str) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
pub trait ProofService: Send + Sync {
    async fn generate(
        &self,
        application: &LoanApplication,
        content_reference: &str,
    ) -> Result<ProofRecord>;
}

#[async_trait]
pub trait RiskService: Send + Sync {
    async fn assess(
        &self,
        proof: &ProofRecord,
        monthly_income: f64,
        requested_amount: f64,
        tenure_months: u32,
    ) -> Result<RiskAssessment>;
}

#[async_trait]
pub trait UnderwritingService: Send + Sync {
    async fn decide(
        &self,
        assessment: &RiskAssessment,
        requested_amount: f64,
        tenure_months: u32,
    ) -> Result<LoanDecision>;
}

/// Input to a disbursement
#[derive(Debug, Clone, PartialEq)]
pub struct DisbursementRequest {
    pub wallet_address: String,
    pub approved_amount: f64,
    pub decision_id: String,
    pub proof_id: String,
}

#[async_trait]
pub trait SettlementService: Send + Sync {
    async fn disburse(&self, request: &DisbursementRequest) -> Result<DisbursementResult>;
    async fn verify(&self, tx_hash: &str) -> Result<TransactionVerification>;
}

/// One handle per collaborator
#[derive(Clone)]
pub struct ServiceSet {
    pub encryption: Arc<dyn EncryptionService>,
    pub storage: Arc<dyn StorageService>,
    pub prover: Arc<dyn ProofService>,
    pub risk: Arc<dyn RiskService>,
    pub underwriting: Arc<dyn UnderwritingService>,
    pub settlement: Arc<dyn SettlementService>,
}

impl ServiceSet {
    /// In-process simulation of every collaborator
    pub fn local(fake: Arc<dyn crate::fake_data::FakeDataGenerator>, network: &str) -> Self {
        Self {
            encryption: Arc::new(LocalEncryption::new(fake.clone())),
            storage: Arc::new(LocalStorage::new()),
            prover: Arc::new(LocalProver::new(fake.clone())),
            risk: Arc::new(LocalRiskService::new(fake.clone())),
            underwriting: Arc::new(LocalUnderwriter::new(fake.clone())),
            settlement: Arc::new(LocalSettlement::new(fake, network)),
        }
    }

    /// Remote collaborators behind `base_url`; encryption stays in-process
    pub fn remote(
        base_url: &str,
        fake: Arc<dyn crate::fake_data::FakeDataGenerator>,
    ) -> Result<Self> {
        let client = Arc::new(HttpCollaborators::new(base_url)?);
        Ok(Self {
            encryption: Arc::new(LocalEncryption::new(fake)),
            storage: client.clone(),
            prover: client.clone(),
            risk: client.clone(),
            underwriting: client.clone(),
            settlement: client,
        })
    }
}
