//! In-process simulated collaborators

use super::{
    DisbursementRequest, EncryptionService, ProofService, RiskService, SettlementService,
    StorageService, UnderwritingService,
};
use crate::agents;
use crate::eligibility::evaluate_conditions;
use crate::error::PipelineError;
use crate::fake_data::FakeDataGenerator;
use crate::models::{
    DisbursementMetadata, DisbursementResult, EncryptedPayload, LoanApplication, LoanDecision,
    ProofRecord, RiskAssessment, StoredContent, TransactionVerification,
};
use crate::proof::{assemble_proof, hashing, ProofInputs};
use crate::validation::validate_loan_application;
use crate::wallet::ensure_recognized_address;
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

const NONCE_LEN: usize = 12;
const LOVELACE_PER_ADA: f64 = 1_000_000.0;
const LENDER_ADDRESS: &str = "addr_test_mock_lender_address";

pub(crate) const MISSING_FIELDS: &str = "Missing required fields";

/// Zero, negative, NaN and infinite all count as missing
pub(crate) fn missing_amount(value: f64) -> bool {
    !value.is_finite() || value <= 0.0
}

// ================= Encryption =================

/// Simulated authenticated encryption.
///
/// A SHA-256 counter keystream XORed over the plaintext. Not a real cipher.
pub struct LocalEncryption {
    key: [u8; 32],
    fake: Arc<dyn FakeDataGenerator>,
}

impl LocalEncryption {
    pub fn new(fake: Arc<dyn FakeDataGenerator>) -> Self {
        let mut key = [0u8; 32];
        fake.fill_bytes(&mut key);
        Self { key, fake }
    }

    fn apply_keystream(&self, nonce: &[u8], data: &[u8]) -> Vec<u8> {
        data.chunks(32)
            .enumerate()
            .flat_map(|(counter, chunk)| {
                let block = Sha256::new()
                    .chain_update(self.key)
                    .chain_update(nonce)
                    .chain_update((counter as u64).to_be_bytes())
                    .finalize();
                chunk
                    .iter()
                    .zip(block.iter())
                    .map(|(b, k)| b ^ k)
                    .collect::<Vec<u8>>()
            })
            .collect()
    }

    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>> {
        let nonce = hex::decode(&payload.nonce)
            .map_err(|e| PipelineError::Collaborator(format!("Invalid nonce: {}", e)))?;
        let ciphertext = hex::decode(&payload.ciphertext)
            .map_err(|e| PipelineError::Collaborator(format!("Invalid ciphertext: {}", e)))?;
        Ok(self.apply_keystream(&nonce, &ciphertext))
    }
}

#[async_trait]
impl EncryptionService for LocalEncryption {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedPayload> {
        let nonce = self.fake.bytes(NONCE_LEN);
        let ciphertext = self.apply_keystream(&nonce, plaintext);

        Ok(EncryptedPayload {
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
        })
    }
}

// ================= Storage =================

/// Content-addressed in-memory blob store
pub struct LocalStorage {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn upload(&self, blob: &[u8]) -> Result<StoredContent> {
        if blob.is_empty() {
            return Err(PipelineError::Collaborator("Missing data".to_string()));
        }

        let content_reference = hashing::content_id(blob);
        let mut blobs = self.blobs.write().await;
        blobs.insert(content_reference.clone(), blob.to_vec());

        debug!(cid = %content_reference, size = blob.len(), "Blob pinned");

        Ok(StoredContent {
            content_reference,
            size: blob.len(),
        })
    }

    async fn retrieve(&self, content_reference: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.read().await;
        Ok(blobs.get(content_reference).cloned())
    }
}

// ================= Proof =================

pub struct LocalProver {
    fake: Arc<dyn FakeDataGenerator>,
}

impl LocalProver {
    pub fn new(fake: Arc<dyn FakeDataGenerator>) -> Self {
        Self { fake }
    }
}

#[async_trait]
impl ProofService for LocalProver {
    async fn generate(
        &self,
        application: &LoanApplication,
        content_reference: &str,
    ) -> Result<ProofRecord> {
        if content_reference.trim().is_empty() {
            return Err(PipelineError::Collaborator("Missing data or CID".to_string()));
        }

        let errors = validate_loan_application(application);
        if !errors.is_empty() {
            return Err(PipelineError::Validation(errors));
        }

        let content_hash = hashing::content_hash(application)?;
        let proof_id = self.fake.uuid().to_string();
        let evaluation = evaluate_conditions(application);
        let proof_hash = hashing::proof_hash(&content_hash, &proof_id, &evaluation)?;

        let proof = assemble_proof(
            application,
            ProofInputs {
                storage_reference: content_reference,
                content_hash: &content_hash,
                proof_id: &proof_id,
                proof_hash: &proof_hash,
            },
            self.fake.as_ref(),
        );

        info!(proof_id = %proof.proof_id, valid = proof.valid, "Proof generated");
        Ok(proof)
    }
}

// ================= Agents =================

pub struct LocalRiskService {
    fake: Arc<dyn FakeDataGenerator>,
}

impl LocalRiskService {
    pub fn new(fake: Arc<dyn FakeDataGenerator>) -> Self {
        Self { fake }
    }
}

#[async_trait]
impl RiskService for LocalRiskService {
    async fn assess(
        &self,
        proof: &ProofRecord,
        monthly_income: f64,
        requested_amount: f64,
        tenure_months: u32,
    ) -> Result<RiskAssessment> {
        if proof.proof_id.is_empty()
            || missing_amount(monthly_income)
            || missing_amount(requested_amount)
            || tenure_months == 0
        {
            return Err(PipelineError::Collaborator(MISSING_FIELDS.to_string()));
        }

        let assessment = agents::assess(
            proof,
            monthly_income,
            requested_amount,
            tenure_months,
            self.fake.as_ref(),
        );

        info!(
            proof_id = %assessment.proof_id,
            risk_score = assessment.risk_score,
            recommendation = ?assessment.recommendation,
            "Aura assessment generated"
        );
        Ok(assessment)
    }
}

pub struct LocalUnderwriter {
    fake: Arc<dyn FakeDataGenerator>,
}

impl LocalUnderwriter {
    pub fn new(fake: Arc<dyn FakeDataGenerator>) -> Self {
        Self { fake }
    }
}

#[async_trait]
impl UnderwritingService for LocalUnderwriter {
    async fn decide(
        &self,
        assessment: &RiskAssessment,
        requested_amount: f64,
        tenure_months: u32,
    ) -> Result<LoanDecision> {
        if assessment.proof_id.is_empty() || missing_amount(requested_amount) || tenure_months == 0
        {
            return Err(PipelineError::Collaborator(MISSING_FIELDS.to_string()));
        }

        let decision = agents::decide(assessment, requested_amount, tenure_months, self.fake.as_ref());

        info!(
            decision_id = %decision.decision_id,
            status = ?decision.status,
            approved_amount = decision.approved_amount,
            "Lender decision issued"
        );
        Ok(decision)
    }
}

// ================= Settlement =================

/// Simulated Plutus disbursement. Issued transactions are remembered so
/// `verify` can tell them apart from unknown hashes.
pub struct LocalSettlement {
    fake: Arc<dyn FakeDataGenerator>,
    network: String,
    ledger: Arc<RwLock<HashSet<String>>>,
}

impl LocalSettlement {
    pub fn new(fake: Arc<dyn FakeDataGenerator>, network: &str) -> Self {
        Self {
            fake,
            network: network.to_string(),
            ledger: Arc::new(RwLock::new(HashSet::new())),
        }
    }
}

#[async_trait]
impl SettlementService for LocalSettlement {
    async fn disburse(&self, request: &DisbursementRequest) -> Result<DisbursementResult> {
        if request.wallet_address.is_empty()
            || missing_amount(request.approved_amount)
            || request.decision_id.is_empty()
            || request.proof_id.is_empty()
        {
            return Err(PipelineError::Collaborator(MISSING_FIELDS.to_string()));
        }
        ensure_recognized_address(&request.wallet_address)?;

        let amount_lovelace = (request.approved_amount * LOVELACE_PER_ADA).floor() as u64;
        info!(
            recipient = %request.wallet_address,
            from = LENDER_ADDRESS,
            amount_lovelace,
            network = %self.network,
            "Building Cardano transaction"
        );

        let tx_hash = self.fake.tx_hash();
        self.ledger.write().await.insert(tx_hash.clone());

        Ok(DisbursementResult {
            transaction_reference: tx_hash,
            recipient_address: request.wallet_address.clone(),
            amount: request.approved_amount,
            network: self.network.clone(),
            metadata: DisbursementMetadata {
                block_height: self.fake.block_height(),
                slot_number: self.fake.slot_number(),
                epoch: self.fake.epoch(),
                fees: self.fake.float_in(0.17, 0.22),
                confirmations: 1,
                plutus_script_hash: self
                    .fake
                    .derived_hash(&format!("plutus-{}", request.decision_id)),
                datum_hash: self.fake.derived_hash(&format!("datum-{}", request.proof_id)),
            },
        })
    }

    async fn verify(&self, tx_hash: &str) -> Result<TransactionVerification> {
        if tx_hash.is_empty() {
            return Err(PipelineError::Collaborator("Missing txHash".to_string()));
        }

        let verified = self.ledger.read().await.contains(tx_hash);
        debug!(tx_hash, verified, "Verifying transaction");

        Ok(TransactionVerification {
            tx_hash: tx_hash.to_string(),
            verified,
            timestamp: Utc::now(),
        })
    }
}
