//! Proof assembly
//!
//! Builds a [`ProofRecord`] from the eligibility evaluation and the opaque
//! identifiers handed in by the caller. Identifiers and hashes are never
//! recomputed here.

use crate::eligibility::evaluate_conditions;
use crate::fake_data::FakeDataGenerator;
use crate::models::{LoanApplication, ProofMetadata, ProofRecord};
use chrono::Utc;

pub mod hashing;

pub const CIRCUIT_NAME: &str = "loan_eligibility_v1";
pub const CURVE_TYPE: &str = "BN254";
pub const PROTOCOL: &str = "Groth16";

/// Opaque values produced by the hashing collaborator
#[derive(Debug, Clone, Copy)]
pub struct ProofInputs<'a> {
    pub storage_reference: &'a str,
    pub content_hash: &'a str,
    pub proof_id: &'a str,
    pub proof_hash: &'a str,
}

pub fn assemble_proof(
    application: &LoanApplication,
    inputs: ProofInputs<'_>,
    fake: &dyn FakeDataGenerator,
) -> ProofRecord {
    let conditions = evaluate_conditions(application).conditions();

    ProofRecord {
        proof_id: inputs.proof_id.to_string(),
        storage_reference: inputs.storage_reference.to_string(),
        conditions,
        integrity_hash: inputs.proof_hash.to_string(),
        valid: conditions.all_hold(),
        generated_at: Utc::now(),
        metadata: ProofMetadata {
            circuit_name: CIRCUIT_NAME.to_string(),
            constraint_count: fake.jitter(2048, 512),
            proof_size: fake.jitter(192, 32),
            verification_time: fake.jitter(12, 8),
            proving_time: fake.jitter(1800, 600),
            curve_type: CURVE_TYPE.to_string(),
            protocol: PROTOCOL.to_string(),
            public_inputs_hash: fake.derived_hash(&format!("pub-{}", inputs.proof_id)),
            witness_hash: fake.derived_hash(&format!("wit-{}", inputs.content_hash)),
        },
    }
}
