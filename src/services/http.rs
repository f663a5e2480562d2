//! HTTP collaborators
//!
//! Talks to the REST surface in [`crate::api`] on another host. Every
//! response is an [`ApiResponse`] envelope.

use super::{
    DisbursementRequest, ProofService, RiskService, SettlementService, StorageService,
    UnderwritingService,
};
use crate::api::ApiResponse;
use crate::error::PipelineError;
use crate::models::{
    DisbursementResult, LoanApplication, LoanDecision, ProofRecord, RiskAssessment,
    StoredContent, TransactionVerification,
};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const UPLOAD_FAILED: &str = "Failed to upload to IPFS. Please try again.";
pub const PROOF_FAILED: &str = "Proof generation failed";
pub const RISK_FAILED: &str = "Risk assessment failed. Please try again.";
pub const LENDER_FAILED: &str = "Lender decision failed. Please try again.";
pub const DISBURSE_FAILED: &str = "Disbursement failed. Please try again.";
pub const VERIFY_FAILED: &str = "Verification failed";

/// Why a remote call did not produce data
#[derive(Debug)]
struct Rejection {
    status: Option<StatusCode>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RetrievedContent {
    data: String,
}

pub struct HttpCollaborators {
    client: Client,
    base_url: String,
}

impl HttpCollaborators {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> std::result::Result<T, Rejection> {
        let request = self
            .client
            .post(self.url(path))
            .header("Content-Type", "application/json")
            .json(body);
        self.exchange(path, request).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> std::result::Result<T, Rejection> {
        let request = self.client.get(self.url(path)).query(query);
        self.exchange(path, request).await
    }

    async fn exchange<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> std::result::Result<T, Rejection> {
        let response = request.send().await.map_err(|e| Rejection {
            status: None,
            message: format!("Request to {} failed: {}", path, e),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| Rejection {
            status: Some(status),
            message: format!("Unreadable response from {}: {}", path, e),
        })?;

        let envelope: Option<ApiResponse> = serde_json::from_str(&text).ok();

        if !status.is_success() {
            let message = envelope.and_then(|e| e.error).unwrap_or(text);
            return Err(Rejection {
                status: Some(status),
                message,
            });
        }

        let data = envelope
            .and_then(|e| e.data)
            .ok_or_else(|| Rejection {
                status: Some(status),
                message: format!("Empty response from {}", path),
            })?;

        debug!(path, %status, "Collaborator responded");

        serde_json::from_value(data).map_err(|e| Rejection {
            status: Some(status),
            message: format!("Invalid JSON response: {}", e),
        })
    }
}

/// Log the underlying cause and surface the fixed user-facing message
fn fixed(message: &'static str) -> impl FnOnce(Rejection) -> PipelineError {
    move |rejection| {
        warn!(status = ?rejection.status, cause = %rejection.message, "{}", message);
        PipelineError::Collaborator(message.to_string())
    }
}

#[async_trait]
impl StorageService for HttpCollaborators {
    async fn upload(&self, blob: &[u8]) -> Result<StoredContent> {
        let data = std::str::from_utf8(blob)
            .map_err(|_| PipelineError::Collaborator(UPLOAD_FAILED.to_string()))?;

        self.post_json("/api/ipfs/upload", &json!({ "data": data }))
            .await
            .map_err(fixed(UPLOAD_FAILED))
    }

    async fn retrieve(&self, content_reference: &str) -> Result<Option<Vec<u8>>> {
        let path = format!("/api/ipfs/{}", content_reference);
        match self.get_json::<RetrievedContent>(&path, &[]).await {
            Ok(content) => Ok(Some(content.data.into_bytes())),
            Err(rejection) if rejection.status == Some(StatusCode::NOT_FOUND) => Ok(None),
            Err(rejection) => Err(PipelineError::Collaborator(rejection.message)),
        }
    }
}

#[async_trait]
impl ProofService for HttpCollaborators {
    async fn generate(
        &self,
        application: &LoanApplication,
        content_reference: &str,
    ) -> Result<ProofRecord> {
        let body = json!({ "data": application, "cid": content_reference });

        // The prover's own error text is shown to the user
        self.post_json("/api/proof/generate", &body)
            .await
            .map_err(|rejection| {
                let message = if rejection.message.trim().is_empty() {
                    PROOF_FAILED.to_string()
                } else {
                    rejection.message
                };
                PipelineError::Collaborator(message)
            })
    }
}

#[async_trait]
impl RiskService for HttpCollaborators {
    async fn assess(
        &self,
        proof: &ProofRecord,
        monthly_income: f64,
        requested_amount: f64,
        tenure_months: u32,
    ) -> Result<RiskAssessment> {
        let body = json!({
            "proof": proof,
            "monthlyIncome": monthly_income,
            "requestedAmount": requested_amount,
            "tenureMonths": tenure_months,
        });

        self.post_json("/api/agents/aura", &body)
            .await
            .map_err(fixed(RISK_FAILED))
    }
}

#[async_trait]
impl UnderwritingService for HttpCollaborators {
    async fn decide(
        &self,
        assessment: &RiskAssessment,
        requested_amount: f64,
        tenure_months: u32,
    ) -> Result<LoanDecision> {
        let body = json!({
            "assessment": assessment,
            "requestedAmount": requested_amount,
            "tenureMonths": tenure_months,
        });

        self.post_json("/api/agents/lender", &body)
            .await
            .map_err(fixed(LENDER_FAILED))
    }
}

#[async_trait]
impl SettlementService for HttpCollaborators {
    async fn disburse(&self, request: &DisbursementRequest) -> Result<DisbursementResult> {
        let body = json!({
            "walletAddress": request.wallet_address,
            "approvedAmount": request.approved_amount,
            "decisionId": request.decision_id,
            "proofId": request.proof_id,
        });

        self.post_json("/api/settlement/disburse", &body)
            .await
            .map_err(fixed(DISBURSE_FAILED))
    }

    async fn verify(&self, tx_hash: &str) -> Result<TransactionVerification> {
        self.get_json("/api/settlement/verify", &[("txHash", tx_hash)])
            .await
            .map_err(fixed(VERIFY_FAILED))
    }
}
