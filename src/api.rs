//! REST API server for the loan pipeline
//!
//! Exposes the orchestrator, plus each collaborator as a stateless endpoint
//! so that another instance can use this one through `HttpCollaborators`.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::models::{LoanApplication, PipelineSnapshot, ProofRecord, RiskAssessment};
use crate::pipeline::{progress_percent, PipelineOrchestrator, PIPELINE_STEPS};
use crate::services::local::{missing_amount, MISSING_FIELDS};
use crate::services::{DisbursementRequest, ServiceSet};

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    #[serde(default)]
    pub wallet_address: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct ProofRequest {
    pub data: Option<LoanApplication>,
    #[serde(default)]
    pub cid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessRequest {
    pub proof: Option<ProofRecord>,
    #[serde(default)]
    pub monthly_income: f64,
    #[serde(default)]
    pub requested_amount: f64,
    #[serde(default)]
    pub tenure_months: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideRequest {
    pub assessment: Option<RiskAssessment>,
    #[serde(default)]
    pub requested_amount: f64,
    #[serde(default)]
    pub tenure_months: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisburseRequest {
    #[serde(default)]
    pub wallet_address: String,
    #[serde(default)]
    pub approved_amount: f64,
    #[serde(default)]
    pub decision_id: String,
    #[serde(default)]
    pub proof_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyQuery {
    #[serde(default)]
    pub tx_hash: String,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Error that still carries details in `data`
    pub fn error_with<T: Serialize>(message: String, data: T) -> Self {
        Self {
            data: serde_json::to_value(data).ok(),
            ..Self::error(message)
        }
    }
}

type Reply = (StatusCode, Json<ApiResponse>);

fn ok<T: Serialize>(status: StatusCode, data: T) -> Reply {
    (status, Json(ApiResponse::success(data)))
}

fn reject(status: StatusCode, message: impl Into<String>) -> Reply {
    (status, Json(ApiResponse::error(message.into())))
}

fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Validation(_)
        | PipelineError::InvalidWalletAddress(_)
        | PipelineError::SerializationError(_) => StatusCode::BAD_REQUEST,
        PipelineError::SettlementUnavailable(_) | PipelineError::Cancelled => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn from_error(error: PipelineError) -> Reply {
    let status = status_for(&error);
    if status.is_server_error() {
        warn!(error = %error, "Request failed");
    }
    reject(status, error.to_string())
}

/// Malformed JSON still gets the envelope
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, Reply> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| reject(StatusCode::BAD_REQUEST, rejection.body_text()))
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    /// Backs the stateless collaborator endpoints
    pub services: ServiceSet,
}

#[derive(Serialize)]
struct PipelineView {
    #[serde(flatten)]
    snapshot: PipelineSnapshot,
    progress: u8,
}

impl From<PipelineSnapshot> for PipelineView {
    fn from(snapshot: PipelineSnapshot) -> Self {
        let progress = progress_percent(&snapshot.state);
        Self { snapshot, progress }
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Pipeline Endpoints
/// =============================

async fn get_pipeline(State(state): State<ApiState>) -> Reply {
    ok(StatusCode::OK, PipelineView::from(state.orchestrator.snapshot()))
}

async fn get_logs(State(state): State<ApiState>) -> Reply {
    ok(StatusCode::OK, state.orchestrator.logs())
}

async fn get_steps() -> Reply {
    ok(StatusCode::OK, PIPELINE_STEPS)
}

async fn start_pipeline(
    State(state): State<ApiState>,
    payload: Result<Json<LoanApplication>, JsonRejection>,
) -> Reply {
    let application = match body(payload) {
        Ok(application) => application,
        Err(reply) => return reply,
    };

    match state.orchestrator.spawn_start(application) {
        Ok(_run) => {
            info!("Pipeline run accepted");
            ok(StatusCode::ACCEPTED, PipelineView::from(state.orchestrator.snapshot()))
        }
        Err(PipelineError::Validation(errors)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::error_with(
                "Validation failed".to_string(),
                json!({ "errors": errors }),
            )),
        ),
        Err(e) => from_error(e),
    }
}

async fn retry_pipeline(State(state): State<ApiState>) -> Reply {
    match state.orchestrator.spawn_retry() {
        Ok(Some(_run)) => ok(StatusCode::ACCEPTED, PipelineView::from(state.orchestrator.snapshot())),
        Ok(None) => reject(StatusCode::CONFLICT, "No previous submission to retry"),
        Err(e) => from_error(e),
    }
}

async fn reset_pipeline(State(state): State<ApiState>) -> Reply {
    state.orchestrator.reset();
    ok(StatusCode::OK, PipelineView::from(state.orchestrator.snapshot()))
}

async fn settle_pipeline(
    State(state): State<ApiState>,
    payload: Result<Json<SettleRequest>, JsonRejection>,
) -> Reply {
    let req = match body(payload) {
        Ok(req) => req,
        Err(reply) => return reply,
    };
    if req.wallet_address.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Missing walletAddress");
    }

    match state.orchestrator.spawn_settlement(&req.wallet_address) {
        Ok(_run) => ok(StatusCode::ACCEPTED, PipelineView::from(state.orchestrator.snapshot())),
        // The address prefix is a settlement precondition like the others
        Err(e @ PipelineError::InvalidWalletAddress(_)) => reject(StatusCode::CONFLICT, e.to_string()),
        Err(e) => from_error(e),
    }
}

/// =============================
/// Collaborator Endpoints
/// =============================

async fn upload_content(
    State(state): State<ApiState>,
    payload: Result<Json<UploadRequest>, JsonRejection>,
) -> Reply {
    let req = match body(payload) {
        Ok(req) => req,
        Err(reply) => return reply,
    };
    if req.data.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Missing data");
    }

    match state.services.storage.upload(req.data.as_bytes()).await {
        Ok(stored) => ok(
            StatusCode::OK,
            json!({
                "cid": stored.content_reference,
                "size": stored.size,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }),
        ),
        Err(e) => from_error(e),
    }
}

async fn retrieve_content(State(state): State<ApiState>, Path(cid): Path<String>) -> Reply {
    match state.services.storage.retrieve(&cid).await {
        Ok(Some(blob)) => ok(
            StatusCode::OK,
            json!({ "cid": cid, "data": String::from_utf8_lossy(&blob) }),
        ),
        Ok(None) => reject(StatusCode::NOT_FOUND, format!("Content not found: {}", cid)),
        Err(e) => from_error(e),
    }
}

async fn generate_proof(
    State(state): State<ApiState>,
    payload: Result<Json<ProofRequest>, JsonRejection>,
) -> Reply {
    let req = match body(payload) {
        Ok(req) => req,
        Err(reply) => return reply,
    };
    let Some(application) = req.data.filter(|_| !req.cid.is_empty()) else {
        return reject(StatusCode::BAD_REQUEST, "Missing data or CID");
    };

    match state.services.prover.generate(&application, &req.cid).await {
        Ok(proof) => ok(StatusCode::OK, proof),
        Err(e) => from_error(e),
    }
}

async fn assess_risk(
    State(state): State<ApiState>,
    payload: Result<Json<AssessRequest>, JsonRejection>,
) -> Reply {
    let req = match body(payload) {
        Ok(req) => req,
        Err(reply) => return reply,
    };
    let Some(proof) = req.proof else {
        return reject(StatusCode::BAD_REQUEST, MISSING_FIELDS);
    };
    if missing_amount(req.monthly_income)
        || missing_amount(req.requested_amount)
        || req.tenure_months == 0
    {
        return reject(StatusCode::BAD_REQUEST, MISSING_FIELDS);
    }

    match state
        .services
        .risk
        .assess(&proof, req.monthly_income, req.requested_amount, req.tenure_months)
        .await
    {
        Ok(assessment) => ok(StatusCode::OK, assessment),
        Err(e) => from_error(e),
    }
}

async fn lender_decision(
    State(state): State<ApiState>,
    payload: Result<Json<DecideRequest>, JsonRejection>,
) -> Reply {
    let req = match body(payload) {
        Ok(req) => req,
        Err(reply) => return reply,
    };
    let Some(assessment) = req.assessment else {
        return reject(StatusCode::BAD_REQUEST, MISSING_FIELDS);
    };
    if missing_amount(req.requested_amount) || req.tenure_months == 0 {
        return reject(StatusCode::BAD_REQUEST, MISSING_FIELDS);
    }

    match state
        .services
        .underwriting
        .decide(&assessment, req.requested_amount, req.tenure_months)
        .await
    {
        Ok(decision) => ok(StatusCode::OK, decision),
        Err(e) => from_error(e),
    }
}

async fn disburse_funds(
    State(state): State<ApiState>,
    payload: Result<Json<DisburseRequest>, JsonRejection>,
) -> Reply {
    let req = match body(payload) {
        Ok(req) => req,
        Err(reply) => return reply,
    };
    if req.wallet_address.is_empty()
        || missing_amount(req.approved_amount)
        || req.decision_id.is_empty()
        || req.proof_id.is_empty()
    {
        return reject(StatusCode::BAD_REQUEST, MISSING_FIELDS);
    }

    let request = DisbursementRequest {
        wallet_address: req.wallet_address,
        approved_amount: req.approved_amount,
        decision_id: req.decision_id,
        proof_id: req.proof_id,
    };

    match state.services.settlement.disburse(&request).await {
        Ok(disbursement) => ok(StatusCode::OK, disbursement),
        Err(e) => from_error(e),
    }
}

async fn verify_transaction(
    State(state): State<ApiState>,
    Query(query): Query<VerifyQuery>,
) -> Reply {
    if query.tx_hash.is_empty() {
        return reject(StatusCode::BAD_REQUEST, "Missing txHash");
    }

    match state.services.settlement.verify(&query.tx_hash).await {
        Ok(verification) => ok(StatusCode::OK, verification),
        Err(e) => from_error(e),
    }
}

/// =============================
/// Router Setup
/// =============================

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Pipeline
        .route("/api/pipeline", get(get_pipeline))
        .route("/api/pipeline/logs", get(get_logs))
        .route("/api/pipeline/steps", get(get_steps))
        .route("/api/pipeline/start", post(start_pipeline))
        .route("/api/pipeline/retry", post(retry_pipeline))
        .route("/api/pipeline/reset", post(reset_pipeline))
        .route("/api/pipeline/settle", post(settle_pipeline))
        // Collaborators
        .route("/api/ipfs/upload", post(upload_content))
        .route("/api/ipfs/:cid", get(retrieve_content))
        .route("/api/proof/generate", post(generate_proof))
        .route("/api/agents/aura", post(assess_risk))
        .route("/api/agents/lender", post(lender_decision))
        .route("/api/settlement/disburse", post(disburse_funds))
        .route("/api/settlement/verify", get(verify_transaction))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: ApiState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FieldError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&PipelineError::Cancelled), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&PipelineError::SettlementUnavailable("pending".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&PipelineError::InvalidWalletAddress("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&PipelineError::Validation(Vec::<FieldError>::new())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&PipelineError::Collaborator("down".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
