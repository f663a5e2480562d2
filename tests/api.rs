use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use loan_pipeline_orchestrator::{
    api::{create_router, ApiState},
    config::PipelineConfig,
    fake_data::{FakeDataGenerator, SeededFakeData},
    models::{DecisionStatus, LoanApplication, PipelineSnapshot, PipelineStage},
    pipeline::PipelineOrchestrator,
    scheduler::VirtualScheduler,
    services::ServiceSet,
    RunOutcome,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower::ServiceExt;

const WALLET: &str = "addr_test1qpz9example0recipient";

fn fake() -> Arc<dyn FakeDataGenerator> {
    Arc::new(SeededFakeData::new(7))
}

fn state() -> ApiState {
    let services = ServiceSet::local(fake(), "preprod");
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        services.clone(),
        Arc::new(VirtualScheduler::new()),
        PipelineConfig::instant(),
    ));
    ApiState {
        orchestrator,
        services,
    }
}

fn application() -> Value {
    json!({
        "fullName": "Grace Hopper",
        "email": "grace@example.com",
        "monthlyIncome": 3000.0,
        "existingDebt": 0.0,
        "requestedAmount": 10000.0,
        "tenureMonths": 12,
        "purpose": "Inventory financing",
        "hasRedFlags": false
    })
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

async fn post(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

async fn wait_for(
    rx: &mut watch::Receiver<PipelineSnapshot>,
    done: impl FnMut(&PipelineSnapshot) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(done))
        .await
        .expect("pipeline did not settle in time")
        .expect("pipeline store dropped");
}

// ================= Pipeline endpoints =================

#[tokio::test]
async fn test_health() {
    let router = create_router(state());
    let (status, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_steps_catalogue() {
    let router = create_router(state());
    let (status, body) = get(&router, "/api/pipeline/steps").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let steps = body["data"].as_array().unwrap();
    assert_eq!(steps.len(), 7);
    assert_eq!(steps[0]["id"], "encrypting");
    assert_eq!(steps[6]["id"], "settlement_confirmed");
}

#[tokio::test]
async fn test_idle_pipeline_snapshot() {
    let router = create_router(state());
    let (status, body) = get(&router, "/api/pipeline").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"]["currentStage"], "idle");
    assert_eq!(body["data"]["progress"], 0);
    assert!(body["data"]["logs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_start_rejects_invalid_application() {
    let state = state();
    let router = create_router(state.clone());

    let mut invalid = application();
    invalid["tenureMonths"] = json!(3);
    invalid["email"] = json!("not-an-email");

    let (status, body) = post(&router, "/api/pipeline/start", invalid).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Validation failed");
    let fields: Vec<&str> = body["data"]["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "tenureMonths"]);
    assert_eq!(state.orchestrator.snapshot(), PipelineSnapshot::default());
}

#[tokio::test]
async fn test_start_rejects_malformed_body() {
    let router = create_router(state());
    let (status, body) = post(&router, "/api/pipeline/start", json!({ "fullName": 42 })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_full_run_and_settlement() {
    let state = state();
    let router = create_router(state.clone());
    let mut rx = state.orchestrator.subscribe();

    let (status, body) = post(&router, "/api/pipeline/start", application()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["success"], true);

    wait_for(&mut rx, |s| {
        s.state.completed_stages.contains(&PipelineStage::LenderDecision)
    })
    .await;

    let (_, body) = get(&router, "/api/pipeline").await;
    assert_eq!(body["data"]["state"]["currentStage"], "idle");
    assert_eq!(body["data"]["result"]["decision"]["status"], "APPROVED");
    assert_eq!(body["data"]["progress"], 71);

    let (status, body) = get(&router, "/api/pipeline/logs").await;
    assert_eq!(status, StatusCode::OK);
    let logs = body["data"].as_array().unwrap();
    assert_eq!(logs.last().unwrap()["message"], "Pipeline completed successfully");

    // Unrecognized prefix is a failed precondition; nothing changes
    let (status, body) = post(
        &router,
        "/api/pipeline/settle",
        json!({ "walletAddress": "DdzFFzCqrht" }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("DdzFFzCqrht"));
    assert_eq!(state.orchestrator.state().current_stage, PipelineStage::Idle);

    let (status, _) = post(&router, "/api/pipeline/settle", json!({ "walletAddress": WALLET })).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    wait_for(&mut rx, |s| {
        s.state.current_stage == PipelineStage::SettlementConfirmed
    })
    .await;

    let disbursement = state.orchestrator.result().disbursement.unwrap();
    assert_eq!(disbursement.recipient_address, WALLET);
    assert_eq!(disbursement.amount, 10000.0);

    let (status, body) = post(&router, "/api/pipeline/settle", json!({ "walletAddress": WALLET })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, body) = post(&router, "/api/pipeline/reset", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"]["currentStage"], "idle");
    assert!(state.orchestrator.logs().is_empty());
}

#[tokio::test]
async fn test_settle_without_decision_conflicts() {
    let router = create_router(state());
    let (status, body) = post(&router, "/api/pipeline/settle", json!({ "walletAddress": WALLET })).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("no loan decision"));
}

#[tokio::test]
async fn test_settle_requires_address() {
    let router = create_router(state());
    let (status, body) = post(&router, "/api/pipeline/settle", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing walletAddress");
}

#[tokio::test]
async fn test_retry_without_submission_conflicts() {
    let router = create_router(state());
    let (status, body) = post(&router, "/api/pipeline/retry", json!({})).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

// ================= Collaborator endpoints =================

#[tokio::test]
async fn test_upload_and_retrieve() {
    let router = create_router(state());

    let (status, body) = post(&router, "/api/ipfs/upload", json!({ "data": "ciphertext-blob" })).await;
    assert_eq!(status, StatusCode::OK);
    let cid = body["data"]["cid"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["size"], 15);
    assert!(body["data"]["timestamp"].is_string());

    let (status, body) = get(&router, &format!("/api/ipfs/{}", cid)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["data"], "ciphertext-blob");

    let (status, body) = get(&router, "/api/ipfs/unknown-cid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_upload_requires_data() {
    let router = create_router(state());
    let (status, body) = post(&router, "/api/ipfs/upload", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing data");
}

#[tokio::test]
async fn test_collaborator_chain_over_rest() {
    let router = create_router(state());

    let (status, body) = post(
        &router,
        "/api/proof/generate",
        json!({ "data": application(), "cid": "bafkreigh2akiscaildc" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let proof = body["data"].clone();
    assert_eq!(proof["valid"], true);
    assert_eq!(proof["cid"], "bafkreigh2akiscaildc");

    let (status, body) = post(
        &router,
        "/api/agents/aura",
        json!({
            "proof": proof,
            "monthlyIncome": 3000.0,
            "requestedAmount": 10000.0,
            "tenureMonths": 12
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let assessment = body["data"].clone();
    assert_eq!(assessment["riskScore"], 60);
    assert_eq!(assessment["recommendation"], "approve");

    let (status, body) = post(
        &router,
        "/api/agents/lender",
        json!({ "assessment": assessment, "requestedAmount": 10000.0, "tenureMonths": 12 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let decision = body["data"].clone();
    assert_eq!(decision["status"], "APPROVED");
    assert_eq!(decision["interestRateAnnualPercent"], 5.0);

    let (status, body) = post(
        &router,
        "/api/settlement/disburse",
        json!({
            "walletAddress": WALLET,
            "approvedAmount": 10000.0,
            "decisionId": decision["decisionId"],
            "proofId": proof["proofId"]
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tx_hash = body["data"]["txHash"].as_str().unwrap().to_string();
    assert_eq!(tx_hash.len(), 64);

    let (status, body) = get(&router, &format!("/api/settlement/verify?txHash={}", tx_hash)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["verified"], true);
}

#[tokio::test]
async fn test_collaborator_endpoints_reject_missing_fields() {
    let router = create_router(state());

    let (status, body) = post(&router, "/api/proof/generate", json!({ "cid": "bafy" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing data or CID");

    let (status, body) = post(&router, "/api/agents/aura", json!({ "monthlyIncome": 3000.0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");

    let (status, _) = post(&router, "/api/agents/lender", json!({ "requestedAmount": 100.0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&router, "/api/settlement/disburse", json!({ "walletAddress": WALLET })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&router, "/api/settlement/verify").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing txHash");
}

#[tokio::test]
async fn test_disburse_rejects_unrecognized_address() {
    let router = create_router(state());
    let (status, body) = post(
        &router,
        "/api/settlement/disburse",
        json!({
            "walletAddress": "stake_test1uexample",
            "approvedAmount": 500.0,
            "decisionId": "decision-1",
            "proofId": "proof-1"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("stake_test1uexample"));
}

#[tokio::test]
async fn test_proof_reports_validation_errors() {
    let router = create_router(state());
    let mut invalid = application();
    invalid["monthlyIncome"] = json!(0.0);

    let (status, body) = post(
        &router,
        "/api/proof/generate",
        json!({ "data": invalid, "cid": "bafy" }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Validation failed"));
}

// ================= Remote collaborators =================

async fn serve(state: ApiState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/", addr)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pipeline_over_http_collaborators() {
    let base_url = serve(state()).await;
    let services = ServiceSet::remote(&base_url, fake()).unwrap();
    let orchestrator = PipelineOrchestrator::new(
        services.clone(),
        Arc::new(VirtualScheduler::new()),
        PipelineConfig::instant(),
    );

    let application: LoanApplication = serde_json::from_value(application()).unwrap();
    let outcome = tokio_test::assert_ok!(orchestrator.start(application).await);
    let decision = outcome.completed().expect("remote run should complete");
    assert_eq!(decision.status, DecisionStatus::Approved);
    assert_eq!(decision.approved_amount, 10000.0);

    let proof = orchestrator.result().proof.unwrap();
    let stored = tokio_test::assert_ok!(services.storage.retrieve(&proof.storage_reference).await);
    assert!(stored.is_some());

    let settled = tokio_test::assert_ok!(orchestrator.confirm_settlement(WALLET).await);
    let RunOutcome::Completed(disbursement) = settled else {
        panic!("settlement should complete");
    };

    let verification = tokio_test::assert_ok!(
        services
            .settlement
            .verify(&disbursement.transaction_reference)
            .await
    );
    assert!(verification.verified);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_remote_rejection_surfaces_fixed_message() {
    let base_url = serve(state()).await;
    let services = ServiceSet::remote(&base_url, fake()).unwrap();

    let err = services.storage.upload(b"").await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to upload to IPFS. Please try again.");

    let missing = tokio_test::assert_ok!(services.storage.retrieve("no-such-cid").await);
    assert!(missing.is_none());
}
