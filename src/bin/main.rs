use loan_pipeline_orchestrator::{
    audit::{self, LogCursor},
    config::AppConfig,
    fake_data::{FakeDataGenerator, RandomFakeData},
    models::{DecisionStatus, LoanApplication},
    pipeline::PipelineOrchestrator,
    scheduler::TokioScheduler,
    services::ServiceSet,
    wallet::{MockWallet, WalletConnector, WalletType},
    RunOutcome,
};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let fake: Arc<dyn FakeDataGenerator> = Arc::new(RandomFakeData);

    let services = match &config.collaborator_base_url {
        Some(base_url) => {
            info!(base_url = %base_url, "Using remote collaborators");
            ServiceSet::remote(base_url, fake.clone())?
        }
        None => ServiceSet::local(fake.clone(), &config.pipeline.network),
    };

    info!(network = %config.pipeline.network, "Loan Pipeline Orchestrator starting");

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        services,
        Arc::new(TokioScheduler),
        config.pipeline.clone(),
    ));

    // Stream the processing log as it grows
    let cursor = Arc::new(Mutex::new(LogCursor::new()));
    let mut rx = orchestrator.subscribe();
    let printer = {
        let cursor = cursor.clone();
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                print_new(&cursor, &orchestrator);
            }
        })
    };

    let application = LoanApplication {
        full_name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        monthly_income: 3000.0,
        existing_debt: 0.0,
        requested_amount: 10000.0,
        tenure_months: 12,
        purpose: "Working capital for a small bakery".to_string(),
        has_red_flags: false,
    };

    let outcome = orchestrator.start(application).await;
    // The printer may not have caught up with the last change yet
    print_new(&cursor, &orchestrator);

    let decision = match outcome? {
        RunOutcome::Completed(decision) => decision,
        RunOutcome::Failed(message) => {
            eprintln!("Pipeline failed: {}", message);
            return Err(message.into());
        }
        RunOutcome::Cancelled => return Err("Pipeline run was cancelled".into()),
    };

    println!("\n=== LOAN DECISION ===");
    println!("Status: {}", decision.status);
    println!("Amount: {:.2} ADA", decision.approved_amount);
    println!("Rate: {}%", decision.interest_rate_annual_percent);
    println!("{}", decision.explanation);

    if decision.status == DecisionStatus::Rejected {
        return Ok(());
    }

    let wallet = MockWallet::new(fake);
    let address = wallet.connect(WalletType::Nami).await?;
    info!(address = %address, "Wallet connected");

    match orchestrator.confirm_settlement(&address).await? {
        RunOutcome::Completed(disbursement) => {
            let verification = orchestrator
                .services()
                .settlement
                .verify(&disbursement.transaction_reference)
                .await?;

            println!("\n=== SETTLEMENT ===");
            println!("Tx Hash: {}", disbursement.transaction_reference);
            println!("Block: {}", disbursement.metadata.block_height);
            println!("Fees: {:.4} ADA", disbursement.metadata.fees);
            println!("Verified: {}", verification.verified);
        }
        RunOutcome::Failed(message) => warn!(error = %message, "Settlement failed"),
        RunOutcome::Cancelled => warn!("Settlement cancelled"),
    }

    wallet.disconnect();
    printer.abort();
    print_new(&cursor, &orchestrator);

    Ok(())
}

/// Reads the log under the cursor lock so a stale copy never looks like a reset
fn print_new(cursor: &Mutex<LogCursor>, orchestrator: &PipelineOrchestrator) {
    let mut cursor = cursor.lock().unwrap_or_else(|e| e.into_inner());
    let logs = orchestrator.logs();
    for entry in cursor.advance(&logs) {
        println!("{}", audit::render_line(entry));
    }
}
