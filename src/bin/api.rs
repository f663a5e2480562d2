use loan_pipeline_orchestrator::{
    api::{start_server, ApiState},
    config::AppConfig,
    fake_data::{FakeDataGenerator, RandomFakeData},
    pipeline::PipelineOrchestrator,
    scheduler::TokioScheduler,
    services::ServiceSet,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load environment variables
    let config = AppConfig::from_env()?;
    let fake: Arc<dyn FakeDataGenerator> = Arc::new(RandomFakeData);

    info!("Loan Pipeline Orchestrator - API Server");
    info!("Port: {}", config.port);
    info!("Network: {}", config.pipeline.network);

    // The stateless endpoints always run in-process
    let local = ServiceSet::local(fake.clone(), &config.pipeline.network);
    let pipeline_services = match &config.collaborator_base_url {
        Some(base_url) => {
            info!("Collaborators: {}", base_url);
            ServiceSet::remote(base_url, fake)?
        }
        None => local.clone(),
    };

    let orchestrator = Arc::new(PipelineOrchestrator::new(
        pipeline_services,
        Arc::new(TokioScheduler),
        config.pipeline.clone(),
    ));

    info!("Orchestrator initialized");

    start_server(
        ApiState {
            orchestrator,
            services: local,
        },
        config.port,
    )
    .await?;

    Ok(())
}
