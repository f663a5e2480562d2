//! Pipeline orchestrator
//!
//! ENCRYPT → UPLOAD → PROVE → ASSESS → DECIDE, then SETTLE once the user
//! confirms with a wallet address.
//!
//! Each stage records its start, narrates progress into the processing log,
//! calls its collaborator and then holds until the stage's minimum display
//! time has passed. Every suspension point checks the run's
//! [`CancellationSignal`]; a cancelled run stops without touching state.

pub mod cancel;
pub mod stage;
pub mod store;


pub use cancel::CancellationSignal;
pub use stage::{progress_percent, stage_index, step_for, StepInfo, PIPELINE_STEPS};
pub use store::PipelineStore;

use crate::audit::{self, LogTag};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::{
    DecisionStatus, DisbursementResult, LoanApplication, LoanDecision, LogEntry, LogLevel,
    PipelineResult, PipelineSnapshot, PipelineStage, PipelineState,
};
use crate::scheduler::Scheduler;
use crate::services::{DisbursementRequest, ServiceSet};
use crate::validation::ensure_valid;
use crate::wallet::ensure_recognized_address;
use crate::Result;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome<T> {
    Completed(T),
    /// Stopped in the error stage with this message
    Failed(String),
    /// Aborted by reset or a newer run. State was left alone.
    Cancelled,
}

impl<T> RunOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            RunOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// A settlement that passed its preconditions and has entered
/// `settlement_pending`
#[derive(Debug, Clone)]
pub struct SettlementTicket {
    signal: CancellationSignal,
    started_at: u64,
    request: DisbursementRequest,
}

impl SettlementTicket {
    pub fn request(&self) -> &DisbursementRequest {
        &self.request
    }
}

struct Session {
    last_application: Option<LoanApplication>,
    signal: CancellationSignal,
}

pub struct PipelineOrchestrator {
    services: ServiceSet,
    scheduler: Arc<dyn Scheduler>,
    config: PipelineConfig,
    store: PipelineStore,
    session: Mutex<Session>,
}

impl PipelineOrchestrator {
    pub fn new(services: ServiceSet, scheduler: Arc<dyn Scheduler>, config: PipelineConfig) -> Self {
        Self {
            services,
            scheduler,
            config,
            store: PipelineStore::new(),
            session: Mutex::new(Session {
                last_application: None,
                signal: CancellationSignal::new(),
            }),
        }
    }

    pub fn services(&self) -> &ServiceSet {
        &self.services
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.store.snapshot()
    }

    pub fn state(&self) -> PipelineState {
        self.store.snapshot().state
    }

    pub fn result(&self) -> PipelineResult {
        self.store.snapshot().result
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.store.snapshot().logs
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.store.subscribe()
    }

    pub fn last_application(&self) -> Option<LoanApplication> {
        self.session().last_application.clone()
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        // Session holds plain values; a poisoned lock is still consistent
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    // =============================
    // Application run
    // =============================

    /// Validate and run the whole pipeline. Any earlier run is cancelled.
    ///
    /// Only validation errors are returned as `Err`; collaborator failures
    /// end in [`RunOutcome::Failed`].
    pub async fn start(&self, application: LoanApplication) -> Result<RunOutcome<LoanDecision>> {
        ensure_valid(&application)?;
        let signal = self.begin(application.clone());
        Ok(self.drive(signal, &application).await)
    }

    /// [`start`](Self::start) on a background task. Validation and the state
    /// reset happen before this returns.
    pub fn spawn_start(
        self: &Arc<Self>,
        application: LoanApplication,
    ) -> Result<JoinHandle<RunOutcome<LoanDecision>>> {
        ensure_valid(&application)?;
        let signal = self.begin(application.clone());
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.drive(signal, &application).await }))
    }

    /// Rerun from the first stage with the last submitted application.
    /// `None` when nothing was ever submitted.
    pub async fn retry(&self) -> Result<Option<RunOutcome<LoanDecision>>> {
        let Some(application) = self.last_application() else {
            debug!("Retry requested with no previous submission");
            return Ok(None);
        };
        self.start(application).await.map(Some)
    }

    pub fn spawn_retry(self: &Arc<Self>) -> Result<Option<JoinHandle<RunOutcome<LoanDecision>>>> {
        match self.last_application() {
            Some(application) => self.spawn_start(application).map(Some),
            None => Ok(None),
        }
    }

    /// Cancel any in-flight run and return to an empty idle state
    pub fn reset(&self) {
        let mut session = self.session();
        let previous = std::mem::replace(&mut session.signal, CancellationSignal::new());
        session.last_application = None;

        self.store.replace(|snapshot| {
            previous.cancel();
            *snapshot = PipelineSnapshot::default();
        });

        info!("Pipeline reset");
    }

    fn begin(&self, application: LoanApplication) -> CancellationSignal {
        let signal = CancellationSignal::new();

        let mut session = self.session();
        let previous = std::mem::replace(&mut session.signal, signal.clone());
        session.last_application = Some(application);

        self.store.replace(|snapshot| {
            previous.cancel();
            *snapshot = PipelineSnapshot::default();
        });

        signal
    }

    async fn drive(
        &self,
        signal: CancellationSignal,
        application: &LoanApplication,
    ) -> RunOutcome<LoanDecision> {
        let run = Run {
            orchestrator: self,
            signal,
        };

        info!(
            requested_amount = application.requested_amount,
            tenure_months = application.tenure_months,
            "Pipeline run started"
        );

        let result = self.run_stages(&run, application).await;
        run.conclude(result)
    }

    async fn run_stages(&self, run: &Run<'_>, application: &LoanApplication) -> Result<LoanDecision> {
        // === ENCRYPT ===
        run.info(LogTag::Encrypt, "Initializing AES-256-GCM encryption engine...")?;
        let started = run.enter(PipelineStage::Encrypting, None)?;

        run.pause(800).await?;
        run.info(LogTag::Encrypt, "Deriving encryption key via PBKDF2...")?;
        run.pause(600).await?;
        run.info(LogTag::Encrypt, "Generating random nonce (96-bit)...")?;

        let plaintext = serde_json::to_vec(application)?;
        let payload = run.call(self.services.encryption.encrypt(&plaintext)).await?;

        run.pause(400).await?;
        run.log(
            LogLevel::Success,
            LogTag::Encrypt,
            "Payload encrypted successfully",
            Some(json!({ "size": format_size(payload.ciphertext.len() / 2) })),
        )?;
        run.hold(PipelineStage::Encrypting, started).await?;

        // === UPLOAD ===
        let started = run.enter(PipelineStage::Uploading, Some(PipelineStage::Encrypting))?;
        run.info(LogTag::Ipfs, "Connecting to Pinata gateway...")?;
        run.pause(500).await?;

        let blob = serde_json::to_vec(&payload)?;
        let stored = run.call(self.services.storage.upload(&blob)).await?;

        run.info(LogTag::Ipfs, "Uploading encrypted blob to network...")?;
        run.pause(800).await?;
        run.log(
            LogLevel::Success,
            LogTag::Ipfs,
            "Pinned successfully",
            Some(json!({ "cid": abbreviate(&stored.content_reference, 20) })),
        )?;
        run.hold(PipelineStage::Uploading, started).await?;

        // === PROVE ===
        let started = run.enter(PipelineStage::GeneratingProof, Some(PipelineStage::Uploading))?;
        run.info(LogTag::Zkproof, "Loading Compact circuit (loan_eligibility_v1)...")?;
        run.pause(600).await?;
        run.info(LogTag::Zkproof, "Compiling R1CS constraints...")?;
        run.pause(800).await?;
        run.info(LogTag::Zkproof, "Computing witness from private inputs...")?;

        let proof = run
            .call(self.services.prover.generate(application, &stored.content_reference))
            .await?;
        let cached = proof.clone();
        run.update(move |s| s.result.proof = Some(cached))?;

        run.info(LogTag::Zkproof, "Proving with Groth16 protocol...")?;
        run.pause(1000).await?;
        run.log(
            LogLevel::Success,
            LogTag::Zkproof,
            format!("Proof generated in {}ms", proof.metadata.proving_time),
            Some(json!({
                "constraints": proof.metadata.constraint_count,
                "valid": proof.valid,
            })),
        )?;
        run.hold(PipelineStage::GeneratingProof, started).await?;

        // === ASSESS ===
        let started = run.enter(PipelineStage::RiskAssessment, Some(PipelineStage::GeneratingProof))?;
        run.info(LogTag::Aura, "Initializing Aura risk assessment agent...")?;
        run.pause(500).await?;
        run.info(LogTag::Aura, "Analyzing proof conditions...")?;

        let assessment = run
            .call(self.services.risk.assess(
                &proof,
                application.monthly_income,
                application.requested_amount,
                application.tenure_months,
            ))
            .await?;
        let cached = assessment.clone();
        run.update(move |s| s.result.assessment = Some(cached))?;

        run.info(LogTag::Aura, "Computing multi-factor risk score...")?;
        run.pause(600).await?;
        run.log(
            LogLevel::Success,
            LogTag::Aura,
            format!("Assessment complete: score {}/100", assessment.risk_score),
            Some(json!({ "recommendation": assessment.recommendation })),
        )?;
        run.hold(PipelineStage::RiskAssessment, started).await?;

        // === DECIDE ===
        let started = run.enter(PipelineStage::LenderDecision, Some(PipelineStage::RiskAssessment))?;
        run.info(LogTag::Lender, "Forwarding to underwriting engine...")?;

        let decision = run
            .call(self.services.underwriting.decide(
                &assessment,
                application.requested_amount,
                application.tenure_months,
            ))
            .await?;
        let cached = decision.clone();
        run.update(move |s| s.result.decision = Some(cached))?;

        run.info(LogTag::Lender, "Applying policy rules and pricing...")?;
        run.pause(500).await?;
        run.log(
            LogLevel::Success,
            LogTag::Lender,
            format!("Decision: {}", decision.status),
            Some(json!({
                "amount": decision.approved_amount,
                "rate": format!("{}%", decision.interest_rate_annual_percent),
            })),
        )?;
        run.hold(PipelineStage::LenderDecision, started).await?;

        // === COMPLETE ===
        run.update(|s| {
            s.state.completed_stages.push(PipelineStage::LenderDecision);
            s.state.current_stage = PipelineStage::Idle;
        })?;
        run.log(LogLevel::Success, LogTag::System, "Pipeline completed successfully", None)?;

        info!(
            decision_id = %decision.decision_id,
            status = %decision.status,
            risk_score = assessment.risk_score,
            "Pipeline run completed"
        );

        Ok(decision)
    }

    // =============================
    // Settlement
    // =============================

    /// Check settlement preconditions and enter `settlement_pending`.
    ///
    /// Preconditions: the run finished with a non-rejected decision and a
    /// proof, nothing is disbursed or pending yet, and the address carries a
    /// recognized prefix. A failed check leaves state untouched.
    pub fn prepare_settlement(&self, wallet_address: &str) -> Result<SettlementTicket> {
        let signal = self.session().signal.clone();
        self.enter_settlement(signal, wallet_address)
    }

    fn enter_settlement(
        &self,
        signal: CancellationSignal,
        wallet_address: &str,
    ) -> Result<SettlementTicket> {
        let now = self.scheduler.now_ms();

        let request = self
            .store
            .try_apply(&signal, |snapshot| {
                let request = settlement_request(snapshot, wallet_address)?;
                let state = &mut snapshot.state;
                state.current_stage = PipelineStage::SettlementPending;
                state.stage_start_time = Some(now);
                state.error = None;
                state.can_retry = false;
                Ok(request)
            })
            .map_err(|e| {
                // A start or reset raced this confirmation
                if e.is_cancelled() {
                    PipelineError::SettlementUnavailable("pipeline was restarted".to_string())
                } else {
                    e
                }
            })?;

        debug!(decision_id = %request.decision_id, "Entered settlement_pending");

        Ok(SettlementTicket {
            signal,
            started_at: now,
            request,
        })
    }

    pub async fn run_settlement(&self, ticket: SettlementTicket) -> RunOutcome<DisbursementResult> {
        let run = Run {
            orchestrator: self,
            signal: ticket.signal,
        };
        let result = self.settle(&run, ticket.started_at, &ticket.request).await;
        run.conclude(result)
    }

    /// Disburse the approved amount to `wallet_address`
    pub async fn confirm_settlement(
        &self,
        wallet_address: &str,
    ) -> Result<RunOutcome<DisbursementResult>> {
        let ticket = self.prepare_settlement(wallet_address)?;
        Ok(self.run_settlement(ticket).await)
    }

    pub fn spawn_settlement(
        self: &Arc<Self>,
        wallet_address: &str,
    ) -> Result<JoinHandle<RunOutcome<DisbursementResult>>> {
        let ticket = self.prepare_settlement(wallet_address)?;
        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.run_settlement(ticket).await }))
    }

    async fn settle(
        &self,
        run: &Run<'_>,
        started: u64,
        request: &DisbursementRequest,
    ) -> Result<DisbursementResult> {
        // === SETTLE ===
        run.info(
            LogTag::Plutus,
            format!("Connecting to Cardano {} network...", self.config.network),
        )?;
        run.pause(600).await?;
        run.info(LogTag::Plutus, "Loading Aura lending contract...")?;
        run.pause(500).await?;
        run.info(LogTag::Plutus, "Constructing transaction outputs...")?;

        let disbursement = run.call(self.services.settlement.disburse(request)).await?;

        run.info(LogTag::Plutus, "Signing transaction...")?;
        run.pause(800).await?;
        run.info(LogTag::Plutus, "Broadcasting to mempool...")?;
        run.pause(1200).await?;
        run.info(LogTag::Plutus, "Waiting for block confirmation...")?;
        run.hold(PipelineStage::SettlementPending, started).await?;

        run.log(
            LogLevel::Success,
            LogTag::Plutus,
            format!(
                "Transaction confirmed in block {}",
                disbursement.metadata.block_height
            ),
            Some(json!({ "txHash": abbreviate(&disbursement.transaction_reference, 16) })),
        )?;

        let confirmed = disbursement.clone();
        let now = run.now();
        run.update(move |s| {
            s.result.disbursement = Some(confirmed);
            s.state.completed_stages.push(PipelineStage::SettlementPending);
            s.state.completed_stages.push(PipelineStage::SettlementConfirmed);
            s.state.current_stage = PipelineStage::SettlementConfirmed;
            s.state.stage_start_time = Some(now);
            s.state.error = None;
            s.state.can_retry = false;
        })?;
        run.log(LogLevel::Success, LogTag::System, "Settlement complete - funds disbursed", None)?;

        info!(
            tx_hash = %disbursement.transaction_reference,
            amount = disbursement.amount,
            network = %disbursement.network,
            "Funds disbursed"
        );

        Ok(disbursement)
    }
}

fn settlement_request(
    snapshot: &PipelineSnapshot,
    wallet_address: &str,
) -> Result<DisbursementRequest> {
    let unavailable = |reason: &str| Err(PipelineError::SettlementUnavailable(reason.to_string()));

    if snapshot.state.current_stage == PipelineStage::SettlementPending {
        return unavailable("settlement already in progress");
    }
    if snapshot.result.disbursement.is_some() {
        return unavailable("funds already disbursed");
    }

    let (Some(decision), Some(proof)) = (&snapshot.result.decision, &snapshot.result.proof) else {
        return unavailable("no loan decision to settle");
    };

    if !snapshot
        .state
        .completed_stages
        .contains(&PipelineStage::LenderDecision)
    {
        return unavailable("pipeline has not finished");
    }
    if decision.status == DecisionStatus::Rejected {
        return unavailable("loan application was rejected");
    }

    ensure_recognized_address(wallet_address)?;

    Ok(DisbursementRequest {
        wallet_address: wallet_address.to_string(),
        approved_amount: decision.approved_amount,
        decision_id: decision.decision_id.clone(),
        proof_id: proof.proof_id.clone(),
    })
}

/// One run's view of the orchestrator. Every write goes through the run's
/// signal.
struct Run<'a> {
    orchestrator: &'a PipelineOrchestrator,
    signal: CancellationSignal,
}

impl Run<'_> {
    fn now(&self) -> u64 {
        self.orchestrator.scheduler.now_ms()
    }

    fn update<F>(&self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut PipelineSnapshot),
    {
        self.orchestrator.store.apply(&self.signal, mutate)
    }

    fn log(
        &self,
        level: LogLevel,
        tag: LogTag,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Result<()> {
        let now = self.now();
        let message = message.into();
        self.update(move |s| s.logs.push(audit::record(now, level, tag, message, data)))
    }

    fn info(&self, tag: LogTag, message: impl Into<String>) -> Result<()> {
        self.log(LogLevel::Info, tag, message, None)
    }

    /// Transition into `stage`, optionally marking the previous stage done.
    /// Returns the stage start time.
    fn enter(&self, stage: PipelineStage, completed: Option<PipelineStage>) -> Result<u64> {
        let now = self.now();
        self.update(|s| {
            if let Some(done) = completed {
                s.state.completed_stages.push(done);
            }
            s.state.current_stage = stage;
            s.state.stage_start_time = Some(now);
            s.state.error = None;
            s.state.can_retry = false;
        })?;
        debug!(stage = %stage, "Entered stage");
        Ok(now)
    }

    async fn sleep(&self, duration: Duration) -> Result<()> {
        self.signal.check()?;
        self.orchestrator.scheduler.sleep(duration).await;
        self.signal.check()
    }

    /// Narration pause between progress messages
    async fn pause(&self, ms: u64) -> Result<()> {
        if self.orchestrator.config.narration_pacing {
            self.sleep(Duration::from_millis(ms)).await
        } else {
            self.signal.check()
        }
    }

    /// Wait out whatever remains of the stage minimum
    async fn hold(&self, stage: PipelineStage, started: u64) -> Result<()> {
        let minimum = self.orchestrator.config.minimums.for_stage(stage);
        let elapsed = Duration::from_millis(self.now().saturating_sub(started));

        if elapsed < minimum {
            self.sleep(minimum - elapsed).await
        } else {
            self.signal.check()
        }
    }

    /// Collaborator call. A result that lands after cancellation is dropped.
    async fn call<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.signal.check()?;
        let result = work.await;
        self.signal.check()?;
        result
    }

    fn fail(&self, message: &str) -> Result<()> {
        let now = self.now();
        self.update(|s| {
            s.state.current_stage = PipelineStage::Error;
            s.state.error = Some(message.to_string());
            s.state.can_retry = true;
            s.logs
                .push(audit::record(now, LogLevel::Error, LogTag::System, message, None));
        })
    }

    fn conclude<T>(&self, result: Result<T>) -> RunOutcome<T> {
        match result {
            Ok(value) => RunOutcome::Completed(value),
            Err(e) if e.is_cancelled() => {
                debug!("Pipeline run cancelled");
                RunOutcome::Cancelled
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "Pipeline run failed");
                match self.fail(&message) {
                    Ok(()) => RunOutcome::Failed(message),
                    Err(_) => RunOutcome::Cancelled,
                }
            }
        }
    }
}

fn format_size(bytes: usize) -> String {
    format!("{:.1}kb", bytes as f64 / 1024.0)
}

fn abbreviate(value: &str, keep: usize) -> String {
    let head: String = value.chars().take(keep).collect();
    format!("{}...", head)
}
