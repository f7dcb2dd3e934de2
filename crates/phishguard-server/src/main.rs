//! Process entry point: bootstraps every collaborator crate, serves the
//! HTTP surface (spec §6), and answers a small CLI subcommand layer for
//! operational checks that don't need a running server.

mod config;
mod error;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use phishguard_audit::async_queue::XaiAuditQueue;
use phishguard_blocklist::cache::BlocklistCache;
use phishguard_core::config::{GovernancePolicy, PipelinePolicy};
use phishguard_core::trust::{TrustGate, TrustManifest};
use phishguard_governance::controller::GovernanceController;
use phishguard_model::model::DeterministicReferenceModel;
use phishguard_pipeline::cache::AnalysisCache;
use phishguard_pipeline::executor::{DefaultExtractorFactory, Pipeline};
use phishguard_telemetry::aggregator::TelemetryAggregator;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::ServerConfig;
use state::AppState;

const STATE_DIR: &str = "governance_state";
const MANIFEST_PATH: &str = "trusted_domains_manifest.json";
const SNAPSHOT_PATH: &str = "tests/fixtures/trusted_domains_snapshot.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("--status") => return run_status_subcommand().await,
        Some("--check-canary") => return run_check_canary_subcommand().await,
        Some(other) => {
            error!(flag = other, "unrecognised CLI flag");
            std::process::exit(2);
        }
        None => {}
    }

    let config = ServerConfig::from_env();
    let state = bootstrap(&config).await?;

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "phishguard-server listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Construct every collaborator and wire them into one [`AppState`].
/// Fails the process (never serves) if the model metadata does not
/// satisfy the calibration invariant, or the trust manifest's version
/// does not match the regression snapshot.
async fn bootstrap(config: &ServerConfig) -> anyhow::Result<AppState> {
    let governance_policy = GovernancePolicy::default();
    let pipeline_policy = PipelinePolicy::default();

    let governance = Arc::new(GovernanceController::new(PathBuf::from(STATE_DIR), governance_policy));

    let trust_gate = Arc::new(load_trust_gate()?);

    let blocklist = Arc::new(BlocklistCache::new());
    if let Err(err) = blocklist.refresh().await {
        tracing::warn!(error = %err, "initial blocklist refresh failed; serving with an empty snapshot");
    }

    // The pipeline refuses to load any model not tagged as calibrated;
    // `DeterministicReferenceModel::new` validates this at construction.
    let model = Arc::new(DeterministicReferenceModel::new().map_err(|e| {
        error!(error = %e, "model failed the calibration invariant at load time");
        e
    })?);

    let cache = Arc::new(AnalysisCache::new(
        std::time::Duration::from_secs(pipeline_policy.cache_ttl_secs),
        pipeline_policy.cache_capacity,
    ));

    let xai_queue = match XaiAuditQueue::start(PathBuf::from("audit").join("xai_telemetry.jsonl")) {
        Ok(queue) => Some(Arc::new(queue)),
        Err(err) => {
            tracing::warn!(error = %err, "xai audit queue failed to start; explanations will not be logged");
            None
        }
    };

    let telemetry = Arc::new(TelemetryAggregator::new(Some(PathBuf::from("explanation_metrics.json"))));

    let pipeline = Arc::new(Pipeline::new(
        trust_gate.clone(),
        blocklist,
        Arc::new(DefaultExtractorFactory),
        model,
        governance.clone(),
        cache,
        xai_queue,
        telemetry.clone(),
        pipeline_policy,
    ));

    Ok(AppState {
        pipeline,
        governance,
        trust_gate,
        telemetry,
        config: Arc::new(config.clone()),
    })
}

/// Load the trust manifest if present, validating its version against the
/// regression snapshot. Missing files are not an error — the gate falls
/// back to its built-in seed set; a version *mismatch*, by contrast, is a
/// startup failure per spec §6.
fn load_trust_gate() -> anyhow::Result<TrustGate> {
    let manifest_path = PathBuf::from(MANIFEST_PATH);
    if !manifest_path.exists() {
        info!(path = MANIFEST_PATH, "no trust manifest found; using seed allowlist only");
        return Ok(TrustGate::new());
    }

    let manifest: TrustManifest = serde_json::from_str(&std::fs::read_to_string(&manifest_path)?)?;

    let snapshot_path = PathBuf::from(SNAPSHOT_PATH);
    if snapshot_path.exists() {
        let snapshot: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&snapshot_path)?)?;
        if let Some(snapshot_version) = snapshot.get("_manifest_version").and_then(|v| v.as_str()) {
            phishguard_core::trust::validate_manifest_version(&manifest, snapshot_version)?;
        }
    }

    Ok(TrustGate::from_manifest(&manifest))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/scan", post(handlers::scan))
        .route("/api/batch-scan", post(handlers::batch_scan))
        .route("/api/governance/status", get(handlers::governance_status))
        .route("/api/governance/unfreeze", post(handlers::unfreeze))
        .route("/api/trusted-domains", get(handlers::trusted_domains))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
}

/// `--status`: print governance freeze/budget state and exit non-zero if frozen.
async fn run_status_subcommand() -> anyhow::Result<()> {
    let governance = GovernanceController::new(PathBuf::from(STATE_DIR), GovernancePolicy::default());
    let state = governance.store().read_cached()?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    if state.freeze.is_frozen {
        std::process::exit(1);
    }
    Ok(())
}

/// `--check-canary`: exits non-zero if there is not yet enough signal to
/// decide promotion eligibility for any tracked domain.
async fn run_check_canary_subcommand() -> anyhow::Result<()> {
    let governance = GovernanceController::new(PathBuf::from(STATE_DIR), GovernancePolicy::default());
    let state = governance.store().read_cached()?;
    if state.canaries.is_empty() {
        error!("no canary domains are currently tracked");
        std::process::exit(1);
    }
    for (domain, _) in &state.canaries {
        let eligibility = governance.check_promotion_eligibility(domain)?;
        println!("{domain}: eligible={} reasons={:?}", eligibility.eligible, eligibility.reasons);
    }
    Ok(())
}
