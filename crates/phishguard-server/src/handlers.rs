//! HTTP route handlers (spec §6).

use std::time::Instant;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use phishguard_core::types::Verdict;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

const MAX_BATCH_SIZE: usize = 50;

/// `GET /health`.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let governance_available = state.governance.is_frozen().is_ok();
    Json(json!({
        "status": "ok",
        "pipeline_ready": true,
        "governance_available": governance_available,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    url: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    #[serde(flatten)]
    result: phishguard_core::types::AnalysisResult,
    risk_level: &'static str,
    latency_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    network_issues: Option<Vec<String>>,
}

fn risk_level_for(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Safe => "low",
        Verdict::Suspicious => "medium",
        Verdict::Phishing => "high",
    }
}

fn network_issues_for(result: &phishguard_core::types::AnalysisResult) -> Option<Vec<String>> {
    let flags = &result.failure_flags;
    if !flags.any_failed() {
        return None;
    }
    let mut issues = Vec::new();
    if let Some(e) = &flags.http_error {
        issues.push(format!("http: {e}"));
    }
    if let Some(e) = &flags.whois_error {
        issues.push(format!("whois: {e}"));
    }
    if let Some(e) = &flags.dns_error {
        issues.push(format!("dns: {e}"));
    }
    Some(issues)
}

/// `POST /scan`.
pub async fn scan(State(state): State<AppState>, Json(req): Json<ScanRequest>) -> Result<Json<ScanResponse>, ApiError> {
    if req.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url must not be empty".to_string()));
    }
    let started = Instant::now();
    let result = state.pipeline.analyze(&req.url).await?;
    let latency_ms = started.elapsed().as_millis();
    let network_issues = network_issues_for(&result);
    let risk_level = risk_level_for(result.verdict);
    Ok(Json(ScanResponse {
        result,
        risk_level,
        latency_ms,
        network_issues,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BatchScanRequest {
    urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchScanResponse {
    results: Vec<phishguard_core::types::AnalysisResult>,
    total: usize,
    phishing_count: usize,
    safe_count: usize,
    suspicious_count: usize,
}

/// `POST /api/batch-scan`.
pub async fn batch_scan(
    State(state): State<AppState>,
    Json(req): Json<BatchScanRequest>,
) -> Result<Json<BatchScanResponse>, ApiError> {
    if req.urls.is_empty() {
        return Err(ApiError::BadRequest("urls must not be empty".to_string()));
    }
    if req.urls.len() > MAX_BATCH_SIZE {
        return Err(ApiError::BadRequest(format!(
            "batch size {} exceeds limit of {MAX_BATCH_SIZE}",
            req.urls.len()
        )));
    }

    let mut results = Vec::with_capacity(req.urls.len());
    for url in &req.urls {
        results.push(state.pipeline.analyze(url).await?);
    }

    let phishing_count = results.iter().filter(|r| r.verdict == Verdict::Phishing).count();
    let safe_count = results.iter().filter(|r| r.verdict == Verdict::Safe).count();
    let suspicious_count = results.iter().filter(|r| r.verdict == Verdict::Suspicious).count();
    let total = results.len();

    Ok(Json(BatchScanResponse {
        results,
        total,
        phishing_count,
        safe_count,
        suspicious_count,
    }))
}

/// `GET /api/governance/status`.
pub async fn governance_status(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let store_state = state.governance.store().read_cached()?;
    Ok(Json(json!({
        "freeze": store_state.freeze,
        "budget": store_state.budget,
        "active_override_count": state.governance.active_overrides()?.len(),
        "calibration_status": format!("{:?}", state.governance.calibration_status()),
    })))
}

#[derive(Debug, Deserialize)]
pub struct UnfreezeRequest {
    force: bool,
    #[serde(default)]
    ticket: Option<String>,
}

/// `POST /api/governance/unfreeze`.
pub async fn unfreeze(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UnfreezeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let expected = state.config.admin_key.as_deref();
    let supplied = headers.get("X-Admin-Key").and_then(|v| v.to_str().ok());
    match (expected, supplied) {
        (Some(expected), Some(supplied)) if expected == supplied => {}
        _ => return Err(ApiError::Unauthorized),
    }

    if !req.force {
        return Err(ApiError::BadRequest("force must be true to unfreeze".to_string()));
    }

    let incident_id = req.ticket.unwrap_or_else(|| "unspecified".to_string());
    state
        .governance
        .resume("admin-api", &incident_id, "unfrozen via /api/governance/unfreeze")?;

    Ok(Json(json!({ "success": true, "message": "system resumed" })))
}

/// `GET /api/trusted-domains`.
pub async fn trusted_domains(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sample = state.trust_gate.sample(50);
    Json(json!({
        "domains": sample,
        "total": state.trust_gate.len(),
    }))
}

/// `GET /metrics` — Prometheus text exposition format.
pub async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    let snapshot = state.telemetry.snapshot();
    let mut out = String::new();

    out.push_str("# HELP phishguard_events_total Total analyses recorded.\n");
    out.push_str("# TYPE phishguard_events_total counter\n");
    out.push_str(&format!("phishguard_events_total {}\n", snapshot.total_events));

    out.push_str("# HELP phishguard_verdict_total Analyses by verdict.\n");
    out.push_str("# TYPE phishguard_verdict_total counter\n");
    for (verdict, count) in &snapshot.by_verdict {
        out.push_str(&format!("phishguard_verdict_total{{verdict=\"{verdict}\"}} {count}\n"));
    }

    out.push_str("# HELP phishguard_calibration_status_total Analyses by calibration status at record time.\n");
    out.push_str("# TYPE phishguard_calibration_status_total counter\n");
    for (status, count) in &snapshot.by_drift_status {
        out.push_str(&format!("phishguard_calibration_status_total{{status=\"{status}\"}} {count}\n"));
    }

    out.push_str("# HELP phishguard_analysis_complete_total Analyses with no upstream signal failure.\n");
    out.push_str("# TYPE phishguard_analysis_complete_total counter\n");
    out.push_str(&format!("phishguard_analysis_complete_total {}\n", snapshot.complete_count));
    out.push_str(&format!(
        "phishguard_analysis_incomplete_total {}\n",
        snapshot.incomplete_count
    ));

    out.push_str("# HELP phishguard_allowlist_override_total Analyses that bypassed the model via trust/override.\n");
    out.push_str("# TYPE phishguard_allowlist_override_total counter\n");
    out.push_str(&format!(
        "phishguard_allowlist_override_total {}\n",
        snapshot.allowlist_override_count
    ));

    (StatusCode::OK, out)
}
