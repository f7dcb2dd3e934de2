//! Maps pipeline/governance errors onto HTTP responses (spec §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use phishguard_governance::error::GovernanceError;
use phishguard_pipeline::error::PipelineError;
use serde_json::json;
use thiserror::Error;

/// Errors the HTTP layer itself can raise, plus everything it forwards
/// from the pipeline and governance crates.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The decision pipeline refused to run because the system is frozen.
    #[error("system is frozen: {0}")]
    Frozen(String),
    /// The request body failed shape or size validation.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The `X-Admin-Key` header did not match the configured admin key.
    #[error("unauthorized")]
    Unauthorized,
    /// A governance mutation was refused for a reason other than freeze.
    #[error("governance error: {0}")]
    Governance(String),
    /// Anything else; surfaced as 500 with no detail leaked to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::SystemFrozen { reason } => ApiError::Frozen(reason),
            PipelineError::InvalidUrl { detail } => ApiError::BadRequest(detail),
            PipelineError::Governance(inner) => inner.into(),
        }
    }
}

impl From<GovernanceError> for ApiError {
    fn from(err: GovernanceError) -> Self {
        match err {
            GovernanceError::SystemFrozen { reason } => ApiError::Frozen(reason),
            GovernanceError::InvalidOverrideRequest { reason } => ApiError::BadRequest(reason),
            GovernanceError::CalibrationViolation { status, action } => {
                ApiError::BadRequest(format!("calibration status {status} forbids '{action}'"))
            }
            other => ApiError::Governance(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Frozen(reason) => (StatusCode::SERVICE_UNAVAILABLE, reason.clone()),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Governance(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail.clone()),
        };
        let body = Json(json!({ "success": false, "error": message }));
        (status, body).into_response()
    }
}
