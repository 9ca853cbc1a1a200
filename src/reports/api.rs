//! # Report HTTP Routes
//!
//! Signed-in users file and browse reports; status changes and
//! deletion are admin operations. The guard has already validated the
//! session token, so handlers read claims from request extensions.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::errors::{ReportError, ReportResult};
use super::model::{CrimeReport, NewReport, ReportStatus};
use super::repository::{set_status, ReportRepository};
use crate::auth::jwt::JwtClaims;
use crate::http_server::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// The guard only inserts claims for valid sessions, so a missing
/// extension means no session
fn require_claims(claims: Option<Extension<JwtClaims>>) -> ReportResult<JwtClaims> {
    claims
        .map(|Extension(c)| c)
        .ok_or(ReportError::Unauthenticated)
}

fn claims_user_id(claims: &JwtClaims) -> ReportResult<Uuid> {
    claims
        .user_id()
        .map_err(|_| ReportError::Internal("Bad token subject".to_string()))
}

/// GET /api/reports
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
) -> ReportResult<Json<Vec<CrimeReport>>> {
    require_claims(claims)?;
    Ok(Json(state.reports.list()?))
}

/// GET /api/reports/mine
pub async fn list_my_reports(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
) -> ReportResult<Json<Vec<CrimeReport>>> {
    let reporter_id = claims_user_id(&require_claims(claims)?)?;
    Ok(Json(state.reports.list_by_reporter(reporter_id)?))
}

/// GET /api/reports/:id
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
    Path(id): Path<Uuid>,
) -> ReportResult<Json<CrimeReport>> {
    require_claims(claims)?;
    let report = state.reports.find_by_id(id)?.ok_or(ReportError::NotFound)?;
    Ok(Json(report))
}

/// POST /api/reports
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
    Json(input): Json<NewReport>,
) -> ReportResult<(StatusCode, Json<CrimeReport>)> {
    let reporter_id = claims_user_id(&require_claims(claims)?)?;
    let report = input.into_report(reporter_id)?;
    state.reports.create(&report)?;

    tracing::info!(report_id = %report.id, reporter_id = %reporter_id, "report filed");
    Ok((StatusCode::CREATED, Json(report)))
}

/// PATCH /api/reports/:id/status (admin only)
pub async fn update_report_status(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> ReportResult<Json<CrimeReport>> {
    if !require_claims(claims)?.is_admin() {
        return Err(ReportError::Forbidden);
    }

    let status = ReportStatus::from_str(&request.status).ok_or_else(|| {
        ReportError::Validation(format!("Unknown status: {}", request.status))
    })?;

    let report = set_status(state.reports.as_ref(), id, status)?;
    tracing::info!(report_id = %id, status = status.as_str(), "report status changed");
    Ok(Json(report))
}

/// DELETE /api/reports/:id (admin only)
pub async fn delete_report(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
    Path(id): Path<Uuid>,
) -> ReportResult<StatusCode> {
    if !require_claims(claims)?.is_admin() {
        return Err(ReportError::Forbidden);
    }

    state.reports.delete(id)?;
    tracing::info!(report_id = %id, "report deleted");
    Ok(StatusCode::NO_CONTENT)
}
