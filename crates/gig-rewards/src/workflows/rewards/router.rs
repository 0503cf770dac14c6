use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{ActivityKind, ActivityRecord, AuditAction, BenefitId, NewRule, RuleId, WorkerId};
use super::ingestion::IngestionError;
use super::repository::{AuditLog, RewardsStore};
use super::service::{ActivityQuery, AuditQuery, RewardsService, RewardsServiceError};
use super::views::{IngestionView, IssuanceView, RecomputeView};

type SharedService<S, L> = State<Arc<RewardsService<S, L>>>;

/// Router builder exposing worker and admin endpoints.
pub fn rewards_router<S, L>(service: Arc<RewardsService<S, L>>) -> Router
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    Router::new()
        .route(
            "/api/v1/workers/:worker_id/summary",
            get(worker_summary_handler::<S, L>),
        )
        .route(
            "/api/v1/workers/:worker_id/activities",
            get(list_activities_handler::<S, L>).post(upload_activities_handler::<S, L>),
        )
        .route(
            "/api/v1/workers/:worker_id/benefits",
            get(list_benefits_handler::<S, L>),
        )
        .route(
            "/api/v1/workers/:worker_id/benefits/summary",
            get(benefits_summary_handler::<S, L>),
        )
        .route(
            "/api/v1/workers/:worker_id/benefits/:benefit_id/claim",
            post(claim_benefit_handler::<S, L>),
        )
        .route(
            "/api/v1/workers/:worker_id/evaluate",
            post(evaluate_worker_handler::<S, L>),
        )
        .route(
            "/api/v1/admin/rules",
            get(list_rules_handler::<S, L>).post(create_rule_handler::<S, L>),
        )
        .route(
            "/api/v1/admin/rules/:rule_id/preview",
            post(preview_rule_handler::<S, L>),
        )
        .route(
            "/api/v1/admin/rules/:rule_id/status",
            patch(rule_status_handler::<S, L>),
        )
        .route("/api/v1/admin/recompute", post(recompute_handler::<S, L>))
        .route("/api/v1/admin/workers", get(list_workers_handler::<S, L>))
        .route("/api/v1/admin/logs", get(audit_log_handler::<S, L>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ActivityParams {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuditParams {
    from: Option<String>,
    to: Option<String>,
    action: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WorkerParams {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatusUpdate {
    #[serde(default, alias = "status")]
    active: Option<bool>,
}

pub(crate) async fn worker_summary_handler<S, L>(
    State(service): SharedService<S, L>,
    Path(worker_id): Path<String>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    match service.worker_summary(&WorkerId(worker_id)) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn list_activities_handler<S, L>(
    State(service): SharedService<S, L>,
    Path(worker_id): Path<String>,
    Query(params): Query<ActivityParams>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    let kind = match params.kind.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => match ActivityKind::parse(raw) {
            Some(kind) => Some(kind),
            None => {
                return bad_request(format!("unknown activity type '{raw}'"));
            }
        },
    };

    let query = ActivityQuery {
        from: params.from,
        to: params.to,
        kind,
    };

    match service.activities(&WorkerId(worker_id), &query) {
        Ok(activities) => (StatusCode::OK, Json(activities)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn upload_activities_handler<S, L>(
    State(service): SharedService<S, L>,
    Path(worker_id): Path<String>,
    Json(activities): Json<Vec<ActivityRecord>>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    match service.ingest_activities(&WorkerId(worker_id), activities) {
        Ok(outcome) => (StatusCode::OK, Json(IngestionView::from(&outcome))).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn list_benefits_handler<S, L>(
    State(service): SharedService<S, L>,
    Path(worker_id): Path<String>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    match service.benefits(&WorkerId(worker_id)) {
        Ok(benefits) => (StatusCode::OK, Json(benefits)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn benefits_summary_handler<S, L>(
    State(service): SharedService<S, L>,
    Path(worker_id): Path<String>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    match service.benefits_summary(&WorkerId(worker_id)) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn claim_benefit_handler<S, L>(
    State(service): SharedService<S, L>,
    Path((worker_id, benefit_id)): Path<(String, String)>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    match service.claim_benefit(&WorkerId(worker_id), &BenefitId(benefit_id)) {
        Ok(benefit) => (StatusCode::OK, Json(benefit)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn evaluate_worker_handler<S, L>(
    State(service): SharedService<S, L>,
    Path(worker_id): Path<String>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    match service.evaluate_worker(&WorkerId(worker_id)) {
        Ok(report) => (StatusCode::OK, Json(IssuanceView::from(&report))).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn list_rules_handler<S, L>(State(service): SharedService<S, L>) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    match service.rules() {
        Ok(rules) => (StatusCode::OK, Json(rules)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn create_rule_handler<S, L>(
    State(service): SharedService<S, L>,
    Json(rule): Json<NewRule>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    match service.create_rule(rule) {
        Ok(rule) => (StatusCode::CREATED, Json(rule)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn preview_rule_handler<S, L>(
    State(service): SharedService<S, L>,
    Path(rule_id): Path<String>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    match service.preview_rule(&RuleId(rule_id)) {
        Ok(preview) => (StatusCode::OK, Json(preview)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn rule_status_handler<S, L>(
    State(service): SharedService<S, L>,
    Path(rule_id): Path<String>,
    update: Option<Json<StatusUpdate>>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    let active = update.and_then(|Json(update)| update.active);
    match service.set_rule_status(&RuleId(rule_id), active) {
        Ok(change) => {
            let payload = json!({
                "ok": true,
                "rule_id": change.rule.id,
                "active": change.rule.active,
                "recompute": RecomputeView::from(&change.recompute),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn recompute_handler<S, L>(State(service): SharedService<S, L>) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    match service.recompute_all() {
        Ok(summary) => (StatusCode::OK, Json(RecomputeView::from(&summary))).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn list_workers_handler<S, L>(
    State(service): SharedService<S, L>,
    Query(params): Query<WorkerParams>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    match service.workers(&params.q) {
        Ok(workers) => (StatusCode::OK, Json(workers)).into_response(),
        Err(err) => service_error_response(err),
    }
}

pub(crate) async fn audit_log_handler<S, L>(
    State(service): SharedService<S, L>,
    Query(params): Query<AuditParams>,
) -> Response
where
    S: RewardsStore + 'static,
    L: AuditLog + 'static,
{
    let action = match params.action.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => match AuditAction::parse(raw) {
            Some(action) => Some(action),
            None => return bad_request(format!("unknown audit action '{raw}'")),
        },
    };

    let query = AuditQuery {
        action,
        from: params.from.filter(|value| !value.trim().is_empty()),
        to: params.to.filter(|value| !value.trim().is_empty()),
    };

    match service.audit_entries(&query) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(err) => service_error_response(err),
    }
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

pub(crate) fn service_error_response(err: RewardsServiceError) -> Response {
    let status = service_error_status(&err);
    if status.is_server_error() {
        error!(%err, "rewards request failed");
    }

    (status, Json(json!({ "error": err.to_string() }))).into_response()
}

/// HTTP status for a service failure; shared with [`crate::error::AppError`].
pub(crate) fn service_error_status(err: &RewardsServiceError) -> StatusCode {
    match err {
        RewardsServiceError::InvalidRule(_)
        | RewardsServiceError::Ingestion(IngestionError::EmptyPayload) => StatusCode::BAD_REQUEST,
        RewardsServiceError::RuleNotFound(_)
        | RewardsServiceError::WorkerNotFound(_)
        | RewardsServiceError::BenefitNotFound(_)
        | RewardsServiceError::Ingestion(IngestionError::WorkerNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        RewardsServiceError::BenefitNotClaimable { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
