//! HTTP handler functions for the traffic reporter API.

use actix_web::{HttpResponse, web};
use traffic_reporter_database::DbError;
use traffic_reporter_database_models::ReportFilter;
use traffic_reporter_server_models::{
    ApiAddResult, ApiCause, ApiError, ApiHealth, ApiNewReport, ApiRemoveResult, ApiReport,
    ReportQueryParams,
};
use traffic_reporter_service::{ReportSubmission, ServiceError};
use uuid::Uuid;

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/causes`
///
/// Lists the configured causes with their merge radius and decay budget.
pub async fn causes(state: web::Data<AppState>) -> HttpResponse {
    match state.service.list_causes().await {
        Ok(rows) => {
            let causes: Vec<ApiCause> = rows.into_iter().map(ApiCause::from).collect();
            HttpResponse::Ok().json(causes)
        }
        Err(e) => error_response("Failed to list causes", &e),
    }
}

/// `POST /api/report`
///
/// Responds `201 Created` for a new report and `200 OK` when the submission
/// confirmed an existing one.
pub async fn add_report(
    state: web::Data<AppState>,
    body: web::Json<ApiNewReport>,
) -> HttpResponse {
    let body = body.into_inner();
    let submission = ReportSubmission {
        cause: body.cause,
        direction: body.direction,
        longitude: body.longitude,
        latitude: body.latitude,
        user_id: body.user_id,
    };

    match state.service.add_report(submission).await {
        Ok(outcome) => {
            let mut resp = if outcome.is_merge() {
                HttpResponse::Ok()
            } else {
                HttpResponse::Created()
            };
            resp.json(ApiAddResult::from(outcome))
        }
        Err(e) => error_response("Failed to add report", &e),
    }
}

/// `GET /api/report/{id}`
pub async fn get_report(state: web::Data<AppState>, id: web::Path<Uuid>) -> HttpResponse {
    let id = id.into_inner();

    match state.service.get_report(id).await {
        Ok(Some(row)) => HttpResponse::Ok().json(ApiReport::from(row)),
        Ok(None) => HttpResponse::NotFound().json(ApiError {
            error: format!("Report {id} not found"),
        }),
        Err(e) => error_response("Failed to get report", &e),
    }
}

/// `DELETE /api/report/{id}`
///
/// Removing an unknown id is not an error; it reports zero rows affected.
pub async fn remove_report(state: web::Data<AppState>, id: web::Path<Uuid>) -> HttpResponse {
    match state.service.remove_report(id.into_inner()).await {
        Ok(rows_affected) => HttpResponse::Ok().json(ApiRemoveResult { rows_affected }),
        Err(e) => error_response("Failed to remove report", &e),
    }
}

/// `GET /api/report`
///
/// Lists reports inside a bounding box, optionally narrowed by a cause
/// bitmask, one page at a time.
pub async fn list_reports(
    state: web::Data<AppState>,
    params: web::Query<ReportQueryParams>,
) -> HttpResponse {
    let filter = ReportFilter::from(&*params);

    match state.service.list_filtered(filter).await {
        Ok(rows) => {
            let reports: Vec<ApiReport> = rows.into_iter().map(ApiReport::from).collect();
            HttpResponse::Ok().json(reports)
        }
        Err(e) => error_response("Failed to list reports", &e),
    }
}

/// Maps a service error to a response. Caller mistakes become `400` with
/// the error message; everything else is logged and returned as `500`.
fn error_response(context: &str, e: &ServiceError) -> HttpResponse {
    match e {
        ServiceError::InvalidFilter(_)
        | ServiceError::InvalidCoordinates { .. }
        | ServiceError::Database(DbError::UnknownCause { .. } | DbError::DuplicateId { .. }) => {
            log::debug!("{context}: {e}");
            HttpResponse::BadRequest().json(ApiError {
                error: e.to_string(),
            })
        }
        ServiceError::Database(_) | ServiceError::Task(_) => {
            log::error!("{context}: {e}");
            HttpResponse::InternalServerError().json(ApiError {
                error: context.to_string(),
            })
        }
    }
}
