use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::{error, warn, Instrument};
use uuid::Uuid;

use timeline_common::{Source, TimelineError, TimelineRequest};

use crate::{AppState, ROLE_HEADER};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineQuery {
    patient_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

/// `GET /api/timeline?patientId=&from=&to=` with the caller's role in
/// `X-User-Role`. 206 when any source is missing from the result.
pub async fn api_timeline(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<TimelineQuery>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("timeline_request", %request_id);

    async move {
        let role = headers.get(ROLE_HEADER).and_then(|v| v.to_str().ok());
        let request = match TimelineRequest::from_params(
            params.patient_id.as_deref(),
            params.from.as_deref(),
            params.to.as_deref(),
            role,
        ) {
            Ok(request) => request,
            Err(e) => return error_response(e),
        };

        match state.service.timeline(&request).await {
            Ok(result) => {
                let status = if result.partial {
                    StatusCode::PARTIAL_CONTENT
                } else {
                    StatusCode::OK
                };
                (status, Json(result)).into_response()
            }
            Err(e) => error_response(e),
        }
    }
    .instrument(span)
    .await
}

fn error_response(err: TimelineError) -> Response {
    match err {
        TimelineError::InvalidRequest(msg) => {
            warn!(reason = %msg, "Rejected timeline request");
            (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": msg }))).into_response()
        }
        TimelineError::AllSourcesFailed(failures) => {
            error!(failed = failures.len(), "No source returned data");
            let sources: Vec<Source> = failures.iter().map(|f| f.origin).collect();
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "error": "Timeline unavailable: no source returned data",
                    "sources": sources,
                })),
            )
                .into_response()
        }
        TimelineError::Config(msg) => {
            error!(reason = %msg, "Timeline request hit a configuration error");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
