//! Scan submission and one-shot retrieval handlers.

use super::{SubmitDataRequest, SubmitDataResponse};
use crate::api::AppState;
use crate::error::ApiError;
use crate::events::DeferredSummary;
use crate::types::ScanRequest;
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::stream::{self, StreamExt};

/// POST /submit-data - Fetch, unpack and scan a download
///
/// Holds the connection open for the whole pipeline; with the default pacing
/// an archive of N files takes at least 15·N seconds.
#[utoipa::path(
    post,
    path = "/submit-data",
    tag = "scan",
    request_body = SubmitDataRequest,
    responses(
        (status = 200, description = "Scan finished", body = SubmitDataResponse),
        (status = 400, description = "Missing or invalid source URL", body = crate::error::ApiError),
        (status = 422, description = "Archive could not be unpacked", body = crate::error::ApiError),
        (status = 502, description = "Source or analysis backend failed", body = crate::error::ApiError)
    )
)]
pub async fn submit_data(
    State(state): State<AppState>,
    Json(request): Json<SubmitDataRequest>,
) -> Response {
    if request.url.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiError::validation("url must not be empty")),
        )
            .into_response();
    }

    let scan = ScanRequest::new(request.url, request.filename, request.mime);
    let (outcome, summary) = state.gate.handle_scan_deferred(scan, request.id).await;
    let response = match outcome {
        Ok(outcome) => (
            StatusCode::OK,
            Json(SubmitDataResponse {
                is_safe: outcome.is_safe,
                proxy_url: outcome.one_shot_url,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    };
    publish_after_body(response, summary)
}

/// Queue `summary` once the response body has been fully handed over
///
/// The guard rides at the end of the body stream and is dropped when the
/// connection has taken the last chunk or has given up on the body.
fn publish_after_body(response: Response, summary: DeferredSummary) -> Response {
    let (parts, body) = response.into_parts();
    let trailer = stream::once(async move { drop(summary) })
        .filter_map(|()| async { None::<Result<Bytes, axum::Error>> });
    Response::from_parts(parts, Body::from_stream(body.into_data_stream().chain(trailer)))
}

/// GET /safe/:token - Redeem a one-shot link
#[utoipa::path(
    get,
    path = "/safe/{token}",
    tag = "scan",
    params(
        ("token" = String, Path, description = "One-shot token from a safe scan")
    ),
    responses(
        (status = 200, description = "File contents as an attachment", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown or already redeemed token", body = crate::error::ApiError)
    )
)]
pub async fn retrieve(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.gate.handle_retrieve(&token).await {
        Ok(retrieval) => {
            let disposition = format!(
                "attachment; filename=\"{}\"",
                retrieval.filename.replace(['"', '\\'], "_")
            );
            let disposition = HeaderValue::from_str(&disposition)
                .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

            (
                StatusCode::OK,
                [
                    (
                        header::CONTENT_TYPE,
                        HeaderValue::from_static(retrieval.content_type),
                    ),
                    (header::CONTENT_DISPOSITION, disposition),
                    (header::CONTENT_LENGTH, HeaderValue::from(retrieval.size)),
                ],
                Body::from_stream(retrieval.into_stream()),
            )
                .into_response()
        }
        Err(e) => {
            tracing::debug!(error = %e, "retrieval refused");
            e.into_response()
        }
    }
}
