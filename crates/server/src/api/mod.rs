//! HTTP surface of the key/value contract.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{AvailabilityResponse, DataResponse, SetDataRequest, TransactionReceipt, MAX_VALUE_BYTES},
};
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

type HttpResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

pub fn availability_route() -> &'static str {
    "/contract/available"
}

pub fn data_route() -> &'static str {
    "/contract/data/:key"
}

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    // base64 inflates the value by a third; leave headroom for the JSON envelope.
    let body_limit = MAX_VALUE_BYTES * 2;

    Router::new()
        .route("/healthz", get(healthz))
        .route(availability_route(), get(http_is_available))
        .route(data_route(), get(http_get_data).put(http_set_data))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, StatusCode> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;
    Ok("ok")
}

async fn http_is_available(State(state): State<Arc<AppState>>) -> HttpResult<AvailabilityResponse> {
    let available = server_api::is_available(&state.api)
        .await
        .map_err(into_response)?;
    Ok(Json(AvailabilityResponse { available }))
}

async fn http_get_data(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> HttpResult<DataResponse> {
    let response = server_api::get_data(&state.api, &key)
        .await
        .map_err(into_response)?;
    Ok(Json(response))
}

async fn http_set_data(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(request): Json<SetDataRequest>,
) -> HttpResult<TransactionReceipt> {
    let receipt = server_api::set_data(&state.api, &key, &request)
        .await
        .map_err(into_response)?;
    Ok(Json(receipt))
}

fn into_response(error: ApiError) -> (StatusCode, Json<ApiError>) {
    (status_for(error.code), Json(error))
}

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
