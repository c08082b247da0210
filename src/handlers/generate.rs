use axum::{Json, extract::State, extract::rejection::JsonRejection};
use std::sync::Arc;
use std::time::Instant;
use crate::error::ProxyError;
use crate::state::AppState;
use crate::models::{ProxyRequest, ProxyResponse};
use crate::metrics::{REQUEST_TOTAL, REQUEST_LATENCY};

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<Json<ProxyResponse>, ProxyError> {
    REQUEST_TOTAL.inc();

    let Json(request) = payload.map_err(|e| ProxyError::InvalidRequest(e.body_text()))?;

    let start_time = Instant::now();
    let result = state.complete(request).await;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    result.map(|result| Json(ProxyResponse { result }))
}
