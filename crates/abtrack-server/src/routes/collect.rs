use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use abtrack_core::{collector::CollectResponse, request::CollectRequest};

use crate::{error::AppError, state::AppState};

/// `POST /api/collect`: the single dispatch endpoint.
///
/// The body is a JSON object whose `action` selects the operation:
/// - `log_impression` / `log_click`: validate and store one event.
///   `200 { "message": "Event logged", "data": <event> }`
/// - `get_stats`: aggregate an experiment over `[from, to]`.
///   `200 { experimentId, window, totals, variants }`
///
/// Missing fields and unknown actions yield `400 { "error" }`. Store failures
/// and unparseable bodies yield `500 { "error": "Internal server error", "message" }`.
///
/// The body is taken as raw bytes rather than through the `Json` extractor so
/// parse failures flow through [`AppError`] with the wire shape above.
#[tracing::instrument(skip(state, body), fields(bytes = body.len()))]
pub async fn collect(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = CollectRequest::from_slice(&body)?;
    tracing::debug!(action = request.action(), "collect request received");

    let response = match state.collector.dispatch(request).await? {
        CollectResponse::Logged(event) => Json(json!({
            "message": "Event logged",
            "data": event,
        }))
        .into_response(),
        CollectResponse::Stats(stats) => Json(stats).into_response(),
    };
    Ok(response)
}
