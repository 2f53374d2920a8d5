use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::EngineError;
use crate::models::ChartSpec;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub spec: ChartSpec,
    pub org: String,
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

/// `POST /api/v1/charts/execute` — the single public entry point. Does no
/// business logic of its own: deserialise, call `Engine::execute`,
/// serialise. Error-kind → status code mapping lives here; callers get a
/// status code and a message, never an internal error type.
pub async fn execute_chart(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .engine
        .execute(&req.spec, &req.org, req.ttl_seconds)
        .await
        .map(Json)
        .map_err(map_engine_error)
}

fn map_engine_error(err: EngineError) -> (StatusCode, String) {
    let status = match &err {
        EngineError::Validation(_)
        | EngineError::UnsupportedChart(_)
        | EngineError::UnsupportedMeasure(_) => StatusCode::BAD_REQUEST,
        EngineError::UnknownOrganisation(_) | EngineError::MalformedTableName { .. } => {
            StatusCode::NOT_FOUND
        }
        EngineError::Executor { .. } => StatusCode::BAD_GATEWAY,
        EngineError::Normalisation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!("chart execute failed: {err}");
    (status, err.to_string())
}
