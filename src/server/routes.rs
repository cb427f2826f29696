//! HTTP route handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{error, info, warn};
use url::Url;

use super::state::AppState;
use crate::error::ApiError;
use crate::models::{
    AcceptedResponse, HealthResponse, ProcessRequest, Task, TimeoutsEcho,
};
use crate::registry::TaskRecord;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/process", post(process_handler))
        .route("/health", get(health_handler))
        .route("/tasks/:task_id", get(task_handler))
        .with_state(state)
}

/// A validated `/process` body.
#[derive(Debug)]
struct Accepted {
    keyword: String,
    task_id: String,
    callback_address: Url,
}

fn validate(req: ProcessRequest) -> Result<Accepted, ApiError> {
    let keyword = req
        .keyword
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("keyword is required".into()))?;
    let task_id = req
        .task_id
        .map(|t| t.into_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("taskId is required".into()))?;
    let raw_address = req
        .callback_address
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("callbackAddress is required".into()))?;

    let callback_address = Url::parse(&raw_address)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .ok_or_else(|| {
            ApiError::InvalidRequest(format!(
                "callbackAddress must be an absolute http(s) URL, got '{raw_address}'"
            ))
        })?;

    Ok(Accepted {
        keyword,
        task_id,
        callback_address,
    })
}

/// POST /process - accept a task and run it in the background
async fn process_handler(
    State(state): State<AppState>,
    body: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError> {
    let Json(req) = body.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected /process body");
        ApiError::InvalidRequest(rejection.body_text())
    })?;
    let accepted = validate(req).inspect_err(|e| warn!(error = %e, "Rejected /process request"))?;

    let generation = state.registry.start(&accepted.task_id, &accepted.keyword);
    let task = Task::new(
        accepted.task_id.clone(),
        accepted.keyword.clone(),
        accepted.callback_address,
        state.config.pipeline.slots,
    )
    .with_generation(generation);
    info!(
        task_id = %task.task_id,
        keyword = %task.keyword,
        callback = %task.callback_address,
        generation,
        available_permits = state.task_permits.available_permits(),
        "Accepted task"
    );

    let runner = state.runner.clone();
    let permits = state.task_permits.clone();
    tokio::spawn(async move {
        let _permit = match permits.acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                error!(error = %e, "Task limiter closed; running without a permit");
                None
            }
        };
        runner.run_task(task).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted".into(),
            task_id: accepted.task_id,
            keyword: accepted.keyword,
        }),
    ))
}

/// GET /health - liveness plus a configuration echo
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = &state.config;
    Json(HealthResponse {
        status: "ok".into(),
        active_tasks: state.registry.active_count(),
        provider: config.provider.name.clone(),
        model: config.provider.model.clone(),
        slots: config.pipeline.slots,
        max_concurrent_tasks: config.server.max_concurrent_tasks,
        timeouts: TimeoutsEcho {
            discovery_secs: config.discovery.timeout_secs,
            fetch_secs: config.extraction.fetch_timeout_secs,
            rewrite_secs: config.provider.timeout_secs,
            callback_secs: config.callback.timeout_secs,
        },
    })
}

/// GET /tasks/:task_id - registry record for one task
async fn task_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    state
        .registry
        .get(&task_id)
        .map(Json)
        .ok_or(ApiError::TaskNotFound(task_id))
}
