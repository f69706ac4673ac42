use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast;

use crate::error::Error;
use crate::models::*;
use crate::registry::ProjectRegistry;
use crate::stream::{Frame, FrameStream};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

// ============================================================
// Error Handling
// ============================================================

/// Map a domain error to a response. Validation failures are returned to the
/// client as-is; internal failures are logged and sanitized.
fn api_error(e: Error) -> (StatusCode, String) {
    let status = match &e {
        Error::InvalidInput(_) | Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        Error::ProjectNotFound(_) => StatusCode::NOT_FOUND,
        Error::AllocationExhausted(_) => StatusCode::CONFLICT,
        Error::SandboxUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::ArtifactParse { .. } | Error::OperationFailed(_) | Error::Storage(_) => {
            tracing::error!("Internal error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };

    tracing::warn!("Request failed: {}", e);
    (status, e.to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Registry
// ============================================================

pub async fn list_projects(
    State(registry): State<ProjectRegistry>,
) -> Result<Json<Vec<ProjectRecord>>, (StatusCode, String)> {
    registry.list_projects().map(Json).map_err(api_error)
}

pub async fn create_project(
    State(registry): State<ProjectRegistry>,
    Json(input): Json<CreateProjectInput>,
) -> Result<(StatusCode, Json<CreateProjectResponse>), (StatusCode, String)> {
    registry
        .create_project(&input.name)
        .map(|identifier| (StatusCode::CREATED, Json(CreateProjectResponse { identifier })))
        .map_err(api_error)
}

pub async fn recent_projects(
    State(registry): State<ProjectRegistry>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    registry.recent_projects().map(Json).map_err(api_error)
}

// ============================================================
// Project orchestrators
// ============================================================

pub async fn get_project(
    State(registry): State<ProjectRegistry>,
    Path(id): Path<String>,
) -> Result<Json<ProjectSnapshot>, (StatusCode, String)> {
    registry
        .orchestrator(&id)
        .and_then(|orchestrator| orchestrator.snapshot())
        .map(Json)
        .map_err(api_error)
}

pub async fn setup_project(
    State(registry): State<ProjectRegistry>,
    Path(id): Path<String>,
    Json(input): Json<SetupInput>,
) -> Result<Json<SetupResponse>, (StatusCode, String)> {
    let orchestrator = registry.orchestrator(&id).map_err(api_error)?;
    orchestrator
        .setup(&input.display_name)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn initialize_sandbox(
    State(registry): State<ProjectRegistry>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let orchestrator = registry.orchestrator(&id).map_err(api_error)?;
    orchestrator
        .initialize_sandbox()
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(api_error)
}

pub async fn update_config(
    State(registry): State<ProjectRegistry>,
    Path(id): Path<String>,
    Json(input): Json<UpdateConfigInput>,
) -> Result<Json<UpdateConfigResponse>, (StatusCode, String)> {
    let orchestrator = registry.orchestrator(&id).map_err(api_error)?;
    orchestrator
        .update_config(&input.config_json)
        .await
        .map(Json)
        .map_err(api_error)
}

pub async fn write_config_to_sandbox(
    State(registry): State<ProjectRegistry>,
    Path(id): Path<String>,
) -> Result<Json<WriteConfigResponse>, (StatusCode, String)> {
    let orchestrator = registry.orchestrator(&id).map_err(api_error)?;
    orchestrator
        .write_config_to_sandbox()
        .await
        .map(Json)
        .map_err(api_error)
}

// ============================================================
// Streams
// ============================================================

pub async fn plan(
    State(registry): State<ProjectRegistry>,
    Path(id): Path<String>,
    Json(input): Json<PlanInput>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, (StatusCode, String)> {
    let orchestrator = registry.orchestrator(&id).map_err(api_error)?;
    let frames = orchestrator.plan(&input.description).map_err(api_error)?;
    Ok(frame_events(frames))
}

pub async fn iterate(
    State(registry): State<ProjectRegistry>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, (StatusCode, String)> {
    let orchestrator = registry.orchestrator(&id).map_err(api_error)?;
    let frames = orchestrator.iterate().map_err(api_error)?;
    Ok(frame_events(frames))
}

/// Live feed of every frame and state change of a project.
pub async fn watch_project(
    State(registry): State<ProjectRegistry>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let orchestrator = registry.orchestrator(&id).map_err(api_error)?;
    let rx = orchestrator.subscribe();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => match watch_event(&event) {
                    Some(event) => return Some((Ok(event), rx)),
                    None => continue,
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Watcher lagged behind project events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keepalive"),
    ))
}

/// Encode a watched event, skipping it if it cannot be serialized.
fn watch_event<T: serde::Serialize>(event: &T) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(data) => Some(Event::default().data(data)),
        Err(e) => {
            tracing::warn!(error = %e, "Dropping project event that failed to serialize");
            None
        }
    }
}

/// One SSE event per frame, named after the frame type. The response ends
/// right after the terminal frame.
fn frame_events(frames: FrameStream) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = stream::unfold(frames, |mut frames| async move {
        let frame = frames.next().await?;
        let event = Event::default().event(frame_kind(&frame)).json_data(&frame);
        Some((event, frames))
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keepalive"),
    )
}

fn frame_kind(frame: &Frame) -> &'static str {
    match frame {
        Frame::Status { .. } => "status",
        Frame::Output { .. } => "output",
        Frame::Complete(_) => "complete",
        Frame::Error { .. } => "error",
    }
}
