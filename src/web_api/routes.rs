//! API Routes

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;

use crate::camera_catalog::Camera;
use crate::error::Error;
use crate::models::{ApiResponse, CompileResponse, ExecuteWorkflowRequest};
use crate::realtime_hub::HubMessage;
use crate::state::AppState;
use crate::workflow::WorkflowDefinition;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(super::health_check))
        // Stream sessions
        .route("/api/streams", get(list_streams))
        .route("/api/streams/:camera_id", get(stream_status))
        .route("/api/streams/:camera_id/start", post(start_stream))
        .route("/api/streams/:camera_id/stop", post(stop_stream))
        .route("/api/streams/:camera_id/restart", post(restart_stream))
        // Camera catalog
        .route("/api/cameras", get(list_cameras))
        .route(
            "/api/cameras/:camera_id",
            put(upsert_camera).get(get_camera).delete(delete_camera),
        )
        // Workflows
        .route("/api/workflows/validate", post(validate_workflow))
        .route("/api/workflows/compile", post(compile_workflow))
        .route("/api/workflows/execute", post(execute_workflow))
        // Realtime
        .route("/api/ws/:channel", get(websocket_handler))
        .with_state(state)
}

// ========================================
// Stream sessions
// ========================================

async fn list_streams(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.sessions.list().await))
}

async fn stream_status(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let status = state.sessions.status(&camera_id).await?;
    Ok(Json(ApiResponse::success(status)))
}

async fn start_stream(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let status = state.sessions.start(&camera_id).await?;
    Ok(Json(ApiResponse::success(status)))
}

async fn stop_stream(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let status = state.sessions.stop(&camera_id).await?;
    Ok(Json(ApiResponse::success(status)))
}

async fn restart_stream(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let status = state.sessions.restart(&camera_id).await?;
    Ok(Json(ApiResponse::success(status)))
}

// ========================================
// Camera catalog
// ========================================

async fn list_cameras(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.catalog.list().await))
}

async fn get_camera(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let camera = state
        .catalog
        .get(&camera_id)
        .await
        .ok_or_else(|| Error::ResourceNotFound(format!("camera {}", camera_id)))?;
    Ok(Json(ApiResponse::success(camera)))
}

async fn upsert_camera(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
    Json(camera): Json<Camera>,
) -> Result<impl IntoResponse, Error> {
    if camera.camera_id != camera_id {
        return Err(Error::Configuration(format!(
            "cameraId {} does not match path {}",
            camera.camera_id, camera_id
        )));
    }

    let previous = state.catalog.upsert(camera.clone()).await?;
    let session = state.sessions.on_camera_updated(&camera_id).await?;

    state.realtime.broadcast(
        &camera.site_id,
        &HubMessage::update("camera", serde_json::to_value(&camera)?),
    );
    if let Some(previous) = previous.filter(|p| p.site_id != camera.site_id) {
        state.realtime.broadcast(
            &previous.site_id,
            &HubMessage::delete("camera", json!({ "cameraId": camera_id })),
        );
    }

    Ok(Json(ApiResponse::success(json!({
        "camera": camera,
        "session": session,
    }))))
}

async fn delete_camera(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let camera = state.catalog.remove(&camera_id).await?;
    state.sessions.on_camera_deleted(&camera_id).await;

    state.realtime.broadcast(
        &camera.site_id,
        &HubMessage::delete("camera", json!({ "cameraId": camera_id })),
    );

    Ok(Json(ApiResponse::success(camera)))
}

// ========================================
// Workflows
// ========================================

async fn validate_workflow(
    State(state): State<AppState>,
    Json(definition): Json<WorkflowDefinition>,
) -> Result<impl IntoResponse, Error> {
    state.workflows.validate(&definition)?;
    Ok(Json(ApiResponse::success(json!({ "valid": true }))))
}

async fn compile_workflow(
    State(state): State<AppState>,
    Json(definition): Json<WorkflowDefinition>,
) -> Result<impl IntoResponse, Error> {
    let order = state.workflows.compile(&definition)?;
    Ok(Json(ApiResponse::success(CompileResponse { order })))
}

/// Runs on a blocking thread; the deadline abandons the wait, not the thread
async fn execute_workflow(
    State(state): State<AppState>,
    Json(req): Json<ExecuteWorkflowRequest>,
) -> Result<impl IntoResponse, Error> {
    let engine = Arc::clone(&state.workflows);
    let timeout = state.config.workflow_timeout();

    let task = tokio::task::spawn_blocking(move || engine.execute(&req.workflow, &req.inputs));

    let result = tokio::time::timeout(timeout, task)
        .await
        .map_err(|_| {
            Error::Timeout(format!("workflow did not finish within {}s", timeout.as_secs()))
        })?
        .map_err(|e| Error::Internal(format!("workflow task failed: {}", e)))??;

    Ok(Json(ApiResponse::success(result)))
}

// ========================================
// WebSocket
// ========================================

async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(channel): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, channel, state))
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, channel: String, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut rx) = state.realtime.connect(&channel);

    tracing::info!(connection_id = %conn_id, channel = %channel, "WebSocket client connected");

    // Forward hub messages to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are only watched for close/errors
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Ping(data)) => {
                    tracing::trace!("Received ping: {:?}", data);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(connection_id = %conn_id, "WebSocket client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::warn!(connection_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.realtime.disconnect(&conn_id, &channel);
}
