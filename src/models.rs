//! Shared API models
//!
//! Response types used by more than one route

use crate::worker_pool::PoolStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
    pub cameras: usize,
    pub active_sessions: usize,
    pub workers: PoolStatus,
    pub realtime_channels: usize,
}

/// Body of POST /api/workflows/execute
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteWorkflowRequest {
    pub workflow: crate::workflow::WorkflowDefinition,
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

/// Compiled execution order
#[derive(Debug, Clone, Serialize)]
pub struct CompileResponse {
    pub order: Vec<String>,
}
