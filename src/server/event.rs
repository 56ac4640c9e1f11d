//! `POST /event` and `POST /stop`.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument};

use super::{ApiError, AppState};
use crate::engine::{EventType, WorkerEvent};
use crate::types::{IssueNumber, RepoId};
use crate::worker::{EnqueueResult, EventHandler};

/// Request body of `POST /event`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRequest {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub repo: Option<RepoId>,
    #[serde(default)]
    pub issue_number: Option<IssueNumber>,
    #[serde(default)]
    pub base_branch: Option<String>,
}

/// Configured fallbacks for fields the payload leaves out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDefaults {
    pub repo: Option<RepoId>,
    pub issue_number: Option<IssueNumber>,
    pub base_branch: Option<String>,
}

impl EventDefaults {
    pub fn apply(&self, request: EventRequest) -> WorkerEvent {
        let payload = request.payload;
        WorkerEvent {
            event_type: request.event_type,
            repo: payload.repo.or_else(|| self.repo.clone()),
            issue_number: payload.issue_number.or(self.issue_number),
            base_branch: payload.base_branch.or_else(|| self.base_branch.clone()),
        }
    }
}

#[instrument(skip_all)]
pub async fn event_handler<H: EventHandler>(
    State(app_state): State<AppState<H>>,
    Json(request): Json<EventRequest>,
) -> Result<Json<EnqueueResult>, ApiError> {
    let event = app_state.defaults().apply(request);
    info!(event = %event.event_type, "event received");

    let needs_context = event.repo.is_none() || event.issue_number.is_none();
    if needs_context && !app_state.store().exists() {
        return Err(ApiError::MissingContext);
    }

    let result = app_state.runtime().enqueue(event)?;
    info!(queue_size = result.queue_size, "event accepted");
    Ok(Json(result))
}

/// Cancels the worker token. The consumer exits and the server begins its
/// graceful shutdown, both driven by the same token.
pub async fn stop_handler<H: EventHandler>(State(app_state): State<AppState<H>>) -> Json<Value> {
    info!("stop requested over HTTP");
    app_state.runtime().cancellation_token().cancel();
    Json(json!({ "status": "stopping" }))
}
