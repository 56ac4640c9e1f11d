//! `GET /state`: read-only view of the persisted worker state.

use axum::Json;
use axum::extract::State;

use super::{ApiError, AppState};
use crate::persistence::WorkerState;
use crate::worker::EventHandler;

pub async fn state_handler<H: EventHandler>(
    State(app_state): State<AppState<H>>,
) -> Result<Json<WorkerState>, ApiError> {
    app_state
        .store()
        .try_load()?
        .map(Json)
        .ok_or(ApiError::StateNotFound)
}
