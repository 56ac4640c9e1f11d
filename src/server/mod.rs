//! HTTP surface of the worker.
//!
//! # Endpoints
//!
//! - `GET /health` - liveness probe
//! - `POST /event` - queue a run; returns `{"queued":true,"queue_size":N}`
//! - `POST /stop` - cancel the worker and shut the server down
//! - `GET /state` - the persisted worker state, 404 before the first run

use std::sync::Arc;

pub mod error;
pub mod event;
pub mod health;
pub mod state;

pub use error::ApiError;
pub use event::{EventDefaults, EventPayload, EventRequest, event_handler, stop_handler};
pub use health::health_handler;
pub use state::state_handler;

use crate::persistence::StateStore;
use crate::worker::{EventHandler, WorkerRuntime};

/// Shared application state, handed to every handler through axum's `State`
/// extractor.
pub struct AppState<H> {
    inner: Arc<AppStateInner<H>>,
}

struct AppStateInner<H> {
    runtime: Arc<WorkerRuntime<H>>,
    store: StateStore,
    defaults: EventDefaults,
}

impl<H> Clone for AppState<H> {
    fn clone(&self) -> Self {
        AppState {
            inner: self.inner.clone(),
        }
    }
}

impl<H: EventHandler> AppState<H> {
    pub fn new(runtime: Arc<WorkerRuntime<H>>, store: StateStore, defaults: EventDefaults) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                runtime,
                store,
                defaults,
            }),
        }
    }

    pub fn runtime(&self) -> &WorkerRuntime<H> {
        &self.inner.runtime
    }

    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }

    pub fn defaults(&self) -> &EventDefaults {
        &self.inner.defaults
    }
}

pub fn build_router<H: EventHandler>(app_state: AppState<H>) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/health", get(health_handler))
        .route("/event", post(event_handler::<H>))
        .route("/stop", post(stop_handler::<H>))
        .route("/state", get(state_handler::<H>))
        .with_state(app_state)
}
