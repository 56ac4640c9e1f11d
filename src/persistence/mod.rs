//! Persistence layer for the engineer bot.
//!
//! One worker owns one work root and, inside it, exactly one state file. There
//! is no database and no locking: the worker runtime guarantees a single run
//! at a time, and every write is an atomic file replacement.
//!
//! # Modules
//!
//! - [`atomic`]: temp-file + fsync + rename JSON writes
//! - [`paths`]: the work root layout
//! - [`state`]: `WorkerState` and its store
//! - [`result`]: best-effort result snapshot written after each run

pub mod atomic;
pub mod paths;
pub mod result;
pub mod state;

pub use atomic::{fsync_dir, write_json_atomic};
pub use paths::WorkPaths;
pub use result::{RunResultSnapshot, write_result_snapshot};
pub use state::{RunStatus, StateError, StateStore, WorkerState};
