//! Background execution of queued events.
//!
//! The HTTP layer only enqueues. A single consumer task takes events in FIFO
//! order and runs each one on a blocking thread, so at most one run touches
//! the work root at any time and no locking is needed around the state file
//! or the working tree.
//!
//! Stopping is cooperative: [`WorkerRuntime::stop`] cancels the shared token,
//! the running job notices at its next checkpoint, and the consumer exits
//! without starting anything else.

mod runtime;


pub use runtime::{EnqueueResult, EventHandler, Result, WorkerError, WorkerRuntime};
