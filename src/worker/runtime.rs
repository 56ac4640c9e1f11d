//! Queue plus single consumer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::engine::{EngineerLoop, RunResult, WorkerEvent};
use crate::git::GitOperations;
use crate::github::IssuePlatform;
use crate::provider::Provider;

/// Errors from the runtime itself. Job failures are not errors here; they are
/// logged by the consumer.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker runtime already started")]
    AlreadyStarted,

    #[error("worker queue is closed")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, WorkerError>;

/// Runs one event to completion on a blocking thread.
pub trait EventHandler: Send + Sync + 'static {
    fn handle(&self, event: &WorkerEvent, cancel: &CancellationToken) -> RunResult;
}

impl<P, G, V> EventHandler for EngineerLoop<P, G, V>
where
    P: IssuePlatform + 'static,
    G: GitOperations + 'static,
    V: Provider + 'static,
{
    fn handle(&self, event: &WorkerEvent, cancel: &CancellationToken) -> RunResult {
        self.run(event, cancel)
    }
}

/// Acknowledgement for an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnqueueResult {
    pub queued: bool,
    /// Events waiting, including this one. A running job is not counted.
    pub queue_size: usize,
}

pub struct WorkerRuntime<H> {
    handler: Arc<H>,
    tx: mpsc::UnboundedSender<WorkerEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<WorkerEvent>>>,
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl<H: EventHandler> WorkerRuntime<H> {
    pub fn new(handler: H) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        WorkerRuntime {
            handler: Arc::new(handler),
            tx,
            rx: Mutex::new(Some(rx)),
            pending: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
            consumer: Mutex::new(None),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Token shared with every job; cancelled by [`WorkerRuntime::stop`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn queue_size(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Spawns the consumer. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let rx = self
            .rx
            .lock()
            .map_err(|_| WorkerError::AlreadyStarted)?
            .take()
            .ok_or(WorkerError::AlreadyStarted)?;

        let handle = tokio::spawn(consume(
            self.handler.clone(),
            rx,
            self.pending.clone(),
            self.cancel.clone(),
        ));
        if let Ok(mut slot) = self.consumer.lock() {
            *slot = Some(handle);
        }
        Ok(())
    }

    pub fn enqueue(&self, event: WorkerEvent) -> Result<EnqueueResult> {
        if self.cancel.is_cancelled() {
            return Err(WorkerError::QueueClosed);
        }
        let queue_size = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if self.tx.send(event).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(WorkerError::QueueClosed);
        }
        debug!(queue_size, "event queued");
        Ok(EnqueueResult {
            queued: true,
            queue_size,
        })
    }

    /// Cancels the token and waits for the consumer. A running job finishes at
    /// its next checkpoint; queued events are dropped.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.consumer.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!(error = %e, "worker consumer ended abnormally");
        }
    }
}

#[instrument(skip_all)]
async fn consume<H: EventHandler>(
    handler: Arc<H>,
    mut rx: mpsc::UnboundedReceiver<WorkerEvent>,
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    info!("worker consumer started");
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("stop requested, worker consumer exiting");
                break;
            }
            event = rx.recv() => match event {
                Some(event) => event,
                None => {
                    info!("worker queue closed");
                    break;
                }
            },
        };
        pending.fetch_sub(1, Ordering::SeqCst);
        info!(event = %event.event_type, "job started");

        let job_handler = handler.clone();
        let token = cancel.clone();
        let job = tokio::task::spawn_blocking(move || job_handler.handle(&event, &token));
        match job.await {
            Ok(result) if result.success => info!(message = %result.message, "job succeeded"),
            Ok(result) => warn!(message = %result.message, "job failed"),
            Err(e) => error!(error = %e, "job panicked"),
        }
    }
    info!("worker consumer stopped");
}
