//! The worker pool that drives the dispatcher.
//!
//! ```text
//!  sources ──► intake (mpsc) ──► router ──┬─► worker 0 ──► Dispatcher
//!                                         ├─► worker 1 ──► Dispatcher
//!                                         └─► worker N-1
//! ```
//!
//! The router sends every update of a chat to the same worker
//! (`hash(chat_id) % workers`), and each worker handles its queue one update
//! at a time, so updates of one chat are processed in arrival order while
//! different chats proceed independently. Updates without a chat are spread
//! round-robin.
//!
//! Shutdown cancels the shared [`CancellationToken`] (update sources watch
//! it), closes intake, lets the workers drain what was already queued and
//! waits up to the configured timeout before aborting stragglers. The
//! transport is closed last.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use gavel_core::{ChatId, Update};
use gavel_framework::Dispatcher;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::DispatchConfig;
use crate::error::{RuntimeError, RuntimeResult};

/// Sizing of the worker pool.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub workers: usize,
    pub queue_capacity: usize,
    pub shutdown_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

impl From<&DispatchConfig> for PoolOptions {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

/// What happened during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Every queued update was handled before the timeout.
    pub drained: bool,
    /// Tasks aborted after the timeout.
    pub aborted: usize,
}

/// A running worker pool.
pub struct GavelRuntime {
    dispatcher: Arc<Dispatcher>,
    intake: mpsc::Sender<Update>,
    token: CancellationToken,
    shutdown_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl GavelRuntime {
    /// Spawns the router and `options.workers` workers.
    pub fn start(dispatcher: Arc<Dispatcher>, options: PoolOptions) -> RuntimeResult<Self> {
        if options.workers == 0 {
            return Err(RuntimeError::InvalidPool("at least one worker is required"));
        }
        if options.queue_capacity == 0 {
            return Err(RuntimeError::InvalidPool("queue capacity must be positive"));
        }

        let token = CancellationToken::new();
        let (intake, intake_rx) = mpsc::channel(options.queue_capacity);

        let mut queues = Vec::with_capacity(options.workers);
        let mut tasks = Vec::with_capacity(options.workers + 1);
        for index in 0..options.workers {
            let (tx, rx) = mpsc::channel(options.queue_capacity);
            queues.push(tx);
            tasks.push(tokio::spawn(worker(index, dispatcher.clone(), rx)));
        }
        tasks.push(tokio::spawn(route(intake_rx, queues, token.clone())));

        info!(
            workers = options.workers,
            queue_capacity = options.queue_capacity,
            "Worker pool started"
        );

        Ok(Self {
            dispatcher,
            intake,
            token,
            shutdown_timeout: options.shutdown_timeout,
            tasks,
        })
    }

    /// Sender for update sources.
    pub fn intake(&self) -> mpsc::Sender<Update> {
        self.intake.clone()
    }

    /// Cancelled when shutdown begins; update sources stop on it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Runs until Ctrl+C or SIGTERM, then shuts down.
    pub async fn run_until_signal(self) -> ShutdownReport {
        wait_for_shutdown().await;
        self.shutdown().await
    }

    /// Stops intake, drains the queues and closes the transport.
    pub async fn shutdown(self) -> ShutdownReport {
        info!("Shutting down worker pool");
        self.token.cancel();
        drop(self.intake);

        let abort_handles: Vec<AbortHandle> =
            self.tasks.iter().map(JoinHandle::abort_handle).collect();

        let drained = match tokio::time::timeout(self.shutdown_timeout, join_all(self.tasks)).await
        {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!(error = %e, "Worker task failed");
                    }
                }
                true
            }
            Err(_) => false,
        };

        let mut aborted = 0;
        if !drained {
            for handle in abort_handles.iter().filter(|handle| !handle.is_finished()) {
                handle.abort();
                aborted += 1;
            }
            warn!(
                aborted,
                timeout = ?self.shutdown_timeout,
                "Shutdown timed out, aborted in-flight work"
            );
        }

        self.dispatcher.transport().close().await;
        info!("Worker pool stopped");
        ShutdownReport { drained, aborted }
    }
}

/// Picks the worker for a chat.
pub fn worker_for(chat_id: ChatId, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    chat_id.hash(&mut hasher);
    (hasher.finish() % workers.max(1) as u64) as usize
}

struct Router {
    queues: Vec<mpsc::Sender<Update>>,
    next: usize,
}

impl Router {
    async fn forward(&mut self, update: Update) {
        let index = match update.chat_id() {
            Some(chat_id) => worker_for(chat_id, self.queues.len()),
            None => {
                self.next = (self.next + 1) % self.queues.len();
                self.next
            }
        };
        if self.queues[index].send(update).await.is_err() {
            warn!(worker = index, "Worker queue closed, dropping update");
        }
    }
}

async fn route(
    mut intake: mpsc::Receiver<Update>,
    queues: Vec<mpsc::Sender<Update>>,
    token: CancellationToken,
) {
    let mut router = Router { queues, next: 0 };

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            update = intake.recv() => match update {
                Some(update) => router.forward(update).await,
                None => break,
            },
        }
    }

    // Accept nothing new, but hand over what is already buffered.
    intake.close();
    while let Some(update) = intake.recv().await {
        router.forward(update).await;
    }
    debug!("Router stopped");
}

async fn worker(index: usize, dispatcher: Arc<Dispatcher>, mut queue: mpsc::Receiver<Update>) {
    while let Some(update) = queue.recv().await {
        let outcome = dispatcher.dispatch(update).await;
        debug!(worker = index, ?outcome, "Update processed");
    }
    debug!(worker = index, "Worker stopped");
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}
