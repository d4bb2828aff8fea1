use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use hooksink_core::ProjectId;
use hooksink_events::{EventBus, InboundMessage, Subscription, TenantScoped};

use crate::credentials::StoreFactory;
use crate::ingest::IngestionClient;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Thread name, also used in logs.
    pub name: String,
    /// How long to block on the subscription before checking for shutdown.
    pub tick: Duration,
    /// When set, messages for other projects are ignored.
    pub project_id: Option<ProjectId>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "hooksink-ingest".to_string(),
            tick: Duration::from_millis(250),
            project_id: None,
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rows_failed: u64,
    pub ignored: u64,
}

/// Handle to control and join a running ingestion worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    ///
    /// The message in flight is finished; anything still queued is left unprocessed.
    pub fn shutdown(mut self) -> WorkerStats {
        let _ = self.shutdown.send(());
        self.wait()
    }

    /// Wait for the worker to drain its subscription and exit after the bus closes.
    pub fn join(mut self) -> WorkerStats {
        self.wait()
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn wait(&mut self) -> WorkerStats {
        if let Some(j) = self.join.take() {
            if let Err(panic) = j.join() {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                error!(%detail, "ingestion worker panicked");
            }
        }
        self.stats()
    }
}

/// Consumes inbound messages from a bus and feeds them to an [`IngestionClient`].
///
/// - One message at a time, end-to-end, on a dedicated thread
/// - Failures are logged and counted; they never stop the loop
/// - Exits on shutdown request or once the bus is closed and drained
#[derive(Debug)]
pub struct IngestionWorker;

impl IngestionWorker {
    pub fn spawn<B, F>(config: WorkerConfig, bus: B, client: Arc<IngestionClient<F>>) -> WorkerHandle
    where
        B: EventBus<InboundMessage> + 'static,
        F: StoreFactory + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();
        let stats = Arc::new(Mutex::new(WorkerStats::default()));
        let stats_clone = stats.clone();

        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || worker_loop(config, sub, shutdown_rx, &client, &stats_clone))
            .expect("failed to spawn ingestion worker thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        }
    }
}

fn worker_loop<F: StoreFactory>(
    config: WorkerConfig,
    sub: Subscription<InboundMessage>,
    shutdown_rx: mpsc::Receiver<()>,
    client: &IngestionClient<F>,
    stats: &Mutex<WorkerStats>,
) {
    info!(worker = %config.name, "ingestion worker started");

    loop {
        if shutdown_rx.try_recv().is_ok() {
            info!(worker = %config.name, "ingestion worker shutting down");
            break;
        }

        let message = match sub.recv_timeout(config.tick) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!(worker = %config.name, "bus closed, ingestion worker drained");
                break;
            }
        };

        if let Some(project) = &config.project_id {
            if message.project_id() != project.as_str() {
                debug!(worker = %config.name, project_id = message.project_id(), "ignoring message for other project");
                record(stats, |s| s.ignored += 1);
                continue;
            }
        }

        let kind = message.kind();
        let project_id = message.project_id().to_string();
        match client.ingest(message) {
            Ok(report) => record(stats, |s| {
                s.processed += 1;
                s.succeeded += 1;
                s.rows_failed += report.rows_failed.len() as u64;
            }),
            Err(err) => {
                warn!(
                    worker = %config.name,
                    kind,
                    project_id = %project_id,
                    error = %err,
                    "unable to send device event hook"
                );
                record(stats, |s| {
                    s.processed += 1;
                    s.failed += 1;
                });
            }
        }
    }
}

fn record(stats: &Mutex<WorkerStats>, update: impl FnOnce(&mut WorkerStats)) {
    if let Ok(mut s) = stats.lock() {
        update(&mut s);
    }
}
