//! Bounded-concurrency processing queue
//!
//! A FIFO of accepted files serviced by a fixed pool of worker tasks. Each
//! worker pulls one file at a time, runs the analysis pipeline on the
//! blocking pool, publishes the outcome, and goes back for more. When the
//! last running task finishes and nothing is waiting, the batch is drained
//! and a single `processing-complete` is published.

use crate::error::IngestError;
use crate::publisher::EventPublisher;
use crate::types::{FileHandle, TaskId};
use chrono::{DateTime, Utc};
use midi_analysis::AnalysisResult;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The CPU-bound step a worker runs for each file. Called on the blocking pool.
pub trait TaskProcessor: Send + Sync + 'static {
    fn process(&self, file: &FileHandle) -> Result<AnalysisResult, IngestError>;
}

impl<F> TaskProcessor for F
where
    F: Fn(&FileHandle) -> Result<AnalysisResult, IngestError> + Send + Sync + 'static,
{
    fn process(&self, file: &FileHandle) -> Result<AnalysisResult, IngestError> {
        self(file)
    }
}

/// Reads the stored bytes and runs decode, extract, and segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct MidiFileProcessor;

impl TaskProcessor for MidiFileProcessor {
    fn process(&self, file: &FileHandle) -> Result<AnalysisResult, IngestError> {
        let bytes = std::fs::read(&file.path).map_err(|source| IngestError::Io {
            path: file.path.clone(),
            source,
        })?;
        Ok(midi_analysis::analyze(&bytes)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { workers: 2 }
    }
}

impl From<&ingestconf::QueueSettings> for QueueConfig {
    fn from(settings: &ingestconf::QueueSettings) -> Self {
        Self {
            workers: settings.workers,
        }
    }
}

/// Terminal state of one task.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Succeeded(Arc<AnalysisResult>),
    Failed(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Returned by `enqueue`; resolves once the task has been published.
#[derive(Debug)]
pub struct TaskHandle {
    pub id: TaskId,
    pub enqueued_at: DateTime<Utc>,
    rx: oneshot::Receiver<TaskOutcome>,
}

impl TaskHandle {
    pub async fn outcome(self) -> TaskOutcome {
        self.rx
            .await
            .unwrap_or_else(|_| TaskOutcome::Failed("task dropped before completion".to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub running: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub batches_drained: u64,
}

struct QueuedTask {
    id: TaskId,
    file: FileHandle,
    enqueued_at: DateTime<Utc>,
    reply: oneshot::Sender<TaskOutcome>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedTask>,
    running: usize,
    succeeded: u64,
    failed: u64,
    batches_drained: u64,
}

struct Shared {
    state: Mutex<QueueState>,
    work_ready: Notify,
    processor: Arc<dyn TaskProcessor>,
    publisher: EventPublisher,
    shutdown: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a running queue. Cheap to clone.
#[derive(Clone)]
pub struct ProcessingQueue {
    shared: Arc<Shared>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ProcessingQueue {
    /// Spawn the worker pool. Must be called inside a tokio runtime.
    pub fn start(
        config: QueueConfig,
        processor: Arc<dyn TaskProcessor>,
        publisher: EventPublisher,
    ) -> Self {
        let workers = if config.workers == 0 {
            tracing::warn!("Queue configured with 0 workers, using 1");
            1
        } else {
            config.workers
        };

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            work_ready: Notify::new(),
            processor,
            publisher,
            shutdown: CancellationToken::new(),
        });

        let handles = (0..workers)
            .map(|n| tokio::spawn(worker_loop(n, shared.clone())))
            .collect();

        tracing::info!(queue.workers = workers, "Processing queue started");

        Self {
            shared,
            workers: Arc::new(Mutex::new(handles)),
        }
    }

    /// Queue one file. Never blocks on processing.
    pub fn enqueue(&self, file: FileHandle) -> TaskHandle {
        self.enqueue_batch(vec![file]).remove(0)
    }

    /// Queue several files atomically: no worker can observe a partial batch,
    /// so the batch cannot drain before its last file has been queued.
    pub fn enqueue_batch(&self, files: Vec<FileHandle>) -> Vec<TaskHandle> {
        let mut handles = Vec::with_capacity(files.len());

        // Shutdown is checked under the same lock workers use to decide to
        // exit, so a file is either queued for a live worker or rejected here.
        let rejected = {
            let mut state = self.shared.lock();
            if self.shared.shutdown.is_cancelled() {
                files
            } else {
                for file in files {
                    let (tx, rx) = oneshot::channel();
                    let id = TaskId::new();
                    let enqueued_at = Utc::now();

                    tracing::info!(
                        task.id = %id,
                        task.file = %file.name,
                        task.size = file.size,
                        queue.depth = state.pending.len() + 1,
                        "Task queued"
                    );

                    state.pending.push_back(QueuedTask {
                        id: id.clone(),
                        file,
                        enqueued_at,
                        reply: tx,
                    });
                    handles.push(TaskHandle { id, enqueued_at, rx });
                }
                Vec::new()
            }
        };

        if !handles.is_empty() {
            self.shared.work_ready.notify_one();
        }

        for file in rejected {
            let (tx, rx) = oneshot::channel();
            let message = "processing queue is shut down".to_string();
            tracing::warn!(task.file = %file.name, "Rejected after shutdown");
            self.shared.publisher.emit_failure(&file.name, &message);
            let _ = tx.send(TaskOutcome::Failed(message));
            handles.push(TaskHandle {
                id: TaskId::new(),
                enqueued_at: Utc::now(),
                rx,
            });
        }

        handles
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.lock();
        QueueStats {
            queued: state.pending.len(),
            running: state.running,
            succeeded: state.succeeded,
            failed: state.failed,
            batches_drained: state.batches_drained,
        }
    }

    /// Let workers finish what is queued, then stop them.
    pub async fn shutdown(&self) {
        {
            let _state = self.shared.lock();
            self.shared.shutdown.cancel();
        }
        self.shared.work_ready.notify_waiters();

        let handles: Vec<_> = {
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            workers.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker exited abnormally");
            }
        }

        tracing::info!("Processing queue stopped");
    }
}

enum Next {
    Run(QueuedTask),
    Wait,
    Exit,
}

async fn worker_loop(worker: usize, shared: Arc<Shared>) {
    tracing::debug!(queue.worker = worker, "Worker started");

    loop {
        let next = {
            let mut state = shared.lock();
            match state.pending.pop_front() {
                Some(task) => {
                    state.running += 1;
                    if !state.pending.is_empty() {
                        // Wake an idle peer for the rest of the backlog.
                        shared.work_ready.notify_one();
                    }
                    Next::Run(task)
                }
                None if shared.shutdown.is_cancelled() => Next::Exit,
                None => Next::Wait,
            }
        };

        match next {
            Next::Run(task) => run_task(worker, &shared, task).await,
            Next::Exit => break,
            Next::Wait => {
                tokio::select! {
                    _ = shared.work_ready.notified() => {}
                    _ = shared.shutdown.cancelled() => {}
                }
            }
        }
    }

    tracing::debug!(queue.worker = worker, "Worker stopped");
}

async fn run_task(worker: usize, shared: &Shared, task: QueuedTask) {
    let QueuedTask {
        id,
        file,
        enqueued_at,
        reply,
    } = task;

    let waited_ms = (Utc::now() - enqueued_at).num_milliseconds();
    tracing::info!(
        task.id = %id,
        task.file = %file.name,
        queue.worker = worker,
        task.waited_ms = waited_ms,
        "Task started"
    );

    let processor = shared.processor.clone();
    let input = file.clone();
    let result = match tokio::task::spawn_blocking(move || processor.process(&input)).await {
        Ok(result) => result,
        Err(e) => Err(IngestError::Panicked(join_error_message(e))),
    };

    let outcome = match result {
        Ok(analysis) => {
            tracing::info!(
                task.id = %id,
                task.file = %file.name,
                analysis.tempos = analysis.tempos.len(),
                analysis.notes = analysis.structure.len(),
                analysis.sections = analysis.sections.len(),
                "Task succeeded"
            );
            shared.publisher.emit_success(&file.name, &analysis);
            TaskOutcome::Succeeded(Arc::new(analysis))
        }
        Err(e) => {
            let message = e.to_string();
            tracing::error!(
                task.id = %id,
                task.file = %file.name,
                task.error = %message,
                "Task failed"
            );
            shared.publisher.emit_failure(&file.name, &message);
            TaskOutcome::Failed(message)
        }
    };

    {
        let mut state = shared.lock();
        state.running -= 1;
        if outcome.is_success() {
            state.succeeded += 1;
        } else {
            state.failed += 1;
        }

        // Published under the lock so nothing from the next batch can slip in ahead of it.
        if state.pending.is_empty() && state.running == 0 {
            state.batches_drained += 1;
            shared.publisher.emit_drain();
        }
    }

    let _ = reply.send(outcome);
}

fn join_error_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let panic = err.into_panic();
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
