//! Deferred task runner: one listener, one worker thread.
//!
//! The listener waits for invocation signals and forwards them to the worker.
//! The worker collects the deferred work of the invocation up to its done
//! marker, runs it in FIFO order, then acknowledges. Only after the ack does
//! the listener ask for the next invocation.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::queue::{DeferredTask, Message, TaskQueue};
use crate::source::{InvocationEvent, InvocationSource};

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Name for logging and the worker thread.
    pub name: String,
    /// Delay before asking the source again after a retryable failure.
    pub retry_backoff: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            name: "deferred-tasks".to_string(),
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl RunnerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

/// Runner statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunnerStats {
    pub invocations_completed: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub pending: usize,
}

/// Entry point for starting the runner.
pub struct TaskRunner;

impl TaskRunner {
    /// Start the listener task and the worker thread.
    ///
    /// Must be called from within a tokio runtime. The returned queue is what
    /// request handlers use; the handle owns the runner's lifetime.
    pub fn start<S>(source: S, config: RunnerConfig) -> std::io::Result<(TaskQueue, TaskRunnerHandle)>
    where
        S: InvocationSource,
    {
        let (tx, rx) = mpsc::channel::<Message>();
        let pending = Arc::new(AtomicUsize::new(0));
        let stats = Arc::new(Mutex::new(RunnerStats::default()));

        let worker = Worker {
            name: config.name.clone(),
            rx,
            backlog: VecDeque::new(),
            invoked: false,
            pending: pending.clone(),
            stats: stats.clone(),
        };
        let worker = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || worker.run())?;

        let listener = tokio::spawn(listen(source, tx.clone(), config));

        let queue = TaskQueue::new(tx.clone(), pending.clone());
        let handle = TaskRunnerHandle {
            control: tx,
            listener,
            worker: Some(worker),
            pending,
            stats,
        };
        Ok((queue, handle))
    }
}

/// Owns the running listener and worker.
#[derive(Debug)]
pub struct TaskRunnerHandle {
    control: mpsc::Sender<Message>,
    listener: JoinHandle<()>,
    worker: Option<thread::JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
    stats: Arc<Mutex<RunnerStats>>,
}

impl TaskRunnerHandle {
    /// Current statistics snapshot.
    pub fn stats(&self) -> RunnerStats {
        let mut snapshot = self
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        snapshot.pending = self.pending.load(Ordering::SeqCst);
        snapshot
    }

    /// Shared statistics, for exposing them outside the owner of the handle.
    pub fn stats_probe(&self) -> StatsProbe {
        StatsProbe {
            pending: self.pending.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Stop listening for invocations, run whatever is still queued, and wait
    /// for the worker thread to exit.
    pub async fn shutdown(mut self) {
        let _ = self.control.send(Message::Shutdown);
        self.listener.abort();
        if let Some(worker) = self.worker.take() {
            let joined = tokio::task::spawn_blocking(move || worker.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                error!("deferred task worker did not exit cleanly");
            }
        }
    }
}

/// Read-only view of runner statistics.
#[derive(Debug, Clone)]
pub struct StatsProbe {
    pending: Arc<AtomicUsize>,
    stats: Arc<Mutex<RunnerStats>>,
}

impl StatsProbe {
    pub fn snapshot(&self) -> RunnerStats {
        let mut snapshot = self
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        snapshot.pending = self.pending.load(Ordering::SeqCst);
        snapshot
    }
}

async fn listen<S: InvocationSource>(
    mut source: S,
    tx: mpsc::Sender<Message>,
    config: RunnerConfig,
) {
    loop {
        match source.next_invocation().await {
            Ok(InvocationEvent::Invoke { request_id, .. }) => {
                let (ack_tx, ack_rx) = oneshot::channel();
                let message = Message::Invoke {
                    request_id,
                    ack: ack_tx,
                };
                if tx.send(message).is_err() || ack_rx.await.is_err() {
                    break; // Worker gone
                }
            }
            Ok(InvocationEvent::Shutdown {
                shutdown_reason, ..
            }) => {
                info!(runner = %config.name, reason = ?shutdown_reason, "platform shutdown received");
                let _ = tx.send(Message::Shutdown);
                break;
            }
            Err(e) if !e.is_retryable() => {
                info!(runner = %config.name, reason = %e, "invocation source stopped");
                let _ = tx.send(Message::Shutdown);
                break;
            }
            Err(e) => {
                warn!(runner = %config.name, error = %e, "failed to wait for next invocation");
                tokio::time::sleep(config.retry_backoff).await;
            }
        }
    }
}

enum Queued {
    Run(DeferredTask),
    Done,
}

struct Worker {
    name: String,
    rx: mpsc::Receiver<Message>,
    /// Work that arrived before its invocation started.
    backlog: VecDeque<Queued>,
    /// Whether any invocation has started yet.
    invoked: bool,
    pending: Arc<AtomicUsize>,
    stats: Arc<Mutex<RunnerStats>>,
}

impl Worker {
    fn run(mut self) {
        info!(runner = %self.name, "deferred task worker started");

        loop {
            match self.rx.recv() {
                Ok(Message::Run(task)) => self.backlog.push_back(Queued::Run(task)),
                Ok(Message::Done) => self.accept_done(),
                Ok(Message::Invoke { request_id, ack }) => {
                    self.invoked = true;
                    let completed = self.serve_invocation(request_id.as_deref());
                    let _ = ack.send(());
                    if !completed {
                        break;
                    }
                }
                Ok(Message::Shutdown) | Err(_) => break,
            }
        }

        self.drain_on_shutdown();
        info!(runner = %self.name, "deferred task worker stopped");
    }

    /// Queue a done marker received while idle.
    ///
    /// Requests served during init (the adapter's readiness check) are not
    /// part of any invocation. Their markers would close the first
    /// invocation's batch before its own work arrives, so a marker seen before
    /// the first invocation is dropped unless it closes work already queued.
    fn accept_done(&mut self) {
        let closes_work = matches!(self.backlog.back(), Some(Queued::Run(_)));
        if self.invoked || closes_work {
            self.backlog.push_back(Queued::Done);
        } else {
            debug!(runner = %self.name, "dropping done marker from before the first invocation");
        }
    }

    /// Collect the invocation's batch up to its done marker, then run it.
    ///
    /// Returns false when a stop was requested before the marker arrived; the
    /// collected work is put back for the shutdown drain.
    fn serve_invocation(&mut self, request_id: Option<&str>) -> bool {
        let started = Instant::now();
        let mut batch = Vec::new();

        loop {
            let item = match self.backlog.pop_front() {
                Some(item) => item,
                None => match self.rx.recv() {
                    Ok(Message::Run(task)) => Queued::Run(task),
                    Ok(Message::Done) => Queued::Done,
                    Ok(Message::Invoke { ack, .. }) => {
                        // The listener waits for our ack, so this only
                        // happens if someone else holds the control sender.
                        let _ = ack.send(());
                        continue;
                    }
                    Ok(Message::Shutdown) | Err(_) => {
                        for task in batch.into_iter().rev() {
                            self.backlog.push_front(Queued::Run(task));
                        }
                        return false;
                    }
                },
            };

            match item {
                Queued::Run(task) => batch.push(task),
                Queued::Done => break,
            }
        }

        let count = batch.len();
        for task in batch {
            self.execute(task);
        }

        self.with_stats(|s| s.invocations_completed += 1);
        if count > 0 {
            info!(
                runner = %self.name,
                request_id = request_id.unwrap_or("-"),
                tasks = count,
                duration_ms = started.elapsed().as_millis() as u64,
                "deferred tasks finished"
            );
        }
        true
    }

    fn drain_on_shutdown(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            match message {
                Message::Run(task) => self.backlog.push_back(Queued::Run(task)),
                Message::Invoke { ack, .. } => {
                    let _ = ack.send(());
                }
                Message::Done | Message::Shutdown => {}
            }
        }

        let remaining: Vec<DeferredTask> = self
            .backlog
            .drain(..)
            .filter_map(|item| match item {
                Queued::Run(task) => Some(task),
                Queued::Done => None,
            })
            .collect();

        if !remaining.is_empty() {
            info!(runner = %self.name, tasks = remaining.len(), "running queued tasks before exit");
        }
        for task in remaining {
            self.execute(task);
        }
    }

    /// Run one task, isolating errors and panics from the rest of the queue.
    fn execute(&self, task: DeferredTask) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        let (name, work) = task.into_parts();
        let started = Instant::now();

        match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(())) => {
                debug!(
                    runner = %self.name,
                    task = %name,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "deferred task completed"
                );
                self.with_stats(|s| s.tasks_succeeded += 1);
            }
            Ok(Err(e)) => {
                error!(runner = %self.name, task = %name, error = %format!("{e:#}"), "deferred task failed");
                self.with_stats(|s| s.tasks_failed += 1);
            }
            Err(payload) => {
                error!(
                    runner = %self.name,
                    task = %name,
                    panic = %panic_message(payload.as_ref()),
                    "deferred task panicked"
                );
                self.with_stats(|s| s.tasks_failed += 1);
            }
        }
    }

    fn with_stats(&self, f: impl FnOnce(&mut RunnerStats)) {
        let mut stats = self
            .stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut stats);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
