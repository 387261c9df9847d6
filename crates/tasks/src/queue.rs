//! Producer side of the deferred-task channel.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};

use tokio::sync::oneshot;
use tracing::warn;

/// Work item body. Arguments are captured by the closure.
pub type TaskFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// A named unit of work to run after the current invocation's response.
pub struct DeferredTask {
    name: String,
    work: TaskFn,
}

impl DeferredTask {
    pub fn new<F>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            work: Box::new(work),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn into_parts(self) -> (String, TaskFn) {
        (self.name, self.work)
    }
}

impl fmt::Debug for DeferredTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredTask")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Everything the worker can receive.
///
/// `Run` and `Done` come from request handlers; `Invoke` comes from the
/// invocation listener and carries the acknowledgement the listener waits on
/// before asking the platform for the next invocation.
pub(crate) enum Message {
    Run(DeferredTask),
    Done,
    Invoke {
        request_id: Option<String>,
        ack: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Cloneable handle used by request handlers to defer work.
///
/// Both operations are plain sends on an unbounded channel: they never block
/// and never report failure to the caller.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<Message>,
    pending: Arc<AtomicUsize>,
}

impl TaskQueue {
    pub(crate) fn new(tx: mpsc::Sender<Message>, pending: Arc<AtomicUsize>) -> Self {
        Self { tx, pending }
    }

    /// Queue `work` to run once the current invocation is marked done.
    pub fn enqueue<F>(&self, name: impl Into<String>, work: F)
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.push(DeferredTask::new(name, work));
    }

    /// Queue an already-built task.
    pub fn push(&self, task: DeferredTask) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::SendError(message)) = self.tx.send(Message::Run(task)) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            if let Message::Run(task) = message {
                warn!(task = %task.name(), "deferred task dropped: worker is not running");
            }
        }
    }

    /// Mark the end of the work deferred by the current request.
    pub fn mark_done(&self) {
        if self.tx.send(Message::Done).is_err() {
            warn!("done marker dropped: worker is not running");
        }
    }

    /// Number of tasks queued but not yet started.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn enqueue_never_blocks_without_a_consumer() {
        let (tx, rx) = mpsc::channel();
        let queue = TaskQueue::new(tx, Arc::new(AtomicUsize::new(0)));

        for i in 0..10_000 {
            queue.enqueue(format!("task-{i}"), || Ok(()));
        }
        queue.mark_done();

        assert_eq!(queue.pending(), 10_000);
        assert_eq!(rx.try_iter().count(), 10_001);
    }

    #[test]
    fn enqueue_after_worker_gone_is_dropped_quietly() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let queue = TaskQueue::new(tx, Arc::new(AtomicUsize::new(0)));

        queue.enqueue("orphan", || Ok(()));
        queue.mark_done();

        assert_eq!(queue.pending(), 0);
    }

    proptest! {
        #[test]
        fn channel_preserves_interleaving_of_tasks_and_markers(
            ops in proptest::collection::vec(any::<bool>(), 0..64)
        ) {
            let (tx, rx) = mpsc::channel();
            let queue = TaskQueue::new(tx, Arc::new(AtomicUsize::new(0)));

            // true = enqueue, false = mark_done
            for (i, enqueue) in ops.iter().enumerate() {
                if *enqueue {
                    queue.enqueue(format!("task-{i}"), || Ok(()));
                } else {
                    queue.mark_done();
                }
            }

            let seen: Vec<Option<String>> = rx
                .try_iter()
                .map(|m| match m {
                    Message::Run(task) => Some(task.name().to_string()),
                    _ => None,
                })
                .collect();
            let expected: Vec<Option<String>> = ops
                .iter()
                .enumerate()
                .map(|(i, enqueue)| enqueue.then(|| format!("task-{i}")))
                .collect();

            prop_assert_eq!(seen, expected);
            prop_assert_eq!(queue.pending(), ops.iter().filter(|e| **e).count());
        }
    }
}
