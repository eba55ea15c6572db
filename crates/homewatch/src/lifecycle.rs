//! Stop signalling and task joining for the capture loops.
//!
//! Every long-running loop gets a clone of one [`StopSignal`] and is spawned
//! into a [`TaskSet`]. Shutdown raises the signal and then joins the set
//! with a bounded timeout; a task that fails to finish in time is reported
//! and abandoned.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// The kind of background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Turns key presses into words and logs them.
    Keywords,

    /// Takes periodic screenshots.
    Screenshots,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keywords => write!(f, "keywords"),
            Self::Screenshots => write!(f, "screenshots"),
        }
    }
}

/// A cloneable, cooperative stop signal.
///
/// All clones observe the same signal. Loops either poll
/// [`StopSignal::is_stopped`] or await [`StopSignal::stopped`] inside a
/// `select!`.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Create a new, unraised stop signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    /// Raise the signal.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Check if the signal has been raised.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal is raised.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of self, so this only
        // returns early if the signal is already raised.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for `duration`, waking early if the signal is raised.
    ///
    /// Returns `true` if the signal was raised.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.stopped() => true,
            () = tokio::time::sleep(duration) => self.is_stopped(),
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of joining one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The task finished.
    Finished,
    /// The task panicked or was cancelled.
    Failed(String),
    /// The task did not finish before the deadline.
    TimedOut,
}

/// The spawned capture tasks, joined together at shutdown.
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: Vec<(TaskKind, JoinHandle<()>)>,
}

impl TaskSet {
    /// Create an empty task set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a spawned task.
    pub fn add(&mut self, kind: TaskKind, handle: JoinHandle<()>) {
        self.tasks.push((kind, handle));
    }

    /// Number of tracked tasks.
    #[must_use]
    pub fn count(&self) -> usize {
        self.tasks.len()
    }

    /// Whether a task of `kind` is tracked and has not finished.
    #[must_use]
    pub fn is_running(&self, kind: TaskKind) -> bool {
        self.tasks
            .iter()
            .any(|(k, handle)| *k == kind && !handle.is_finished())
    }

    /// Check if any tracked task is still running.
    #[must_use]
    pub fn any_running(&self) -> bool {
        self.tasks.iter().any(|(_, handle)| !handle.is_finished())
    }

    /// Join every task, waiting at most `timeout` in total.
    ///
    /// Tasks that miss the deadline are aborted and reported as
    /// [`JoinOutcome::TimedOut`].
    pub async fn join_all(&mut self, timeout: Duration) -> Vec<(TaskKind, JoinOutcome)> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut outcomes = Vec::with_capacity(self.tasks.len());

        for (kind, mut handle) in self.tasks.drain(..) {
            let outcome = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => JoinOutcome::Finished,
                Ok(Err(e)) => JoinOutcome::Failed(e.to_string()),
                Err(_) => {
                    handle.abort();
                    JoinOutcome::TimedOut
                }
            };
            match &outcome {
                JoinOutcome::Finished => debug!(task = %kind, "Task finished"),
                JoinOutcome::Failed(e) => warn!(task = %kind, error = %e, "Task failed"),
                JoinOutcome::TimedOut => warn!(task = %kind, "Task did not stop in time"),
            }
            outcomes.push((kind, outcome));
        }

        outcomes
    }
}
