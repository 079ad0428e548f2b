//! Bounded worker pool with optional job tracking
//!
//! [`TrackingExecutor`] runs submitted jobs on the Tokio runtime, at most
//! `max_workers` at a time. Outside a session it is a plain pool: jobs run
//! and their [`JobHandle`]s are only as useful as the caller makes them.
//! Inside a session every handle is also recorded, so the session can be
//! drained and the first failure surfaced.
//!
//! # Lifecycle
//!
//! ```text
//! Created --open_session--> TrackingEnabled --close_session--> Draining --> Closed
//! ```
//!
//! [`TrackingExecutor::scoped`] pairs `open_session` and `close_session` so the
//! drain runs whether or not the body succeeded.
//!
//! # Example
//!
//! ```no_run
//! use evimport_ingest::executor::{ExecutorError, TrackingExecutor};
//!
//! # async fn demo() -> Result<(), ExecutorError> {
//! let executor = TrackingExecutor::<u32>::new(16);
//! executor
//!     .scoped(|session| {
//!         for n in 0..4 {
//!             session.submit(async move { Ok(n * 2) })?;
//!         }
//!         Ok::<_, ExecutorError>(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{FuturesUnordered, Stream, StreamExt};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, trace, warn};

/// Outcome stored in a [`JobHandle`]
pub type JobOutcome<T> = Result<T, JobError>;

/// Why a job did not produce a value
#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("job failed: {0:#}")]
    Failed(Arc<anyhow::Error>),

    #[error("job panicked: {0}")]
    Panicked(String),

    #[error("job was cancelled before it completed")]
    Cancelled,

    #[error("executor shut down before the job could start")]
    Shutdown,
}

/// Misuse of the executor, or a failed session
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Cannot get results from executor without job tracking")]
    TrackingDisabled,

    #[error("Executor is closed and no longer accepts jobs")]
    Closed,

    #[error("Invalid executor transition from {from} to {to}")]
    InvalidTransition {
        from: ExecutorState,
        to: ExecutorState,
    },

    #[error(transparent)]
    JobFailed(#[from] JobError),
}

/// Executor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Created,
    TrackingEnabled,
    Draining,
    Closed,
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorState::Created => write!(f, "created"),
            ExecutorState::TrackingEnabled => write!(f, "tracking"),
            ExecutorState::Draining => write!(f, "draining"),
            ExecutorState::Closed => write!(f, "closed"),
        }
    }
}

/// Handle to the eventual outcome of one submitted job
///
/// Cloning is cheap; every clone resolves to the same outcome.
pub struct JobHandle<T> {
    id: u64,
    inner: Shared<BoxFuture<'static, JobOutcome<T>>>,
}

impl<T: Clone> JobHandle<T> {
    /// The outcome, if some clone of this handle has already observed it
    pub fn peek(&self) -> Option<&JobOutcome<T>> {
        self.inner.peek()
    }
}

impl<T: Clone> Clone for JobHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> Future for JobHandle<T> {
    type Output = JobOutcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<T> fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle").field("id", &self.id).finish()
    }
}

/// Outcomes of the tracked jobs, yielded as they complete
///
/// Finite and single-pass: once exhausted it yields `None` forever.
pub struct CompletedJobs<T> {
    pending: FuturesUnordered<JobHandle<T>>,
}

impl<T: Clone> CompletedJobs<T> {
    /// Jobs not yet yielded
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T: Clone> Stream for CompletedJobs<T> {
    type Item = JobOutcome<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.pending.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pending.len(), Some(self.pending.len()))
    }
}

/// Fixed-size worker pool that can track and drain its jobs
pub struct TrackingExecutor<T> {
    workers: Arc<Semaphore>,
    max_workers: usize,
    state: ExecutorState,
    outstanding: Vec<JobHandle<T>>,
    next_id: u64,
}

impl<T> TrackingExecutor<T>
where
    T: Clone + Send + 'static,
{
    /// Create a pool running at most `max_workers` jobs at once (minimum 1)
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            workers: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            state: ExecutorState::Created,
            outstanding: Vec::new(),
            next_id: 0,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        self.state == ExecutorState::TrackingEnabled
    }

    /// Number of tracked handles not yet drained
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Queue a job for execution
    ///
    /// The job starts once a worker slot is free. An error or panic inside
    /// the job becomes the handle's outcome; it never takes the pool down.
    /// Must be called from within a Tokio runtime.
    pub fn submit<F>(&mut self, job: F) -> Result<JobHandle<T>, ExecutorError>
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        if matches!(self.state, ExecutorState::Draining | ExecutorState::Closed) {
            return Err(ExecutorError::Closed);
        }

        let id = self.next_id;
        self.next_id += 1;

        let workers = Arc::clone(&self.workers);
        let task = tokio::spawn(async move {
            let _slot = workers
                .acquire_owned()
                .await
                .map_err(|_| JobError::Shutdown)?;
            job.await.map_err(|e| JobError::Failed(Arc::new(e)))
        });

        let inner = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => Err(JobError::Panicked(panic_message(e.into_panic()))),
                Err(_) => Err(JobError::Cancelled),
            }
        }
        .boxed()
        .shared();

        let handle = JobHandle { id, inner };
        if self.is_tracking() {
            self.outstanding.push(handle.clone());
        }

        trace!(job = id, tracked = self.is_tracking(), "Submitted job");
        Ok(handle)
    }

    /// Stream of tracked outcomes in completion order
    ///
    /// Fails immediately unless a session is open.
    pub fn results(&self) -> Result<CompletedJobs<T>, ExecutorError> {
        match self.state {
            ExecutorState::TrackingEnabled => Ok(CompletedJobs {
                pending: self.outstanding.iter().cloned().collect(),
            }),
            ExecutorState::Created => Err(ExecutorError::TrackingDisabled),
            ExecutorState::Draining | ExecutorState::Closed => Err(ExecutorError::Closed),
        }
    }

    /// Enable tracking with an empty outstanding list
    pub fn open_session(&mut self) -> Result<(), ExecutorError> {
        if self.state != ExecutorState::Created {
            return Err(ExecutorError::InvalidTransition {
                from: self.state,
                to: ExecutorState::TrackingEnabled,
            });
        }

        self.outstanding.clear();
        self.state = ExecutorState::TrackingEnabled;
        Ok(())
    }

    /// Wait for every tracked job, then shut the pool down
    ///
    /// All handles are resolved before this returns. If any job failed, the
    /// first failure in completion order is returned; later ones are logged.
    pub async fn close_session(&mut self) -> Result<(), ExecutorError> {
        if self.state != ExecutorState::TrackingEnabled {
            return Err(ExecutorError::InvalidTransition {
                from: self.state,
                to: ExecutorState::Draining,
            });
        }

        self.state = ExecutorState::Draining;

        let mut pending: FuturesUnordered<_> =
            std::mem::take(&mut self.outstanding).into_iter().collect();
        let total = pending.len();
        let mut first_failure = None;

        while let Some(outcome) = pending.next().await {
            if let Err(e) = outcome {
                if first_failure.is_none() {
                    first_failure = Some(e);
                } else {
                    warn!(error = %e, "Additional job failure while draining session");
                }
            }
        }

        // Nothing is queued any more; closing only stops stray acquisitions.
        self.workers.close();
        self.state = ExecutorState::Closed;
        debug!(jobs = total, failed = first_failure.is_some(), "Session drained");

        match first_failure {
            Some(e) => Err(ExecutorError::JobFailed(e)),
            None => Ok(()),
        }
    }

    /// Run `body` inside a session and always drain afterwards
    ///
    /// An error from `body` takes precedence over a drain failure, which is
    /// then only logged.
    pub async fn scoped<R, E, F>(mut self, body: F) -> Result<R, E>
    where
        F: FnOnce(&mut Self) -> Result<R, E>,
        E: From<ExecutorError>,
    {
        self.open_session()?;
        let body_result = body(&mut self);
        let drained = self.close_session().await;

        match (body_result, drained) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(drain_err)) => {
                warn!(error = %drain_err, "Session drain failed after body error");
                Err(e)
            },
        }
    }
}

impl<T> Drop for TrackingExecutor<T> {
    fn drop(&mut self) {
        if self.state == ExecutorState::TrackingEnabled {
            // Jobs already holding a slot finish detached; queued ones resolve to Shutdown.
            self.workers.close();
            warn!(
                outstanding = self.outstanding.len(),
                "Executor dropped without closing its session"
            );
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
