//! Start-then-poll driver for long-running server jobs.
//!
//! A [`TaskPoller`] starts a job through a [`JobBackend`], then queries its
//! status until the server reports `completed` or `error`, or until the caller
//! stops observing. Exactly one status request is in flight at a time and the
//! next one is scheduled `interval` after the previous one resolved.
//!
//! Failed status requests are logged and retried on the next tick, except
//! for an expired session, which ends the observation. Cancelling only stops
//! observation, the job keeps running on the server.

use crate::error::{ApiError, StartError};
use crate::task::status::{TaskHandle, TaskStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Server side of a pollable job.
#[async_trait]
pub trait JobBackend: Send + Sync + 'static {
    /// Create the job and return its handle.
    async fn start(&self) -> Result<TaskHandle, ApiError>;

    /// Fetch the current status of a job.
    async fn status(&self, task: &TaskHandle) -> Result<TaskStatus, ApiError>;
}

/// Poller settings.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between the end of one status request and the start of the next.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// State of the polling process (not of the job itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Starting,
    FailedToStart(String),
    Polling,
    Done,
    Stopped,
    /// The services rejected the session; a new login is needed.
    SessionExpired,
}

impl PollState {
    /// No further transition happens without a new `start()`.
    pub fn is_settled(&self) -> bool {
        !matches!(self, PollState::Starting | PollState::Polling)
    }
}

/// How an observation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The job reached a terminal status.
    Finished(TaskStatus),
    /// The caller stopped observing first.
    Stopped,
    /// Polling ended because the session expired.
    SessionExpired,
    /// Nothing was polled: the poller was never started or the start failed.
    NotStarted,
}

struct ActiveRun {
    /// Unset while the start call is in flight.
    task: Option<TaskHandle>,
    cancel: watch::Sender<bool>,
}

/// Drives one job observation at a time.
pub struct TaskPoller<B> {
    backend: Arc<B>,
    config: PollerConfig,
    state: Arc<watch::Sender<PollState>>,
    status: Arc<watch::Sender<Option<TaskStatus>>>,
    active: Mutex<Option<ActiveRun>>,
}

impl<B: JobBackend> TaskPoller<B> {
    pub fn new(backend: B, config: PollerConfig) -> Self {
        Self::with_shared_backend(Arc::new(backend), config)
    }

    pub fn with_shared_backend(backend: Arc<B>, config: PollerConfig) -> Self {
        let (state, _) = watch::channel(PollState::Idle);
        let (status, _) = watch::channel(None);
        Self {
            backend,
            config,
            state: Arc::new(state),
            status: Arc::new(status),
            active: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Start the job and begin polling it.
    ///
    /// Calling `start` while a previous job is still being observed stops that
    /// observation first; the earlier job keeps running on the server. A
    /// `cancel()` issued while the start call is in flight still returns the
    /// handle, but nothing is polled.
    pub async fn start(&self) -> Result<TaskHandle, StartError> {
        self.cancel();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.status.send_replace(None);
        self.state.send_replace(PollState::Starting);
        *self.active.lock() = Some(ActiveRun {
            task: None,
            cancel: cancel_tx,
        });

        let started = self.backend.start().await;

        // Decided under the lock so that cancel() sees either Starting or Polling.
        let mut active = self.active.lock();
        let cancelled = *cancel_rx.borrow();

        let task = match started {
            Ok(task) => task,
            Err(e) => {
                warn!("Job failed to start: {}", e);
                if !cancelled {
                    self.state.send_replace(PollState::FailedToStart(e.to_string()));
                }
                return Err(StartError(e));
            }
        };

        if cancelled {
            info!(task_id = task.id(), "Job started after observation was cancelled; not polling");
            return Ok(task);
        }
        if let Some(run) = active.as_mut() {
            run.task = Some(task.clone());
        }

        info!(task_id = task.id(), "Job started, polling every {:?}", self.config.interval);
        self.state.send_replace(PollState::Polling);

        tokio::spawn(poll_until_settled(
            Arc::clone(&self.backend),
            task.clone(),
            self.config.interval,
            cancel_rx,
            Arc::clone(&self.status),
            Arc::clone(&self.state),
        ));
        drop(active);

        Ok(task)
    }

    /// Stop polling. No status is published after this returns. Does nothing
    /// when the poller is idle or already finished.
    pub fn cancel(&self) {
        let active = self.active.lock();
        let Some(run) = active.as_ref() else {
            return;
        };
        if *run.cancel.borrow() {
            return;
        }

        // Blocks until an in-progress publication has completed.
        run.cancel.send_replace(true);

        let stopped = self.state.send_if_modified(|state| {
            if matches!(state, PollState::Starting | PollState::Polling) {
                *state = PollState::Stopped;
                true
            } else {
                false
            }
        });
        if stopped {
            match run.task {
                Some(ref task) => {
                    info!(task_id = task.id(), "Stopped observing job; it continues on the server")
                }
                None => info!("Stopped observing job before its start call returned"),
            }
        }
    }

    /// Most recent status received from the server.
    pub fn latest(&self) -> Option<TaskStatus> {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Handle of the job currently or last observed.
    pub fn task(&self) -> Option<TaskHandle> {
        self.active.lock().as_ref().and_then(|run| run.task.clone())
    }

    /// Receiver notified after every published status.
    pub fn subscribe(&self) -> watch::Receiver<Option<TaskStatus>> {
        self.status.subscribe()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    /// Wait until the current observation ends.
    pub async fn wait(&self) -> PollOutcome {
        let mut state_rx = self.state.subscribe();
        let settled = match state_rx.wait_for(PollState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => return PollOutcome::Stopped,
        };

        match settled {
            PollState::Done => match self.latest() {
                Some(status) => PollOutcome::Finished(status),
                None => PollOutcome::Stopped,
            },
            PollState::Stopped => PollOutcome::Stopped,
            PollState::SessionExpired => PollOutcome::SessionExpired,
            _ => PollOutcome::NotStarted,
        }
    }
}

impl<B> Drop for TaskPoller<B> {
    fn drop(&mut self) {
        if let Some(run) = self.active.get_mut().take() {
            run.cancel.send_replace(true);
        }
    }
}

/// Resolves once cancellation is requested or the poller is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let _ = cancel.wait_for(|requested| *requested).await;
}

async fn poll_until_settled<B: JobBackend>(
    backend: Arc<B>,
    task: TaskHandle,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
    status: Arc<watch::Sender<Option<TaskStatus>>>,
    state: Arc<watch::Sender<PollState>>,
) {
    let mut floor = 0u8;
    let mut polls = 0u64;

    loop {
        let fetched = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                debug!(task_id = task.id(), polls, "Polling cancelled during request");
                return;
            }
            fetched = backend.status(&task) => fetched,
        };
        polls += 1;

        match fetched {
            Ok(next) => {
                let next = next.with_progress_floor(floor);
                let terminal = next.is_terminal();
                if !terminal {
                    floor = next.progress();
                }
                debug!(task_id = task.id(), polls, "Status: {}", next);

                {
                    // Holding the cancel flag makes publication and cancel() exclusive.
                    let requested = cancel.borrow();
                    if *requested {
                        return;
                    }
                    status.send_replace(Some(next));
                    if terminal {
                        state.send_replace(PollState::Done);
                    }
                }

                if terminal {
                    info!(task_id = task.id(), polls, "Job reached a terminal state");
                    return;
                }
            }
            Err(ApiError::SessionExpired) => {
                warn!(task_id = task.id(), polls, "Session expired; stopped polling");
                let requested = cancel.borrow();
                if !*requested {
                    state.send_replace(PollState::SessionExpired);
                }
                return;
            }
            Err(e) => {
                warn!(
                    task_id = task.id(),
                    "Status request failed, retrying in {:?}: {}", interval, e
                );
            }
        }

        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                debug!(task_id = task.id(), polls, "Polling cancelled while waiting");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
