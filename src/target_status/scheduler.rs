//! # Poll Scheduler
//!
//! Self-rearming loop driving [`TargetStatusUpdater`].
//!
//! ```text
//!            trigger                      cycle done
//! Awaiting ───────────► Polling ─────────────────────► Cooling
//!    ▲                                                    │
//!    └────────── re-trigger once the interval elapsed ────┘
//! ```
//!
//! Activations arrive over a channel with a single slot, so any number of
//! triggers posted while a cycle runs collapse into one pending activation.
//! Cancellation is checked first at every wait and ends the loop.

use crate::observability::metrics;
use crate::target_status::updater::TargetStatusUpdater;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Handle that requests an out-of-band poll
#[derive(Debug, Clone)]
pub struct PollTrigger {
    tx: mpsc::Sender<()>,
}

impl PollTrigger {
    /// Request an activation
    ///
    /// Returns `false` when one is already pending (the request is coalesced)
    /// or the scheduler is gone.
    pub fn trigger(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("poll already pending, trigger coalesced");
                false
            }
            Err(TrySendError::Closed(())) => false,
        }
    }
}

/// Far enough ahead that the scheduler only wakes up on cancellation
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `started + interval`, saturating at [`FAR_FUTURE`] instead of overflowing
fn cooldown_deadline(started: Instant, interval: Duration) -> Instant {
    started
        .checked_add(interval)
        .or_else(|| started.checked_add(FAR_FUTURE))
        .unwrap_or(started)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    AwaitingTrigger,
    Polling,
    Cooling { until: Instant },
}

#[derive(Debug)]
pub struct PollScheduler {
    updater: Arc<TargetStatusUpdater>,
    interval: Duration,
    trigger: PollTrigger,
    rx: mpsc::Receiver<()>,
}

impl PollScheduler {
    /// `interval` is the minimum time between the start of two activations
    #[must_use]
    pub fn new(updater: Arc<TargetStatusUpdater>, interval: Duration) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            updater,
            interval,
            trigger: PollTrigger { tx },
            rx,
        }
    }

    #[must_use]
    pub fn trigger(&self) -> PollTrigger {
        self.trigger.clone()
    }

    /// Run until `cancel` fires, starting with an immediate activation
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(interval = ?self.interval, "target status scheduler started");
        self.trigger.trigger();

        let mut state = SchedulerState::AwaitingTrigger;
        loop {
            state = match state {
                SchedulerState::AwaitingTrigger => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        received = self.rx.recv() => match received {
                            Some(()) => SchedulerState::Polling,
                            None => break,
                        },
                    }
                }
                SchedulerState::Polling => {
                    let started = Instant::now();
                    self.activate(&cancel).await;
                    SchedulerState::Cooling {
                        until: cooldown_deadline(started, self.interval),
                    }
                }
                SchedulerState::Cooling { until } => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = sleep_until(until) => {
                            self.trigger.trigger();
                            SchedulerState::AwaitingTrigger
                        }
                    }
                }
            };
        }

        info!("target status scheduler stopped");
    }

    async fn activate(&self, cancel: &CancellationToken) {
        match self.updater.should_poll().await {
            Ok(false) => {
                debug!("target status poll skipped");
                metrics::increment_poll_cycles_skipped();
            }
            Ok(true) => {
                if let Err(e) = self.updater.run_cycle(cancel).await {
                    error!(error = %e, "target status update failed");
                }
            }
            Err(e) => error!(error = %e, "checking whether to poll target status failed"),
        }
    }
}
