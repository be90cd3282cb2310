//! Named repeating tasks, each on its own tokio task.
//!
//! A task sleeps its interval and then runs one tick. Ticks are never
//! interrupted by cancellation: a cancelled task finishes the tick it is in
//! and then stops. Dropping the scheduler aborts outright.

use neurotwin_core::{BackoffConfig, PollingConfig};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PollTask {
    BrainModel,
    Biometric,
    Temporal,
    Performance,
    Correlation,
}

impl PollTask {
    pub const ALL: [PollTask; 5] = [
        PollTask::BrainModel,
        PollTask::Biometric,
        PollTask::Temporal,
        PollTask::Performance,
        PollTask::Correlation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PollTask::BrainModel => "brain_model",
            PollTask::Biometric => "biometric",
            PollTask::Temporal => "temporal",
            PollTask::Performance => "performance",
            PollTask::Correlation => "correlation",
        }
    }

    pub fn interval(self, polling: &PollingConfig) -> Duration {
        match self {
            PollTask::BrainModel => polling.brain_model_refresh(),
            PollTask::Biometric => polling.biometric_refresh(),
            PollTask::Temporal => polling.temporal_refresh(),
            PollTask::Performance => polling.performance_refresh(),
            PollTask::Correlation => polling.correlation_refresh(),
        }
    }
}

impl fmt::Display for PollTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Scheduled {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct PollScheduler {
    backoff: BackoffConfig,
    tasks: BTreeMap<PollTask, Scheduled>,
}

impl PollScheduler {
    pub fn new(backoff: BackoffConfig) -> Self {
        Self {
            backoff,
            tasks: BTreeMap::new(),
        }
    }

    /// Arm `task`. `tick` returns whether the tick succeeded, which drives
    /// backoff. Re-arming an armed task replaces it.
    pub fn schedule<F, Fut>(&mut self, task: PollTask, interval: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.cancel(task);

        let (stop, mut stop_rx) = watch::channel(false);
        let backoff = self.backoff.clone();
        let handle = tokio::spawn(async move {
            let mut failures: u32 = 0;
            loop {
                let delay = backoff.next_delay(interval, failures);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop_rx.changed() => break,
                }
                if *stop_rx.borrow() {
                    break;
                }

                tracing::trace!(%task, failures, "tick");
                if tick().await {
                    failures = 0;
                } else {
                    failures = failures.saturating_add(1);
                    if backoff.enabled {
                        tracing::debug!(
                            %task,
                            failures,
                            next_ms = backoff.next_delay(interval, failures).as_millis() as u64,
                            "tick failed, backing off"
                        );
                    }
                }
            }
            tracing::debug!(%task, "poll task stopped");
        });

        tracing::debug!(%task, interval_ms = interval.as_millis() as u64, "poll task armed");
        self.tasks.insert(task, Scheduled { stop, handle });
    }

    /// Stop one task. Returns false if it was not armed.
    pub fn cancel(&mut self, task: PollTask) -> bool {
        match self.tasks.remove(&task) {
            Some(scheduled) => {
                let _ = scheduled.stop.send(true);
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, task: PollTask) -> bool {
        self.tasks.contains_key(&task)
    }

    pub fn active(&self) -> Vec<PollTask> {
        self.tasks.keys().copied().collect()
    }

    /// Stop every task. Returns how many were stopped, so a second call
    /// returns 0.
    pub fn shutdown(&mut self) -> usize {
        let armed: Vec<PollTask> = self.active();
        for task in &armed {
            self.cancel(*task);
        }
        armed.len()
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        for (_, scheduled) in std::mem::take(&mut self.tasks) {
            scheduled.handle.abort();
        }
    }
}
