//! Generic controller core shared by every domain controller.
//!
//! A domain controller owns one slice of state and runs every operation
//! through [`ControllerCore::run`], which gives all domains the same contract:
//!
//! - `is_processing` is raised while any operation is in flight
//! - success replaces the slice and refreshes `last_updated`
//! - failure records the message in `error_state` and leaves the slice untouched
//! - metrics accumulate across calls, they are never reset per call
//!
//! The adapter future runs on its own task so a panicking data source cannot
//! take the caller down; such panics surface as "Unknown error".
//!
//! [`ControllerCore::reset`] starts a new epoch. An operation begun in an
//! earlier epoch settles its in-flight count but never touches the slice,
//! its error state or its metrics.

use chrono::{DateTime, Utc};
use neurotwin_core::{CommitPolicy, ControllerError, Domain, LoadingState, SourceResult};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::{watch, RwLock};
use tokio::time::Instant;

/// Cumulative observability counters. Never affect correctness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ControllerMetrics {
    pub operations: u64,
    pub failures: u64,
    /// Records held by the slice after the last committed success
    pub records: usize,
    /// Latency of the most recent operation
    pub processing_latency_ms: u64,
    pub total_latency_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ControllerState<S> {
    pub data: S,
    pub is_processing: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub error_state: Option<String>,
    pub metrics: ControllerMetrics,
    in_flight: usize,
}

impl<S> ControllerState<S> {
    fn new(data: S) -> Self {
        Self {
            data,
            is_processing: false,
            last_updated: None,
            error_state: None,
            metrics: ControllerMetrics::default(),
            in_flight: 0,
        }
    }

    /// Coarse status for UI consumption.
    pub fn loading_state(&self) -> LoadingState {
        if self.is_processing {
            LoadingState::Loading
        } else if let Some(message) = &self.error_state {
            LoadingState::Error(message.clone())
        } else if self.last_updated.is_some() {
            LoadingState::Loaded
        } else {
            LoadingState::Idle
        }
    }
}

pub struct ControllerCore<S> {
    domain: Domain,
    policy: CommitPolicy,
    state: RwLock<ControllerState<S>>,
    /// Latest issued generation per operation name
    issued: Mutex<HashMap<&'static str, u64>>,
    epoch: AtomicU64,
    revision: watch::Sender<u64>,
    count_records: fn(&S) -> usize,
    /// Slice contents restored by `reset`
    initial: S,
}

impl<S> ControllerCore<S>
where
    S: Default + Clone + Send + Sync,
{
    pub fn new(domain: Domain, policy: CommitPolicy, count_records: fn(&S) -> usize) -> Self {
        Self::with_initial(domain, policy, count_records, S::default())
    }

    /// Start from (and reset back to) `initial` instead of `S::default()`.
    pub fn with_initial(
        domain: Domain,
        policy: CommitPolicy,
        count_records: fn(&S) -> usize,
        initial: S,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            domain,
            policy,
            state: RwLock::new(ControllerState::new(initial.clone())),
            issued: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            revision,
            count_records,
            initial,
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    pub async fn snapshot(&self) -> ControllerState<S> {
        self.state.read().await.clone()
    }

    /// Read a projection of the data slice without cloning all of it.
    pub async fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.read().await.data)
    }

    /// Revision counter bumped on every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Mutate the slice directly (configuration changes, no adapter involved).
    pub async fn update(&self, f: impl FnOnce(&mut S)) {
        {
            let mut state = self.state.write().await;
            f(&mut state.data);
            state.metrics.records = (self.count_records)(&state.data);
        }
        self.notify();
    }

    /// Current reset epoch. Operations that read the slice before running
    /// capture it up front and pass it to [`run_in`](Self::run_in).
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch() == epoch
    }

    /// Drop all data and metrics and start a new epoch. Operations still in
    /// flight settle their in-flight count when they resolve, nothing else.
    pub async fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.write().await;
            let in_flight = state.in_flight;
            *state = ControllerState::new(self.initial.clone());
            state.in_flight = in_flight;
            state.is_processing = in_flight > 0;
        }
        tracing::debug!(domain = %self.domain, "controller reset");
        self.notify();
    }

    /// Run one operation. `task` yields the payload, `apply` commits it into
    /// the slice when the commit policy allows.
    pub async fn run<T, Fut, A>(
        &self,
        operation: &'static str,
        task: Fut,
        apply: A,
    ) -> Result<T, ControllerError>
    where
        T: Send + 'static,
        Fut: Future<Output = SourceResult<T>> + Send + 'static,
        A: FnOnce(&mut S, &T) + Send,
    {
        let epoch = self.epoch();
        self.run_in(epoch, operation, task, apply).await
    }

    /// [`run`](Self::run) for an operation that started in `epoch`.
    pub async fn run_in<T, Fut, A>(
        &self,
        epoch: u64,
        operation: &'static str,
        task: Fut,
        apply: A,
    ) -> Result<T, ControllerError>
    where
        T: Send + 'static,
        Fut: Future<Output = SourceResult<T>> + Send + 'static,
        A: FnOnce(&mut S, &T) + Send,
    {
        let generation = self.begin(operation).await;
        let started = Instant::now();

        let outcome = match tokio::spawn(task).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ControllerError::Adapter(err)),
            Err(join_err) => {
                if join_err.is_panic() {
                    tracing::error!(domain = %self.domain, operation, "data source panicked");
                }
                Err(ControllerError::unknown())
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        self.finish(epoch, operation, generation, latency_ms, outcome, apply)
            .await
    }

    /// Fail an operation before it reaches the adapter.
    pub async fn reject<T>(
        &self,
        operation: &'static str,
        error: ControllerError,
    ) -> Result<T, ControllerError> {
        let epoch = self.epoch();
        self.reject_in(epoch, operation, error).await
    }

    /// [`reject`](Self::reject) for an operation that started in `epoch`.
    pub async fn reject_in<T>(
        &self,
        epoch: u64,
        operation: &'static str,
        error: ControllerError,
    ) -> Result<T, ControllerError> {
        if !self.is_current(epoch) {
            tracing::debug!(domain = %self.domain, operation, "rejection from before reset dropped");
            return Err(error);
        }
        {
            let mut state = self.state.write().await;
            state.metrics.operations += 1;
            state.metrics.failures += 1;
            state.error_state = Some(error.to_string());
        }
        tracing::warn!(domain = %self.domain, operation, error = %error, "operation rejected");
        self.notify();
        Err(error)
    }

    async fn begin(&self, operation: &'static str) -> u64 {
        let generation = {
            let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
            let slot = issued.entry(operation).or_insert(0);
            *slot += 1;
            *slot
        };
        {
            let mut state = self.state.write().await;
            state.in_flight += 1;
            state.is_processing = true;
            state.error_state = None;
        }
        tracing::debug!(domain = %self.domain, operation, generation, "operation started");
        self.notify();
        generation
    }

    fn is_latest(&self, operation: &'static str, generation: u64) -> bool {
        let issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.get(operation).copied() == Some(generation)
    }

    async fn finish<T, A>(
        &self,
        epoch: u64,
        operation: &'static str,
        generation: u64,
        latency_ms: u64,
        outcome: Result<T, ControllerError>,
        apply: A,
    ) -> Result<T, ControllerError>
    where
        A: FnOnce(&mut S, &T),
    {
        let commit = match self.policy {
            CommitPolicy::LastResolved => true,
            CommitPolicy::LatestIssued => self.is_latest(operation, generation),
        };

        {
            let mut state = self.state.write().await;
            state.in_flight = state.in_flight.saturating_sub(1);
            state.is_processing = state.in_flight > 0;

            if !self.is_current(epoch) {
                drop(state);
                tracing::debug!(domain = %self.domain, operation, generation, "result from before reset dropped");
                self.notify();
                return outcome;
            }

            state.metrics.operations += 1;
            state.metrics.processing_latency_ms = latency_ms;
            state.metrics.total_latency_ms += latency_ms;

            match &outcome {
                Ok(value) if commit => {
                    apply(&mut state.data, value);
                    state.last_updated = Some(Utc::now());
                    state.error_state = None;
                    state.metrics.records = (self.count_records)(&state.data);
                    tracing::debug!(domain = %self.domain, operation, generation, latency_ms, "committed");
                }
                Ok(_) => {
                    tracing::debug!(domain = %self.domain, operation, generation, "stale result dropped");
                }
                Err(err) => {
                    state.metrics.failures += 1;
                    if commit {
                        state.error_state = Some(err.to_string());
                        tracing::warn!(domain = %self.domain, operation, error = %err, "operation failed");
                    } else {
                        tracing::debug!(domain = %self.domain, operation, generation, "stale failure dropped");
                    }
                }
            }
        }

        self.notify();
        outcome
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}
