//! Overlapping operations and status transitions, run on paused time.

use async_trait::async_trait;
use chrono::Utc;
use neurotwin_controllers::TemporalController;
use neurotwin_core::{
    CommitPolicy, LoadingState, PatientId, SourceResult, TemporalDynamics, TemporalPoint,
    TemporalSource, TimeScale,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Answers call `n` after `delays[n]` with a single point of value `n`.
struct ScriptedTemporal {
    delays: Vec<u64>,
    calls: AtomicUsize,
}

impl ScriptedTemporal {
    fn new(delays: &[u64]) -> Arc<Self> {
        Arc::new(Self {
            delays: delays.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TemporalSource for ScriptedTemporal {
    async fn fetch_dynamics(
        &self,
        _patient: &PatientId,
        scale: TimeScale,
    ) -> SourceResult<TemporalDynamics> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.get(n).copied().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(TemporalDynamics {
            scale,
            points: vec![TemporalPoint {
                timestamp: Utc::now(),
                value: n as f32,
            }],
            fetched_at: Utc::now(),
        })
    }
}

fn patient() -> PatientId {
    PatientId::from("patient-race")
}

/// Issue A, then B 10ms later. A takes 200ms, B 50ms, so A resolves last.
async fn overlapping_loads(policy: CommitPolicy) -> f32 {
    let source = ScriptedTemporal::new(&[200, 50]);
    let controller = Arc::new(TemporalController::new(source.clone(), policy));

    let a = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.load(&patient(), TimeScale::Daily).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let b = controller.load(&patient(), TimeScale::Daily).await.unwrap();
    assert_eq!(b.points[0].value, 1.0);

    let a = a.await.unwrap().unwrap();
    assert_eq!(a.points[0].value, 0.0);

    let state = controller.snapshot().await;
    assert!(!state.is_processing);
    assert_eq!(state.metrics.operations, 2);
    state.data.dynamics[&TimeScale::Daily].points[0].value
}

// ============================================================================
// Commit policy
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_last_resolved_keeps_slow_first_call() {
    assert_eq!(overlapping_loads(CommitPolicy::LastResolved).await, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_latest_issued_keeps_second_call() {
    assert_eq!(overlapping_loads(CommitPolicy::LatestIssued).await, 1.0);
}

// ============================================================================
// Status transitions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_load_from_idle_passes_through_loading() {
    let source = ScriptedTemporal::new(&[100]);
    let controller = Arc::new(TemporalController::new(source, CommitPolicy::default()));
    assert_eq!(controller.snapshot().await.loading_state(), LoadingState::Idle);

    let pending = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.load(&patient(), TimeScale::Daily).await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;
    let during = controller.snapshot().await;
    assert!(during.is_processing);
    assert_eq!(during.loading_state(), LoadingState::Loading);

    pending.await.unwrap().unwrap();
    let after = controller.snapshot().await;
    assert_eq!(after.loading_state(), LoadingState::Loaded);
    assert!(after.data.dynamics.contains_key(&TimeScale::Daily));
    assert_eq!(after.data.current_scale, Some(TimeScale::Daily));
    assert!(after.metrics.processing_latency_ms >= 100);
    assert!(after.last_updated.is_some());
}

#[tokio::test]
async fn test_analyze_without_load_skips_source() {
    let source = ScriptedTemporal::new(&[]);
    let controller = TemporalController::new(source.clone(), CommitPolicy::default());

    let err = controller.analyze().await.unwrap_err();
    assert_eq!(err.to_string(), "No temporal data available for analysis");
    assert_eq!(source.calls(), 0);

    let state = controller.snapshot().await;
    assert_eq!(
        state.loading_state(),
        LoadingState::Error("No temporal data available for analysis".into())
    );
}

#[tokio::test]
async fn test_analysis_suite_after_load() {
    let source = ScriptedTemporal::new(&[0]);
    let controller = TemporalController::new(source, CommitPolicy::default());
    controller.load(&patient(), TimeScale::Weekly).await.unwrap();

    let analysis = controller.analyze().await.unwrap();
    assert_eq!(analysis.scale, TimeScale::Weekly);
    assert_eq!(analysis.sample_count, 1);
    assert!(controller.detect_transitions().await.unwrap().is_empty());
    let features = controller.extract_features().await.unwrap();
    assert_eq!(features.dominant_period, None);

    let state = controller.snapshot().await;
    assert!(state.data.analysis.is_some());
    assert!(state.data.features.is_some());
    assert_eq!(state.metrics.operations, 4);
    assert_eq!(state.metrics.failures, 0);
}
