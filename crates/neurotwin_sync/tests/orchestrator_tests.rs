//! Orchestrator integration tests over synthetic sources, on paused time.

use async_trait::async_trait;
use neurotwin_controllers::{DomainControllers, DomainSources};
use neurotwin_core::{
    AdapterError, LoadingState, NeuroTwinConfig, PatientId, PollingConfig, RegionId,
    RenderMode, SourceConfig, SourceResult, TemporalDynamics, TemporalPoint, TemporalSource,
    TimeScale,
};
use neurotwin_sources::{SeverityActivitySignal, SyntheticSource, UnavailableSource};
use neurotwin_sync::{Collaborators, PollTask, SyncOrchestrator};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every requested scale, optionally failing.
struct RecordingTemporal {
    inner: SyntheticSource,
    requested: Mutex<Vec<TimeScale>>,
    fail: bool,
}

impl RecordingTemporal {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: SyntheticSource::instant(11),
            requested: Mutex::new(Vec::new()),
            fail,
        })
    }

    fn requested(&self) -> Vec<TimeScale> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemporalSource for RecordingTemporal {
    async fn fetch_dynamics(
        &self,
        patient: &PatientId,
        scale: TimeScale,
    ) -> SourceResult<TemporalDynamics> {
        self.requested.lock().unwrap().push(scale);
        if self.fail {
            return Err(AdapterError::unavailable("temporal dynamics service", "archive offline"));
        }
        self.inner.fetch_dynamics(patient, scale).await
    }
}

/// Flat series whose level depends on the patient; `slow` patients answer
/// after 500ms.
struct PerPatientTemporal {
    slow: PatientId,
}

impl PerPatientTemporal {
    fn level(patient: &PatientId) -> f32 {
        if patient.as_str() == "patient-A" {
            1.0
        } else {
            2.0
        }
    }
}

#[async_trait]
impl TemporalSource for PerPatientTemporal {
    async fn fetch_dynamics(
        &self,
        patient: &PatientId,
        scale: TimeScale,
    ) -> SourceResult<TemporalDynamics> {
        if patient == &self.slow {
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        let now = chrono::Utc::now();
        Ok(TemporalDynamics {
            scale,
            points: (0..8)
                .map(|i| TemporalPoint {
                    timestamp: now - chrono::Duration::hours(8 - i),
                    value: Self::level(patient),
                })
                .collect(),
            fetched_at: now,
        })
    }
}

fn collaborators() -> Collaborators {
    Collaborators {
        performance: Arc::new(SyntheticSource::instant(7)),
        activity: Arc::new(SeverityActivitySignal { threshold: 0.0 }),
    }
}

fn quiet_config() -> NeuroTwinConfig {
    NeuroTwinConfig {
        polling: PollingConfig::uniform(3_600_000),
        ..NeuroTwinConfig::default()
    }
}

async fn mount_with(sources: DomainSources, config: NeuroTwinConfig) -> SyncOrchestrator {
    let controllers = DomainControllers::new(sources, &config);
    SyncOrchestrator::mount(PatientId::from("patient-001"), config, controllers, collaborators()).await
}

async fn mount_synthetic(config: NeuroTwinConfig) -> SyncOrchestrator {
    let source = Arc::new(SyntheticSource::new(&config.sources));
    mount_with(DomainSources::from_shared(source), config).await
}

fn with_temporal(temporal: Arc<RecordingTemporal>) -> DomainSources {
    let mut sources = DomainSources::from_shared(Arc::new(SyntheticSource::instant(3)));
    sources.temporal = temporal;
    sources
}

// ============================================================================
// Mount
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_mount_runs_initial_loads() {
    let orchestrator = mount_synthetic(quiet_config()).await;
    let state = orchestrator.state();

    assert_eq!(state.patient_id, PatientId::from("patient-001"));
    assert_eq!(state.loading_state, LoadingState::Loaded);
    assert!(state.brain_model.is_some());
    assert!(!state.symptom_mappings.is_empty());
    assert!(!state.treatment_predictions.is_empty());
    assert!(!state.biometric_streams.is_empty());
    assert_eq!(state.temporal.as_ref().map(|t| t.scale), Some(TimeScale::Daily));
    assert!(state.performance.sampled_at.is_some());
    assert!(orchestrator
        .controllers()
        .neural
        .snapshot()
        .await
        .data
        .baseline
        .is_some());

    assert_eq!(orchestrator.active_tasks(), PollTask::ALL.to_vec());
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_offline_sources_surface_error() {
    let sources = DomainSources::from_shared(Arc::new(UnavailableSource::offline("network down")));
    let orchestrator = mount_with(sources, quiet_config()).await;

    let state = orchestrator.state();
    assert!(state.loading_state.is_error());
    assert!(state.error_message().unwrap().contains("network down"));
    assert!(state.brain_model.is_none());

    orchestrator.clear_error();
    assert_eq!(orchestrator.state().loading_state, LoadingState::Idle);
}

// ============================================================================
// Polling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_brain_model_cycle_passes_through_loading() {
    let config = NeuroTwinConfig {
        sources: SourceConfig {
            simulated_latency_ms: 100,
            seed: Some(1),
        },
        ..NeuroTwinConfig::default()
    };
    let orchestrator = mount_synthetic(config).await;
    assert_eq!(orchestrator.state().loading_state, LoadingState::Loaded);

    // Brain model tick fires 5000ms after mount and takes 100ms.
    tokio::time::sleep(Duration::from_millis(5050)).await;
    assert_eq!(orchestrator.state().loading_state, LoadingState::Loading);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(orchestrator.state().loading_state, LoadingState::Loaded);
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_correlation_tick_derives_active_regions() {
    let config = NeuroTwinConfig {
        polling: PollingConfig {
            correlation_refresh_ms: 2000,
            ..PollingConfig::uniform(3_600_000)
        },
        ..NeuroTwinConfig::default()
    };
    let orchestrator = mount_synthetic(config).await;
    assert!(orchestrator.state().active_regions.is_empty());

    tokio::time::sleep(Duration::from_millis(2100)).await;
    let state = orchestrator.state();
    let model = state.brain_model.as_ref().unwrap();
    assert!(!state.active_regions.is_empty());
    assert!(state.active_regions.iter().all(|r| model.contains_region(r)));
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_polling() {
    let config = NeuroTwinConfig {
        polling: PollingConfig::uniform(100),
        ..NeuroTwinConfig::default()
    };
    let orchestrator = mount_synthetic(config).await;
    let mut rx = orchestrator.subscribe();

    orchestrator.shutdown();
    orchestrator.shutdown();
    assert!(orchestrator.active_tasks().is_empty());

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(!rx.has_changed().unwrap());
}

// ============================================================================
// Actions
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_set_time_scale_reloads_once() {
    let temporal = RecordingTemporal::new(false);
    let orchestrator = mount_with(with_temporal(temporal.clone()), quiet_config()).await;
    assert_eq!(temporal.requested(), vec![TimeScale::Daily]);

    let reload = orchestrator.set_time_scale(TimeScale::Weekly);
    assert_eq!(orchestrator.state().time_scale, TimeScale::Weekly);

    assert!(reload.await.unwrap());
    assert_eq!(temporal.requested(), vec![TimeScale::Daily, TimeScale::Weekly]);
    assert_eq!(
        orchestrator.state().temporal.map(|t| t.scale),
        Some(TimeScale::Weekly)
    );
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_set_time_scale_applies_even_when_reload_fails() {
    let temporal = RecordingTemporal::new(true);
    let orchestrator = mount_with(with_temporal(temporal.clone()), quiet_config()).await;
    orchestrator.clear_error();

    let reload = orchestrator.set_time_scale(TimeScale::Monthly);
    assert!(!reload.await.unwrap());

    let state = orchestrator.state();
    assert_eq!(state.time_scale, TimeScale::Monthly);
    assert_eq!(temporal.requested().len(), 2);
    assert_eq!(
        state.error_message(),
        Some("temporal dynamics service is unavailable: archive offline")
    );
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_user_actions_update_state() {
    let orchestrator = mount_synthetic(quiet_config()).await;
    let thalamus = RegionId::from("thalamus");

    orchestrator.select_region(thalamus.clone());
    orchestrator.select_region(thalamus.clone());
    orchestrator.toggle_region(RegionId::from("insula_l"));
    orchestrator.set_render_mode(RenderMode::RiskHeatmap);
    let state = orchestrator.state();
    assert_eq!(state.selected_regions.len(), 2);
    assert_eq!(state.render_mode, RenderMode::RiskHeatmap);

    orchestrator.deselect_region(thalamus);
    assert_eq!(orchestrator.state().selected_regions.len(), 1);

    orchestrator.reset();
    let state = orchestrator.state();
    assert!(state.selected_regions.is_empty());
    assert_eq!(state.render_mode, RenderMode::default());
    assert_eq!(state.patient_id, PatientId::from("patient-001"));
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_switch_patient_remounts() {
    let orchestrator = mount_synthetic(quiet_config()).await;
    orchestrator.select_region(RegionId::from("thalamus"));

    orchestrator.switch_patient(PatientId::from("patient-002")).await;
    let state = orchestrator.state();
    assert_eq!(state.patient_id, PatientId::from("patient-002"));
    assert!(state.selected_regions.is_empty());
    assert_eq!(
        state.brain_model.as_ref().map(|m| m.patient_id.clone()),
        Some(PatientId::from("patient-002"))
    );
    assert_eq!(orchestrator.active_tasks().len(), PollTask::ALL.len());
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_switch_patient_drops_in_flight_results() {
    let config = NeuroTwinConfig {
        polling: PollingConfig {
            temporal_refresh_ms: 1000,
            ..PollingConfig::uniform(3_600_000)
        },
        ..NeuroTwinConfig::default()
    };
    let mut sources = DomainSources::from_shared(Arc::new(SyntheticSource::instant(3)));
    sources.temporal = Arc::new(PerPatientTemporal {
        slow: PatientId::from("patient-A"),
    });
    let controllers = DomainControllers::new(sources, &config);
    let orchestrator =
        SyncOrchestrator::mount(PatientId::from("patient-A"), config, controllers, collaborators())
            .await;

    // Temporal tick fires 1000ms after mount and answers 500ms later.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let temporal = &orchestrator.controllers().temporal;
    assert!(temporal.snapshot().await.is_processing);

    orchestrator.switch_patient(PatientId::from("patient-B")).await;
    tokio::time::sleep(Duration::from_millis(600)).await;

    let levels = |dynamics: Option<&TemporalDynamics>| -> Vec<f32> {
        dynamics
            .map(|d| d.points.iter().map(|p| p.value).collect())
            .unwrap_or_default()
    };
    let state = orchestrator.state();
    assert_eq!(state.patient_id, PatientId::from("patient-B"));
    assert!(levels(state.temporal.as_ref()).iter().all(|v| *v == 2.0));

    let snapshot = temporal.snapshot().await;
    let current = levels(snapshot.data.current());
    assert!(!current.is_empty());
    assert!(current.iter().all(|v| *v == 2.0));
    assert!(!snapshot.is_processing);
    assert_eq!(snapshot.data.analysis.map(|a| a.mean), Some(2.0));
    orchestrator.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_temporal_refresh_runs_analysis_suite() {
    let orchestrator = mount_synthetic(quiet_config()).await;
    let data = orchestrator.controllers().temporal.snapshot().await.data;
    let scale = orchestrator.state().time_scale;

    assert_eq!(data.analysis.map(|a| a.scale), Some(scale));
    assert_eq!(data.features.map(|f| f.scale), Some(scale));
    orchestrator.shutdown();
}
