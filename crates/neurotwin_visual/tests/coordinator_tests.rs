//! Integration tests for VisualizationCoordinator over synthetic sources.

use neurotwin_controllers::{DomainControllers, DomainSources};
use neurotwin_core::{
    AlertId, NeuralTransform, NeuroTwinConfig, PatientId, PollingConfig, RegionId,
};
use neurotwin_sources::{SeverityActivitySignal, SyntheticSource, UnavailableSource};
use neurotwin_sync::{Collaborators, SyncOrchestrator};
use neurotwin_visual::{ErrorSink, VisualizationCoordinator};
use std::error::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingSink {
    reports: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingSink {
    fn messages(&self) -> Vec<String> {
        self.reports.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, operation: &'static str, error: &(dyn Error + 'static)) {
        self.reports.lock().unwrap().push((operation, error.to_string()));
    }
}

fn config() -> NeuroTwinConfig {
    let mut config = NeuroTwinConfig {
        polling: PollingConfig::uniform(3_600_000),
        ..NeuroTwinConfig::default()
    };
    // Every heart-rate sample raises an alert.
    config.biometric.heart_rate_warning = 0.0;
    config.biometric.heart_rate_critical = 1_000.0;
    config
}

fn synthetic() -> DomainSources {
    DomainSources::from_shared(Arc::new(SyntheticSource::instant(21)))
}

async fn setup(sources: DomainSources) -> (Arc<VisualizationCoordinator>, Arc<RecordingSink>) {
    let config = config();
    let controllers = DomainControllers::new(sources, &config);
    let orchestrator = SyncOrchestrator::mount(
        PatientId::from("patient-viz"),
        config,
        controllers.clone(),
        Collaborators {
            performance: Arc::new(SyntheticSource::instant(2)),
            activity: Arc::new(SeverityActivitySignal { threshold: 0.5 }),
        },
    )
    .await;
    let sink = Arc::new(RecordingSink::default());
    let coordinator = Arc::new(VisualizationCoordinator::new(
        Arc::new(orchestrator),
        controllers,
        sink.clone(),
    ));
    (coordinator, sink)
}

// ============================================================================
// reset_visualization
// ============================================================================

#[tokio::test]
async fn test_reset_visualization_succeeds_when_both_steps_succeed() {
    let (coordinator, sink) = setup(synthetic()).await;
    assert!(coordinator
        .apply_neural_transforms(&[NeuralTransform::Scale { factor: 0.1 }])
        .await);

    assert!(coordinator.reset_visualization().await);
    let neural = coordinator.orchestrator().controllers().neural.snapshot().await;
    assert_eq!(neural.data.current, neural.data.baseline);
    assert!(sink.messages().is_empty());
}

#[tokio::test]
async fn test_reset_visualization_runs_temporal_even_if_neural_fails() {
    let mut sources = synthetic();
    sources.neural = Arc::new(UnavailableSource::not_implemented());
    let (coordinator, sink) = setup(sources).await;
    let temporal = &coordinator.orchestrator().controllers().temporal;
    let before = temporal.snapshot().await.metrics.operations;

    assert!(!coordinator.reset_visualization().await);
    assert_eq!(temporal.snapshot().await.metrics.operations, before + 1);
    assert_eq!(sink.messages(), vec!["No neural activity baseline loaded".to_string()]);
}

#[tokio::test]
async fn test_reset_visualization_keeps_neural_reset_when_temporal_fails() {
    let mut sources = synthetic();
    sources.temporal = Arc::new(UnavailableSource::offline("archive offline"));
    let (coordinator, sink) = setup(sources).await;
    coordinator
        .apply_neural_transforms(&[NeuralTransform::Offset { delta: 0.2 }])
        .await;

    assert!(!coordinator.reset_visualization().await);
    let neural = coordinator.orchestrator().controllers().neural.snapshot().await;
    assert!(neural.data.applied.is_empty());
    assert_eq!(neural.data.current, neural.data.baseline);
    assert_eq!(sink.messages().len(), 1);
    assert!(sink.messages()[0].contains("archive offline"));
}

// ============================================================================
// Coarse actions
// ============================================================================

#[tokio::test]
async fn test_neural_transforms_reach_projection() {
    let (coordinator, _sink) = setup(synthetic()).await;
    assert!(coordinator
        .apply_neural_transforms(&[NeuralTransform::Threshold { min: 2.0 }])
        .await);
    let view = coordinator.snapshot().await;
    assert!(!view.regions.is_empty());
    assert!(view.regions.iter().all(|r| r.activation == 0.0));
}

#[tokio::test]
async fn test_predict_treatment_outcomes_syncs_state() {
    let (coordinator, _sink) = setup(synthetic()).await;
    coordinator.orchestrator().dispatch(neurotwin_sync::SyncAction::TreatmentsPredicted(vec![]));
    assert!(coordinator.orchestrator().state().treatment_predictions.is_empty());

    assert!(coordinator.predict_treatment_outcomes().await);
    assert!(!coordinator.orchestrator().state().treatment_predictions.is_empty());
}

#[tokio::test]
async fn test_predict_without_mappings_reports_to_sink() {
    let mut sources = synthetic();
    sources.clinical = Arc::new(UnavailableSource::not_implemented());
    let (coordinator, sink) = setup(sources).await;

    assert!(!coordinator.predict_treatment_outcomes().await);
    assert_eq!(
        sink.messages(),
        vec!["No clinical mappings available for prediction".to_string()]
    );
}

#[tokio::test]
async fn test_acknowledge_alert_syncs_state() {
    let (coordinator, sink) = setup(synthetic()).await;
    let view = coordinator.snapshot().await;
    assert!(view.alerts.unacknowledged >= 1);
    let id = view.alerts.alerts[0].id.clone();

    assert!(coordinator.acknowledge_alert(&id).await);
    let after = coordinator.snapshot().await;
    assert_eq!(after.alerts.unacknowledged, view.alerts.unacknowledged - 1);

    assert!(!coordinator.acknowledge_alert(&AlertId::from("nope")).await);
    assert_eq!(sink.messages(), vec!["Unknown biometric alert: nope".to_string()]);
}

// ============================================================================
// Projection and export
// ============================================================================

#[tokio::test]
async fn test_projection_follows_state_changes() {
    let (coordinator, _sink) = setup(synthetic()).await;
    let mut rx = coordinator.spawn_projection().await;
    assert!(rx.borrow().regions.iter().all(|r| !r.selected));

    coordinator.orchestrator().select_region(RegionId::from("thalamus"));
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            rx.changed().await.unwrap();
            if rx.borrow().regions.iter().any(|r| r.selected) {
                break;
            }
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_mount_populates_temporal_analyses() {
    let (coordinator, _sink) = setup(synthetic()).await;
    let view = coordinator.snapshot().await;
    let scale = view.temporal.scale;

    assert!(view.temporal.dynamics.is_some());
    let analysis = view.temporal.analysis.expect("analysis after mount");
    assert_eq!(analysis.scale, scale);
    assert_eq!(analysis.sample_count, scale.window_len());
    assert_eq!(view.temporal.features.map(|f| f.scale), Some(scale));
}

#[tokio::test]
async fn test_export_writes_pretty_json() {
    let (coordinator, _sink) = setup(synthetic()).await;
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("twin.json");

    assert!(coordinator.export_visualization_data(&path).await);
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains('\n'));
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["patient_id"], "patient-viz");
    assert_eq!(json["domains"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_export_failure_reports_to_sink() {
    let (coordinator, sink) = setup(synthetic()).await;
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("missing").join("twin.json");

    assert!(!coordinator.export_visualization_data(&path).await);
    assert!(sink.messages()[0].starts_with("Failed to write visualization export"));
}
