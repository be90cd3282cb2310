//! Visualization coordinator: read model plus coarse actions for rendering
//! consumers.
//!
//! Actions return `bool` and never an error. Failure detail goes to the
//! [`ErrorSink`].

use anyhow::{Context, Result};
use neurotwin_controllers::DomainControllers;
use neurotwin_core::{AlertId, Domain, NeuralTransform};
use neurotwin_sync::{SyncAction, SyncOrchestrator};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

use crate::projection::{project, ProjectionInputs, UnifiedVisualizationState};
use crate::sink::ErrorSink;

pub struct VisualizationCoordinator {
    orchestrator: Arc<SyncOrchestrator>,
    controllers: DomainControllers,
    sink: Arc<dyn ErrorSink>,
}

impl VisualizationCoordinator {
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        controllers: DomainControllers,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            orchestrator,
            controllers,
            sink,
        }
    }

    pub fn orchestrator(&self) -> &Arc<SyncOrchestrator> {
        &self.orchestrator
    }

    pub async fn snapshot(&self) -> UnifiedVisualizationState {
        let sync = self.orchestrator.state();
        let brain_model = self.controllers.brain_model.snapshot().await;
        let clinical = self.controllers.clinical.snapshot().await;
        let biometric = self.controllers.biometric.snapshot().await;
        let temporal = self.controllers.temporal.snapshot().await;
        let neural = self.controllers.neural.snapshot().await;
        project(&ProjectionInputs {
            sync: &sync,
            brain_model: &brain_model,
            clinical: &clinical,
            biometric: &biometric,
            temporal: &temporal,
            neural: &neural,
        })
    }

    /// Keep a projection current. The background task rebuilds it whenever
    /// the orchestrator or any controller changes and exits once every
    /// receiver is dropped.
    pub async fn spawn_projection(self: &Arc<Self>) -> watch::Receiver<UnifiedVisualizationState> {
        let (tx, rx) = watch::channel(self.snapshot().await);
        let coordinator = Arc::clone(self);
        let mut sync_rx = self.orchestrator.subscribe();
        let [mut brain_rx, mut clinical_rx, mut biometric_rx, mut temporal_rx, mut neural_rx] =
            self.controllers.subscribe_all();

        tokio::spawn(async move {
            loop {
                let changed = tokio::select! {
                    _ = tx.closed() => break,
                    r = sync_rx.changed() => r,
                    r = brain_rx.changed() => r,
                    r = clinical_rx.changed() => r,
                    r = biometric_rx.changed() => r,
                    r = temporal_rx.changed() => r,
                    r = neural_rx.changed() => r,
                };
                if changed.is_err() {
                    break;
                }
                // Coalesce whatever else arrived in the same burst.
                let _ = sync_rx.borrow_and_update();
                for rx in [
                    &mut brain_rx,
                    &mut clinical_rx,
                    &mut biometric_rx,
                    &mut temporal_rx,
                    &mut neural_rx,
                ] {
                    let _ = rx.borrow_and_update();
                }
                let view = coordinator.snapshot().await;
                if tx.send(view).is_err() {
                    break;
                }
            }
            tracing::debug!("projection task stopped");
        });
        rx
    }

    fn report(&self, operation: &'static str, error: &(dyn std::error::Error + 'static)) -> bool {
        self.sink.report(operation, error);
        false
    }

    pub async fn apply_neural_transforms(&self, transforms: &[NeuralTransform]) -> bool {
        match self.controllers.neural.apply_transforms(transforms).await {
            Ok(_) => true,
            Err(err) => self.report("apply_neural_transforms", &err),
        }
    }

    /// Re-run treatment prediction and publish the result to sync state.
    pub async fn predict_treatment_outcomes(&self) -> bool {
        let patient = self.orchestrator.patient();
        match self.controllers.clinical.predict_treatments(&patient).await {
            Ok(predictions) => {
                self.orchestrator
                    .dispatch(SyncAction::TreatmentsPredicted(predictions));
                true
            }
            Err(err) => self.report("predict_treatment_outcomes", &err),
        }
    }

    pub async fn acknowledge_alert(&self, id: &AlertId) -> bool {
        let biometric = &self.controllers.biometric;
        match biometric.acknowledge_alert(id).await {
            Ok(_) => {
                let alerts = biometric.core().read(|d| d.alerts.clone()).await;
                self.orchestrator.dispatch(SyncAction::AlertsUpdated(alerts));
                true
            }
            Err(err) => self.report("acknowledge_alert", &err),
        }
    }

    /// Neural activity back to baseline, then a temporal reload for the
    /// current scale. Both steps always run; a step that succeeded is not
    /// undone when the other fails.
    pub async fn reset_visualization(&self) -> bool {
        let neural_ok = match self.controllers.neural.reset_to_baseline().await {
            Ok(_) => true,
            Err(err) => self.report("reset_visualization", &err),
        };

        let patient = self.orchestrator.patient();
        let scale = self.orchestrator.state().time_scale;
        let temporal_ok = match self.controllers.temporal.load(&patient, scale).await {
            Ok(dynamics) => {
                self.orchestrator
                    .dispatch(SyncAction::TemporalLoaded(dynamics));
                true
            }
            Err(err) => {
                self.orchestrator.dispatch(SyncAction::DomainFailed {
                    domain: Domain::Temporal,
                    message: err.to_string(),
                });
                self.report("reset_visualization", &err)
            }
        };

        neural_ok && temporal_ok
    }

    /// Write the current snapshot as pretty JSON.
    pub async fn write_snapshot(&self, path: &Path) -> Result<()> {
        let view = self.snapshot().await;
        let json = serde_json::to_string_pretty(&view).context("Failed to serialize visualization state")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write visualization export to {}", path.display()))?;
        tracing::info!(path = %path.display(), "visualization exported");
        Ok(())
    }

    pub async fn export_visualization_data(&self, path: impl AsRef<Path>) -> bool {
        match self.write_snapshot(path.as_ref()).await {
            Ok(()) => true,
            Err(err) => self.report("export_visualization_data", &*err),
        }
    }
}
