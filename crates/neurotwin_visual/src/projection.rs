//! The unified read model handed to rendering consumers.
//!
//! [`project`] is pure: the same inputs always produce the same view, and
//! nothing here is stored between calls.

use chrono::{DateTime, Utc};
use neurotwin_controllers::{
    BiometricData, BrainModelData, ClinicalData, ControllerMetrics, ControllerState, NeuralData,
    TemporalData,
};
use neurotwin_core::{
    BiometricAlert, DetailLevel, Domain, Hemisphere, LoadingState, NeuralConnection, PatientId,
    PerformanceCounters, RegionId, RenderMode, StateTransition, TemporalAnalysis,
    TemporalDynamics, TemporalFeatures, TimeScale, TreatmentId, TreatmentPrediction,
};
use neurotwin_sync::SyncState;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionView {
    pub id: RegionId,
    pub name: String,
    pub hemisphere: Hemisphere,
    pub selected: bool,
    pub active: bool,
    /// Current (transformed) activation, falling back to the atlas baseline
    pub activation: f32,
    /// Highest severity among symptoms mapped to this region
    pub clinical_risk: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentPanel {
    pub predictions: Vec<TreatmentPrediction>,
    pub selected: Option<TreatmentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPanel {
    pub alerts: Vec<BiometricAlert>,
    pub unacknowledged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalPanel {
    pub scale: TimeScale,
    pub dynamics: Option<TemporalDynamics>,
    pub analysis: Option<TemporalAnalysis>,
    pub transitions: Vec<StateTransition>,
    pub features: Option<TemporalFeatures>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderSettings {
    pub mode: RenderMode,
    pub detail_level: DetailLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainStatus {
    pub domain: Domain,
    pub status: LoadingState,
    pub last_updated: Option<DateTime<Utc>>,
    pub metrics: ControllerMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedVisualizationState {
    pub patient_id: PatientId,
    pub regions: Vec<RegionView>,
    pub connections: Vec<NeuralConnection>,
    pub treatment: TreatmentPanel,
    pub alerts: AlertPanel,
    pub temporal: TemporalPanel,
    pub render: RenderSettings,
    pub performance: PerformanceCounters,
    pub loading_state: LoadingState,
    pub domains: Vec<DomainStatus>,
}

impl UnifiedVisualizationState {
    pub fn error_message(&self) -> Option<&str> {
        self.loading_state.error_message()
    }

    /// One-line status for logs.
    pub fn summary(&self) -> String {
        let selected = self.regions.iter().filter(|r| r.selected).count();
        let active = self.regions.iter().filter(|r| r.active).count();
        let mut line = format!(
            "patient={} status={} regions={} selected={} active={} treatments={} alerts={} scale={} fps={:.1}",
            self.patient_id,
            self.loading_state.label(),
            self.regions.len(),
            selected,
            active,
            self.treatment.predictions.len(),
            self.alerts.unacknowledged,
            self.temporal.scale,
            self.performance.frame_rate,
        );
        if let Some(message) = self.error_message() {
            line.push_str(&format!(" error=\"{}\"", message));
        }
        line
    }
}

/// Everything a projection reads.
pub struct ProjectionInputs<'a> {
    pub sync: &'a SyncState,
    pub brain_model: &'a ControllerState<BrainModelData>,
    pub clinical: &'a ControllerState<ClinicalData>,
    pub biometric: &'a ControllerState<BiometricData>,
    pub temporal: &'a ControllerState<TemporalData>,
    pub neural: &'a ControllerState<NeuralData>,
}

fn status<S>(domain: Domain, state: &ControllerState<S>) -> DomainStatus {
    DomainStatus {
        domain,
        status: state.loading_state(),
        last_updated: state.last_updated,
        metrics: state.metrics.clone(),
    }
}

pub fn project(inputs: &ProjectionInputs<'_>) -> UnifiedVisualizationState {
    let sync = inputs.sync;
    let activity = inputs.neural.data.current.as_ref();

    let (regions, connections) = match &sync.brain_model {
        Some(model) => {
            let regions = model
                .regions
                .iter()
                .map(|region| RegionView {
                    id: region.id.clone(),
                    name: region.name.clone(),
                    hemisphere: region.hemisphere,
                    selected: sync.selected_regions.contains(&region.id),
                    active: sync.active_regions.contains(&region.id),
                    activation: activity
                        .and_then(|a| a.activation(&region.id))
                        .unwrap_or(region.baseline_activity),
                    clinical_risk: sync
                        .symptom_mappings
                        .iter()
                        .filter(|m| m.region_ids.contains(&region.id))
                        .map(|m| m.severity)
                        .fold(0.0, f32::max),
                })
                .collect();
            (regions, model.connections.clone())
        }
        None => (Vec::new(), Vec::new()),
    };

    let temporal = &inputs.temporal.data;
    let scale = sync.time_scale;
    let temporal_panel = TemporalPanel {
        scale,
        dynamics: temporal
            .dynamics
            .get(&scale)
            .cloned()
            .or_else(|| sync.temporal.clone().filter(|t| t.scale == scale)),
        analysis: temporal.analysis.clone().filter(|a| a.scale == scale),
        transitions: if temporal.current_scale == Some(scale) {
            temporal.transitions.clone()
        } else {
            Vec::new()
        },
        features: temporal.features.clone().filter(|f| f.scale == scale),
    };

    UnifiedVisualizationState {
        patient_id: sync.patient_id.clone(),
        regions,
        connections,
        treatment: TreatmentPanel {
            predictions: sync.treatment_predictions.clone(),
            selected: sync.selected_treatment.clone(),
        },
        alerts: AlertPanel {
            unacknowledged: sync.biometric_alerts.iter().filter(|a| !a.acknowledged).count(),
            alerts: sync.biometric_alerts.clone(),
        },
        temporal: temporal_panel,
        render: RenderSettings {
            mode: sync.render_mode,
            detail_level: sync.detail_level,
        },
        performance: sync.performance,
        loading_state: sync.loading_state.clone(),
        domains: vec![
            status(Domain::BrainModel, inputs.brain_model),
            status(Domain::Clinical, inputs.clinical),
            status(Domain::Biometric, inputs.biometric),
            status(Domain::Temporal, inputs.temporal),
            status(Domain::NeuralActivity, inputs.neural),
        ],
    }
}
