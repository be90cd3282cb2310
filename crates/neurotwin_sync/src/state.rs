//! Orchestrator-owned patient state and the reducer that mutates it.
//!
//! Nothing outside [`reduce`] writes to a [`SyncState`]. Every change, user
//! or poll driven, is expressed as a [`SyncAction`].

use neurotwin_core::{
    BiometricAlert, BiometricStream, BrainModel, DetailLevel, Domain, LoadingState, PatientId,
    PerformanceCounters, RegionId, RenderMode, SymptomMapping, TemporalDynamics, TimeScale,
    TreatmentId, TreatmentPrediction,
};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncState {
    pub patient_id: PatientId,
    pub brain_model: Option<BrainModel>,
    pub selected_regions: BTreeSet<RegionId>,
    /// Derived by correlation, never edited directly
    pub active_regions: BTreeSet<RegionId>,
    pub symptom_mappings: Vec<SymptomMapping>,
    pub treatment_predictions: Vec<TreatmentPrediction>,
    pub selected_treatment: Option<TreatmentId>,
    pub biometric_streams: Vec<BiometricStream>,
    pub biometric_alerts: Vec<BiometricAlert>,
    pub temporal: Option<TemporalDynamics>,
    pub time_scale: TimeScale,
    pub render_mode: RenderMode,
    pub detail_level: DetailLevel,
    pub performance: PerformanceCounters,
    pub loading_state: LoadingState,
}

impl SyncState {
    pub fn new(patient_id: PatientId) -> Self {
        Self {
            patient_id,
            brain_model: None,
            selected_regions: BTreeSet::new(),
            active_regions: BTreeSet::new(),
            symptom_mappings: Vec::new(),
            treatment_predictions: Vec::new(),
            selected_treatment: None,
            biometric_streams: Vec::new(),
            biometric_alerts: Vec::new(),
            temporal: None,
            time_scale: TimeScale::default(),
            render_mode: RenderMode::default(),
            detail_level: DetailLevel::default(),
            performance: PerformanceCounters::default(),
            loading_state: LoadingState::Idle,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.loading_state.error_message()
    }

    pub fn is_loading(&self) -> bool {
        self.loading_state == LoadingState::Loading
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncAction {
    // Fetch lifecycle
    BrainModelRequested,
    BrainModelLoaded(BrainModel),
    SymptomMappingsLoaded(Vec<SymptomMapping>),
    TreatmentsPredicted(Vec<TreatmentPrediction>),
    BiometricsUpdated {
        streams: Vec<BiometricStream>,
        alerts: Vec<BiometricAlert>,
    },
    AlertsUpdated(Vec<BiometricAlert>),
    TemporalLoaded(TemporalDynamics),
    PerformanceSampled(PerformanceCounters),
    ActiveRegionsDerived(BTreeSet<RegionId>),
    DomainFailed { domain: Domain, message: String },

    // User intent
    SelectRegion(RegionId),
    DeselectRegion(RegionId),
    ToggleRegion(RegionId),
    SelectTreatment(Option<TreatmentId>),
    SetRenderMode(RenderMode),
    SetDetailLevel(DetailLevel),
    SetTimeScale(TimeScale),
    ClearError,
    Reset,
}

pub fn reduce(state: &mut SyncState, action: SyncAction) {
    match action {
        SyncAction::BrainModelRequested => {
            state.loading_state = LoadingState::Loading;
        }
        SyncAction::BrainModelLoaded(model) => {
            state.brain_model = Some(model);
            state.loading_state = LoadingState::Loaded;
        }
        SyncAction::SymptomMappingsLoaded(mappings) => {
            state.symptom_mappings = mappings;
        }
        SyncAction::TreatmentsPredicted(predictions) => {
            if let Some(selected) = &state.selected_treatment {
                if !predictions.iter().any(|p| &p.treatment_id == selected) {
                    state.selected_treatment = None;
                }
            }
            state.treatment_predictions = predictions;
        }
        SyncAction::BiometricsUpdated { streams, alerts } => {
            state.biometric_streams = streams;
            state.biometric_alerts = alerts;
        }
        SyncAction::AlertsUpdated(alerts) => {
            state.biometric_alerts = alerts;
        }
        SyncAction::TemporalLoaded(dynamics) => {
            // A reload for a scale the user already left is dropped.
            if dynamics.scale == state.time_scale {
                state.temporal = Some(dynamics);
            } else {
                tracing::trace!(scale = %dynamics.scale, current = %state.time_scale, "stale temporal result");
            }
        }
        SyncAction::PerformanceSampled(counters) => {
            state.performance = counters;
        }
        SyncAction::ActiveRegionsDerived(regions) => {
            state.active_regions = regions;
        }
        SyncAction::DomainFailed { domain, message } => {
            tracing::warn!(%domain, error = %message, "sync error");
            state.loading_state = LoadingState::Error(message);
        }
        SyncAction::SelectRegion(region) => {
            state.selected_regions.insert(region);
        }
        SyncAction::DeselectRegion(region) => {
            state.selected_regions.remove(&region);
        }
        SyncAction::ToggleRegion(region) => {
            if !state.selected_regions.remove(&region) {
                state.selected_regions.insert(region);
            }
        }
        SyncAction::SelectTreatment(treatment) => {
            state.selected_treatment = treatment;
        }
        SyncAction::SetRenderMode(mode) => {
            state.render_mode = mode;
        }
        SyncAction::SetDetailLevel(level) => {
            state.detail_level = level;
        }
        SyncAction::SetTimeScale(scale) => {
            state.time_scale = scale;
        }
        SyncAction::ClearError => {
            if state.loading_state.is_error() {
                state.loading_state = if state.brain_model.is_some() {
                    LoadingState::Loaded
                } else {
                    LoadingState::Idle
                };
            }
        }
        SyncAction::Reset => {
            *state = SyncState::new(state.patient_id.clone());
        }
    }
}
