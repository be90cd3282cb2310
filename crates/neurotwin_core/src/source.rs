//! Data-source contracts consumed by the domain controllers.
//!
//! Every fetch returns `Result<T, AdapterError>`; implementations must not
//! panic for expected failure modes. A panic is treated as a programmer error
//! and reported upstream as "Unknown error".

use async_trait::async_trait;

use crate::domain::{
    BiometricStream, BrainModel, NeuralActivity, PatientId, PerformanceCounters, SymptomId,
    SymptomMapping, TemporalDynamics, TimeScale, TreatmentPrediction,
};
use crate::error::AdapterError;

pub type SourceResult<T> = Result<T, AdapterError>;

#[async_trait]
pub trait BrainModelSource: Send + Sync {
    async fn fetch_brain_model(&self, patient: &PatientId) -> SourceResult<BrainModel>;
}

#[async_trait]
pub trait ClinicalSource: Send + Sync {
    /// Empty `symptoms` means "every mapping on record".
    async fn fetch_symptom_mappings(
        &self,
        patient: &PatientId,
        symptoms: &[SymptomId],
    ) -> SourceResult<Vec<SymptomMapping>>;

    async fn predict_treatments(
        &self,
        patient: &PatientId,
        mappings: &[SymptomMapping],
    ) -> SourceResult<Vec<TreatmentPrediction>>;
}

#[async_trait]
pub trait BiometricSource: Send + Sync {
    async fn fetch_streams(&self, patient: &PatientId) -> SourceResult<Vec<BiometricStream>>;
}

#[async_trait]
pub trait TemporalSource: Send + Sync {
    async fn fetch_dynamics(
        &self,
        patient: &PatientId,
        scale: TimeScale,
    ) -> SourceResult<TemporalDynamics>;
}

#[async_trait]
pub trait NeuralActivitySource: Send + Sync {
    async fn fetch_baseline(&self, patient: &PatientId) -> SourceResult<NeuralActivity>;
}

/// Samples host rendering/runtime counters.
pub trait PerformanceProbe: Send + Sync {
    fn sample(&self) -> PerformanceCounters;
}

/// Decides whether a mapped symptom currently counts as active.
pub trait ActivitySignal: Send + Sync {
    fn is_active(&self, mapping: &SymptomMapping) -> bool;
}
