//! Stand-in for backends that do not exist yet. Every call fails with an
//! expected, typed error so controllers exercise their failure paths.

use async_trait::async_trait;
use neurotwin_core::{
    AdapterError, BiometricSource, BiometricStream, BrainModel, BrainModelSource, ClinicalSource,
    NeuralActivity, NeuralActivitySource, PatientId, SourceResult, SymptomId, SymptomMapping,
    TemporalDynamics, TemporalSource, TimeScale, TreatmentPrediction,
};

#[derive(Debug, Clone, Default)]
pub struct UnavailableSource {
    reason: Option<String>,
}

impl UnavailableSource {
    /// Fails with `NotImplemented` for every operation.
    pub fn not_implemented() -> Self {
        Self { reason: None }
    }

    /// Fails with `Unavailable { reason }` for every operation.
    pub fn offline(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }

    fn fail<T>(&self, operation: &str) -> SourceResult<T> {
        Err(match &self.reason {
            Some(reason) => AdapterError::unavailable(operation, reason.clone()),
            None => AdapterError::NotImplemented(operation.to_string()),
        })
    }
}

#[async_trait]
impl BrainModelSource for UnavailableSource {
    async fn fetch_brain_model(&self, _patient: &PatientId) -> SourceResult<BrainModel> {
        self.fail("brain model service")
    }
}

#[async_trait]
impl ClinicalSource for UnavailableSource {
    async fn fetch_symptom_mappings(
        &self,
        _patient: &PatientId,
        _symptoms: &[SymptomId],
    ) -> SourceResult<Vec<SymptomMapping>> {
        self.fail("clinical mapping service")
    }

    async fn predict_treatments(
        &self,
        _patient: &PatientId,
        _mappings: &[SymptomMapping],
    ) -> SourceResult<Vec<TreatmentPrediction>> {
        self.fail("treatment prediction service")
    }
}

#[async_trait]
impl BiometricSource for UnavailableSource {
    async fn fetch_streams(&self, _patient: &PatientId) -> SourceResult<Vec<BiometricStream>> {
        self.fail("biometric stream service")
    }
}

#[async_trait]
impl TemporalSource for UnavailableSource {
    async fn fetch_dynamics(
        &self,
        _patient: &PatientId,
        _scale: TimeScale,
    ) -> SourceResult<TemporalDynamics> {
        self.fail("temporal dynamics service")
    }
}

#[async_trait]
impl NeuralActivitySource for UnavailableSource {
    async fn fetch_baseline(&self, _patient: &PatientId) -> SourceResult<NeuralActivity> {
        self.fail("neural activity service")
    }
}
