use neurotwin_core::{
    ClinicalSource, CommitPolicy, ControllerError, Domain, PatientId, SymptomId, SymptomMapping,
    TreatmentPrediction,
};
use std::sync::Arc;

use crate::controller::{ControllerCore, ControllerState};

#[derive(Debug, Clone, Default)]
pub struct ClinicalData {
    pub mappings: Vec<SymptomMapping>,
    pub predictions: Vec<TreatmentPrediction>,
}

pub struct ClinicalController {
    core: ControllerCore<ClinicalData>,
    source: Arc<dyn ClinicalSource>,
}

impl ClinicalController {
    pub fn new(source: Arc<dyn ClinicalSource>, policy: CommitPolicy) -> Self {
        Self {
            core: ControllerCore::new(Domain::Clinical, policy, |d| {
                d.mappings.len() + d.predictions.len()
            }),
            source,
        }
    }

    pub fn core(&self) -> &ControllerCore<ClinicalData> {
        &self.core
    }

    pub async fn snapshot(&self) -> ControllerState<ClinicalData> {
        self.core.snapshot().await
    }

    /// Load symptom → region mappings. An empty `symptoms` slice loads all.
    /// Predictions computed for an older mapping set are discarded.
    pub async fn load(
        &self,
        patient: &PatientId,
        symptoms: &[SymptomId],
    ) -> Result<Vec<SymptomMapping>, ControllerError> {
        let source = Arc::clone(&self.source);
        let patient = patient.clone();
        let symptoms = symptoms.to_vec();
        self.core
            .run(
                "load",
                async move { source.fetch_symptom_mappings(&patient, &symptoms).await },
                |data, mappings| {
                    if &data.mappings != mappings {
                        data.predictions.clear();
                    }
                    data.mappings = mappings.clone();
                },
            )
            .await
    }

    pub async fn predict_treatments(
        &self,
        patient: &PatientId,
    ) -> Result<Vec<TreatmentPrediction>, ControllerError> {
        let epoch = self.core.epoch();
        let mappings = self.core.read(|d| d.mappings.clone()).await;
        if mappings.is_empty() {
            return self
                .core
                .reject_in(
                    epoch,
                    "predict_treatments",
                    ControllerError::precondition("No clinical mappings available for prediction"),
                )
                .await;
        }

        let source = Arc::clone(&self.source);
        let patient = patient.clone();
        self.core
            .run_in(
                epoch,
                "predict_treatments",
                async move { source.predict_treatments(&patient, &mappings).await },
                |data, predictions| data.predictions = predictions.clone(),
            )
            .await
    }
}
