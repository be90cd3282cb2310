use neurotwin_core::{
    BiometricSource, BrainModelSource, ClinicalSource, NeuralActivitySource, NeuroTwinConfig,
    TemporalSource,
};
use std::sync::Arc;
use tokio::sync::watch;

use crate::{
    BiometricController, BrainModelController, ClinicalController, NeuralActivityController,
    TemporalController,
};

/// One adapter per domain.
#[derive(Clone)]
pub struct DomainSources {
    pub brain_model: Arc<dyn BrainModelSource>,
    pub clinical: Arc<dyn ClinicalSource>,
    pub biometric: Arc<dyn BiometricSource>,
    pub temporal: Arc<dyn TemporalSource>,
    pub neural: Arc<dyn NeuralActivitySource>,
}

impl DomainSources {
    /// Use a single backend for every domain.
    pub fn from_shared<T>(source: Arc<T>) -> Self
    where
        T: BrainModelSource
            + ClinicalSource
            + BiometricSource
            + TemporalSource
            + NeuralActivitySource
            + 'static,
    {
        Self {
            brain_model: source.clone(),
            clinical: source.clone(),
            biometric: source.clone(),
            temporal: source.clone(),
            neural: source,
        }
    }
}

/// The full controller set. Cheap to clone.
#[derive(Clone)]
pub struct DomainControllers {
    pub brain_model: Arc<BrainModelController>,
    pub clinical: Arc<ClinicalController>,
    pub biometric: Arc<BiometricController>,
    pub temporal: Arc<TemporalController>,
    pub neural: Arc<NeuralActivityController>,
}

impl DomainControllers {
    pub fn new(sources: DomainSources, config: &NeuroTwinConfig) -> Self {
        let policy = config.controllers.commit_policy;
        tracing::debug!(?policy, "building domain controllers");
        Self {
            brain_model: Arc::new(BrainModelController::new(sources.brain_model, policy)),
            clinical: Arc::new(ClinicalController::new(sources.clinical, policy)),
            biometric: Arc::new(BiometricController::with_thresholds(
                sources.biometric,
                policy,
                config.biometric.clone(),
            )),
            temporal: Arc::new(TemporalController::new(sources.temporal, policy)),
            neural: Arc::new(NeuralActivityController::new(sources.neural, policy)),
        }
    }

    /// Revision receivers for every controller.
    pub fn subscribe_all(&self) -> [watch::Receiver<u64>; 5] {
        [
            self.brain_model.core().subscribe(),
            self.clinical.core().subscribe(),
            self.biometric.core().subscribe(),
            self.temporal.core().subscribe(),
            self.neural.core().subscribe(),
        ]
    }

    pub async fn reset_all(&self) {
        self.brain_model.core().reset().await;
        self.clinical.core().reset().await;
        self.biometric.core().reset().await;
        self.temporal.core().reset().await;
        self.neural.core().reset().await;
    }
}
