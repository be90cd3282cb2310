use neurotwin_core::{
    CommitPolicy, ControllerError, Domain, NeuralActivity, NeuralActivitySource, NeuralTransform,
    PatientId,
};
use std::sync::Arc;

use crate::controller::{ControllerCore, ControllerState};

const NO_BASELINE: &str = "No neural activity baseline loaded";

#[derive(Debug, Clone, Default)]
pub struct NeuralData {
    pub baseline: Option<NeuralActivity>,
    /// Baseline with `applied` folded over it
    pub current: Option<NeuralActivity>,
    pub applied: Vec<NeuralTransform>,
}

pub struct NeuralActivityController {
    core: ControllerCore<NeuralData>,
    source: Arc<dyn NeuralActivitySource>,
}

impl NeuralActivityController {
    pub fn new(source: Arc<dyn NeuralActivitySource>, policy: CommitPolicy) -> Self {
        Self {
            core: ControllerCore::new(Domain::NeuralActivity, policy, |d| {
                d.current.as_ref().map_or(0, |a| a.activations.len())
            }),
            source,
        }
    }

    pub fn core(&self) -> &ControllerCore<NeuralData> {
        &self.core
    }

    pub async fn snapshot(&self) -> ControllerState<NeuralData> {
        self.core.snapshot().await
    }

    pub async fn load_baseline(&self, patient: &PatientId) -> Result<NeuralActivity, ControllerError> {
        let source = Arc::clone(&self.source);
        let patient = patient.clone();
        self.core
            .run(
                "load_baseline",
                async move { source.fetch_baseline(&patient).await },
                |data, baseline| {
                    data.baseline = Some(baseline.clone());
                    data.current = Some(baseline.clone());
                    data.applied.clear();
                },
            )
            .await
    }

    /// Stack `transforms` on top of whatever is currently applied.
    pub async fn apply_transforms(
        &self,
        transforms: &[NeuralTransform],
    ) -> Result<NeuralActivity, ControllerError> {
        let epoch = self.core.epoch();
        let current = self
            .core
            .read(|d| d.current.clone().or_else(|| d.baseline.clone()))
            .await;
        let Some(mut activity) = current else {
            return self
                .core
                .reject_in(epoch, "apply_transforms", ControllerError::precondition(NO_BASELINE))
                .await;
        };

        let transforms = transforms.to_vec();
        let log = transforms.clone();
        self.core
            .run_in(
                epoch,
                "apply_transforms",
                async move {
                    for transform in &transforms {
                        transform.apply(&mut activity);
                    }
                    Ok(activity)
                },
                move |data, activity| {
                    data.current = Some(activity.clone());
                    data.applied.extend(log);
                },
            )
            .await
    }

    pub async fn reset_to_baseline(&self) -> Result<NeuralActivity, ControllerError> {
        let epoch = self.core.epoch();
        let Some(baseline) = self.core.read(|d| d.baseline.clone()).await else {
            return self
                .core
                .reject_in(epoch, "reset_to_baseline", ControllerError::precondition(NO_BASELINE))
                .await;
        };
        self.core
            .run_in(
                epoch,
                "reset_to_baseline",
                async move { Ok(baseline) },
                |data, baseline| {
                    data.current = Some(baseline.clone());
                    data.applied.clear();
                },
            )
            .await
    }
}
