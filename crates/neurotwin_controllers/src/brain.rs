use neurotwin_core::{
    BrainModel, BrainModelSource, CommitPolicy, ControllerError, Domain, PatientId,
};
use std::sync::Arc;

use crate::controller::{ControllerCore, ControllerState};

#[derive(Debug, Clone, Default)]
pub struct BrainModelData {
    pub model: Option<BrainModel>,
}

pub struct BrainModelController {
    core: ControllerCore<BrainModelData>,
    source: Arc<dyn BrainModelSource>,
}

impl BrainModelController {
    pub fn new(source: Arc<dyn BrainModelSource>, policy: CommitPolicy) -> Self {
        Self {
            core: ControllerCore::new(Domain::BrainModel, policy, |d| {
                d.model.as_ref().map_or(0, |m| m.regions.len())
            }),
            source,
        }
    }

    pub fn core(&self) -> &ControllerCore<BrainModelData> {
        &self.core
    }

    pub async fn snapshot(&self) -> ControllerState<BrainModelData> {
        self.core.snapshot().await
    }

    pub async fn load(&self, patient: &PatientId) -> Result<BrainModel, ControllerError> {
        let source = Arc::clone(&self.source);
        let patient = patient.clone();
        self.core
            .run(
                "load",
                async move { source.fetch_brain_model(&patient).await },
                |data, model| data.model = Some(model.clone()),
            )
            .await
    }
}
