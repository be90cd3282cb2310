//! The sync orchestrator: mounts a patient, runs the initial fan-out, keeps
//! every domain fresh on its own cadence and folds results into one
//! [`SyncState`].

use neurotwin_controllers::DomainControllers;
use neurotwin_core::{
    ActivitySignal, DetailLevel, Domain, NeuroTwinConfig, PatientId, PerformanceProbe, RegionId,
    RenderMode, TimeScale, TreatmentId,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::correlation::derive_active_regions;
use crate::scheduler::{PollScheduler, PollTask};
use crate::state::{reduce, SyncAction, SyncState};

/// Synchronous inputs that are not domain controllers.
#[derive(Clone)]
pub struct Collaborators {
    pub performance: Arc<dyn PerformanceProbe>,
    pub activity: Arc<dyn ActivitySignal>,
}

/// Single writer for [`SyncState`]. Actions are reduced in dispatch order.
#[derive(Clone)]
struct Dispatcher {
    tx: Arc<watch::Sender<SyncState>>,
}

impl Dispatcher {
    fn new(patient: PatientId) -> Self {
        let (tx, _) = watch::channel(SyncState::new(patient));
        Self { tx: Arc::new(tx) }
    }

    fn dispatch(&self, action: SyncAction) {
        self.tx.send_modify(|state| reduce(state, action));
    }

    /// Dispatch only while `patient` is still the mounted one. Results of
    /// fetches started before a patient switch are dropped here.
    fn dispatch_for(&self, patient: &PatientId, action: SyncAction) {
        self.tx.send_if_modified(|state| {
            if &state.patient_id != patient {
                tracing::debug!(%patient, current = %state.patient_id, "result for previous patient dropped");
                return false;
            }
            reduce(state, action);
            true
        });
    }

    fn fail(&self, patient: &PatientId, domain: Domain, message: String) {
        self.dispatch_for(patient, SyncAction::DomainFailed { domain, message });
    }

    fn replace(&self, state: SyncState) {
        self.tx.send_replace(state);
    }

    fn state(&self) -> SyncState {
        self.tx.borrow().clone()
    }

    fn is_mounted(&self, patient: &PatientId) -> bool {
        &self.tx.borrow().patient_id == patient
    }
}

struct Inner {
    dispatcher: Dispatcher,
    controllers: DomainControllers,
    collaborators: Collaborators,
    config: NeuroTwinConfig,
}

// ============================================================================
// Domain refreshes
// ============================================================================
//
// Each refresh returns whether it succeeded; the scheduler uses that for
// backoff. Failures only ever reach state as a message. Every controller step
// checks the patient is still mounted first, so a tick that outlives a patient
// switch stops at its next step.

impl Inner {
    async fn refresh_brain_model(&self, patient: &PatientId) -> bool {
        if !self.dispatcher.is_mounted(patient) {
            return false;
        }
        self.dispatcher
            .dispatch_for(patient, SyncAction::BrainModelRequested);
        match self.controllers.brain_model.load(patient).await {
            Ok(model) => {
                self.dispatcher
                    .dispatch_for(patient, SyncAction::BrainModelLoaded(model));
                true
            }
            Err(err) => {
                self.dispatcher
                    .fail(patient, Domain::BrainModel, err.to_string());
                false
            }
        }
    }

    async fn refresh_clinical(&self, patient: &PatientId) -> bool {
        let clinical = &self.controllers.clinical;
        if !self.dispatcher.is_mounted(patient) {
            return false;
        }
        let mappings = match clinical.load(patient, &[]).await {
            Ok(mappings) => mappings,
            Err(err) => {
                self.dispatcher.fail(patient, Domain::Clinical, err.to_string());
                return false;
            }
        };
        self.dispatcher
            .dispatch_for(patient, SyncAction::SymptomMappingsLoaded(mappings));

        if !self.dispatcher.is_mounted(patient) {
            return false;
        }
        match clinical.predict_treatments(patient).await {
            Ok(predictions) => {
                self.dispatcher
                    .dispatch_for(patient, SyncAction::TreatmentsPredicted(predictions));
                true
            }
            Err(err) => {
                self.dispatcher.fail(patient, Domain::Clinical, err.to_string());
                false
            }
        }
    }

    async fn refresh_biometric(&self, patient: &PatientId) -> bool {
        let biometric = &self.controllers.biometric;
        if !self.dispatcher.is_mounted(patient) {
            return false;
        }
        let streams = match biometric.load(patient).await {
            Ok(streams) => streams,
            Err(err) => {
                self.dispatcher.fail(patient, Domain::Biometric, err.to_string());
                return false;
            }
        };

        if !self.dispatcher.is_mounted(patient) {
            return false;
        }
        let detected = biometric.detect_alerts().await;
        let alerts = biometric.core().read(|d| d.alerts.clone()).await;
        self.dispatcher
            .dispatch_for(patient, SyncAction::BiometricsUpdated { streams, alerts });

        match detected {
            Ok(raised) => {
                if !raised.is_empty() {
                    tracing::info!(%patient, count = raised.len(), "biometric alerts raised");
                }
                true
            }
            Err(err) => {
                self.dispatcher.fail(patient, Domain::Biometric, err.to_string());
                false
            }
        }
    }

    /// Load the series for `scale`, then run the analysis suite over it.
    async fn refresh_temporal(&self, patient: &PatientId, scale: TimeScale) -> bool {
        let temporal = &self.controllers.temporal;
        if !self.dispatcher.is_mounted(patient) {
            return false;
        }
        match temporal.load(patient, scale).await {
            Ok(dynamics) => {
                self.dispatcher
                    .dispatch_for(patient, SyncAction::TemporalLoaded(dynamics));
            }
            Err(err) => {
                self.dispatcher.fail(patient, Domain::Temporal, err.to_string());
                return false;
            }
        }

        if !self.dispatcher.is_mounted(patient) {
            return false;
        }
        let (analysis, transitions, features) = tokio::join!(
            temporal.analyze(),
            temporal.detect_transitions(),
            temporal.extract_features(),
        );
        let failure = [
            analysis.err(),
            transitions.err(),
            features.err(),
        ]
        .into_iter()
        .flatten()
        .next();
        match failure {
            None => true,
            Some(err) => {
                self.dispatcher.fail(patient, Domain::Temporal, err.to_string());
                false
            }
        }
    }

    async fn refresh_neural(&self, patient: &PatientId) -> bool {
        if !self.dispatcher.is_mounted(patient) {
            return false;
        }
        match self.controllers.neural.load_baseline(patient).await {
            Ok(_) => true,
            Err(err) => {
                self.dispatcher
                    .fail(patient, Domain::NeuralActivity, err.to_string());
                false
            }
        }
    }

    fn sample_performance(&self, patient: &PatientId) -> bool {
        let counters = self.collaborators.performance.sample();
        self.dispatcher
            .dispatch_for(patient, SyncAction::PerformanceSampled(counters));
        true
    }

    fn correlate(&self, patient: &PatientId) -> bool {
        let state = self.dispatcher.state();
        if let Some(active) = derive_active_regions(
            state.brain_model.as_ref(),
            &state.symptom_mappings,
            self.collaborators.activity.as_ref(),
        ) {
            tracing::trace!(%patient, active = active.len(), "active regions derived");
            self.dispatcher
                .dispatch_for(patient, SyncAction::ActiveRegionsDerived(active));
        }
        true
    }

    /// One load per domain, concurrently.
    async fn initial_load(&self, patient: &PatientId) {
        let scale = self.dispatcher.state().time_scale;
        let _ = tokio::join!(
            self.refresh_brain_model(patient),
            self.refresh_clinical(patient),
            self.refresh_biometric(patient),
            self.refresh_temporal(patient, scale),
            self.refresh_neural(patient),
        );
        self.sample_performance(patient);
    }
}

fn arm(scheduler: &mut PollScheduler, inner: &Arc<Inner>, patient: &PatientId) {
    let polling = inner.config.polling.clone();
    for task in PollTask::ALL {
        let inner = Arc::clone(inner);
        let patient = patient.clone();
        scheduler.schedule(task, task.interval(&polling), move || {
            let inner = Arc::clone(&inner);
            let patient = patient.clone();
            async move {
                match task {
                    PollTask::BrainModel => inner.refresh_brain_model(&patient).await,
                    PollTask::Biometric => inner.refresh_biometric(&patient).await,
                    PollTask::Temporal => {
                        let scale = inner.dispatcher.state().time_scale;
                        inner.refresh_temporal(&patient, scale).await
                    }
                    PollTask::Performance => inner.sample_performance(&patient),
                    PollTask::Correlation => inner.correlate(&patient),
                }
            }
        });
    }
}

pub struct SyncOrchestrator {
    inner: Arc<Inner>,
    scheduler: Mutex<PollScheduler>,
}

impl SyncOrchestrator {
    /// Mount for `patient`: initial loads, then the five polling tasks.
    pub async fn mount(
        patient: PatientId,
        config: NeuroTwinConfig,
        controllers: DomainControllers,
        collaborators: Collaborators,
    ) -> Self {
        let scheduler = PollScheduler::new(config.backoff.clone());
        let inner = Arc::new(Inner {
            dispatcher: Dispatcher::new(patient.clone()),
            controllers,
            collaborators,
            config,
        });

        tracing::info!(%patient, "mounting sync orchestrator");
        inner.initial_load(&patient).await;

        let orchestrator = Self {
            inner,
            scheduler: Mutex::new(scheduler),
        };
        arm(&mut orchestrator.scheduler(), &orchestrator.inner, &patient);
        orchestrator
    }

    fn scheduler(&self) -> MutexGuard<'_, PollScheduler> {
        self.scheduler.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> SyncState {
        self.inner.dispatcher.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.inner.dispatcher.tx.subscribe()
    }

    pub fn patient(&self) -> PatientId {
        self.inner.dispatcher.tx.borrow().patient_id.clone()
    }

    pub fn controllers(&self) -> &DomainControllers {
        &self.inner.controllers
    }

    pub fn config(&self) -> &NeuroTwinConfig {
        &self.inner.config
    }

    pub fn active_tasks(&self) -> Vec<PollTask> {
        self.scheduler().active()
    }

    /// Raw dispatch for collaborators that sync controller results into state.
    pub fn dispatch(&self, action: SyncAction) {
        self.inner.dispatcher.dispatch(action);
    }

    // ========================================================================
    // Actions
    // ========================================================================

    pub fn select_region(&self, region: RegionId) {
        self.dispatch(SyncAction::SelectRegion(region));
    }

    pub fn deselect_region(&self, region: RegionId) {
        self.dispatch(SyncAction::DeselectRegion(region));
    }

    pub fn toggle_region(&self, region: RegionId) {
        self.dispatch(SyncAction::ToggleRegion(region));
    }

    pub fn select_treatment(&self, treatment: Option<TreatmentId>) {
        self.dispatch(SyncAction::SelectTreatment(treatment));
    }

    pub fn set_render_mode(&self, mode: RenderMode) {
        self.dispatch(SyncAction::SetRenderMode(mode));
    }

    pub fn set_detail_level(&self, level: DetailLevel) {
        self.dispatch(SyncAction::SetDetailLevel(level));
    }

    /// Switch scale now and reload temporal data for it in the background.
    /// The handle resolves to whether the reload succeeded.
    pub fn set_time_scale(&self, scale: TimeScale) -> JoinHandle<bool> {
        self.dispatch(SyncAction::SetTimeScale(scale));
        let inner = Arc::clone(&self.inner);
        let patient = self.patient();
        tokio::spawn(async move { inner.refresh_temporal(&patient, scale).await })
    }

    pub fn clear_error(&self) {
        self.dispatch(SyncAction::ClearError);
    }

    pub fn reset(&self) {
        self.dispatch(SyncAction::Reset);
    }

    /// Tear down the current patient and mount `patient` in its place.
    ///
    /// Ticks still running for the previous patient stop at their next step,
    /// and anything they fetch is dropped by both the dispatcher and the
    /// controller reset epoch.
    pub async fn switch_patient(&self, patient: PatientId) {
        let previous = self.patient();
        self.scheduler().shutdown();
        self.inner.dispatcher.replace(SyncState::new(patient.clone()));
        self.inner.controllers.reset_all().await;
        tracing::info!(%previous, %patient, "switching patient");

        self.inner.initial_load(&patient).await;
        arm(&mut self.scheduler(), &self.inner, &patient);
    }

    /// Stop all polling. Safe to call more than once.
    pub fn shutdown(&self) {
        let stopped = self.scheduler().shutdown();
        if stopped > 0 {
            tracing::info!(patient = %self.patient(), stopped, "sync orchestrator unmounted");
        }
    }
}
