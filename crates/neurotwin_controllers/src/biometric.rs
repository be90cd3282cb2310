use chrono::{DateTime, Utc};
use neurotwin_core::{
    AlertId, AlertSeverity, BiometricAlert, BiometricKind, BiometricSource, BiometricStream,
    BiometricThresholds, CommitPolicy, ControllerError, Domain, PatientId,
};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::controller::{ControllerCore, ControllerState};

/// Oldest alerts are dropped beyond this many.
pub const MAX_ALERTS: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct BiometricData {
    pub streams: Vec<BiometricStream>,
    pub alerts: Vec<BiometricAlert>,
    pub thresholds: BiometricThresholds,
    pub acknowledged: BTreeSet<AlertId>,
}

impl BiometricData {
    pub fn unacknowledged(&self) -> impl Iterator<Item = &BiometricAlert> {
        self.alerts.iter().filter(|a| !a.acknowledged)
    }
}

/// A threshold breach before it is given an id.
#[derive(Debug, Clone, PartialEq)]
pub struct Breach {
    pub kind: BiometricKind,
    pub value: f32,
    pub threshold: f32,
    pub severity: AlertSeverity,
    pub observed_at: DateTime<Utc>,
}

/// Check the latest sample of each stream against the thresholds.
pub fn evaluate(streams: &[BiometricStream], thresholds: &BiometricThresholds) -> Vec<Breach> {
    let mut breaches = Vec::new();
    for stream in streams {
        let Some(sample) = stream.latest() else {
            continue;
        };
        let v = sample.value;
        let hit = match stream.kind {
            BiometricKind::HeartRate => {
                if v >= thresholds.heart_rate_critical {
                    Some((thresholds.heart_rate_critical, AlertSeverity::Critical))
                } else if v >= thresholds.heart_rate_warning {
                    Some((thresholds.heart_rate_warning, AlertSeverity::Warning))
                } else {
                    None
                }
            }
            BiometricKind::EegAlphaPower => (v < thresholds.eeg_alpha_low_warning)
                .then_some((thresholds.eeg_alpha_low_warning, AlertSeverity::Warning)),
            BiometricKind::StressIndex => {
                if v >= thresholds.stress_index_critical {
                    Some((thresholds.stress_index_critical, AlertSeverity::Critical))
                } else if v >= thresholds.stress_index_warning {
                    Some((thresholds.stress_index_warning, AlertSeverity::Warning))
                } else {
                    None
                }
            }
            BiometricKind::OxygenSaturation => {
                if v <= thresholds.oxygen_saturation_critical {
                    Some((thresholds.oxygen_saturation_critical, AlertSeverity::Critical))
                } else if v <= thresholds.oxygen_saturation_warning {
                    Some((thresholds.oxygen_saturation_warning, AlertSeverity::Warning))
                } else {
                    None
                }
            }
        };
        if let Some((threshold, severity)) = hit {
            breaches.push(Breach {
                kind: stream.kind,
                value: v,
                threshold,
                severity,
                observed_at: sample.timestamp,
            });
        }
    }
    breaches
}

pub struct BiometricController {
    core: ControllerCore<BiometricData>,
    source: Arc<dyn BiometricSource>,
}

impl BiometricController {
    pub fn new(source: Arc<dyn BiometricSource>, policy: CommitPolicy) -> Self {
        Self::with_thresholds(source, policy, BiometricThresholds::default())
    }

    pub fn with_thresholds(
        source: Arc<dyn BiometricSource>,
        policy: CommitPolicy,
        thresholds: BiometricThresholds,
    ) -> Self {
        let initial = BiometricData {
            thresholds,
            ..BiometricData::default()
        };
        Self {
            core: ControllerCore::with_initial(
                Domain::Biometric,
                policy,
                |d| d.streams.iter().map(|s| s.samples.len()).sum::<usize>() + d.alerts.len(),
                initial,
            ),
            source,
        }
    }

    pub fn core(&self) -> &ControllerCore<BiometricData> {
        &self.core
    }

    pub async fn snapshot(&self) -> ControllerState<BiometricData> {
        self.core.snapshot().await
    }

    pub async fn load(&self, patient: &PatientId) -> Result<Vec<BiometricStream>, ControllerError> {
        let source = Arc::clone(&self.source);
        let patient = patient.clone();
        self.core
            .run(
                "load",
                async move { source.fetch_streams(&patient).await },
                |data, streams| data.streams = streams.clone(),
            )
            .await
    }

    /// Raise alerts for the latest samples. Returns only alerts raised by this
    /// call; a breach already alerted for the same sample is skipped.
    pub async fn detect_alerts(&self) -> Result<Vec<BiometricAlert>, ControllerError> {
        let epoch = self.core.epoch();
        let (breaches, known) = self
            .core
            .read(|d| {
                let known: Vec<(BiometricKind, DateTime<Utc>)> =
                    d.alerts.iter().map(|a| (a.kind, a.raised_at)).collect();
                (
                    (!d.streams.is_empty()).then(|| evaluate(&d.streams, &d.thresholds)),
                    known,
                )
            })
            .await;
        let Some(breaches) = breaches else {
            return self
                .core
                .reject_in(
                    epoch,
                    "detect_alerts",
                    ControllerError::precondition("No biometric data available for alert detection"),
                )
                .await;
        };

        let fresh: Vec<BiometricAlert> = breaches
            .into_iter()
            .filter(|b| !known.contains(&(b.kind, b.observed_at)))
            .map(|b| BiometricAlert {
                id: AlertId::new(uuid::Uuid::new_v4().to_string()),
                kind: b.kind,
                value: b.value,
                threshold: b.threshold,
                severity: b.severity,
                raised_at: b.observed_at,
                acknowledged: false,
            })
            .collect();

        self.core
            .run_in(epoch, "detect_alerts", async move { Ok(fresh) }, |data, fresh| {
                for alert in fresh {
                    let duplicate = data
                        .alerts
                        .iter()
                        .any(|a| a.kind == alert.kind && a.raised_at == alert.raised_at);
                    if !duplicate {
                        data.alerts.push(alert.clone());
                    }
                }
                if data.alerts.len() > MAX_ALERTS {
                    let excess = data.alerts.len() - MAX_ALERTS;
                    data.alerts.drain(..excess);
                }
                let live: BTreeSet<&AlertId> = data.alerts.iter().map(|a| &a.id).collect();
                data.acknowledged.retain(|id| live.contains(id));
            })
            .await
    }

    pub async fn configure(&self, thresholds: BiometricThresholds) {
        tracing::info!(?thresholds, "biometric thresholds updated");
        self.core.update(|data| data.thresholds = thresholds).await;
    }

    pub async fn acknowledge_alert(&self, id: &AlertId) -> Result<BiometricAlert, ControllerError> {
        let epoch = self.core.epoch();
        let alert = self
            .core
            .read(|d| d.alerts.iter().find(|a| &a.id == id).cloned())
            .await;
        let Some(mut alert) = alert else {
            return self
                .core
                .reject_in(
                    epoch,
                    "acknowledge_alert",
                    ControllerError::precondition(format!("Unknown biometric alert: {}", id)),
                )
                .await;
        };
        alert.acknowledged = true;

        self.core
            .run_in(epoch, "acknowledge_alert", async move { Ok(alert) }, |data, acked| {
                if let Some(existing) = data.alerts.iter_mut().find(|a| a.id == acked.id) {
                    existing.acknowledged = true;
                    data.acknowledged.insert(acked.id.clone());
                }
            })
            .await
    }
}
