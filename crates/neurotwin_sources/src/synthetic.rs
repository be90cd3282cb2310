//! Synthetic data sources: plausible clinical data without a backend.
//!
//! Structural data (atlas, symptom severities) is derived from a hash of the
//! patient id so it is stable across refreshes. Streaming data (biometrics,
//! temporal series, baseline activity) carries seeded noise so repeated polls
//! look alive.

use async_trait::async_trait;
use chrono::Utc;
use neurotwin_core::{
    AdapterError, BiometricKind, BiometricSample, BiometricSource, BiometricStream, BrainModel,
    BrainModelSource, ClinicalSource, NeuralActivity, NeuralActivitySource, PatientId,
    PerformanceCounters, PerformanceProbe, RegionId, SourceConfig, SourceResult, SymptomId,
    SymptomMapping, TemporalDynamics, TemporalPoint, TemporalSource, TimeScale,
    TreatmentId, TreatmentPrediction,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::f32::consts::TAU;
use std::sync::Mutex;
use std::time::Duration;

use crate::atlas;

const BIOMETRIC_WINDOW: usize = 10;

/// One synthetic backend implementing every domain source.
pub struct SyntheticSource {
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl SyntheticSource {
    pub fn new(config: &SourceConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        tracing::debug!(
            latency_ms = config.simulated_latency_ms,
            seed = ?config.seed,
            "synthetic source ready"
        );
        Self {
            latency: config.simulated_latency(),
            rng: Mutex::new(rng),
        }
    }

    /// Zero latency, fixed seed.
    pub fn instant(seed: u64) -> Self {
        Self::new(&SourceConfig {
            simulated_latency_ms: 0,
            seed: Some(seed),
        })
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn noise(&self, amplitude: f32) -> f32 {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen_range(-amplitude..=amplitude)
    }

    fn check_patient(patient: &PatientId) -> SourceResult<()> {
        if patient.as_str().trim().is_empty() {
            return Err(AdapterError::NotFound("patient ''".to_string()));
        }
        Ok(())
    }
}

/// Stable per-patient value in [0, 1) for a given salt (FNV-1a).
fn patient_fraction(patient: &PatientId, salt: &str) -> f32 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in patient.as_str().bytes().chain(salt.bytes()) {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % 10_000) as f32 / 10_000.0
}

#[async_trait]
impl BrainModelSource for SyntheticSource {
    async fn fetch_brain_model(&self, patient: &PatientId) -> SourceResult<BrainModel> {
        Self::check_patient(patient)?;
        self.simulate_latency().await;
        Ok(BrainModel {
            patient_id: patient.clone(),
            regions: atlas::regions(),
            connections: atlas::connections(),
            generated_at: Utc::now(),
        })
    }
}

#[async_trait]
impl ClinicalSource for SyntheticSource {
    async fn fetch_symptom_mappings(
        &self,
        patient: &PatientId,
        symptoms: &[SymptomId],
    ) -> SourceResult<Vec<SymptomMapping>> {
        Self::check_patient(patient)?;
        self.simulate_latency().await;

        let specs: Vec<&atlas::SymptomSpec> = if symptoms.is_empty() {
            atlas::SYMPTOMS.iter().collect()
        } else {
            symptoms
                .iter()
                .map(|id| {
                    atlas::symptom(id).ok_or_else(|| AdapterError::NotFound(format!("symptom {}", id)))
                })
                .collect::<SourceResult<_>>()?
        };

        Ok(specs
            .into_iter()
            .map(|symptom| SymptomMapping {
                symptom_id: SymptomId::from(symptom.id),
                symptom_name: symptom.name.to_string(),
                region_ids: symptom.regions.iter().map(|r| RegionId::from(*r)).collect(),
                severity: 0.2 + 0.75 * patient_fraction(patient, symptom.id),
            })
            .collect())
    }

    async fn predict_treatments(
        &self,
        patient: &PatientId,
        mappings: &[SymptomMapping],
    ) -> SourceResult<Vec<TreatmentPrediction>> {
        Self::check_patient(patient)?;
        self.simulate_latency().await;

        let implicated: HashSet<&RegionId> =
            mappings.iter().flat_map(|m| m.region_ids.iter()).collect();
        let mean_severity = if mappings.is_empty() {
            0.0
        } else {
            mappings.iter().map(|m| m.severity).sum::<f32>() / mappings.len() as f32
        };

        let mut predictions: Vec<TreatmentPrediction> = atlas::TREATMENTS
            .iter()
            .filter_map(|t| {
                let targets: Vec<RegionId> = t.targets.iter().map(|r| RegionId::from(*r)).collect();
                let covered = targets.iter().filter(|r| implicated.contains(r)).count();
                if covered == 0 {
                    return None;
                }
                let coverage = covered as f32 / targets.len() as f32;
                Some(TreatmentPrediction {
                    treatment_id: TreatmentId::from(t.id),
                    name: t.name.to_string(),
                    efficacy: (t.base_efficacy * (0.5 + 0.5 * coverage) * (1.0 - 0.3 * mean_severity))
                        .clamp(0.0, 1.0),
                    confidence: (0.5 + 0.4 * coverage).clamp(0.0, 1.0),
                    target_regions: targets,
                })
            })
            .collect();
        predictions.sort_by(|a, b| b.efficacy.total_cmp(&a.efficacy));
        Ok(predictions)
    }
}

#[async_trait]
impl BiometricSource for SyntheticSource {
    async fn fetch_streams(&self, patient: &PatientId) -> SourceResult<Vec<BiometricStream>> {
        Self::check_patient(patient)?;
        self.simulate_latency().await;

        let now = Utc::now();
        Ok(BiometricKind::ALL
            .iter()
            .map(|&kind| {
                let (centre, spread) = match kind {
                    BiometricKind::HeartRate => (72.0 + 30.0 * patient_fraction(patient, "hr"), 8.0),
                    BiometricKind::EegAlphaPower => (9.0, 3.0),
                    BiometricKind::StressIndex => (0.3 + 0.4 * patient_fraction(patient, "stress"), 0.15),
                    BiometricKind::OxygenSaturation => (97.0, 1.5),
                };
                let samples = (0..BIOMETRIC_WINDOW)
                    .map(|i| BiometricSample {
                        timestamp: now - chrono::Duration::seconds((BIOMETRIC_WINDOW - 1 - i) as i64),
                        value: centre + self.noise(spread),
                    })
                    .collect();
                BiometricStream { kind, samples }
            })
            .collect())
    }
}

#[async_trait]
impl TemporalSource for SyntheticSource {
    async fn fetch_dynamics(
        &self,
        patient: &PatientId,
        scale: TimeScale,
    ) -> SourceResult<TemporalDynamics> {
        Self::check_patient(patient)?;
        self.simulate_latency().await;

        let now = Utc::now();
        let len = scale.window_len();
        let period = (len as f32 / 2.0).max(2.0);
        let phase = TAU * patient_fraction(patient, scale.as_str());
        let spacing = scale.sample_spacing();
        let points = (0..len)
            .map(|i| {
                let wave = (TAU * i as f32 / period + phase).sin();
                TemporalPoint {
                    timestamp: now - spacing * (len - 1 - i) as i32,
                    value: (0.5 + 0.3 * wave + self.noise(0.05)).clamp(0.0, 1.0),
                }
            })
            .collect();

        Ok(TemporalDynamics {
            scale,
            points,
            fetched_at: now,
        })
    }
}

#[async_trait]
impl NeuralActivitySource for SyntheticSource {
    async fn fetch_baseline(&self, patient: &PatientId) -> SourceResult<NeuralActivity> {
        Self::check_patient(patient)?;
        self.simulate_latency().await;

        Ok(NeuralActivity {
            activations: atlas::REGIONS
                .iter()
                .map(|r| {
                    let value = (r.baseline + self.noise(0.05)).clamp(0.0, 1.0);
                    (RegionId::from(r.id), value)
                })
                .collect(),
            captured_at: Some(Utc::now()),
        })
    }
}

impl PerformanceProbe for SyntheticSource {
    fn sample(&self) -> PerformanceCounters {
        PerformanceCounters {
            frame_rate: (60.0 + self.noise(6.0)).max(0.0),
            memory_usage_mb: (256.0 + self.noise(32.0)).max(0.0),
            sampled_at: Some(Utc::now()),
        }
    }
}
