//! Temporal dynamics: per-scale series plus the derived analyses.
//!
//! The analysis functions are pure so they can be tested without a runtime.
//! The controller runs them on the series for the current scale.

use neurotwin_core::{
    AdapterError, CommitPolicy, ControllerError, Domain, PatientId, StateTransition, TemporalAnalysis,
    TemporalDynamics, TemporalFeatures, TemporalSource, TimeScale,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::controller::{ControllerCore, ControllerState};

/// Smallest jump reported as a transition, whatever the series' noise level.
const MIN_TRANSITION: f32 = 0.05;
const TRANSITION_SIGMA: f32 = 1.5;

#[derive(Debug, Clone, Default)]
pub struct TemporalData {
    pub dynamics: BTreeMap<TimeScale, TemporalDynamics>,
    pub current_scale: Option<TimeScale>,
    pub analysis: Option<TemporalAnalysis>,
    pub transitions: Vec<StateTransition>,
    pub features: Option<TemporalFeatures>,
}

impl TemporalData {
    pub fn current(&self) -> Option<&TemporalDynamics> {
        self.current_scale.and_then(|scale| self.dynamics.get(&scale))
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

fn diffs(values: &[f32]) -> Vec<f32> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

pub fn analyze(dynamics: &TemporalDynamics) -> TemporalAnalysis {
    let values = dynamics.values();
    let n = values.len();
    let mu = mean(&values);
    let variance = if n == 0 {
        0.0
    } else {
        values.iter().map(|v| (v - mu).powi(2)).sum::<f32>() / n as f32
    };

    // Least squares against the sample index.
    let x_mean = (n as f32 - 1.0) / 2.0;
    let (mut num, mut den) = (0.0f32, 0.0f32);
    for (i, v) in values.iter().enumerate() {
        let dx = i as f32 - x_mean;
        num += dx * (v - mu);
        den += dx * dx;
    }
    let trend_slope = if den > 0.0 { num / den } else { 0.0 };

    let (min, max) = if n == 0 {
        (0.0, 0.0)
    } else {
        (
            values.iter().copied().fold(f32::INFINITY, f32::min),
            values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        )
    };

    TemporalAnalysis {
        scale: dynamics.scale,
        sample_count: n,
        mean: mu,
        variance,
        min,
        max,
        trend_slope,
    }
}

/// Jumps between consecutive samples larger than the series' usual step.
pub fn detect_transitions(dynamics: &TemporalDynamics) -> Vec<StateTransition> {
    let values = dynamics.values();
    let steps = diffs(&values);
    if steps.is_empty() {
        return Vec::new();
    }
    let step_mean = mean(&steps);
    let step_std = (steps.iter().map(|d| (d - step_mean).powi(2)).sum::<f32>()
        / steps.len() as f32)
        .sqrt();
    let threshold = (TRANSITION_SIGMA * step_std).max(MIN_TRANSITION);

    steps
        .iter()
        .enumerate()
        .filter(|(_, d)| d.abs() > threshold)
        .map(|(i, d)| StateTransition {
            at: dynamics.points[i + 1].timestamp,
            index: i + 1,
            from_level: values[i],
            to_level: values[i + 1],
            magnitude: d.abs(),
        })
        .collect()
}

pub fn extract_features(dynamics: &TemporalDynamics) -> TemporalFeatures {
    let values = dynamics.values();
    let n = values.len();
    let mu = mean(&values);
    let centred: Vec<f32> = values.iter().map(|v| v - mu).collect();
    let denom: f32 = centred.iter().map(|c| c * c).sum();

    let mut dominant_period = None;
    let mut peak_autocorrelation = 0.0f32;
    if denom > f32::EPSILON {
        for lag in 1..=n / 2 {
            let r = centred
                .iter()
                .zip(centred.iter().skip(lag))
                .map(|(a, b)| a * b)
                .sum::<f32>()
                / denom;
            if r > peak_autocorrelation {
                peak_autocorrelation = r;
                dominant_period = Some(lag);
            }
        }
    }

    let steps = diffs(&values);
    TemporalFeatures {
        scale: dynamics.scale,
        dominant_period,
        peak_autocorrelation,
        volatility: mean(&steps.iter().map(|d| d.abs()).collect::<Vec<_>>()),
        energy: mean(&values.iter().map(|v| v * v).collect::<Vec<_>>()),
    }
}

pub struct TemporalController {
    core: ControllerCore<TemporalData>,
    source: Arc<dyn TemporalSource>,
}

impl TemporalController {
    pub fn new(source: Arc<dyn TemporalSource>, policy: CommitPolicy) -> Self {
        Self {
            core: ControllerCore::new(Domain::Temporal, policy, |d| {
                d.dynamics.values().map(|dy| dy.points.len()).sum()
            }),
            source,
        }
    }

    pub fn core(&self) -> &ControllerCore<TemporalData> {
        &self.core
    }

    pub async fn snapshot(&self) -> ControllerState<TemporalData> {
        self.core.snapshot().await
    }

    /// Fetch the series for `scale` and make it the current one.
    pub async fn load(
        &self,
        patient: &PatientId,
        scale: TimeScale,
    ) -> Result<TemporalDynamics, ControllerError> {
        let source = Arc::clone(&self.source);
        let patient = patient.clone();
        self.core
            .run(
                "load",
                async move {
                    let dynamics = source.fetch_dynamics(&patient, scale).await?;
                    if dynamics.scale != scale {
                        return Err(AdapterError::invalid_response(
                            "temporal dynamics service",
                            format!("requested {} series, got {}", scale, dynamics.scale),
                        ));
                    }
                    Ok(dynamics)
                },
                move |data, dynamics| {
                    data.dynamics.insert(scale, dynamics.clone());
                    data.current_scale = Some(scale);
                },
            )
            .await
    }

    async fn current_series(
        &self,
        epoch: u64,
        operation: &'static str,
        message: &str,
    ) -> Result<TemporalDynamics, ControllerError> {
        match self.core.read(|d| d.current().cloned()).await {
            Some(dynamics) => Ok(dynamics),
            None => {
                self.core
                    .reject_in(epoch, operation, ControllerError::precondition(message))
                    .await
            }
        }
    }

    pub async fn analyze(&self) -> Result<TemporalAnalysis, ControllerError> {
        let epoch = self.core.epoch();
        let dynamics = self
            .current_series(epoch, "analyze", "No temporal data available for analysis")
            .await?;
        self.core
            .run_in(
                epoch,
                "analyze",
                async move { Ok(analyze(&dynamics)) },
                |data, analysis| data.analysis = Some(analysis.clone()),
            )
            .await
    }

    pub async fn detect_transitions(&self) -> Result<Vec<StateTransition>, ControllerError> {
        let epoch = self.core.epoch();
        let dynamics = self
            .current_series(
                epoch,
                "detect_transitions",
                "No temporal data available for transition detection",
            )
            .await?;
        self.core
            .run_in(
                epoch,
                "detect_transitions",
                async move { Ok(detect_transitions(&dynamics)) },
                |data, transitions| data.transitions = transitions.clone(),
            )
            .await
    }

    pub async fn extract_features(&self) -> Result<TemporalFeatures, ControllerError> {
        let epoch = self.core.epoch();
        let dynamics = self
            .current_series(
                epoch,
                "extract_features",
                "No temporal data available for feature extraction",
            )
            .await?;
        self.core
            .run_in(
                epoch,
                "extract_features",
                async move { Ok(extract_features(&dynamics)) },
                |data, features| data.features = Some(features.clone()),
            )
            .await
    }
}
