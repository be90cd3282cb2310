//! Domain records exchanged between data sources, controllers and the
//! visualization layer.
//!
//! Everything here is plain data: cloneable, serializable, no behaviour
//! beyond small derivations (lookups, transforms, latest sample).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(PatientId);
string_id!(RegionId);
string_id!(SymptomId);
string_id!(TreatmentId);
string_id!(AlertId);

// ============================================================================
// View settings
// ============================================================================

/// Temporal resolution used for dynamics queries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TimeScale {
    Momentary,
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl TimeScale {
    pub const ALL: [TimeScale; 5] = [
        TimeScale::Momentary,
        TimeScale::Hourly,
        TimeScale::Daily,
        TimeScale::Weekly,
        TimeScale::Monthly,
    ];

    /// Spacing between consecutive samples at this scale.
    pub fn sample_spacing(self) -> Duration {
        match self {
            TimeScale::Momentary => Duration::seconds(1),
            TimeScale::Hourly => Duration::minutes(1),
            TimeScale::Daily => Duration::hours(1),
            TimeScale::Weekly => Duration::hours(6),
            TimeScale::Monthly => Duration::days(1),
        }
    }

    /// Number of samples a window at this scale holds.
    pub fn window_len(self) -> usize {
        match self {
            TimeScale::Momentary => 60,
            TimeScale::Hourly => 60,
            TimeScale::Daily => 24,
            TimeScale::Weekly => 28,
            TimeScale::Monthly => 30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeScale::Momentary => "momentary",
            TimeScale::Hourly => "hourly",
            TimeScale::Daily => "daily",
            TimeScale::Weekly => "weekly",
            TimeScale::Monthly => "monthly",
        }
    }
}

impl fmt::Display for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Anatomical,
    FunctionalActivity,
    Connectivity,
    RiskHeatmap,
    TreatmentResponse,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

// ============================================================================
// Brain model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hemisphere {
    Left,
    Right,
    Midline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainRegion {
    pub id: RegionId,
    pub name: String,
    pub hemisphere: Hemisphere,
    /// Resting activation level (0.0 - 1.0)
    pub baseline_activity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralConnection {
    pub source: RegionId,
    pub target: RegionId,
    /// Connection weight (0.0 - 1.0)
    pub strength: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrainModel {
    pub patient_id: PatientId,
    pub regions: Vec<BrainRegion>,
    pub connections: Vec<NeuralConnection>,
    pub generated_at: DateTime<Utc>,
}

impl BrainModel {
    pub fn region(&self, id: &RegionId) -> Option<&BrainRegion> {
        self.regions.iter().find(|r| &r.id == id)
    }

    pub fn contains_region(&self, id: &RegionId) -> bool {
        self.region(id).is_some()
    }
}

// ============================================================================
// Clinical
// ============================================================================

/// Links a clinical symptom to the brain regions implicated in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomMapping {
    pub symptom_id: SymptomId,
    pub symptom_name: String,
    pub region_ids: Vec<RegionId>,
    /// Clinician-rated severity (0.0 - 1.0)
    pub severity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPrediction {
    pub treatment_id: TreatmentId,
    pub name: String,
    /// Predicted symptom reduction (0.0 - 1.0)
    pub efficacy: f32,
    pub confidence: f32,
    pub target_regions: Vec<RegionId>,
}

// ============================================================================
// Biometric
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiometricKind {
    HeartRate,
    EegAlphaPower,
    StressIndex,
    OxygenSaturation,
}

impl BiometricKind {
    pub const ALL: [BiometricKind; 4] = [
        BiometricKind::HeartRate,
        BiometricKind::EegAlphaPower,
        BiometricKind::StressIndex,
        BiometricKind::OxygenSaturation,
    ];

    pub fn unit(self) -> &'static str {
        match self {
            BiometricKind::HeartRate => "bpm",
            BiometricKind::EegAlphaPower => "uV^2",
            BiometricKind::StressIndex => "index",
            BiometricKind::OxygenSaturation => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiometricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricStream {
    pub kind: BiometricKind,
    pub samples: Vec<BiometricSample>,
}

impl BiometricStream {
    pub fn latest(&self) -> Option<&BiometricSample> {
        self.samples.iter().max_by_key(|s| s.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricAlert {
    pub id: AlertId,
    pub kind: BiometricKind,
    pub value: f32,
    pub threshold: f32,
    pub severity: AlertSeverity,
    pub raised_at: DateTime<Utc>,
    pub acknowledged: bool,
}

// ============================================================================
// Temporal dynamics
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalDynamics {
    pub scale: TimeScale,
    pub points: Vec<TemporalPoint>,
    pub fetched_at: DateTime<Utc>,
}

impl TemporalDynamics {
    pub fn values(&self) -> Vec<f32> {
        self.points.iter().map(|p| p.value).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalAnalysis {
    pub scale: TimeScale,
    pub sample_count: usize,
    pub mean: f32,
    pub variance: f32,
    pub min: f32,
    pub max: f32,
    /// Least-squares slope per sample
    pub trend_slope: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub at: DateTime<Utc>,
    pub index: usize,
    pub from_level: f32,
    pub to_level: f32,
    pub magnitude: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalFeatures {
    pub scale: TimeScale,
    /// Lag (in samples) with the strongest positive autocorrelation, if any
    pub dominant_period: Option<usize>,
    pub peak_autocorrelation: f32,
    /// Mean absolute first difference
    pub volatility: f32,
    /// Mean squared value
    pub energy: f32,
}

// ============================================================================
// Neural activity
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeuralActivity {
    pub activations: BTreeMap<RegionId, f32>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl NeuralActivity {
    pub fn activation(&self, region: &RegionId) -> Option<f32> {
        self.activations.get(region).copied()
    }
}

/// Transform applied on top of the baseline activity map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NeuralTransform {
    /// Multiply every activation
    Scale { factor: f32 },
    /// Add a constant to every activation
    Offset { delta: f32 },
    /// Zero activations below `min`
    Threshold { min: f32 },
    /// Rescale so the strongest activation is 1.0
    Normalize,
}

impl NeuralTransform {
    /// Apply in place. Results are clamped to [0.0, 1.0].
    pub fn apply(&self, activity: &mut NeuralActivity) {
        let peak = activity
            .activations
            .values()
            .copied()
            .fold(0.0f32, f32::max);
        for value in activity.activations.values_mut() {
            let next = match *self {
                NeuralTransform::Scale { factor } => *value * factor,
                NeuralTransform::Offset { delta } => *value + delta,
                NeuralTransform::Threshold { min } => {
                    if *value < min {
                        0.0
                    } else {
                        *value
                    }
                }
                NeuralTransform::Normalize => {
                    if peak > f32::EPSILON {
                        *value / peak
                    } else {
                        *value
                    }
                }
            };
            *value = if next.is_finite() {
                next.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
    }
}

// ============================================================================
// Performance
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceCounters {
    pub frame_rate: f32,
    pub memory_usage_mb: f32,
    pub sampled_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Sync status
// ============================================================================

/// Clinical data domains, one controller each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    BrainModel,
    Clinical,
    Biometric,
    Temporal,
    NeuralActivity,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::BrainModel,
        Domain::Clinical,
        Domain::Biometric,
        Domain::Temporal,
        Domain::NeuralActivity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::BrainModel => "brain_model",
            Domain::Clinical => "clinical",
            Domain::Biometric => "biometric",
            Domain::Temporal => "temporal",
            Domain::NeuralActivity => "neural_activity",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch lifecycle. The error message lives inside `Error`, so an error state
/// without a message (or a message without an error state) cannot exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum LoadingState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error(String),
}

impl LoadingState {
    pub fn error_message(&self) -> Option<&str> {
        match self {
            LoadingState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LoadingState::Error(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoadingState::Idle => "idle",
            LoadingState::Loading => "loading",
            LoadingState::Loaded => "loaded",
            LoadingState::Error(_) => "error",
        }
    }
}
