//! Activity signals deciding which mapped symptoms count as active during
//! cross-domain correlation.

use neurotwin_core::{ActivitySignal, ActivitySignalKind, CorrelationConfig, SymptomMapping};
use rand::Rng;
use std::sync::Arc;

/// Placeholder: no live symptom feed exists, so each symptom is active with
/// probability one half on every evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomActivitySignal;

impl ActivitySignal for RandomActivitySignal {
    fn is_active(&self, _mapping: &SymptomMapping) -> bool {
        rand::thread_rng().gen_bool(0.5)
    }
}

/// Active when the clinician-rated severity reaches `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct SeverityActivitySignal {
    pub threshold: f32,
}

impl ActivitySignal for SeverityActivitySignal {
    fn is_active(&self, mapping: &SymptomMapping) -> bool {
        mapping.severity >= self.threshold
    }
}

pub fn activity_signal_from_config(config: &CorrelationConfig) -> Arc<dyn ActivitySignal> {
    match config.signal {
        ActivitySignalKind::Random => Arc::new(RandomActivitySignal),
        ActivitySignalKind::Severity => Arc::new(SeverityActivitySignal {
            threshold: config.severity_threshold,
        }),
    }
}
