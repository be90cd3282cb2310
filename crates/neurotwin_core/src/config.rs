use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NeuroTwinConfig {
    pub polling: PollingConfig,
    pub backoff: BackoffConfig,
    pub controllers: ControllerConfig,
    pub biometric: BiometricThresholds,
    pub correlation: CorrelationConfig,
    pub sources: SourceConfig,
}

impl NeuroTwinConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    /// After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: NeuroTwinConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if file doesn't exist, return defaults with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({:#}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut u64); 6] = [
            ("NEUROTWIN_BRAIN_MODEL_REFRESH_MS", &mut self.polling.brain_model_refresh_ms),
            ("NEUROTWIN_BIOMETRIC_REFRESH_MS", &mut self.polling.biometric_refresh_ms),
            ("NEUROTWIN_TEMPORAL_REFRESH_MS", &mut self.polling.temporal_refresh_ms),
            ("NEUROTWIN_PERFORMANCE_REFRESH_MS", &mut self.polling.performance_refresh_ms),
            ("NEUROTWIN_CORRELATION_REFRESH_MS", &mut self.polling.correlation_refresh_ms),
            ("NEUROTWIN_SIMULATED_LATENCY_MS", &mut self.sources.simulated_latency_ms),
        ];
        for (key, slot) in overrides {
            if let Ok(v) = std::env::var(key) {
                match v.parse() {
                    Ok(n) => *slot = n,
                    Err(_) => tracing::warn!("Ignoring non-numeric {}={}", key, v),
                }
            }
        }
        if let Ok(v) = std::env::var("NEUROTWIN_COMMIT_POLICY") {
            match v.as_str() {
                "last_resolved" => self.controllers.commit_policy = CommitPolicy::LastResolved,
                "latest_issued" => self.controllers.commit_policy = CommitPolicy::LatestIssued,
                other => tracing::warn!("Ignoring unknown NEUROTWIN_COMMIT_POLICY={}", other),
            }
        }
        self.polling.clamp_intervals();
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

/// Refresh cadence of each polling task, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub brain_model_refresh_ms: u64,
    pub biometric_refresh_ms: u64,
    pub temporal_refresh_ms: u64,
    pub performance_refresh_ms: u64,
    pub correlation_refresh_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            brain_model_refresh_ms: 5000,
            biometric_refresh_ms: 1000,
            temporal_refresh_ms: 10_000,
            performance_refresh_ms: 500,
            correlation_refresh_ms: 2000,
        }
    }
}

/// Floor for every polling interval.
pub const MIN_POLL_INTERVAL_MS: u64 = 1;

fn poll_interval(ms: u64) -> Duration {
    Duration::from_millis(ms.max(MIN_POLL_INTERVAL_MS))
}

impl PollingConfig {
    /// Raise any interval below [`MIN_POLL_INTERVAL_MS`] to the floor.
    pub fn clamp_intervals(&mut self) {
        for (name, slot) in [
            ("brain_model_refresh_ms", &mut self.brain_model_refresh_ms),
            ("biometric_refresh_ms", &mut self.biometric_refresh_ms),
            ("temporal_refresh_ms", &mut self.temporal_refresh_ms),
            ("performance_refresh_ms", &mut self.performance_refresh_ms),
            ("correlation_refresh_ms", &mut self.correlation_refresh_ms),
        ] {
            if *slot < MIN_POLL_INTERVAL_MS {
                tracing::warn!("polling.{} = {} raised to {}ms", name, slot, MIN_POLL_INTERVAL_MS);
                *slot = MIN_POLL_INTERVAL_MS;
            }
        }
    }

    /// Same interval for every task; handy for tests.
    pub fn uniform(interval_ms: u64) -> Self {
        Self {
            brain_model_refresh_ms: interval_ms,
            biometric_refresh_ms: interval_ms,
            temporal_refresh_ms: interval_ms,
            performance_refresh_ms: interval_ms,
            correlation_refresh_ms: interval_ms,
        }
    }

    pub fn brain_model_refresh(&self) -> Duration {
        poll_interval(self.brain_model_refresh_ms)
    }

    pub fn biometric_refresh(&self) -> Duration {
        poll_interval(self.biometric_refresh_ms)
    }

    pub fn temporal_refresh(&self) -> Duration {
        poll_interval(self.temporal_refresh_ms)
    }

    pub fn performance_refresh(&self) -> Duration {
        poll_interval(self.performance_refresh_ms)
    }

    pub fn correlation_refresh(&self) -> Duration {
        poll_interval(self.correlation_refresh_ms)
    }
}

/// Stretch a task's interval after consecutive failed ticks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub enabled: bool,
    pub factor: f64,
    pub max_interval_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            factor: 2.0,
            max_interval_ms: 60_000,
        }
    }
}

impl BackoffConfig {
    /// Delay before the next tick given the base interval and the number of
    /// consecutive failures so far.
    pub fn next_delay(&self, base: Duration, consecutive_failures: u32) -> Duration {
        if !self.enabled || consecutive_failures == 0 {
            return base;
        }
        let max = Duration::from_millis(self.max_interval_ms).max(base);
        let exp = consecutive_failures.min(32) as i32;
        let secs = base.as_secs_f64() * self.factor.max(1.0).powi(exp);
        if !secs.is_finite() || secs >= max.as_secs_f64() {
            max
        } else {
            Duration::from_secs_f64(secs).max(base)
        }
    }
}

/// Which resolved controller results are allowed to reach state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Every result is committed in resolution order; a slow older call can
    /// overwrite a newer one.
    #[default]
    LastResolved,
    /// Only the most recently issued call's result is committed.
    LatestIssued,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub commit_policy: CommitPolicy,
}

/// Alert thresholds for biometric streams. Values outside the warning band
/// raise a warning, outside the critical band a critical alert.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BiometricThresholds {
    pub heart_rate_warning: f32,
    pub heart_rate_critical: f32,
    pub eeg_alpha_low_warning: f32,
    pub stress_index_warning: f32,
    pub stress_index_critical: f32,
    pub oxygen_saturation_warning: f32,
    pub oxygen_saturation_critical: f32,
}

impl Default for BiometricThresholds {
    fn default() -> Self {
        Self {
            heart_rate_warning: 110.0,
            heart_rate_critical: 140.0,
            eeg_alpha_low_warning: 4.0,
            stress_index_warning: 0.7,
            stress_index_critical: 0.9,
            oxygen_saturation_warning: 92.0,
            oxygen_saturation_critical: 88.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySignalKind {
    /// Coin flip per symptom; stands in until a real activity feed exists.
    #[default]
    Random,
    /// Symptom is active when its severity reaches the threshold.
    Severity,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub signal: ActivitySignalKind,
    pub severity_threshold: f32,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            signal: ActivitySignalKind::Random,
            severity_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub simulated_latency_ms: u64,
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            simulated_latency_ms: 50,
            seed: None,
        }
    }
}

impl SourceConfig {
    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = NeuroTwinConfig::default();
        assert_eq!(cfg.polling.brain_model_refresh_ms, 5000);
        assert_eq!(cfg.polling.biometric_refresh_ms, 1000);
        assert_eq!(cfg.polling.temporal_refresh_ms, 10_000);
        assert_eq!(cfg.polling.performance_refresh_ms, 500);
        assert_eq!(cfg.polling.correlation_refresh_ms, 2000);
        assert_eq!(cfg.controllers.commit_policy, CommitPolicy::LastResolved);
        assert!(!cfg.backoff.enabled);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml_str = r#"
[polling]
biometric_refresh_ms = 250
"#;
        let cfg: NeuroTwinConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.polling.biometric_refresh_ms, 250);
        // Defaults for unspecified fields
        assert_eq!(cfg.polling.temporal_refresh_ms, 10_000);
        assert_eq!(cfg.correlation.signal, ActivitySignalKind::Random);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[polling]
brain_model_refresh_ms = 1000
biometric_refresh_ms = 200
temporal_refresh_ms = 3000
performance_refresh_ms = 100
correlation_refresh_ms = 400

[backoff]
enabled = true
factor = 3.0
max_interval_ms = 9000

[controllers]
commit_policy = "latest_issued"

[biometric]
heart_rate_warning = 100.0
heart_rate_critical = 130.0

[correlation]
signal = "severity"
severity_threshold = 0.5

[sources]
simulated_latency_ms = 0
seed = 7
"#;
        let cfg: NeuroTwinConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.polling.correlation_refresh(), Duration::from_millis(400));
        assert!(cfg.backoff.enabled);
        assert_eq!(cfg.controllers.commit_policy, CommitPolicy::LatestIssued);
        assert_eq!(cfg.biometric.heart_rate_critical, 130.0);
        assert_eq!(cfg.biometric.stress_index_warning, 0.7);
        assert_eq!(cfg.correlation.signal, ActivitySignalKind::Severity);
        assert_eq!(cfg.sources.seed, Some(7));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let toml_str = r#"
[polling]
performance_refresh_ms = 0
"#;
        let mut cfg: NeuroTwinConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.polling.performance_refresh(), Duration::from_millis(1));

        cfg.polling.clamp_intervals();
        assert_eq!(cfg.polling.performance_refresh_ms, 1);
        assert_eq!(cfg.polling.correlation_refresh_ms, 2000);
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let backoff = BackoffConfig {
            enabled: true,
            factor: 2.0,
            max_interval_ms: 5000,
        };
        let base = Duration::from_millis(1000);
        assert_eq!(backoff.next_delay(base, 0), base);
        assert_eq!(backoff.next_delay(base, 1), Duration::from_millis(2000));
        assert_eq!(backoff.next_delay(base, 2), Duration::from_millis(4000));
        assert_eq!(backoff.next_delay(base, 3), Duration::from_millis(5000));
        assert_eq!(backoff.next_delay(base, 40), Duration::from_millis(5000));
    }

    #[test]
    fn test_backoff_disabled_keeps_base() {
        let backoff = BackoffConfig::default();
        let base = Duration::from_millis(750);
        assert_eq!(backoff.next_delay(base, 10), base);
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        // Part 1: env overrides
        std::env::set_var("NEUROTWIN_TEMPORAL_REFRESH_MS", "1234");
        std::env::set_var("NEUROTWIN_COMMIT_POLICY", "latest_issued");
        std::env::set_var("NEUROTWIN_BIOMETRIC_REFRESH_MS", "0");

        let mut cfg = NeuroTwinConfig::default();
        cfg.apply_env_overrides();

        assert_eq!(cfg.polling.temporal_refresh_ms, 1234);
        assert_eq!(cfg.controllers.commit_policy, CommitPolicy::LatestIssued);
        assert_eq!(cfg.polling.biometric_refresh_ms, MIN_POLL_INTERVAL_MS);

        std::env::remove_var("NEUROTWIN_TEMPORAL_REFRESH_MS");
        std::env::remove_var("NEUROTWIN_COMMIT_POLICY");
        std::env::remove_var("NEUROTWIN_BIOMETRIC_REFRESH_MS");

        // Part 2: nonexistent path returns defaults (no env interference)
        let cfg = NeuroTwinConfig::load_or_default("/nonexistent/neurotwin.toml");
        assert_eq!(cfg.polling.temporal_refresh_ms, 10_000);
    }
}
