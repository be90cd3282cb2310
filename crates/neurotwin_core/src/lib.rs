//! # NeuroTwin Core
//!
//! Shared vocabulary of the digital-twin sync layer:
//!
//! - [`domain`]: records flowing from data sources to the visualization read model
//! - [`source`]: async data-source contracts, one per clinical domain
//! - [`error`]: adapter and controller failure taxonomy
//! - [`config`]: TOML configuration with environment overrides

pub mod config;
pub mod domain;
pub mod error;
pub mod source;

pub use config::{
    ActivitySignalKind, BackoffConfig, BiometricThresholds, CommitPolicy, ControllerConfig,
    CorrelationConfig, NeuroTwinConfig, PollingConfig, SourceConfig, MIN_POLL_INTERVAL_MS,
};
pub use domain::*;
pub use error::{AdapterError, ControllerError, ErrorKind};
pub use source::{
    ActivitySignal, BiometricSource, BrainModelSource, ClinicalSource, NeuralActivitySource,
    PerformanceProbe, SourceResult, TemporalSource,
};
