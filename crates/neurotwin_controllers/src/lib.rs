//! Per-domain controllers.
//!
//! Each controller owns one slice of patient state and exposes async
//! operations over its data source. All of them share [`ControllerCore`] for
//! status flags, metrics, error capture and commit ordering.

pub mod biometric;
pub mod brain;
pub mod clinical;
pub mod controller;
pub mod neural;
pub mod registry;
pub mod temporal;

pub use biometric::{BiometricController, BiometricData};
pub use brain::{BrainModelController, BrainModelData};
pub use clinical::{ClinicalController, ClinicalData};
pub use controller::{ControllerCore, ControllerMetrics, ControllerState};
pub use neural::{NeuralActivityController, NeuralData};
pub use registry::{DomainControllers, DomainSources};
pub use temporal::{TemporalController, TemporalData};
