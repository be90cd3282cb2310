//! Data sources backing the NeuroTwin controllers when no clinical backend
//! is reachable.
//!
//! - [`SyntheticSource`]: plausible, seeded data for every domain
//! - [`UnavailableSource`]: fails every call with a typed error
//! - [`RandomActivitySignal`] / [`SeverityActivitySignal`]: symptom activity for correlation

mod atlas;
pub mod signal;
pub mod synthetic;
pub mod unavailable;

pub use signal::{activity_signal_from_config, RandomActivitySignal, SeverityActivitySignal};
pub use synthetic::SyntheticSource;
pub use unavailable::UnavailableSource;
