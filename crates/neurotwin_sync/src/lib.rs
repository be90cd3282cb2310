//! Sync orchestration for the patient twin.
//!
//! [`SyncOrchestrator`] owns the shared [`SyncState`], fans out to the domain
//! controllers on mount and keeps each domain fresh through a
//! [`PollScheduler`]. All state changes go through [`reduce`].

pub mod correlation;
pub mod orchestrator;
pub mod scheduler;
pub mod state;

pub use correlation::derive_active_regions;
pub use orchestrator::{Collaborators, SyncOrchestrator};
pub use scheduler::{PollScheduler, PollTask};
pub use state::{reduce, SyncAction, SyncState};
