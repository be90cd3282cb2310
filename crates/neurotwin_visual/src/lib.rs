//! Rendering-facing layer of the twin: a pure read model over the sync
//! state and controllers, and coarse actions that report success as `bool`.

pub mod coordinator;
pub mod projection;
pub mod sink;

pub use coordinator::VisualizationCoordinator;
pub use projection::{
    project, AlertPanel, DomainStatus, ProjectionInputs, RegionView, RenderSettings,
    TemporalPanel, TreatmentPanel, UnifiedVisualizationState,
};
pub use sink::{ErrorSink, TracingErrorSink};
