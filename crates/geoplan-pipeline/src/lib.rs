//! Geoplan Pipeline - Filter stages, plan validation, and execution
//!
//! The pipeline takes a machine-proposed plan (an ordered sequence of
//! stage descriptors), validates it fully before any geometry work, then
//! chains the stages: each stage consumes the previous stage's output
//! dataset and produces a new one, with every output persisted as a
//! GeoJSON artifact and intermediates deleted once the run completes.

pub mod executor;
pub mod stages;
pub mod validator;

pub use executor::{
    Collaborators, PipelineExecutor, PipelineReport, PipelineState, StepOutcome, StepReport,
    UnitReport,
};
pub use stages::{FilterStage, StageOutput};
pub use validator::PlanValidator;
