//! Planner-facing data model: stage descriptors, plans, sector tables,
//! and the land-cover code enumeration.

pub mod landcover;
pub mod plan;
pub mod sector;

pub use landcover::LandCover;
pub use plan::{Plan, ReferencePoint, StageDescriptor, StageKind, SubPlan};
pub use sector::{AngularRange, SectorTable};
