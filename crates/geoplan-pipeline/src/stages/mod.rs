//! Filter stages.
//!
//! Every stage implements `FilterStage`: parameter validation separate
//! from execution, and execution that consumes its input dataset and
//! returns a brand-new one. Expected conditions (missing parameter,
//! unknown sector) surface as `Err` values before geometry work begins;
//! data absence is a pass-through, never an error.

use geoplan_core::config::GeoBounds;
use geoplan_core::error::{GeoplanError, Result};
use geoplan_core::models::plan::StageKind;
use geoplan_geo::dataset::SpatialDataset;
use serde::de::DeserializeOwned;
use serde_json::Value;

mod area_merge;
mod buffer;
mod distance;
mod raster_band;
mod relative_position;
mod vegetation;

pub use area_merge::AreaMergeStage;
pub use buffer::BufferExclusionStage;
pub use distance::DistanceStage;
pub use raster_band::RasterBandStage;
pub use relative_position::RelativePositionStage;
pub use vegetation::VegetationStage;

/// Result of one stage execution.
#[derive(Debug)]
pub struct StageOutput {
    pub dataset: SpatialDataset,
    pub region_count: usize,
    pub total_area_m2: f64,
}

impl StageOutput {
    pub fn from_dataset(dataset: SpatialDataset) -> Self {
        let region_count = dataset.len();
        let total_area_m2 = dataset.total_area_m2();
        Self {
            dataset,
            region_count,
            total_area_m2,
        }
    }
}

/// One geometric filtering operation.
pub trait FilterStage: Send + Sync {
    fn kind(&self) -> StageKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Structural and semantic parameter checks; must not touch geometry.
    fn validate_params(&self, params: &Value) -> Result<()>;

    /// Consume the input dataset and produce a filtered one. Inputs and
    /// outputs are in the geographic frame; physical-distance math runs
    /// in UTM internally.
    fn execute(&self, input: SpatialDataset, params: &Value) -> Result<StageOutput>;
}

/// Deserialize a stage's typed parameter struct out of the descriptor's
/// params object, with validation-grade errors.
pub(crate) fn parse_params<T: DeserializeOwned>(stage: &str, params: &Value) -> Result<T> {
    if !params.is_object() {
        return Err(GeoplanError::validation(format!(
            "stage '{}' requires a params object",
            stage
        )));
    }
    serde_json::from_value(params.clone()).map_err(|e| {
        GeoplanError::validation(format!("stage '{}' params are malformed: {}", stage, e))
    })
}

/// Subdivide the input when any region exceeds the threshold. Sampled
/// filters treat a region as one measurement, so whole-map regions must
/// be broken up first.
pub(crate) fn subdivide_if_oversized(
    mut dataset: SpatialDataset,
    max_region_km2: f64,
) -> Result<SpatialDataset> {
    if dataset.is_empty() {
        return Ok(dataset);
    }
    if dataset.has_region_larger_than(max_region_km2)? {
        dataset.subdivide_oversized(max_region_km2)
    } else {
        Ok(dataset)
    }
}

/// Standard stage epilogue: clip to the operational bounds, re-measure,
/// and package the output.
pub(crate) fn clip_and_finish(
    dataset: SpatialDataset,
    bounds: &GeoBounds,
) -> Result<StageOutput> {
    let mut clipped = dataset.clip_to_bounds(bounds)?;
    clipped.compute_areas()?;
    Ok(StageOutput::from_dataset(clipped))
}

/// Ensure area attributes exist without touching geometry, for stages
/// that pass their input through unchanged.
pub(crate) fn pass_through(mut dataset: SpatialDataset) -> Result<StageOutput> {
    if dataset
        .regions()
        .iter()
        .any(|r| r.area_m2().is_none())
    {
        dataset.compute_areas()?;
    }
    Ok(StageOutput::from_dataset(dataset))
}

/// Require a finite, strictly positive number.
pub(crate) fn require_positive(stage: &str, name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(GeoplanError::validation(format!(
            "stage '{}' requires a positive {}, got {}",
            stage, name, value
        )));
    }
    Ok(())
}
