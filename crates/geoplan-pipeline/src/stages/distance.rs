//! Distance stage: keep regions within a great-circle radius of a
//! reference point.

use crate::stages::{
    clip_and_finish, parse_params, require_positive, subdivide_if_oversized, FilterStage,
    StageOutput,
};
use geo::Centroid;
use geoplan_core::config::GeoBounds;
use geoplan_core::error::Result;
use geoplan_core::models::plan::{ReferencePoint, StageKind};
use geoplan_geo::compass::haversine_distance;
use geoplan_geo::dataset::{Crs, SpatialDataset};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct DistanceParams {
    reference_point: ReferencePoint,
    max_distance: f64,
}

/// Keeps regions whose centroid lies within `max_distance` meters
/// (inclusive) of the reference point.
pub struct DistanceStage {
    bounds: GeoBounds,
    max_region_km2: f64,
}

impl DistanceStage {
    pub fn new(bounds: GeoBounds, max_region_km2: f64) -> Self {
        Self {
            bounds,
            max_region_km2,
        }
    }
}

impl FilterStage for DistanceStage {
    fn kind(&self) -> StageKind {
        StageKind::Distance
    }

    fn validate_params(&self, params: &Value) -> Result<()> {
        let parsed: DistanceParams = parse_params(self.name(), params)?;
        require_positive(self.name(), "max_distance", parsed.max_distance)
    }

    fn execute(&self, input: SpatialDataset, params: &Value) -> Result<StageOutput> {
        let parsed: DistanceParams = parse_params(self.name(), params)?;

        if input.is_empty() {
            return Ok(StageOutput::from_dataset(input));
        }

        let prepared = subdivide_if_oversized(input, self.max_region_km2)?;

        let mut kept = Vec::new();
        for mut region in prepared.into_regions() {
            let centroid = match region.polygon.centroid() {
                Some(point) => point,
                None => continue,
            };
            let distance = haversine_distance(
                parsed.reference_point.lon,
                parsed.reference_point.lat,
                centroid.x(),
                centroid.y(),
            );
            if distance <= parsed.max_distance {
                region.set_attribute("distance_m", distance);
                kept.push(region);
            }
        }

        clip_and_finish(SpatialDataset::new(kept, Crs::Geographic), &self.bounds)
    }
}
