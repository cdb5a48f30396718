//! Buffer-exclusion stage: subtract buffered buildings and roads.

use crate::stages::{parse_params, pass_through, require_positive, FilterStage, StageOutput};
use geo::{Area, BooleanOps, MultiPolygon};
use geoplan_core::config::GeoBounds;
use geoplan_core::error::Result;
use geoplan_core::models::plan::StageKind;
use geoplan_core::ports::ObstacleSource;
use geoplan_geo::buffer::{buffer_geometry, union_all};
use geoplan_geo::dataset::{explode, Crs, Region, SpatialDataset};
use geoplan_geo::transform::{projector, reproject_geometry};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct BufferParams {
    buffer_distance: f64,
    #[serde(default)]
    utm_epsg: Option<u32>,
}

/// Excludes everything within `buffer_distance` meters of a building or
/// road from the input regions.
pub struct BufferExclusionStage {
    obstacles: Arc<dyn ObstacleSource>,
    bounds: GeoBounds,
}

impl BufferExclusionStage {
    pub fn new(obstacles: Arc<dyn ObstacleSource>, bounds: GeoBounds) -> Self {
        Self { obstacles, bounds }
    }
}

impl FilterStage for BufferExclusionStage {
    fn kind(&self) -> StageKind {
        StageKind::Buffer
    }

    fn validate_params(&self, params: &Value) -> Result<()> {
        let parsed: BufferParams = parse_params(self.name(), params)?;
        require_positive(self.name(), "buffer_distance", parsed.buffer_distance)
    }

    fn execute(&self, input: SpatialDataset, params: &Value) -> Result<StageOutput> {
        let parsed: BufferParams = parse_params(self.name(), params)?;

        if input.is_empty() {
            return Ok(StageOutput::from_dataset(input));
        }

        let set = self.obstacles.query(&self.bounds)?;
        if set.is_empty() {
            // Nothing to exclude: the input passes through untouched.
            debug!("buffer stage found no obstacles in bounds");
            return pass_through(input);
        }

        let epsg = match parsed.utm_epsg {
            Some(epsg) => epsg,
            // Non-empty dataset always yields an extent.
            None => match input.utm_epsg() {
                Some(epsg) => epsg,
                None => return Ok(StageOutput::from_dataset(input)),
            },
        };

        let to_utm = projector(4326, epsg)?;
        let mut buffered = Vec::with_capacity(set.buildings.len() + set.roads.len());
        for geometry in set.buildings.iter().chain(set.roads.iter()) {
            let projected = reproject_geometry(&to_utm, geometry)?;
            buffered.push(buffer_geometry(&projected, parsed.buffer_distance));
        }
        let exclusion = union_all(buffered);
        debug!(
            buildings = set.buildings.len(),
            roads = set.roads.len(),
            "built exclusion union"
        );

        let input_utm = input.reproject(Crs::Utm { epsg })?;
        let mut survivors = Vec::new();
        for region in input_utm.regions() {
            let remainder =
                MultiPolygon(vec![region.polygon.clone()]).difference(&exclusion);
            for piece in explode(remainder) {
                let area = piece.unsigned_area();
                let mut survivor =
                    Region::with_attributes(piece, region.attributes_without_areas());
                survivor.set_areas(area);
                survivors.push(survivor);
            }
        }

        let output = SpatialDataset::new(survivors, Crs::Utm { epsg })
            .reproject(Crs::Geographic)?;
        Ok(StageOutput::from_dataset(output))
    }
}
