//! Area-merge stage: glue fragmented sub-threshold regions together and
//! keep every contiguous area that reaches the minimum size.

use crate::stages::{
    clip_and_finish, parse_params, require_positive, FilterStage, StageOutput,
};
use geo::{Area, MultiPolygon};
use geoplan_core::config::GeoBounds;
use geoplan_core::error::Result;
use geoplan_core::models::plan::StageKind;
use geoplan_geo::buffer::union_all;
use geoplan_geo::dataset::{explode, Crs, Region, SpatialDataset};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct AreaMergeParams {
    min_area_km2: f64,
}

/// Answers "is there a contiguous deployable area of at least X km² once
/// fragmented small regions are glued together": regions already at or
/// above the threshold pass verbatim; all smaller ones are unioned, and
/// of the merged pieces only those reaching the threshold survive.
/// Isolated slivers that cannot merge with a neighbor are discarded.
pub struct AreaMergeStage {
    bounds: GeoBounds,
}

impl AreaMergeStage {
    pub fn new(bounds: GeoBounds) -> Self {
        Self { bounds }
    }
}

impl FilterStage for AreaMergeStage {
    fn kind(&self) -> StageKind {
        StageKind::Area
    }

    fn validate_params(&self, params: &Value) -> Result<()> {
        let parsed: AreaMergeParams = parse_params(self.name(), params)?;
        require_positive(self.name(), "min_area_km2", parsed.min_area_km2)
    }

    fn execute(&self, input: SpatialDataset, params: &Value) -> Result<StageOutput> {
        let parsed: AreaMergeParams = parse_params(self.name(), params)?;
        let threshold_m2 = parsed.min_area_km2 * 1_000_000.0;

        if input.is_empty() {
            return Ok(StageOutput::from_dataset(input));
        }
        let epsg = match input.utm_epsg() {
            Some(epsg) => epsg,
            None => return Ok(StageOutput::from_dataset(input)),
        };
        let input_utm = input.reproject(Crs::Utm { epsg })?;

        let mut large = Vec::new();
        let mut small = Vec::new();
        for region in input_utm.into_regions() {
            let area = region.polygon.unsigned_area();
            if area >= threshold_m2 {
                let mut kept = region;
                kept.set_areas(area);
                large.push(kept);
            } else {
                small.push(MultiPolygon(vec![region.polygon]));
            }
        }

        // The union coalesces only mutually adjacent or overlapping
        // fragments; disjoint ones stay separate pieces and are then
        // tested individually.
        let merged = union_all(small);
        let mut merged_kept = 0usize;
        let mut output = large;
        for piece in explode(merged) {
            let area = piece.unsigned_area();
            if area >= threshold_m2 {
                let mut region = Region::new(piece);
                region.set_areas(area);
                output.push(region);
                merged_kept += 1;
            }
        }
        debug!(
            kept_large = output.len() - merged_kept,
            kept_merged = merged_kept,
            "area merge complete"
        );

        let dataset =
            SpatialDataset::new(output, Crs::Utm { epsg }).reproject(Crs::Geographic)?;
        clip_and_finish(dataset, &self.bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};
    use serde_json::json;

    fn bounds() -> GeoBounds {
        GeoBounds::new(118.5, 31.5, 119.0, 32.5)
    }

    fn stage() -> AreaMergeStage {
        AreaMergeStage::new(bounds())
    }

    fn square(min_lon: f64, min_lat: f64, dlon: f64, dlat: f64) -> Region {
        Region::new(Polygon::new(
            LineString::from(vec![
                (min_lon, min_lat),
                (min_lon + dlon, min_lat),
                (min_lon + dlon, min_lat + dlat),
                (min_lon, min_lat + dlat),
                (min_lon, min_lat),
            ]),
            vec![],
        ))
    }

    #[test]
    fn test_adjacent_small_regions_merge_past_threshold() {
        // Two ~0.66 km² squares sharing an edge; each alone is under the
        // 1 km² threshold, together they pass it.
        let a = square(118.70, 31.90, 0.0075, 0.0075);
        let b = square(118.7075, 31.90, 0.0075, 0.0075);
        let input = SpatialDataset::new(vec![a, b], Crs::Geographic);

        let output = stage()
            .execute(input, &json!({"min_area_km2": 1.0}))
            .unwrap();

        assert_eq!(output.region_count, 1, "adjacent fragments merge into one");
        let km2 = output.dataset.regions()[0].area_km2().unwrap();
        assert!(km2 >= 1.0, "merged area was {} km²", km2);
    }

    #[test]
    fn test_isolated_small_regions_are_dropped() {
        // Same sizes, but far apart: the union leaves them separate and
        // each stays under the threshold.
        let a = square(118.60, 31.90, 0.0075, 0.0075);
        let b = square(118.80, 31.90, 0.0075, 0.0075);
        let input = SpatialDataset::new(vec![a, b], Crs::Geographic);

        let output = stage()
            .execute(input, &json!({"min_area_km2": 1.0}))
            .unwrap();
        assert_eq!(output.region_count, 0);
    }

    #[test]
    fn test_large_region_kept_verbatim_with_tags() {
        let mut large = square(118.70, 31.90, 0.02, 0.02);
        large.set_attribute("slope_deg", 2.5);
        let sliver = square(118.80, 32.10, 0.001, 0.001);
        let input = SpatialDataset::new(vec![large, sliver], Crs::Geographic);

        let output = stage()
            .execute(input, &json!({"min_area_km2": 1.0}))
            .unwrap();

        assert_eq!(output.region_count, 1);
        let kept = &output.dataset.regions()[0];
        assert!(kept.area_km2().unwrap() >= 1.0);
        // Above-threshold regions keep their attributes.
        assert_eq!(
            kept.attributes.get("slope_deg").and_then(|v| v.as_f64()),
            Some(2.5)
        );
    }

    #[test]
    fn test_validation_requires_positive_threshold() {
        assert!(stage()
            .validate_params(&json!({"min_area_km2": 0.0}))
            .is_err());
        assert!(stage().validate_params(&json!({})).is_err());
        assert!(stage()
            .validate_params(&json!({"min_area_km2": 2.0}))
            .is_ok());
    }
}
