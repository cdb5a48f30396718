//! Relative-position stage: classify regions into bearing sectors around
//! a reference point and direction.

use crate::stages::{
    clip_and_finish, parse_params, subdivide_if_oversized, FilterStage, StageOutput,
};
use geo::Centroid;
use geoplan_core::config::GeoBounds;
use geoplan_core::error::{GeoplanError, Result};
use geoplan_core::models::plan::{ReferencePoint, StageKind};
use geoplan_core::models::sector::SectorTable;
use geoplan_geo::compass::{angle_difference, bearing};
use geoplan_geo::dataset::{Crs, SpatialDataset};
use serde::Deserialize;
use serde_json::Value;

/// Centroids closer than this to the reference point (in degrees on each
/// axis) have no defined bearing and are excluded.
const COINCIDENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Deserialize)]
struct RelativePositionParams {
    reference_point: ReferencePoint,
    reference_direction: f64,
    position_types: Vec<String>,
    #[serde(default)]
    custom_position_config: Option<Value>,
}

/// Keeps regions whose centroid falls in one of the requested position
/// sectors relative to a reference point and direction.
pub struct RelativePositionStage {
    bounds: GeoBounds,
    max_region_km2: f64,
}

impl RelativePositionStage {
    pub fn new(bounds: GeoBounds, max_region_km2: f64) -> Self {
        Self {
            bounds,
            max_region_km2,
        }
    }

    /// Parse params and resolve the active sector table, checking every
    /// requested sector name against it. Runs before any geometry work.
    fn parse(&self, params: &Value) -> Result<(RelativePositionParams, SectorTable)> {
        let parsed: RelativePositionParams = parse_params(self.name(), params)?;

        if !parsed.reference_direction.is_finite() {
            return Err(GeoplanError::validation(
                "reference_direction must be a finite number of degrees",
            ));
        }
        if !parsed.reference_point.lon.is_finite() || !parsed.reference_point.lat.is_finite() {
            return Err(GeoplanError::validation(
                "reference_point must have finite lon and lat",
            ));
        }
        if parsed.position_types.is_empty() {
            return Err(GeoplanError::validation(
                "position_types must name at least one sector",
            ));
        }

        let table = match &parsed.custom_position_config {
            Some(config) => SectorTable::from_value(config)?,
            None => SectorTable::standard(),
        };
        for name in &parsed.position_types {
            if !table.contains_name(name) {
                return Err(GeoplanError::validation(format!(
                    "position type '{}' is not defined; available: {}",
                    name,
                    table.names().join(", ")
                )));
            }
        }
        Ok((parsed, table))
    }
}

impl FilterStage for RelativePositionStage {
    fn kind(&self) -> StageKind {
        StageKind::RelativePosition
    }

    fn validate_params(&self, params: &Value) -> Result<()> {
        self.parse(params).map(|_| ())
    }

    fn execute(&self, input: SpatialDataset, params: &Value) -> Result<StageOutput> {
        let (parsed, table) = self.parse(params)?;

        if input.is_empty() {
            return Ok(StageOutput::from_dataset(input));
        }

        // Matching runs against the table restricted to the requested
        // sectors, in table order: requesting only "flanks" matches the
        // whole flanks range even where "near_flanks" would have claimed
        // the angle first.
        let active = table.restrict(&parsed.position_types);
        let reference = parsed.reference_point;
        let direction = parsed.reference_direction;

        let prepared = subdivide_if_oversized(input, self.max_region_km2)?;

        let mut kept = Vec::new();
        for mut region in prepared.into_regions() {
            let centroid = match region.polygon.centroid() {
                Some(point) => point,
                None => continue,
            };
            // Coincident with the reference point: bearing is undefined.
            if (centroid.x() - reference.lon).abs() < COINCIDENT_EPSILON
                && (centroid.y() - reference.lat).abs() < COINCIDENT_EPSILON
            {
                continue;
            }

            let b = bearing(reference.lon, reference.lat, centroid.x(), centroid.y());
            let diff = angle_difference(b, direction);
            if let Some(sector) = active.classify(diff) {
                region.set_attribute("relative_position", sector);
                kept.push(region);
            }
        }

        clip_and_finish(SpatialDataset::new(kept, Crs::Geographic), &self.bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};
    use geoplan_geo::dataset::Region;
    use serde_json::json;

    fn bounds() -> GeoBounds {
        GeoBounds::new(118.5, 31.5, 119.0, 32.5)
    }

    fn stage() -> RelativePositionStage {
        RelativePositionStage::new(bounds(), 1.0)
    }

    /// A small square centered on the given point.
    fn square_at(lon: f64, lat: f64) -> Region {
        let half = 0.002;
        Region::new(Polygon::new(
            LineString::from(vec![
                (lon - half, lat - half),
                (lon + half, lat - half),
                (lon + half, lat + half),
                (lon - half, lat + half),
                (lon - half, lat - half),
            ]),
            vec![],
        ))
    }

    const REF_LON: f64 = 118.75;
    const REF_LAT: f64 = 32.0;

    fn params(position_types: Value) -> Value {
        json!({
            "reference_point": {"lon": REF_LON, "lat": REF_LAT},
            "reference_direction": 0.0,
            "position_types": position_types
        })
    }

    #[test]
    fn test_forward_region_kept_with_attribute() {
        // Due north of the reference, facing north: angle difference 0.
        let input = SpatialDataset::new(
            vec![square_at(REF_LON, REF_LAT + 0.02)],
            Crs::Geographic,
        );
        let output = stage()
            .execute(input, &params(json!(["most_forward"])))
            .unwrap();

        assert_eq!(output.region_count, 1);
        assert_eq!(
            output.dataset.regions()[0]
                .attributes
                .get("relative_position")
                .and_then(|v| v.as_str()),
            Some("most_forward")
        );
    }

    #[test]
    fn test_rear_region_dropped_when_asking_forward() {
        let input = SpatialDataset::new(
            vec![square_at(REF_LON, REF_LAT - 0.02)],
            Crs::Geographic,
        );
        let output = stage()
            .execute(input, &params(json!(["forward"])))
            .unwrap();
        assert_eq!(output.region_count, 0);
    }

    #[test]
    fn test_flanks_cover_their_whole_range() {
        // Due east: angle difference +90, inside flanks but outside the
        // narrower near_flanks band.
        let input = SpatialDataset::new(
            vec![square_at(REF_LON + 0.02, REF_LAT)],
            Crs::Geographic,
        );
        let output = stage()
            .execute(input, &params(json!(["flanks"])))
            .unwrap();
        assert_eq!(output.region_count, 1);
        assert_eq!(
            output.dataset.regions()[0]
                .attributes
                .get("relative_position")
                .and_then(|v| v.as_str()),
            Some("flanks")
        );
    }

    #[test]
    fn test_rear_matchable_when_requested() {
        // Due south, facing north: angle difference 180.
        let input = SpatialDataset::new(
            vec![square_at(REF_LON, REF_LAT - 0.02)],
            Crs::Geographic,
        );
        let output = stage()
            .execute(input, &params(json!(["rear"])))
            .unwrap();
        assert_eq!(output.region_count, 1);
    }

    #[test]
    fn test_coincident_region_excluded() {
        let input =
            SpatialDataset::new(vec![square_at(REF_LON, REF_LAT)], Crs::Geographic);
        let output = stage()
            .execute(input, &params(json!(["most_forward", "forward", "rear"])))
            .unwrap();
        assert_eq!(output.region_count, 0);
    }

    #[test]
    fn test_unknown_position_type_fails_validation() {
        let err = stage()
            .validate_params(&params(json!(["前方"])))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("前方"));
        assert!(msg.contains("available"));
    }

    #[test]
    fn test_custom_config_overrides_table() {
        let custom = json!({
            "reference_point": {"lon": REF_LON, "lat": REF_LAT},
            "reference_direction": 0.0,
            "position_types": ["ahead"],
            "custom_position_config": {
                "ahead": [{"min_offset": -10.0, "max_offset": 10.0}]
            }
        });

        // Validation accepts the custom name and rejects standard ones.
        assert!(stage().validate_params(&custom).is_ok());
        let standard_name = json!({
            "reference_point": {"lon": REF_LON, "lat": REF_LAT},
            "reference_direction": 0.0,
            "position_types": ["forward"],
            "custom_position_config": {
                "ahead": [{"min_offset": -10.0, "max_offset": 10.0}]
            }
        });
        assert!(stage().validate_params(&standard_name).is_err());

        let input = SpatialDataset::new(
            vec![square_at(REF_LON, REF_LAT + 0.02)],
            Crs::Geographic,
        );
        let output = stage().execute(input, &custom).unwrap();
        assert_eq!(output.region_count, 1);
        assert_eq!(
            output.dataset.regions()[0]
                .attributes
                .get("relative_position")
                .and_then(|v| v.as_str()),
            Some("ahead")
        );
    }

    #[test]
    fn test_missing_reference_point_fails_validation() {
        let err = stage()
            .validate_params(&json!({
                "reference_direction": 0.0,
                "position_types": ["forward"]
            }))
            .unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }
}
