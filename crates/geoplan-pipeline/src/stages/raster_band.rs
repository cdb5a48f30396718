//! Raster-band stages: elevation and slope filtering by sampled mean.
//!
//! The two filters are the same machinery pointed at different rasters,
//! so one stage type serves both. The bound test is inclusive-min /
//! exclusive-max (`value in [min, max)`), preserved from the source
//! system. A region with no valid samples passes through: absence of
//! data must never delete deployable area.

use crate::stages::{
    clip_and_finish, pass_through, subdivide_if_oversized, FilterStage, StageOutput,
};
use geo::{BoundingRect, Centroid};
use geoplan_core::config::GeoBounds;
use geoplan_core::error::{GeoplanError, Result};
use geoplan_core::models::plan::StageKind;
use geoplan_core::ports::RasterSource;
use geoplan_geo::dataset::SpatialDataset;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Elevation or slope filtering over a raster source.
pub struct RasterBandStage {
    kind: StageKind,
    attribute: &'static str,
    min_key: &'static str,
    max_key: &'static str,
    raster: Arc<dyn RasterSource>,
    bounds: GeoBounds,
    max_region_km2: f64,
}

impl RasterBandStage {
    pub fn elevation(
        raster: Arc<dyn RasterSource>,
        bounds: GeoBounds,
        max_region_km2: f64,
    ) -> Self {
        Self {
            kind: StageKind::Elevation,
            attribute: "elevation_m",
            min_key: "min_elevation",
            max_key: "max_elevation",
            raster,
            bounds,
            max_region_km2,
        }
    }

    pub fn slope(
        raster: Arc<dyn RasterSource>,
        bounds: GeoBounds,
        max_region_km2: f64,
    ) -> Self {
        Self {
            kind: StageKind::Slope,
            attribute: "slope_deg",
            min_key: "min_slope",
            max_key: "max_slope",
            raster,
            bounds,
            max_region_km2,
        }
    }

    fn parse_bounds(&self, params: &Value) -> Result<(Option<f64>, Option<f64>)> {
        // Keys differ per stage kind, so the params parse by hand.
        let object = params.as_object().ok_or_else(|| {
            GeoplanError::validation(format!(
                "stage '{}' requires a params object",
                self.name()
            ))
        })?;

        let read = |key: &str| -> Result<Option<f64>> {
            match object.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(value) => value.as_f64().filter(|v| v.is_finite()).map(Some).ok_or_else(
                    || {
                        GeoplanError::validation(format!(
                            "stage '{}' parameter '{}' must be a finite number",
                            self.name(),
                            key
                        ))
                    },
                ),
            }
        };

        let min = read(self.min_key)?;
        let max = read(self.max_key)?;
        if let (Some(min), Some(max)) = (min, max) {
            if min >= max {
                return Err(GeoplanError::validation(format!(
                    "stage '{}' bounds are empty: {} >= {}",
                    self.name(),
                    min,
                    max
                )));
            }
        }
        Ok((min, max))
    }

    /// Mean of the valid samples over a region; `None` when the raster
    /// yields no usable values.
    fn sample_mean(&self, polygon: &geo::Polygon<f64>) -> Result<Option<f64>> {
        let values = match self.raster.sample_polygon(polygon)? {
            Some(values) => values,
            // No masked-crop support: centroid plus bounding-box corners.
            None => {
                let mut points = Vec::with_capacity(5);
                if let Some(center) = polygon.centroid() {
                    points.push((center.x(), center.y()));
                }
                if let Some(rect) = polygon.bounding_rect() {
                    points.push((rect.min().x, rect.min().y));
                    points.push((rect.max().x, rect.min().y));
                    points.push((rect.min().x, rect.max().y));
                    points.push((rect.max().x, rect.max().y));
                }
                let mut values = Vec::with_capacity(points.len());
                for (lon, lat) in points {
                    if let Some(value) = self.raster.sample_point(lon, lat)? {
                        values.push(value);
                    }
                }
                values
            }
        };

        let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(values.iter().sum::<f64>() / values.len() as f64))
    }
}

impl FilterStage for RasterBandStage {
    fn kind(&self) -> StageKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    fn validate_params(&self, params: &Value) -> Result<()> {
        self.parse_bounds(params).map(|_| ())
    }

    fn execute(&self, input: SpatialDataset, params: &Value) -> Result<StageOutput> {
        let (min, max) = self.parse_bounds(params)?;

        if input.is_empty() {
            return Ok(StageOutput::from_dataset(input));
        }
        // Unbounded on both sides: nothing to filter on.
        if min.is_none() && max.is_none() {
            return pass_through(input);
        }

        let prepared = subdivide_if_oversized(input, self.max_region_km2)?;

        let mut kept = Vec::new();
        let mut no_data = 0usize;
        for mut region in prepared.into_regions() {
            match self.sample_mean(&region.polygon)? {
                None => {
                    // Insufficient information: pass the region through.
                    no_data += 1;
                    kept.push(region);
                }
                Some(mean) => {
                    if min.is_some_and(|m| mean < m) {
                        continue;
                    }
                    if max.is_some_and(|m| mean >= m) {
                        continue;
                    }
                    region.set_attribute(self.attribute, mean);
                    kept.push(region);
                }
            }
        }
        if no_data > 0 {
            debug!(
                stage = self.name(),
                regions = no_data,
                "regions passed through without raster data"
            );
        }

        clip_and_finish(
            SpatialDataset::new(kept, geoplan_geo::dataset::Crs::Geographic),
            &self.bounds,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};
    use geoplan_geo::dataset::{Crs, Region};
    use serde_json::json;

    struct NoDataRaster;

    impl RasterSource for NoDataRaster {
        fn sample_point(&self, _lon: f64, _lat: f64) -> Result<Option<f64>> {
            Ok(None)
        }

        fn sample_polygon(&self, _polygon: &Polygon<f64>) -> Result<Option<Vec<f64>>> {
            Ok(Some(vec![]))
        }
    }

    struct FixedRaster {
        value: f64,
        masked: bool,
    }

    impl RasterSource for FixedRaster {
        fn sample_point(&self, _lon: f64, _lat: f64) -> Result<Option<f64>> {
            Ok(Some(self.value))
        }

        fn sample_polygon(&self, _polygon: &Polygon<f64>) -> Result<Option<Vec<f64>>> {
            if self.masked {
                Ok(Some(vec![self.value - 1.0, self.value, self.value + 1.0]))
            } else {
                Ok(None)
            }
        }
    }

    fn bounds() -> GeoBounds {
        GeoBounds::new(118.5, 31.5, 119.0, 32.5)
    }

    fn small_region() -> Region {
        Region::new(Polygon::new(
            LineString::from(vec![
                (118.70, 31.90),
                (118.705, 31.90),
                (118.705, 31.905),
                (118.70, 31.905),
                (118.70, 31.90),
            ]),
            vec![],
        ))
    }

    fn input() -> SpatialDataset {
        SpatialDataset::new(vec![small_region()], Crs::Geographic)
    }

    #[test]
    fn test_band_is_inclusive_min_exclusive_max() {
        let bounds_cfg = bounds();
        // Mean over the masked samples is exactly the fixed value.
        let stage = RasterBandStage::slope(
            Arc::new(FixedRaster {
                value: 10.0,
                masked: true,
            }),
            bounds_cfg,
            1.0,
        );

        // value == min: kept.
        let kept = stage
            .execute(input(), &json!({"min_slope": 10.0, "max_slope": 20.0}))
            .unwrap();
        assert_eq!(kept.region_count, 1);
        assert_eq!(
            kept.dataset.regions()[0]
                .attributes
                .get("slope_deg")
                .and_then(|v| v.as_f64()),
            Some(10.0)
        );

        // value == max: rejected (exclusive).
        let rejected = stage
            .execute(input(), &json!({"min_slope": 0.0, "max_slope": 10.0}))
            .unwrap();
        assert_eq!(rejected.region_count, 0);

        // value < min: rejected.
        let below = stage
            .execute(input(), &json!({"min_slope": 10.5}))
            .unwrap();
        assert_eq!(below.region_count, 0);
    }

    #[test]
    fn test_no_data_passes_region_through() {
        let stage = RasterBandStage::elevation(Arc::new(NoDataRaster), bounds(), 1.0);
        let output = stage
            .execute(input(), &json!({"min_elevation": 100.0}))
            .unwrap();

        assert_eq!(output.region_count, 1);
        // Passed-through regions carry no sampled attribute.
        assert!(output.dataset.regions()[0]
            .attributes
            .get("elevation_m")
            .is_none());
    }

    #[test]
    fn test_point_fallback_used_without_mask_support() {
        let stage = RasterBandStage::elevation(
            Arc::new(FixedRaster {
                value: 50.0,
                masked: false,
            }),
            bounds(),
            1.0,
        );
        let output = stage
            .execute(input(), &json!({"min_elevation": 40.0, "max_elevation": 60.0}))
            .unwrap();

        assert_eq!(output.region_count, 1);
        assert_eq!(
            output.dataset.regions()[0]
                .attributes
                .get("elevation_m")
                .and_then(|v| v.as_f64()),
            Some(50.0)
        );
    }

    #[test]
    fn test_no_bounds_is_pass_through() {
        let stage = RasterBandStage::slope(
            Arc::new(FixedRaster {
                value: 10.0,
                masked: true,
            }),
            bounds(),
            1.0,
        );
        let output = stage.execute(input(), &json!({})).unwrap();
        assert_eq!(output.region_count, 1);
    }

    #[test]
    fn test_validation_rejects_empty_band() {
        let stage = RasterBandStage::slope(
            Arc::new(FixedRaster {
                value: 10.0,
                masked: true,
            }),
            bounds(),
            1.0,
        );
        assert!(stage
            .validate_params(&json!({"min_slope": 20.0, "max_slope": 10.0}))
            .is_err());
        assert!(stage
            .validate_params(&json!({"min_slope": "steep"}))
            .is_err());
        assert!(stage.validate_params(&json!({})).is_ok());
    }
}
