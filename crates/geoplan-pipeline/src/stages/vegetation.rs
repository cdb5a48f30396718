//! Vegetation stage: keep regions by dominant land-cover class.

use crate::stages::{
    clip_and_finish, parse_params, subdivide_if_oversized, FilterStage, StageOutput,
};
use geoplan_core::config::GeoBounds;
use geoplan_core::error::{GeoplanError, Result};
use geoplan_core::models::landcover::LandCover;
use geoplan_core::models::plan::StageKind;
use geoplan_core::ports::LandCoverSource;
use geoplan_geo::dataset::{Crs, SpatialDataset};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct VegetationParams {
    #[serde(default)]
    vegetation_types: Option<Vec<u8>>,
    #[serde(default)]
    exclude_types: Option<Vec<u8>>,
}

enum CoverRule {
    Include(HashSet<u8>),
    Exclude(HashSet<u8>),
}

impl CoverRule {
    fn keeps(&self, code: u8) -> bool {
        match self {
            CoverRule::Include(codes) => codes.contains(&code),
            CoverRule::Exclude(codes) => !codes.contains(&code),
        }
    }
}

/// Filters regions by their dominant land-cover code, with either an
/// inclusion list (`vegetation_types`) or an exclusion list
/// (`exclude_types`); exactly one per invocation.
pub struct VegetationStage {
    land_cover: Arc<dyn LandCoverSource>,
    bounds: GeoBounds,
    max_region_km2: f64,
}

impl VegetationStage {
    pub fn new(
        land_cover: Arc<dyn LandCoverSource>,
        bounds: GeoBounds,
        max_region_km2: f64,
    ) -> Self {
        Self {
            land_cover,
            bounds,
            max_region_km2,
        }
    }

    fn parse_rule(&self, params: &Value) -> Result<CoverRule> {
        let parsed: VegetationParams = parse_params(self.name(), params)?;
        let (codes, rule): (Vec<u8>, fn(HashSet<u8>) -> CoverRule) =
            match (parsed.vegetation_types, parsed.exclude_types) {
                (Some(_), Some(_)) => {
                    return Err(GeoplanError::validation(
                        "vegetation_types and exclude_types are mutually exclusive",
                    ))
                }
                (None, None) => {
                    return Err(GeoplanError::validation(
                        "vegetation stage requires vegetation_types or exclude_types",
                    ))
                }
                (Some(include), None) => (include, CoverRule::Include),
                (None, Some(exclude)) => (exclude, CoverRule::Exclude),
            };

        if codes.is_empty() {
            return Err(GeoplanError::validation(
                "vegetation type list must not be empty",
            ));
        }
        for code in &codes {
            if LandCover::from_code(*code).is_none() {
                return Err(GeoplanError::validation(format!(
                    "unknown land-cover code {}",
                    code
                )));
            }
        }
        Ok(rule(codes.into_iter().collect()))
    }
}

impl FilterStage for VegetationStage {
    fn kind(&self) -> StageKind {
        StageKind::Vegetation
    }

    fn validate_params(&self, params: &Value) -> Result<()> {
        self.parse_rule(params).map(|_| ())
    }

    fn execute(&self, input: SpatialDataset, params: &Value) -> Result<StageOutput> {
        let rule = self.parse_rule(params)?;

        if input.is_empty() {
            return Ok(StageOutput::from_dataset(input));
        }

        let prepared = subdivide_if_oversized(input, self.max_region_km2)?;

        let mut kept = Vec::new();
        for mut region in prepared.into_regions() {
            match self.land_cover.classify(&region.polygon)? {
                // No land-cover data: insufficient information, pass through.
                None => kept.push(region),
                Some(cover) => {
                    if rule.keeps(cover.code()) {
                        region.set_attribute("land_cover", cover.code());
                        kept.push(region);
                    }
                }
            }
        }

        clip_and_finish(SpatialDataset::new(kept, Crs::Geographic), &self.bounds)
    }
}
