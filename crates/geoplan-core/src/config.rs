//! Pipeline configuration
//!
//! The executor receives its configuration as an explicit value at
//! construction. Nothing here is ambient or global: two executors with
//! different bounds or enabled-stage sets can coexist in one process.

use crate::error::{GeoplanError, Result};
use crate::models::plan::StageKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// The fixed rectangular operational area, in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl GeoBounds {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Center of the bounds, used for UTM zone selection.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }

    /// The bounds as a closed rectangle polygon (counter-clockwise exterior).
    pub fn to_polygon(&self) -> geo::Polygon<f64> {
        geo::Polygon::new(
            geo::LineString::from(vec![
                (self.min_lon, self.min_lat),
                (self.max_lon, self.min_lat),
                (self.max_lon, self.max_lat),
                (self.min_lon, self.max_lat),
                (self.min_lon, self.min_lat),
            ]),
            vec![],
        )
    }
}

/// Configuration for one pipeline executor.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Operational area; stage outputs are clipped to it and the initial
    /// full-extent dataset covers it.
    pub bounds: GeoBounds,
    /// Stage kinds the executor is allowed to run. Stages outside this set
    /// are recorded as skipped, not failed.
    pub enabled_stages: BTreeSet<StageKind>,
    /// Directory for stage output artifacts.
    pub result_dir: PathBuf,
    /// Regions larger than this are subdivided before point-sampled filters.
    pub max_region_km2: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bounds: GeoBounds::new(118.5, 31.5, 119.0, 32.5),
            enabled_stages: StageKind::ALL.iter().copied().collect(),
            result_dir: PathBuf::from("result"),
            max_region_km2: 1.0,
        }
    }
}

impl PipelineConfig {
    pub fn is_enabled(&self, kind: StageKind) -> bool {
        self.enabled_stages.contains(&kind)
    }

    /// Restrict the executor to the given stage kinds.
    pub fn with_enabled_stages<I: IntoIterator<Item = StageKind>>(mut self, kinds: I) -> Self {
        self.enabled_stages = kinds.into_iter().collect();
        self
    }

    pub fn with_result_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.result_dir = dir.into();
        self
    }

    pub fn with_bounds(mut self, bounds: GeoBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Load configuration from a TOML file, layered over the defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| GeoplanError::Serialization(format!(
                "Failed to parse config TOML: {}",
                e
            )))?;

        let mut config = Self::default();
        if let Some(bounds) = file_config.bounds {
            config.bounds = bounds;
        }
        if let Some(enabled) = file_config.enabled_stages {
            config.enabled_stages = enabled.into_iter().collect();
        }
        if let Some(dir) = file_config.result_dir {
            config.result_dir = dir;
        }
        if let Some(max) = file_config.max_region_km2 {
            if max <= 0.0 {
                return Err(GeoplanError::Serialization(
                    "max_region_km2 must be positive".to_string(),
                ));
            }
            config.max_region_km2 = max;
        }
        Ok(config)
    }
}

/// On-disk TOML shape; every field optional so partial files layer over defaults.
#[derive(Debug, Deserialize)]
struct FileConfig {
    bounds: Option<GeoBounds>,
    enabled_stages: Option<Vec<StageKind>>,
    result_dir: Option<PathBuf>,
    max_region_km2: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_enables_every_stage() {
        let config = PipelineConfig::default();
        for kind in StageKind::ALL {
            assert!(config.is_enabled(kind), "{} should be enabled", kind);
        }
        assert!(config.max_region_km2 > 0.0);
    }

    #[test]
    fn test_bounds_center_and_contains() {
        let bounds = GeoBounds::new(118.5, 31.5, 119.0, 32.5);
        let (lon, lat) = bounds.center();
        assert!((lon - 118.75).abs() < 1e-12);
        assert!((lat - 32.0).abs() < 1e-12);
        assert!(bounds.contains(118.6, 32.0));
        assert!(!bounds.contains(120.0, 32.0));
    }

    #[test]
    fn test_load_partial_toml_layers_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            enabled_stages = ["buffer", "distance"]
            max_region_km2 = 0.5

            [bounds]
            min_lon = 10.0
            min_lat = 50.0
            max_lon = 11.0
            max_lat = 51.0
            "#
        )
        .unwrap();

        let config = PipelineConfig::load_from_file(file.path()).unwrap();
        assert!(config.is_enabled(StageKind::Buffer));
        assert!(config.is_enabled(StageKind::Distance));
        assert!(!config.is_enabled(StageKind::Slope));
        assert_eq!(config.bounds.min_lon, 10.0);
        assert_eq!(config.max_region_km2, 0.5);
        // Unset fields keep their defaults
        assert_eq!(config.result_dir, PathBuf::from("result"));
    }

    #[test]
    fn test_load_rejects_non_positive_threshold() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_region_km2 = 0.0").unwrap();
        assert!(PipelineConfig::load_from_file(file.path()).is_err());
    }
}
