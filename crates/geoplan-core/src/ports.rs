//! Collaborator ports.
//!
//! The pipeline core never reads OSM extracts or raster files itself; it
//! reaches buildings/roads, terrain rasters, and land-cover data through
//! these traits. Real readers live outside the core; `geoplan-sources`
//! provides in-memory implementations for development and testing.

use crate::config::GeoBounds;
use crate::error::Result;
use crate::models::landcover::LandCover;
use geo::{Geometry, Polygon};

/// Buildings and roads inside a queried area, in geographic coordinates.
/// Buildings are polygons (or rings degraded to lines in the source data);
/// roads are line strings.
#[derive(Debug, Clone, Default)]
pub struct ObstacleSet {
    pub buildings: Vec<Geometry<f64>>,
    pub roads: Vec<Geometry<f64>>,
}

impl ObstacleSet {
    pub fn is_empty(&self) -> bool {
        self.buildings.is_empty() && self.roads.is_empty()
    }
}

/// Source of building/road obstacle geometries for the buffer filter.
pub trait ObstacleSource: Send + Sync {
    fn query(&self, bounds: &GeoBounds) -> Result<ObstacleSet>;
}

/// Source of raster samples (elevation, or a slope proxy).
pub trait RasterSource: Send + Sync {
    /// Sample one geographic point. `None` when the point is outside the
    /// raster or hits a nodata cell.
    fn sample_point(&self, lon: f64, lat: f64) -> Result<Option<f64>>;

    /// Masked-crop sampling: every valid cell value inside the polygon.
    /// `None` means the source does not support polygon sampling and the
    /// caller should fall back to point sampling.
    fn sample_polygon(&self, _polygon: &Polygon<f64>) -> Result<Option<Vec<f64>>> {
        Ok(None)
    }
}

/// Source of the dominant land-cover class for a region.
pub trait LandCoverSource: Send + Sync {
    /// `None` when the region has no land-cover data.
    fn classify(&self, region: &Polygon<f64>) -> Result<Option<LandCover>>;
}
