//! In-memory port implementations for development and testing.
//!
//! Geometry lives in geographic coordinates throughout. Rasters are
//! regular lon/lat grids addressed from the south-west corner, row-major
//! with row 0 at the minimum latitude.

use geo::{BoundingRect, Centroid, Contains, Geometry, Polygon};
use geoplan_core::config::GeoBounds;
use geoplan_core::error::Result;
use geoplan_core::models::landcover::LandCover;
use geoplan_core::ports::{LandCoverSource, ObstacleSet, ObstacleSource, RasterSource};
use rstar::{RTree, RTreeObject, AABB};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObstacleKind {
    Building,
    Road,
}

/// One obstacle with its precomputed envelope for the R-tree.
#[derive(Debug, Clone)]
struct IndexedObstacle {
    kind: ObstacleKind,
    geometry: Geometry<f64>,
    envelope: AABB<[f64; 2]>,
}

impl IndexedObstacle {
    fn new(kind: ObstacleKind, geometry: Geometry<f64>) -> Self {
        let envelope = match geometry.bounding_rect() {
            Some(rect) => AABB::from_corners(
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            ),
            None => AABB::from_point([0.0, 0.0]),
        };
        Self {
            kind,
            geometry,
            envelope,
        }
    }
}

impl RTreeObject for IndexedObstacle {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// In-memory building/road source backed by an R-tree over envelopes.
#[derive(Debug, Default)]
pub struct MemoryObstacleSource {
    tree: RTree<IndexedObstacle>,
}

impl MemoryObstacleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// An obstacle source with nothing in it; the buffer filter then
    /// passes regions through untouched.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_obstacles(
        buildings: Vec<Geometry<f64>>,
        roads: Vec<Geometry<f64>>,
    ) -> Self {
        let mut indexed: Vec<IndexedObstacle> = buildings
            .into_iter()
            .map(|g| IndexedObstacle::new(ObstacleKind::Building, g))
            .collect();
        indexed.extend(
            roads
                .into_iter()
                .map(|g| IndexedObstacle::new(ObstacleKind::Road, g)),
        );
        Self {
            tree: RTree::bulk_load(indexed),
        }
    }

    pub fn add_building(&mut self, geometry: Geometry<f64>) {
        self.tree
            .insert(IndexedObstacle::new(ObstacleKind::Building, geometry));
    }

    pub fn add_road(&mut self, geometry: Geometry<f64>) {
        self.tree
            .insert(IndexedObstacle::new(ObstacleKind::Road, geometry));
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl ObstacleSource for MemoryObstacleSource {
    fn query(&self, bounds: &GeoBounds) -> Result<ObstacleSet> {
        let envelope = AABB::from_corners(
            [bounds.min_lon, bounds.min_lat],
            [bounds.max_lon, bounds.max_lat],
        );
        let mut set = ObstacleSet::default();
        for obstacle in self.tree.locate_in_envelope_intersecting(&envelope) {
            match obstacle.kind {
                ObstacleKind::Building => set.buildings.push(obstacle.geometry.clone()),
                ObstacleKind::Road => set.roads.push(obstacle.geometry.clone()),
            }
        }
        Ok(set)
    }
}

/// A regular lon/lat grid of sample values with an optional nodata marker.
#[derive(Debug, Clone)]
pub struct GridRaster {
    origin_lon: f64,
    origin_lat: f64,
    cell_deg: f64,
    cols: usize,
    rows: usize,
    values: Vec<f64>,
    nodata: Option<f64>,
}

impl GridRaster {
    /// `values` is row-major with row 0 at `origin_lat` (the grid's
    /// south edge). Panics if the value count does not match the grid.
    pub fn new(
        origin_lon: f64,
        origin_lat: f64,
        cell_deg: f64,
        cols: usize,
        rows: usize,
        values: Vec<f64>,
        nodata: Option<f64>,
    ) -> Self {
        assert_eq!(values.len(), cols * rows, "value count must match grid");
        Self {
            origin_lon,
            origin_lat,
            cell_deg,
            cols,
            rows,
            values,
            nodata,
        }
    }

    fn cell_value(&self, col: usize, row: usize) -> Option<f64> {
        let value = self.values[row * self.cols + col];
        if !value.is_finite() {
            return None;
        }
        if let Some(nodata) = self.nodata {
            if value == nodata {
                return None;
            }
        }
        Some(value)
    }

    fn cell_for(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        let col = (lon - self.origin_lon) / self.cell_deg;
        let row = (lat - self.origin_lat) / self.cell_deg;
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col.floor() as usize, row.floor() as usize);
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some((col, row))
    }

    fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.origin_lon + (col as f64 + 0.5) * self.cell_deg,
            self.origin_lat + (row as f64 + 0.5) * self.cell_deg,
        )
    }
}

impl RasterSource for GridRaster {
    fn sample_point(&self, lon: f64, lat: f64) -> Result<Option<f64>> {
        Ok(self
            .cell_for(lon, lat)
            .and_then(|(col, row)| self.cell_value(col, row)))
    }

    /// Masked crop: every valid cell whose center falls inside the polygon.
    fn sample_polygon(&self, polygon: &Polygon<f64>) -> Result<Option<Vec<f64>>> {
        let mut samples = Vec::new();
        for row in 0..self.rows {
            for col in 0..self.cols {
                let (lon, lat) = self.cell_center(col, row);
                if polygon.contains(&geo::Point::new(lon, lat)) {
                    if let Some(value) = self.cell_value(col, row) {
                        samples.push(value);
                    }
                }
            }
        }
        Ok(Some(samples))
    }
}

/// A raster that returns one value everywhere. `supports_mask` decides
/// whether polygon sampling is offered or the caller must fall back to
/// point sampling.
#[derive(Debug, Clone, Copy)]
pub struct ConstantRaster {
    value: f64,
    supports_mask: bool,
}

impl ConstantRaster {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            supports_mask: true,
        }
    }

    pub fn without_mask_support(value: f64) -> Self {
        Self {
            value,
            supports_mask: false,
        }
    }
}

impl RasterSource for ConstantRaster {
    fn sample_point(&self, _lon: f64, _lat: f64) -> Result<Option<f64>> {
        Ok(Some(self.value))
    }

    fn sample_polygon(&self, _polygon: &Polygon<f64>) -> Result<Option<Vec<f64>>> {
        if self.supports_mask {
            Ok(Some(vec![self.value]))
        } else {
            Ok(None)
        }
    }
}

/// A land-cover grid; classification is the most frequent code among cell
/// centers inside the region, falling back to the centroid's cell.
#[derive(Debug, Clone)]
pub struct GridLandCover {
    grid: GridRaster,
}

impl GridLandCover {
    /// `codes` is row-major with row 0 at `origin_lat`.
    pub fn new(
        origin_lon: f64,
        origin_lat: f64,
        cell_deg: f64,
        cols: usize,
        rows: usize,
        codes: Vec<u8>,
    ) -> Self {
        let values = codes.into_iter().map(|c| c as f64).collect();
        Self {
            grid: GridRaster::new(origin_lon, origin_lat, cell_deg, cols, rows, values, None),
        }
    }
}

impl LandCoverSource for GridLandCover {
    fn classify(&self, region: &Polygon<f64>) -> Result<Option<LandCover>> {
        let samples = self.grid.sample_polygon(region)?.unwrap_or_default();

        let mut counts: HashMap<u8, usize> = HashMap::new();
        for sample in samples {
            counts
                .entry(sample as u8)
                .and_modify(|n| *n += 1)
                .or_insert(1);
        }

        let dominant = counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .and_then(|(code, _)| LandCover::from_code(code));
        if dominant.is_some() {
            return Ok(dominant);
        }

        // No cell center inside the region; try the centroid's cell.
        let centroid = match region.centroid() {
            Some(point) => point,
            None => return Ok(None),
        };
        Ok(self
            .grid
            .sample_point(centroid.x(), centroid.y())?
            .and_then(|value| LandCover::from_code(value as u8)))
    }
}

/// Uniform land cover everywhere.
#[derive(Debug, Clone, Copy)]
pub struct UniformLandCover(pub LandCover);

impl LandCoverSource for UniformLandCover {
    fn classify(&self, _region: &Polygon<f64>) -> Result<Option<LandCover>> {
        Ok(Some(self.0))
    }
}

/// A land-cover source with no data anywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDataLandCover;

impl LandCoverSource for NoDataLandCover {
    fn classify(&self, _region: &Polygon<f64>) -> Result<Option<LandCover>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    fn square(min_lon: f64, min_lat: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (min_lon, min_lat),
                (min_lon + size, min_lat),
                (min_lon + size, min_lat + size),
                (min_lon, min_lat + size),
                (min_lon, min_lat),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_obstacle_query_filters_by_bounds() {
        let source = MemoryObstacleSource::with_obstacles(
            vec![
                Geometry::Polygon(square(118.6, 31.6, 0.01)),
                Geometry::Polygon(square(125.0, 40.0, 0.01)),
            ],
            vec![Geometry::LineString(LineString::from(vec![
                (118.6, 31.6),
                (118.7, 31.7),
            ]))],
        );

        let set = source
            .query(&GeoBounds::new(118.5, 31.5, 119.0, 32.5))
            .unwrap();
        assert_eq!(set.buildings.len(), 1);
        assert_eq!(set.roads.len(), 1);
    }

    #[test]
    fn test_empty_obstacle_source() {
        let source = MemoryObstacleSource::empty();
        let set = source
            .query(&GeoBounds::new(118.5, 31.5, 119.0, 32.5))
            .unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_grid_raster_point_sampling() {
        let raster = GridRaster::new(
            118.5,
            31.5,
            0.1,
            2,
            2,
            vec![10.0, 20.0, 30.0, 40.0],
            Some(-9999.0),
        );

        assert_eq!(raster.sample_point(118.55, 31.55).unwrap(), Some(10.0));
        assert_eq!(raster.sample_point(118.65, 31.55).unwrap(), Some(20.0));
        assert_eq!(raster.sample_point(118.55, 31.65).unwrap(), Some(30.0));
        // Outside the grid
        assert_eq!(raster.sample_point(120.0, 31.55).unwrap(), None);
    }

    #[test]
    fn test_grid_raster_nodata_is_invalid() {
        let raster = GridRaster::new(
            118.5,
            31.5,
            0.1,
            2,
            1,
            vec![-9999.0, 5.0],
            Some(-9999.0),
        );
        assert_eq!(raster.sample_point(118.55, 31.55).unwrap(), None);
        assert_eq!(raster.sample_point(118.65, 31.55).unwrap(), Some(5.0));
    }

    #[test]
    fn test_grid_raster_polygon_sampling() {
        let raster = GridRaster::new(
            118.5,
            31.5,
            0.1,
            2,
            2,
            vec![10.0, 20.0, 30.0, 40.0],
            None,
        );
        // A tall polygon over the western column only: catches the centers
        // at lon 118.55 but not those at 118.65.
        let column = Polygon::new(
            LineString::from(vec![
                (118.5, 31.5),
                (118.62, 31.5),
                (118.62, 31.7),
                (118.5, 31.7),
                (118.5, 31.5),
            ]),
            vec![],
        );
        let samples = raster.sample_polygon(&column).unwrap().unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples.contains(&10.0));
        assert!(samples.contains(&30.0));
    }

    #[test]
    fn test_constant_raster_mask_support() {
        let masked = ConstantRaster::new(7.0);
        assert_eq!(
            masked.sample_polygon(&square(0.0, 0.0, 1.0)).unwrap(),
            Some(vec![7.0])
        );

        let unmasked = ConstantRaster::without_mask_support(7.0);
        assert_eq!(unmasked.sample_polygon(&square(0.0, 0.0, 1.0)).unwrap(), None);
        assert_eq!(unmasked.sample_point(0.5, 0.5).unwrap(), Some(7.0));
    }

    #[test]
    fn test_grid_land_cover_dominant_class() {
        // Three grassland cells, one water cell.
        let cover = GridLandCover::new(118.5, 31.5, 0.1, 2, 2, vec![30, 30, 30, 80]);
        let class = cover.classify(&square(118.5, 31.5, 0.2)).unwrap();
        assert_eq!(class, Some(LandCover::Grassland));
    }

    #[test]
    fn test_grid_land_cover_centroid_fallback() {
        let cover = GridLandCover::new(118.5, 31.5, 0.1, 2, 2, vec![40, 40, 40, 40]);
        // Tiny region between cell centers: falls back to the centroid cell.
        let class = cover.classify(&square(118.51, 31.51, 0.001)).unwrap();
        assert_eq!(class, Some(LandCover::Cropland));
    }

    #[test]
    fn test_no_data_land_cover() {
        assert_eq!(
            NoDataLandCover.classify(&square(0.0, 0.0, 1.0)).unwrap(),
            None
        );
    }
}
