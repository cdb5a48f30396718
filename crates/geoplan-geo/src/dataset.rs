//! Regions and spatial datasets.
//!
//! A `Region` is one polygon plus an attribute map; a `SpatialDataset` is
//! an ordered collection of regions sharing a CRS. Stages never mutate a
//! dataset in place: every operation returns a new dataset, and geometric
//! operations that need physical distances run in a UTM frame chosen from
//! the dataset's extent.

use crate::transform::{projector, reproject_polygon, utm_epsg_for};
use geo::{Area, BooleanOps, BoundingRect, MultiPolygon, Polygon, Rect};
use geoplan_core::config::GeoBounds;
use geoplan_core::error::Result;
use serde_json::{Map, Value};

/// Attribute key for the area in square meters.
pub const AREA_M2_KEY: &str = "area_m2";
/// Attribute key for the area in square kilometers.
pub const AREA_KM2_KEY: &str = "area_km2";

const M2_PER_KM2: f64 = 1_000_000.0;

/// Coordinate reference frame of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// Longitude/latitude degrees (EPSG:4326).
    Geographic,
    /// A UTM zone; coordinates in meters.
    Utm { epsg: u32 },
}

impl Crs {
    pub fn epsg(self) -> u32 {
        match self {
            Crs::Geographic => 4326,
            Crs::Utm { epsg } => epsg,
        }
    }

    pub fn is_metric(self) -> bool {
        matches!(self, Crs::Utm { .. })
    }
}

/// One polygon with its attribute map.
#[derive(Debug, Clone)]
pub struct Region {
    pub polygon: Polygon<f64>,
    pub attributes: Map<String, Value>,
}

impl Region {
    pub fn new(polygon: Polygon<f64>) -> Self {
        Self {
            polygon,
            attributes: Map::new(),
        }
    }

    pub fn with_attributes(polygon: Polygon<f64>, attributes: Map<String, Value>) -> Self {
        Self {
            polygon,
            attributes,
        }
    }

    pub fn set_attribute(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn area_m2(&self) -> Option<f64> {
        self.attributes.get(AREA_M2_KEY).and_then(Value::as_f64)
    }

    pub fn area_km2(&self) -> Option<f64> {
        self.attributes.get(AREA_KM2_KEY).and_then(Value::as_f64)
    }

    /// Record both area attributes from a square-meter measurement.
    pub fn set_areas(&mut self, area_m2: f64) {
        self.set_attribute(AREA_M2_KEY, area_m2);
        self.set_attribute(AREA_KM2_KEY, area_m2 / M2_PER_KM2);
    }

    /// The attribute map without the area keys, for children that must
    /// inherit a parent's tags but re-measure their own geometry.
    pub fn attributes_without_areas(&self) -> Map<String, Value> {
        self.attributes
            .iter()
            .filter(|(k, _)| k.as_str() != AREA_M2_KEY && k.as_str() != AREA_KM2_KEY)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// An ordered collection of regions in one CRS.
#[derive(Debug, Clone)]
pub struct SpatialDataset {
    regions: Vec<Region>,
    crs: Crs,
}

impl SpatialDataset {
    pub fn new(regions: Vec<Region>, crs: Crs) -> Self {
        Self { regions, crs }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Crs::Geographic)
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn into_regions(self) -> Vec<Region> {
        self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Sum of the recorded `area_m2` attributes.
    pub fn total_area_m2(&self) -> f64 {
        self.regions.iter().filter_map(Region::area_m2).sum()
    }

    /// Center of the dataset's combined bounding box.
    pub fn extent_center(&self) -> Option<(f64, f64)> {
        let mut extent: Option<Rect<f64>> = None;
        for region in &self.regions {
            let rect = match region.polygon.bounding_rect() {
                Some(rect) => rect,
                None => continue,
            };
            extent = Some(match extent {
                None => rect,
                Some(acc) => Rect::new(
                    geo::Coord {
                        x: acc.min().x.min(rect.min().x),
                        y: acc.min().y.min(rect.min().y),
                    },
                    geo::Coord {
                        x: acc.max().x.max(rect.max().x),
                        y: acc.max().y.max(rect.max().y),
                    },
                ),
            });
        }
        extent.map(|rect| {
            let c = rect.center();
            (c.x, c.y)
        })
    }

    /// The UTM zone EPSG for this dataset's extent center. Meaningful for
    /// geographic datasets; `None` when the dataset is empty.
    pub fn utm_epsg(&self) -> Option<u32> {
        self.extent_center().map(|(lon, lat)| utm_epsg_for(lon, lat))
    }

    /// Reproject every region into the target CRS. Pure: returns a new
    /// dataset, attributes untouched.
    pub fn reproject(&self, target: Crs) -> Result<SpatialDataset> {
        if self.crs == target || self.regions.is_empty() {
            return Ok(SpatialDataset::new(self.regions.clone(), target));
        }
        let proj = projector(self.crs.epsg(), target.epsg())?;
        let regions: Result<Vec<Region>> = self
            .regions
            .iter()
            .map(|region| {
                Ok(Region::with_attributes(
                    reproject_polygon(&proj, &region.polygon)?,
                    region.attributes.clone(),
                ))
            })
            .collect();
        Ok(SpatialDataset::new(regions?, target))
    }

    /// Measure every region and record `area_m2`/`area_km2`. A metric
    /// dataset is measured directly; a geographic one is measured through
    /// a transient UTM projection, leaving the stored geometry unchanged.
    pub fn compute_areas(&mut self) -> Result<()> {
        if self.regions.is_empty() {
            return Ok(());
        }
        match self.crs {
            Crs::Utm { .. } => {
                for region in &mut self.regions {
                    let area = region.polygon.unsigned_area();
                    region.set_areas(area);
                }
            }
            Crs::Geographic => {
                let epsg = match self.utm_epsg() {
                    Some(epsg) => epsg,
                    None => return Ok(()),
                };
                let proj = projector(4326, epsg)?;
                for region in &mut self.regions {
                    let projected = reproject_polygon(&proj, &region.polygon)?;
                    region.set_areas(projected.unsigned_area());
                }
            }
        }
        Ok(())
    }

    /// Intersect every region with the operational bounds. Regions outside
    /// are dropped; straddling regions are clipped, with multi-polygon
    /// intersections exploded into separate regions. Metric datasets are
    /// brought back to the geographic frame first.
    pub fn clip_to_bounds(&self, bounds: &GeoBounds) -> Result<SpatialDataset> {
        let dataset = if self.crs.is_metric() {
            self.reproject(Crs::Geographic)?
        } else {
            self.clone()
        };

        let boundary = MultiPolygon(vec![bounds.to_polygon()]);
        let mut clipped = Vec::new();
        for region in dataset.regions() {
            let pieces = MultiPolygon(vec![region.polygon.clone()]).intersection(&boundary);
            for polygon in explode(pieces) {
                clipped.push(Region::with_attributes(polygon, region.attributes.clone()));
            }
        }
        Ok(SpatialDataset::new(clipped, Crs::Geographic))
    }

    /// Split every region larger than `max_area_km2` along a regular
    /// square grid aligned to its UTM bounding box; children inherit the
    /// parent's non-area attributes and get freshly measured areas.
    /// Regions at or below the threshold pass through unchanged.
    ///
    /// Point-sampled filters (slope, distance) are only meaningful at
    /// sub-km granularity; a whole-map region sampled once would pass or
    /// fail wholesale.
    pub fn subdivide_oversized(&self, max_area_km2: f64) -> Result<SpatialDataset> {
        let dataset = if self.crs.is_metric() {
            self.reproject(Crs::Geographic)?
        } else {
            self.clone()
        };
        let epsg = match dataset.utm_epsg() {
            Some(epsg) => epsg,
            None => return Ok(dataset),
        };
        let to_utm = projector(4326, epsg)?;
        let to_geo = projector(epsg, 4326)?;

        let max_area_m2 = max_area_km2 * M2_PER_KM2;
        let cell_edge = max_area_m2.sqrt();

        let mut output = Vec::new();
        for region in dataset.regions() {
            let projected = reproject_polygon(&to_utm, &region.polygon)?;
            let area = projected.unsigned_area();
            if area <= max_area_m2 {
                let mut kept = region.clone();
                kept.set_areas(area);
                output.push(kept);
                continue;
            }

            let rect = match projected.bounding_rect() {
                Some(rect) => rect,
                None => continue,
            };
            let subject = MultiPolygon(vec![projected]);
            let nx = ((rect.width() / cell_edge).ceil() as usize).max(1);
            let ny = ((rect.height() / cell_edge).ceil() as usize).max(1);
            for i in 0..nx {
                for j in 0..ny {
                    let x0 = rect.min().x + i as f64 * cell_edge;
                    let y0 = rect.min().y + j as f64 * cell_edge;
                    let cell = Rect::new(
                        geo::Coord { x: x0, y: y0 },
                        geo::Coord {
                            x: (x0 + cell_edge).min(rect.max().x),
                            y: (y0 + cell_edge).min(rect.max().y),
                        },
                    )
                    .to_polygon();
                    let pieces = subject.intersection(&MultiPolygon(vec![cell]));
                    for piece in explode(pieces) {
                        let piece_area = piece.unsigned_area();
                        let mut child = Region::with_attributes(
                            reproject_polygon(&to_geo, &piece)?,
                            region.attributes_without_areas(),
                        );
                        child.set_areas(piece_area);
                        output.push(child);
                    }
                }
            }
        }
        Ok(SpatialDataset::new(output, Crs::Geographic))
    }

    /// True when any region exceeds the threshold, per recorded or freshly
    /// measured areas.
    pub fn has_region_larger_than(&mut self, max_area_km2: f64) -> Result<bool> {
        if self.regions.iter().any(|r| r.area_km2().is_none()) {
            self.compute_areas()?;
        }
        Ok(self
            .regions
            .iter()
            .any(|r| r.area_km2().unwrap_or(0.0) > max_area_km2))
    }
}

/// Break a multi-polygon into its non-degenerate parts.
pub fn explode(multi: MultiPolygon<f64>) -> Vec<Polygon<f64>> {
    multi
        .0
        .into_iter()
        .filter(|p| p.exterior().0.len() >= 4 && p.unsigned_area() > 0.0)
        .collect()
}
