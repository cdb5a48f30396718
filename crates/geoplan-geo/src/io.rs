//! GeoJSON serialization of spatial datasets.
//!
//! Datasets rest on disk as FeatureCollections of Polygon features in
//! EPSG:4326; feature properties carry the region attribute maps.

use crate::dataset::{Crs, Region, SpatialDataset};
use geojson::{Feature, FeatureCollection, GeoJson};
use geoplan_core::error::{GeoplanError, Result};
use std::fs;
use std::path::Path;

fn geojson_error(path: &Path, reason: impl Into<String>) -> GeoplanError {
    GeoplanError::Geojson {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Read a FeatureCollection of polygons into a geographic dataset.
/// MultiPolygon features are exploded into one region per part.
pub fn read_geojson(path: &Path) -> Result<SpatialDataset> {
    let content = fs::read_to_string(path)?;
    let geojson: GeoJson = content
        .parse()
        .map_err(|e| geojson_error(path, format!("failed to parse: {}", e)))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(geojson_error(path, "expected a FeatureCollection")),
    };

    let mut regions = Vec::with_capacity(collection.features.len());
    for (idx, feature) in collection.features.into_iter().enumerate() {
        let geometry = feature
            .geometry
            .ok_or_else(|| geojson_error(path, format!("feature {} has no geometry", idx)))?;
        let attributes = feature.properties.unwrap_or_default();

        let converted = geo::Geometry::<f64>::try_from(geometry.value)
            .map_err(|e| geojson_error(path, format!("feature {}: {}", idx, e)))?;
        match converted {
            geo::Geometry::Polygon(polygon) => {
                regions.push(Region::with_attributes(polygon, attributes));
            }
            geo::Geometry::MultiPolygon(parts) => {
                for polygon in parts {
                    regions.push(Region::with_attributes(polygon, attributes.clone()));
                }
            }
            other => {
                return Err(geojson_error(
                    path,
                    format!(
                        "feature {} is a {}, expected Polygon",
                        idx,
                        geojson_kind(&other)
                    ),
                ));
            }
        }
    }

    Ok(SpatialDataset::new(regions, Crs::Geographic))
}

/// Write a dataset as a FeatureCollection. Metric datasets are brought
/// back to the geographic frame before serialization.
pub fn write_geojson(dataset: &SpatialDataset, path: &Path) -> Result<()> {
    let dataset = if dataset.crs().is_metric() {
        dataset.reproject(Crs::Geographic)?
    } else {
        dataset.clone()
    };

    let features: Vec<Feature> = dataset
        .regions()
        .iter()
        .map(|region| Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &region.polygon,
            ))),
            id: None,
            properties: Some(region.attributes.clone()),
            foreign_members: None,
        })
        .collect();

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, GeoJson::from(collection).to_string())?;
    Ok(())
}

fn geojson_kind(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}
