//! Geoplan Geo - Geometry math, spatial datasets, CRS transforms, and GeoJSON I/O
//!
//! This crate holds everything geometric: bearing and distance math, the
//! `SpatialDataset` type that flows between filter stages, UTM reprojection,
//! buffered-union construction, and the GeoJSON interchange format.

pub mod buffer;
pub mod compass;
pub mod dataset;
pub mod io;
pub mod transform;

pub use dataset::{Crs, Region, SpatialDataset};
