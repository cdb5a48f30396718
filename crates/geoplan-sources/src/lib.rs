//! Geoplan Sources - In-memory collaborator implementations
//!
//! The pipeline reaches obstacle, raster, and land-cover data through the
//! port traits in `geoplan-core`. This crate provides in-memory
//! implementations for development and testing; production deployments
//! wire in real OSM/raster-backed sources instead.

pub mod memory;

pub use memory::{
    ConstantRaster, GridLandCover, GridRaster, MemoryObstacleSource, NoDataLandCover,
    UniformLandCover,
};
