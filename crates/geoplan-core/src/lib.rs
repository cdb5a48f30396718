//! Geoplan Core - Error taxonomy, configuration, plan model, and collaborator ports
//!
//! This crate contains the planner-facing data model and the port definitions
//! through which the pipeline reaches its external data sources.

pub mod config;
pub mod error;
pub mod models;
pub mod ports;

pub use error::{GeoplanError, Result};
