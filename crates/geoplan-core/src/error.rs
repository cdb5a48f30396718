//! Error types for geoplan

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoplanError {
    // Plan errors
    #[error("Invalid plan{}{}: {reason}", fmt_unit(.unit), fmt_step(.step))]
    Validation {
        unit: Option<String>,
        step: Option<usize>,
        reason: String,
    },

    #[error("Unknown stage type '{value}'. Known types: buffer, elevation, slope, vegetation, relative_position, distance, area")]
    UnknownStageType { value: String },

    // Stage errors
    #[error("Stage '{stage}' failed: {reason}")]
    Stage { stage: String, reason: String },

    // Geometry errors
    #[error("Projection from {from} to {to} failed: {reason}")]
    Projection {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Invalid GeoJSON at {path}: {reason}")]
    Geojson { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GeoplanError {
    /// Validation error with no step context yet.
    pub fn validation(reason: impl Into<String>) -> Self {
        GeoplanError::Validation {
            unit: None,
            step: None,
            reason: reason.into(),
        }
    }

    /// Attach unit/step context to a validation error; other variants pass through.
    pub fn at(self, unit: Option<&str>, step: usize) -> Self {
        match self {
            GeoplanError::Validation { reason, .. } => GeoplanError::Validation {
                unit: unit.map(str::to_string),
                step: Some(step),
                reason,
            },
            GeoplanError::UnknownStageType { value } => GeoplanError::Validation {
                unit: unit.map(str::to_string),
                step: Some(step),
                reason: format!("unknown stage type '{}'", value),
            },
            other => other,
        }
    }

    /// Wrap a stage-internal failure with the stage name.
    pub fn stage(stage: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        GeoplanError::Stage {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }
}

fn fmt_unit(unit: &Option<String>) -> String {
    match unit {
        Some(u) => format!(" (unit '{}')", u),
        None => String::new(),
    }
}

fn fmt_step(step: &Option<usize>) -> String {
    match step {
        Some(s) => format!(" at step {}", s + 1),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, GeoplanError>;
