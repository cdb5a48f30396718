//! Stage descriptors and plans as produced by the external planner.
//!
//! The wire shape is JSON with snake_case keys:
//!
//! ```json
//! {"step_id": 1, "type": "buffer", "params": {"buffer_distance": 300.0}}
//! ```
//!
//! A plan is either `{"steps": [...]}` or, for multi-unit taskings,
//! `{"sub_plans": [{"unit": "...", "steps": [...]}]}`. Descriptors are
//! never mutated once validated.

use crate::error::{GeoplanError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Closed set of filter stage kinds. This enum is the single source of
/// truth for both plan validation and stage dispatch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Buffer,
    Elevation,
    Slope,
    Vegetation,
    RelativePosition,
    Distance,
    Area,
}

impl StageKind {
    pub const ALL: [StageKind; 7] = [
        StageKind::Buffer,
        StageKind::Elevation,
        StageKind::Slope,
        StageKind::Vegetation,
        StageKind::RelativePosition,
        StageKind::Distance,
        StageKind::Area,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Buffer => "buffer",
            StageKind::Elevation => "elevation",
            StageKind::Slope => "slope",
            StageKind::Vegetation => "vegetation",
            StageKind::RelativePosition => "relative_position",
            StageKind::Distance => "distance",
            StageKind::Area => "area",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageKind {
    type Err = GeoplanError;

    fn from_str(s: &str) -> Result<Self> {
        StageKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| GeoplanError::UnknownStageType {
                value: s.to_string(),
            })
    }
}

/// A geographic reference point, as supplied by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub lon: f64,
    pub lat: f64,
}

/// One step of a plan: a stage type plus its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDescriptor {
    pub step_id: i64,
    #[serde(rename = "type")]
    pub stage_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub params: Value,
}

impl StageDescriptor {
    /// Resolve the raw type tag against the closed stage set.
    pub fn kind(&self) -> Result<StageKind> {
        self.stage_type.parse()
    }
}

/// A named sequence of steps for one unit in a multi-unit tasking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubPlan {
    pub unit: String,
    pub steps: Vec<StageDescriptor>,
}

/// A complete plan: a single stage sequence, or one sequence per unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Plan {
    MultiUnit { sub_plans: Vec<SubPlan> },
    Single { steps: Vec<StageDescriptor> },
}

impl Plan {
    pub fn from_json(json: &str) -> Result<Plan> {
        serde_json::from_str(json).map_err(|e| {
            GeoplanError::validation(format!("plan is not valid JSON for either plan shape: {}", e))
        })
    }

    /// Flatten into `(unit, steps)` sequences; a single plan yields one
    /// unnamed sequence.
    pub fn sequences(&self) -> Vec<(Option<&str>, &[StageDescriptor])> {
        match self {
            Plan::Single { steps } => vec![(None, steps.as_slice())],
            Plan::MultiUnit { sub_plans } => sub_plans
                .iter()
                .map(|sp| (Some(sp.unit.as_str()), sp.steps.as_slice()))
                .collect(),
        }
    }
}
