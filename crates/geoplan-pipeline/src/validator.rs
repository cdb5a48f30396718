//! Whole-plan validation.
//!
//! Every structural and semantic check runs before any stage executes;
//! an invalid plan never causes partial execution. The validator shares
//! the executor's stage registry, so the set of known stage types and
//! their parameter rules exist in exactly one place.

use crate::stages::FilterStage;
use geoplan_core::error::{GeoplanError, Result};
use geoplan_core::models::plan::{Plan, StageDescriptor, StageKind};
use std::collections::BTreeMap;

pub struct PlanValidator<'a> {
    registry: &'a BTreeMap<StageKind, Box<dyn FilterStage>>,
}

impl<'a> PlanValidator<'a> {
    pub fn new(registry: &'a BTreeMap<StageKind, Box<dyn FilterStage>>) -> Self {
        Self { registry }
    }

    pub fn validate(&self, plan: &Plan) -> Result<()> {
        let sequences = plan.sequences();
        if sequences.is_empty() {
            return Err(GeoplanError::validation("plan has no sub-plans"));
        }

        for (unit, steps) in sequences {
            if let Some(name) = unit {
                if name.trim().is_empty() {
                    return Err(GeoplanError::validation("sub-plan must name its unit"));
                }
            }
            if steps.is_empty() {
                return Err(GeoplanError::validation("plan has no steps").at(unit, 0));
            }
            for (idx, step) in steps.iter().enumerate() {
                self.validate_step(step).map_err(|e| e.at(unit, idx))?;
            }
        }
        Ok(())
    }

    fn validate_step(&self, step: &StageDescriptor) -> Result<()> {
        let kind = step.kind()?;
        if step.step_id <= 0 {
            return Err(GeoplanError::validation(format!(
                "step_id must be a positive integer, got {}",
                step.step_id
            )));
        }
        if !step.params.is_object() {
            return Err(GeoplanError::validation(format!(
                "stage '{}' requires a params object",
                kind
            )));
        }
        let stage = self.registry.get(&kind).ok_or_else(|| {
            GeoplanError::validation(format!("no handler registered for stage '{}'", kind))
        })?;
        stage.validate_params(&step.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Collaborators, PipelineExecutor};
    use geoplan_core::config::PipelineConfig;

    fn executor() -> PipelineExecutor {
        PipelineExecutor::new(PipelineConfig::default(), Collaborators::unavailable())
    }

    fn validate(json: &str) -> Result<()> {
        let plan = Plan::from_json(json).expect("fixture plans parse");
        executor().validate(&plan)
    }

    #[test]
    fn test_accepts_well_formed_plan() {
        validate(
            r#"{"steps": [
                {"step_id": 1, "type": "buffer", "params": {"buffer_distance": 300.0}},
                {"step_id": 2, "type": "relative_position", "params": {
                    "reference_point": {"lon": 118.75, "lat": 32.0},
                    "reference_direction": 90.0,
                    "position_types": ["forward", "flanks"]
                }},
                {"step_id": 3, "type": "area", "params": {"min_area_km2": 2.0}}
            ]}"#,
        )
        .unwrap();
    }

    #[test]
    fn test_rejects_unknown_stage_type() {
        let err = validate(
            r#"{"steps": [{"step_id": 1, "type": "teleport", "params": {}}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("teleport"));
    }

    #[test]
    fn test_rejects_zero_steps() {
        assert!(validate(r#"{"steps": []}"#).is_err());
    }

    #[test]
    fn test_rejects_non_positive_step_id() {
        let err = validate(
            r#"{"steps": [{"step_id": 0, "type": "area", "params": {"min_area_km2": 1.0}}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("step_id"));
    }

    #[test]
    fn test_rejects_missing_params_object() {
        let err =
            validate(r#"{"steps": [{"step_id": 1, "type": "buffer"}]}"#).unwrap_err();
        assert!(err.to_string().contains("params object"));
    }

    #[test]
    fn test_rejects_unknown_position_sector_before_execution() {
        let err = validate(
            r#"{"steps": [{"step_id": 1, "type": "relative_position", "params": {
                "reference_point": {"lon": 118.75, "lat": 32.0},
                "reference_direction": 0.0,
                "position_types": ["前方"]
            }}]}"#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("前方"), "message was: {}", msg);
        assert!(msg.contains("step 1"), "message was: {}", msg);
    }

    #[test]
    fn test_multi_unit_validates_each_sub_plan() {
        let err = validate(
            r#"{"sub_plans": [
                {"unit": "recon", "steps": [{"step_id": 1, "type": "area", "params": {"min_area_km2": 1.0}}]},
                {"unit": "armor", "steps": [{"step_id": 1, "type": "buffer", "params": {}}]}
            ]}"#,
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("armor"), "message was: {}", msg);
        assert!(msg.contains("buffer_distance"), "message was: {}", msg);
    }

    #[test]
    fn test_rejects_unnamed_unit() {
        let err = validate(
            r#"{"sub_plans": [
                {"unit": "  ", "steps": [{"step_id": 1, "type": "area", "params": {"min_area_km2": 1.0}}]}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unit"));
    }
}
