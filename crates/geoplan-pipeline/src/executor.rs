//! Pipeline execution.
//!
//! The executor owns the closed stage registry (one handler per stage
//! kind, shared with the validator), wires each stage's output dataset
//! into the next enabled stage, persists every output as a GeoJSON
//! artifact, and guarantees that intermediate artifacts never outlive
//! the run: on success only the final output survives, on failure
//! nothing does.

use crate::stages::{
    AreaMergeStage, BufferExclusionStage, DistanceStage, FilterStage, RasterBandStage,
    RelativePositionStage, VegetationStage,
};
use crate::validator::PlanValidator;
use geoplan_core::config::PipelineConfig;
use geoplan_core::error::{GeoplanError, Result};
use geoplan_core::models::landcover::LandCover;
use geoplan_core::models::plan::{Plan, StageDescriptor, StageKind};
use geoplan_core::ports::{LandCoverSource, ObstacleSet, ObstacleSource, RasterSource};
use geoplan_geo::dataset::{Crs, Region, SpatialDataset};
use geoplan_geo::io::write_geojson;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The external data sources the stages depend on.
#[derive(Clone)]
pub struct Collaborators {
    pub obstacles: Arc<dyn ObstacleSource>,
    pub elevation: Arc<dyn RasterSource>,
    pub slope: Arc<dyn RasterSource>,
    pub land_cover: Arc<dyn LandCoverSource>,
}

impl Collaborators {
    /// Ports that fail on first use. Suitable for validation-only
    /// executors and for plans that never touch the data-backed stages.
    pub fn unavailable() -> Self {
        Self {
            obstacles: Arc::new(UnavailablePort),
            elevation: Arc::new(UnavailablePort),
            slope: Arc::new(UnavailablePort),
            land_cover: Arc::new(UnavailablePort),
        }
    }
}

struct UnavailablePort;

impl UnavailablePort {
    fn error(port: &str) -> GeoplanError {
        GeoplanError::stage(port, "no source configured")
    }
}

impl ObstacleSource for UnavailablePort {
    fn query(&self, _bounds: &geoplan_core::config::GeoBounds) -> Result<ObstacleSet> {
        Err(Self::error("obstacle source"))
    }
}

impl RasterSource for UnavailablePort {
    fn sample_point(&self, _lon: f64, _lat: f64) -> Result<Option<f64>> {
        Err(Self::error("raster source"))
    }
}

impl LandCoverSource for UnavailablePort {
    fn classify(&self, _region: &geo::Polygon<f64>) -> Result<Option<LandCover>> {
        Err(Self::error("land-cover source"))
    }
}

/// States of one plan (or sub-plan) run:
/// `Pending -> Running -> {Succeeded, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Completed {
        region_count: usize,
        total_area_m2: f64,
    },
    Skipped,
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step_id: i64,
    pub stage: String,
    pub outcome: StepOutcome,
}

/// Result of one plan or sub-plan run.
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: Option<String>,
    pub state: PipelineState,
    pub steps: Vec<StepReport>,
    pub final_artifact: Option<PathBuf>,
    pub error: Option<String>,
}

/// Result of the whole plan: overall success is the conjunction of the
/// per-unit successes.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub success: bool,
    pub units: Vec<UnitReport>,
}

pub struct PipelineExecutor {
    config: PipelineConfig,
    registry: BTreeMap<StageKind, Box<dyn FilterStage>>,
}

impl PipelineExecutor {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        let bounds = config.bounds;
        let max_km2 = config.max_region_km2;

        let mut registry: BTreeMap<StageKind, Box<dyn FilterStage>> = BTreeMap::new();
        registry.insert(
            StageKind::Buffer,
            Box::new(BufferExclusionStage::new(collaborators.obstacles, bounds)),
        );
        registry.insert(
            StageKind::Elevation,
            Box::new(RasterBandStage::elevation(
                collaborators.elevation,
                bounds,
                max_km2,
            )),
        );
        registry.insert(
            StageKind::Slope,
            Box::new(RasterBandStage::slope(collaborators.slope, bounds, max_km2)),
        );
        registry.insert(
            StageKind::Vegetation,
            Box::new(VegetationStage::new(
                collaborators.land_cover,
                bounds,
                max_km2,
            )),
        );
        registry.insert(
            StageKind::RelativePosition,
            Box::new(RelativePositionStage::new(bounds, max_km2)),
        );
        registry.insert(
            StageKind::Distance,
            Box::new(DistanceStage::new(bounds, max_km2)),
        );
        registry.insert(StageKind::Area, Box::new(AreaMergeStage::new(bounds)));

        Self { config, registry }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validate a plan against the stage registry without executing it.
    pub fn validate(&self, plan: &Plan) -> Result<()> {
        PlanValidator::new(&self.registry).validate(plan)
    }

    /// Validate and run a plan. Validation failures return `Err` before
    /// any geometry work; stage failures are reported per unit in the
    /// returned report, with all of that unit's artifacts cleaned up.
    pub fn run(&self, plan: &Plan) -> Result<PipelineReport> {
        self.validate(plan)?;

        let mut units = Vec::new();
        for (unit, steps) in plan.sequences() {
            // Sub-plans run independently: one failure does not stop the rest.
            units.push(self.run_sequence(unit, steps));
        }

        let success = units.iter().all(|u| u.state == PipelineState::Succeeded);
        Ok(PipelineReport { success, units })
    }

    fn run_sequence(&self, unit: Option<&str>, steps: &[StageDescriptor]) -> UnitReport {
        info!(
            unit = unit.unwrap_or("-"),
            steps = steps.len(),
            "starting plan run"
        );

        let mut reports = Vec::with_capacity(steps.len());
        let mut artifacts: Vec<PathBuf> = Vec::new();

        match self.execute_steps(unit, steps, &mut reports, &mut artifacts) {
            Ok(final_artifact) => {
                // Success keeps only the final output.
                let intermediates: Vec<PathBuf> = artifacts
                    .iter()
                    .filter(|p| Some(p.as_path()) != final_artifact.as_deref())
                    .cloned()
                    .collect();
                self.cleanup(&intermediates);
                UnitReport {
                    unit: unit.map(str::to_string),
                    state: PipelineState::Succeeded,
                    steps: reports,
                    final_artifact,
                    error: None,
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(
                    unit = unit.unwrap_or("-"),
                    error = %message,
                    "plan run failed, cleaning up artifacts"
                );
                // Failure cleans up everything, the synthesized initial
                // dataset included.
                self.cleanup(&artifacts);
                UnitReport {
                    unit: unit.map(str::to_string),
                    state: PipelineState::Failed,
                    steps: reports,
                    final_artifact: None,
                    error: Some(message),
                }
            }
        }
    }

    /// Run the steps of one sequence, appending per-step reports and
    /// every written artifact path. Returns the final artifact on
    /// success; the first stage error short-circuits the remainder.
    fn execute_steps(
        &self,
        unit: Option<&str>,
        steps: &[StageDescriptor],
        reports: &mut Vec<StepReport>,
        artifacts: &mut Vec<PathBuf>,
    ) -> Result<Option<PathBuf>> {
        let mut current: Option<SpatialDataset> = None;
        let mut final_artifact: Option<PathBuf> = None;

        for (idx, step) in steps.iter().enumerate() {
            let fail = |error: GeoplanError, reports: &mut Vec<StepReport>| {
                reports.push(StepReport {
                    step_id: step.step_id,
                    stage: step.stage_type.clone(),
                    outcome: StepOutcome::Failed {
                        error: error.to_string(),
                    },
                });
                error
            };

            // Pre-validated; a parse failure here is a defect, surfaced
            // as a stage failure rather than a panic.
            let kind = match step.kind() {
                Ok(kind) => kind,
                Err(e) => return Err(fail(e, reports)),
            };

            if !self.config.is_enabled(kind) {
                debug!(stage = %kind, "stage disabled, skipping");
                reports.push(StepReport {
                    step_id: step.step_id,
                    stage: step.stage_type.clone(),
                    outcome: StepOutcome::Skipped,
                });
                continue;
            }

            // The first enabled stage starts from the synthesized
            // full-extent dataset; later stages consume their
            // predecessor's output. This wiring belongs to the executor,
            // never to the planner.
            let input = match current.take() {
                Some(dataset) => dataset,
                None => match self.synthesize_initial(unit, artifacts) {
                    Ok(dataset) => dataset,
                    Err(e) => return Err(fail(e, reports)),
                },
            };

            let stage = match self.registry.get(&kind) {
                Some(stage) => stage,
                None => {
                    let e = GeoplanError::stage(kind.as_str(), "no handler registered");
                    return Err(fail(e, reports));
                }
            };

            let executed = stage.execute(input, &step.params).and_then(|output| {
                let path = self.artifact_path(unit, idx + 1, kind.as_str());
                write_geojson(&output.dataset, &path)?;
                Ok((output, path))
            });

            match executed {
                Ok((output, path)) => {
                    info!(
                        stage = %kind,
                        regions = output.region_count,
                        area_m2 = output.total_area_m2,
                        "stage completed"
                    );
                    artifacts.push(path.clone());
                    final_artifact = Some(path);
                    reports.push(StepReport {
                        step_id: step.step_id,
                        stage: step.stage_type.clone(),
                        outcome: StepOutcome::Completed {
                            region_count: output.region_count,
                            total_area_m2: output.total_area_m2,
                        },
                    });
                    current = Some(output.dataset);
                }
                Err(e) => return Err(fail(e, reports)),
            }
        }

        Ok(final_artifact)
    }

    /// One polygon covering the whole operational area, with measured
    /// areas, persisted like any other artifact.
    fn synthesize_initial(
        &self,
        unit: Option<&str>,
        artifacts: &mut Vec<PathBuf>,
    ) -> Result<SpatialDataset> {
        let mut dataset = SpatialDataset::new(
            vec![Region::new(self.config.bounds.to_polygon())],
            Crs::Geographic,
        );
        dataset.compute_areas()?;

        let path = self.artifact_path(unit, 0, "initial_region");
        write_geojson(&dataset, &path)?;
        info!(path = %path.display(), "synthesized initial full-extent dataset");
        artifacts.push(path);
        Ok(dataset)
    }

    fn artifact_path(&self, unit: Option<&str>, seq: usize, label: &str) -> PathBuf {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let name = match unit {
            Some(unit) => format!("{}_{:02}_{}_{}.geojson", slug(unit), seq, label, timestamp),
            None => format!("{:02}_{}_{}.geojson", seq, label, timestamp),
        };
        self.config.result_dir.join(name)
    }

    fn cleanup(&self, paths: &[PathBuf]) {
        for path in paths {
            if path.is_file() {
                match fs::remove_file(path) {
                    Ok(()) => debug!(path = %path.display(), "removed intermediate artifact"),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to remove artifact")
                    }
                }
            }
        }
    }
}

/// File-name-safe version of a unit name.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("1st Battalion"), "1st-battalion");
        assert_eq!(slug("recon--team "), "recon-team");
        assert_eq!(slug("Alpha/7"), "alpha-7");
    }
}
