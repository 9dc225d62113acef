//! End-to-end wetness-index pipeline
//!
//! ```text
//! DEM ─ fill ─▶ filled ─┬─ slope ─────────────▶ slope ──┐
//!                       └─ route ─▶ directions          ├─ compose ─▶ TWI
//!                                   accumulation ───────┘
//! ```
//!
//! Each stage borrows its inputs and returns a freshly owned grid. The
//! first failing stage aborts the run; the error names the stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, info_span};
use twi_core::raster::{Raster, D8};
use twi_core::{Algorithm, Error};

use crate::hydrology::{priority_flood, route, FlowDirectionParams, FlowRouting, PriorityFloodParams};
use crate::terrain::{slope, twi, SlopeMethod, SlopeParams, TwiParams};

/// Flow routing scheme. Only single-direction steepest descent is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoutingMethod {
    #[default]
    D8,
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub routing: RoutingMethod,
    /// Fill increment δ applied by Priority-Flood
    pub fill_increment: f64,
    /// Safety clamp ε for slope and specific catchment area
    pub epsilon: f64,
    /// Direction priority for exactly equal drops
    pub tie_break: [D8; 8],
    pub slope_method: SlopeMethod,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            routing: RoutingMethod::D8,
            fill_increment: 1e-6,
            epsilon: 0.001,
            tie_break: D8::DEFAULT_PRIORITY,
            slope_method: SlopeMethod::SteepestDescent,
        }
    }
}

impl PipelineConfig {
    /// Reject values no stage could run with
    pub fn validate(&self) -> twi_core::Result<()> {
        if !self.fill_increment.is_finite() || self.fill_increment < 0.0 {
            return Err(Error::InvalidParameter {
                name: "fill_increment",
                value: self.fill_increment.to_string(),
                reason: "must be finite and >= 0".into(),
            });
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "epsilon",
                value: self.epsilon.to_string(),
                reason: "must be finite and > 0".into(),
            });
        }
        if !D8::is_permutation(&self.tie_break) {
            return Err(Error::InvalidParameter {
                name: "tie_break",
                value: format!("{:?}", self.tie_break),
                reason: "must list each of the 8 directions exactly once".into(),
            });
        }
        Ok(())
    }

    fn fill_params(&self) -> PriorityFloodParams {
        PriorityFloodParams {
            epsilon: self.fill_increment,
        }
    }

    fn slope_params(&self) -> SlopeParams {
        SlopeParams {
            method: self.slope_method,
            min_slope: self.epsilon,
        }
    }

    fn direction_params(&self) -> FlowDirectionParams {
        FlowDirectionParams {
            tie_break: self.tie_break,
        }
    }

    fn twi_params(&self) -> TwiParams {
        TwiParams {
            epsilon: self.epsilon,
        }
    }
}

/// Pipeline stage, as reported in errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Fill,
    Slope,
    Route,
    Compose,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Fill => "fill",
            Stage::Slope => "slope",
            Stage::Route => "route",
            Stage::Compose => "compose",
        };
        f.write_str(name)
    }
}

/// A stage failure
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl PipelineError {
    fn at(stage: Stage) -> impl FnOnce(Error) -> PipelineError {
        move |source| PipelineError { stage, source }
    }
}

/// Every grid the pipeline produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub filled: Raster<f64>,
    pub slope: Raster<f64>,
    pub directions: Raster<u8>,
    pub accumulation: Raster<f64>,
    pub twi: Raster<f64>,
}

/// Wetness-index pipeline
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn timed<T>(
        &self,
        stage: Stage,
        f: impl FnOnce() -> twi_core::Result<T>,
    ) -> Result<T, PipelineError> {
        let _span = info_span!("stage", %stage).entered();
        let start = Instant::now();
        let result = f().map_err(PipelineError::at(stage));
        debug!(elapsed = ?start.elapsed(), ok = result.is_ok(), "stage finished");
        result
    }

    /// Check configuration and DEM invariants before any stage runs
    pub fn validate(&self, dem: &Raster<f64>) -> Result<(), PipelineError> {
        self.timed(Stage::Validate, || {
            self.config.validate()?;
            dem.validate()?;
            debug!(rows = dem.rows(), cols = dem.cols(), valid = dem.valid_count(), "DEM accepted");
            Ok(())
        })
    }

    pub fn fill(&self, dem: &Raster<f64>) -> Result<Raster<f64>, PipelineError> {
        self.timed(Stage::Fill, || priority_flood(dem, self.config.fill_params()))
    }

    pub fn slope(&self, filled: &Raster<f64>) -> Result<Raster<f64>, PipelineError> {
        self.timed(Stage::Slope, || slope(filled, self.config.slope_params()))
    }

    pub fn route(&self, filled: &Raster<f64>) -> Result<FlowRouting, PipelineError> {
        self.timed(Stage::Route, || match self.config.routing {
            RoutingMethod::D8 => route(filled, self.config.direction_params()),
        })
    }

    pub fn compose(
        &self,
        accumulation: &Raster<f64>,
        slope: &Raster<f64>,
    ) -> Result<Raster<f64>, PipelineError> {
        self.timed(Stage::Compose, || twi(accumulation, slope, self.config.twi_params()))
    }

    /// Run every stage in order and return all intermediate grids
    pub fn run(&self, dem: &Raster<f64>) -> Result<PipelineOutput, PipelineError> {
        info!(rows = dem.rows(), cols = dem.cols(), "running TWI pipeline");

        self.validate(dem)?;
        let filled = self.fill(dem)?;
        let slope = self.slope(&filled)?;
        let FlowRouting {
            directions,
            accumulation,
        } = self.route(&filled)?;
        let twi = self.compose(&accumulation, &slope)?;

        info!("TWI pipeline complete");

        Ok(PipelineOutput {
            filled,
            slope,
            directions,
            accumulation,
            twi,
        })
    }
}

impl Algorithm for Pipeline {
    type Input = Raster<f64>;
    type Output = PipelineOutput;
    type Params = PipelineConfig;
    type Error = PipelineError;

    fn name(&self) -> &'static str {
        "Topographic Wetness Index"
    }

    fn description(&self) -> &'static str {
        "Fill, slope, D8 routing and TWI composition in one run"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output, Self::Error> {
        Pipeline::new(params).run(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.fill_increment, 1e-6);
        assert_eq!(cfg.epsilon, 0.001);
        assert_eq!(cfg.tie_break, D8::DEFAULT_PRIORITY);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{ "fill_increment": 0.0, "tie_break": ["N","NE","E","SE","S","SW","W","NW"], "slope_method": "horn" }"#,
        )
        .unwrap();
        assert_eq!(cfg.fill_increment, 0.0);
        assert_eq!(cfg.tie_break[0], D8::N);
        assert_eq!(cfg.slope_method, SlopeMethod::Horn);
        assert_eq!(cfg.epsilon, 0.001);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_unknown_fields() {
        let parsed: Result<PipelineConfig, _> = serde_json::from_str(r#"{ "routing": "D8", "mfd": true }"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_invalid_config_fails_validate_stage() {
        let cfg = PipelineConfig {
            epsilon: -1.0,
            ..Default::default()
        };
        let dem: Raster<f64> = Raster::filled(3, 3, 1.0);
        let err = Pipeline::new(cfg).run(&dem).unwrap_err();
        assert_eq!(err.stage, Stage::Validate);
        assert!(matches!(err.source, Error::InvalidParameter { name: "epsilon", .. }));
    }

    #[test]
    fn test_error_message_names_stage() {
        let dem: Raster<f64> = Raster::filled(2, 2, f64::NAN);
        let err = Pipeline::default().run(&dem).unwrap_err();
        assert_eq!(err.to_string(), "validate stage failed: Grid contains no valid cells (every cell is nodata)");
    }

    #[test]
    fn test_execute_uses_given_config() {
        let mut dem: Raster<f64> = Raster::filled(3, 3, 10.0);
        dem.set(1, 1, 1.0).unwrap();

        // Reversed priority sends the filled pit north instead of east
        let mut tie_break = D8::DEFAULT_PRIORITY;
        tie_break.reverse();
        let config = PipelineConfig {
            tie_break,
            ..Default::default()
        };

        let out = Pipeline::default().execute(dem.clone(), config).unwrap();
        assert_eq!(out.directions.get(1, 1).unwrap(), D8::N.code());

        let out = Pipeline::default().execute_default(dem).unwrap();
        assert_eq!(out.directions.get(1, 1).unwrap(), D8::E.code());
    }
}
