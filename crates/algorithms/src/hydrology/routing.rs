//! D8 routing: direction assignment followed by accumulation

use twi_core::raster::Raster;
use twi_core::{Algorithm, Error, Result};

use super::flow_accumulation::flow_accumulation;
use super::flow_direction::{flow_direction, FlowDirectionParams};

/// Direction and accumulation grids produced from one filled DEM
#[derive(Debug, Clone)]
pub struct FlowRouting {
    /// D8 codes (`0` sink, `1..=8` direction, `255` nodata)
    pub directions: Raster<u8>,
    /// Upstream cell counts, each valid cell counting itself
    pub accumulation: Raster<f64>,
}

/// Flow router (D8 directions + accumulation)
#[derive(Debug, Clone, Default)]
pub struct FlowRouter;

impl Algorithm for FlowRouter {
    type Input = Raster<f64>;
    type Output = FlowRouting;
    type Params = FlowDirectionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Router (D8)"
    }

    fn description(&self) -> &'static str {
        "Assign D8 directions and accumulate upstream cell counts"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        route(&input, params)
    }
}

/// Route flow over a filled DEM.
pub fn route(filled: &Raster<f64>, params: FlowDirectionParams) -> Result<FlowRouting> {
    let directions = flow_direction(filled, params)?;
    let accumulation = flow_accumulation(filled, &directions)?;

    Ok(FlowRouting {
        directions,
        accumulation,
    })
}
