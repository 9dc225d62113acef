//! # TWI Algorithms
//!
//! Terrain-analysis stages that turn a DEM into a Topographic Wetness Index:
//!
//! - **hydrology**: Priority-Flood filling, D8 flow direction, flow accumulation
//! - **terrain**: slope (radians) and the TWI composition
//! - **pipeline**: runs the stages in order with one configuration

pub mod hydrology;
pub mod pipeline;
pub mod terrain;

mod maybe_rayon;

pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineOutput, RoutingMethod, Stage};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        flow_accumulation, flow_direction, priority_flood, route, FlowDirectionParams, FlowRouter,
        FlowRouting, PriorityFlood, PriorityFloodParams,
    };
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineOutput, Stage};
    pub use crate::terrain::{slope, twi, Slope, SlopeMethod, SlopeParams, TwiParams};
    pub use twi_core::prelude::*;
}
