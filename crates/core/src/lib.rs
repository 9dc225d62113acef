//! # TWI Core
//!
//! Core types, traits and I/O shared by the wetness-index pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: generic raster grid with nodata and cell size
//! - `GeoTransform`: affine transformation for georeferencing
//! - `D8`: the eight-neighbour direction set used by routing and slope
//! - Algorithm trait for a consistent stage API
//! - Native GeoTIFF reading and writing

pub mod error;
pub mod io;
pub mod raster;

pub use error::{Error, Result};
pub use raster::{GeoKeys, GeoTransform, Raster, RasterElement, RasterStatistics, D8};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoKeys, GeoTransform, Raster, RasterElement, RasterStatistics, D8};
    pub use crate::Algorithm;
}

/// Core trait for every pipeline stage.
///
/// Stages are pure functions that transform input grids according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
