//! Terrain attributes derived from a filled DEM
//!
//! - Slope: steepest-descent or Horn gradient, in radians
//! - TWI: Topographic Wetness Index from accumulation and slope

mod slope;
mod twi;

pub use slope::{slope, Slope, SlopeMethod, SlopeParams};
pub use twi::{twi, TwiParams};
