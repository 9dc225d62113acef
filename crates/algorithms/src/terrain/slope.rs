//! Slope calculation from filled DEMs
//!
//! The default is the steepest-descent slope: the largest downhill gradient
//! to any valid D8 neighbour, in radians. Horn's (1981) 3x3 finite
//! difference is available as an alternative. Both clamp the result to a
//! minimum slope so that downstream `tan(slope)` never reaches zero.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use crate::maybe_rayon::*;
use twi_core::raster::{Neighbors, Raster};
use twi_core::{Algorithm, Error, Result};

/// How the gradient at a cell is estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeMethod {
    /// Maximum downhill drop over the 8 neighbours
    #[default]
    SteepestDescent,
    /// Horn's weighted 3x3 finite difference
    Horn,
}

/// Parameters for slope calculation
#[derive(Debug, Clone)]
pub struct SlopeParams {
    /// Gradient estimator
    pub method: SlopeMethod,
    /// Lower clamp in radians, applied to every valid cell
    pub min_slope: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            method: SlopeMethod::SteepestDescent,
            min_slope: 0.001,
        }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Calculate slope in radians from a filled DEM"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, params)
    }
}

/// Steepest downhill slope at (row, col); 0 when no valid neighbour is lower
fn steepest_descent(dem: &Raster<f64>, row: usize, col: usize, center: f64, cell_size: f64) -> f64 {
    let (rows, cols) = dem.shape();
    let mut max_gradient = 0.0_f64;

    for (dir, nr, nc) in Neighbors::all(row, col, rows, cols) {
        let neighbor = unsafe { dem.get_unchecked(nr, nc) };
        if dem.is_nodata(neighbor) {
            continue;
        }
        let gradient = (center - neighbor) / (dir.distance() * cell_size);
        max_gradient = max_gradient.max(gradient);
    }

    max_gradient.atan()
}

/// Horn slope at (row, col). Missing or nodata window cells take the
/// centre value, so edge cells still get a gradient from what is present.
fn horn(dem: &Raster<f64>, row: usize, col: usize, center: f64, cell_size: f64) -> f64 {
    let (rows, cols) = dem.shape();
    let z = |dr: isize, dc: isize| -> f64 {
        let r = row as isize + dr;
        let c = col as isize + dc;
        if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
            return center;
        }
        let v = unsafe { dem.get_unchecked(r as usize, c as usize) };
        if dem.is_nodata(v) {
            center
        } else {
            v
        }
    };

    // a b c
    // d e f
    // g h i
    let (a, b, c) = (z(-1, -1), z(-1, 0), z(-1, 1));
    let (d, f) = (z(0, -1), z(0, 1));
    let (g, h, i) = (z(1, -1), z(1, 0), z(1, 1));

    let eight_cell_size = 8.0 * cell_size;
    let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / eight_cell_size;
    let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / eight_cell_size;

    (dz_dx * dz_dx + dz_dy * dz_dy).sqrt().atan()
}

/// Calculate slope in radians from a DEM.
///
/// Every valid cell gets a value in `[min_slope, π/2]`, including cells on
/// the grid edge or next to nodata. Nodata cells stay nodata.
///
/// # Arguments
/// * `dem` - Input DEM raster (normally filled)
/// * `params` - Slope calculation parameters
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    if !params.min_slope.is_finite() || params.min_slope <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "min_slope",
            value: params.min_slope.to_string(),
            reason: "must be finite and > 0".into(),
        });
    }
    dem.validate()?;

    let (rows, cols) = dem.shape();
    let cell_size = dem.transform().uniform_cell_size()?;
    let nodata = dem.nodata().unwrap_or(f64::NAN);
    let min_slope = params.min_slope;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![nodata; cols];

            for col in 0..cols {
                let e = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(e) {
                    continue;
                }

                let slope_rad = match params.method {
                    SlopeMethod::SteepestDescent => steepest_descent(dem, row, col, e, cell_size),
                    SlopeMethod::Horn => horn(dem, row, col, e, cell_size),
                };

                row_data[col] = slope_rad.max(min_slope);
            }

            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    dem.derive(data, Some(nodata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;
    use twi_core::GeoTransform;

    fn create_test_dem() -> Raster<f64> {
        // Tilted plane: z = row + col
        let values: Vec<f64> = (0..100).map(|i| ((i / 10) + (i % 10)) as f64).collect();
        let mut dem = Raster::from_vec(values, 10, 10).unwrap();
        dem.set_transform(GeoTransform::with_cell_size(1.0));
        dem
    }

    #[test]
    fn test_slope_flat_is_clamped() {
        let dem: Raster<f64> = Raster::filled(10, 10, 100.0);
        let result = slope(&dem, SlopeParams::default()).unwrap();

        for &v in result.data().iter() {
            assert_eq!(v, 0.001);
        }
    }

    #[test]
    fn test_steepest_descent_value() {
        let dem = create_test_dem();
        let result = slope(&dem, SlopeParams::default()).unwrap();

        // Steepest drop from an interior cell is diagonal: 2 / √2
        assert_relative_eq!(result.get(5, 5).unwrap(), 2f64.sqrt().atan(), epsilon = 1e-12);
        // The lowest corner has no lower neighbour
        assert_eq!(result.get(0, 0).unwrap(), 0.001);
    }

    #[test]
    fn test_cell_size_scales_gradient() {
        let mut dem = create_test_dem();
        dem.set_transform(GeoTransform::with_cell_size(10.0));
        let result = slope(&dem, SlopeParams::default()).unwrap();
        assert_relative_eq!(result.get(5, 5).unwrap(), (2f64.sqrt() / 10.0).atan(), epsilon = 1e-12);
    }

    #[test]
    fn test_horn_tilted() {
        let dem = create_test_dem();
        let params = SlopeParams {
            method: SlopeMethod::Horn,
            ..Default::default()
        };
        let result = slope(&dem, params).unwrap();

        // dz/dx = dz/dy = 1 -> atan(√2) for every interior cell
        assert_relative_eq!(result.get(3, 3).unwrap(), 2f64.sqrt().atan(), epsilon = 1e-12);
        assert_relative_eq!(result.get(6, 4).unwrap(), 2f64.sqrt().atan(), epsilon = 1e-12);
        // Edges are real numbers, not nodata
        assert!(result.get(0, 5).unwrap().is_finite());
    }

    #[test]
    fn test_slope_bounds_and_nodata() {
        let mut dem = create_test_dem();
        dem.set_nodata(Some(-9999.0));
        dem.set(4, 4, -9999.0).unwrap();
        dem.set(9, 9, 1e9).unwrap();

        let result = slope(&dem, SlopeParams::default()).unwrap();
        assert_eq!(result.get(4, 4).unwrap(), -9999.0);
        assert_eq!(result.nodata(), Some(-9999.0));

        for ((r, c), &v) in result.data().indexed_iter() {
            if (r, c) == (4, 4) {
                continue;
            }
            assert!((0.001..=FRAC_PI_2).contains(&v), "({}, {}) = {}", r, c, v);
        }
    }

    #[test]
    fn test_rejects_non_positive_min_slope() {
        let dem = create_test_dem();
        let params = SlopeParams {
            min_slope: 0.0,
            ..Default::default()
        };
        assert!(matches!(slope(&dem, params), Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_stage_interface_matches_function() {
        let dem = create_test_dem();
        let direct = slope(&dem, SlopeParams::default()).unwrap();
        let staged = Slope.execute_default(dem).unwrap();
        assert_eq!(staged.data(), direct.data());
    }
}
