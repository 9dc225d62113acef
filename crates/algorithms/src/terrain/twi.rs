//! Topographic Wetness Index (TWI)
//!
//! TWI = ln(a / tan(β))
//! where a = specific catchment area (flow accumulation × cell size, i.e.
//! contributing area per unit contour width) and β = slope in radians.
//!
//! High TWI values indicate areas prone to saturation.

use ndarray::Array2;
use crate::maybe_rayon::*;
use twi_core::raster::Raster;
use twi_core::{Error, Result};

/// Parameters for TWI composition
#[derive(Debug, Clone)]
pub struct TwiParams {
    /// Lower clamp for both SCA and slope
    pub epsilon: f64,
}

impl Default for TwiParams {
    fn default() -> Self {
        Self { epsilon: 0.001 }
    }
}

/// Compute Topographic Wetness Index
///
/// `SCA = max(acc × cell_size, ε)`, `β = max(slope, ε)`,
/// `TWI = ln(SCA / tan(β))`. The cell size is read from the accumulation
/// grid's transform.
///
/// # Arguments
/// * `flow_acc` - Flow accumulation raster (cell counts, self included)
/// * `slope_rad` - Slope in radians
///
/// # Returns
/// TWI raster, nodata wherever either input is nodata
pub fn twi(flow_acc: &Raster<f64>, slope_rad: &Raster<f64>, params: TwiParams) -> Result<Raster<f64>> {
    let (rows_a, cols_a) = flow_acc.shape();
    let (rows_s, cols_s) = slope_rad.shape();

    if rows_a != rows_s || cols_a != cols_s {
        return Err(Error::SizeMismatch {
            er: rows_a,
            ec: cols_a,
            ar: rows_s,
            ac: cols_s,
        });
    }
    if !params.epsilon.is_finite() || params.epsilon <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "epsilon",
            value: params.epsilon.to_string(),
            reason: "must be finite and > 0".into(),
        });
    }
    flow_acc.validate()?;
    slope_rad.validate()?;

    let rows = rows_a;
    let cols = cols_a;
    let cell_size = flow_acc.transform().uniform_cell_size()?;
    let nodata = flow_acc.nodata().unwrap_or(f64::NAN);
    let eps = params.epsilon;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![nodata; cols];
            for col in 0..cols {
                let acc = unsafe { flow_acc.get_unchecked(row, col) };
                let slp = unsafe { slope_rad.get_unchecked(row, col) };

                if flow_acc.is_nodata(acc) || slope_rad.is_nodata(slp) {
                    continue;
                }

                let sca = (acc * cell_size).max(eps);
                let beta = slp.max(eps);

                row_data[col] = (sca / beta.tan()).ln();
            }
            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    flow_acc.derive(data, Some(nodata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use twi_core::GeoTransform;

    fn grids(acc: f64, slope: f64, cell_size: f64) -> (Raster<f64>, Raster<f64>) {
        let mut flow_acc = Raster::filled(3, 3, acc);
        flow_acc.set_transform(GeoTransform::with_cell_size(cell_size));
        let mut slope_r = Raster::filled(3, 3, slope);
        slope_r.set_transform(GeoTransform::with_cell_size(cell_size));
        (flow_acc, slope_r)
    }

    #[test]
    fn test_twi_formula() {
        // SCA = 100 * 2 = 200; ln(200 / tan(0.1)) ≈ 7.598
        let (acc, slp) = grids(100.0, 0.1, 2.0);
        let result = twi(&acc, &slp, TwiParams::default()).unwrap();
        let v = result.get(1, 1).unwrap();
        assert_abs_diff_eq!(v, (200.0 / 0.1f64.tan()).ln(), epsilon = 1e-12);
        assert_abs_diff_eq!(v, 7.598, epsilon = 1e-3);
    }

    #[test]
    fn test_twi_high_acc_low_slope() {
        let (acc, slp) = grids(1000.0, 0.01, 1.0);
        let result = twi(&acc, &slp, TwiParams::default()).unwrap();
        // High accumulation + low slope = wet
        assert!(result.get(1, 1).unwrap() > 10.0);
    }

    #[test]
    fn test_twi_clamps_zero_slope() {
        let (acc, slp) = grids(1.0, 0.0, 1.0);
        let result = twi(&acc, &slp, TwiParams::default()).unwrap();
        assert_abs_diff_eq!(result.get(0, 0).unwrap(), (1.0 / 0.001f64.tan()).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_twi_propagates_nodata() {
        let (mut acc, mut slp) = grids(4.0, 0.2, 1.0);
        acc.set_nodata(Some(-9999.0));
        slp.set_nodata(Some(-9999.0));
        acc.set(0, 1, -9999.0).unwrap();
        slp.set(2, 2, -9999.0).unwrap();

        let result = twi(&acc, &slp, TwiParams::default()).unwrap();
        assert_eq!(result.get(0, 1).unwrap(), -9999.0);
        assert_eq!(result.get(2, 2).unwrap(), -9999.0);
        assert_eq!(result.valid_count(), 7);
    }

    #[test]
    fn test_twi_dimension_mismatch() {
        let acc: Raster<f64> = Raster::filled(5, 5, 1.0);
        let slp: Raster<f64> = Raster::filled(3, 3, 0.1);
        assert!(matches!(
            twi(&acc, &slp, TwiParams::default()),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
