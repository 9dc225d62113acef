//! D8 flow direction algorithm
//!
//! Assigns each cell the neighbour with the steepest downslope drop using
//! the D8 (deterministic eight-node) method.
//!
//! Flow direction encoding:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = sink (no strictly lower neighbour), 1-8 = direction to steepest
//! neighbour, 255 = nodata.

use ndarray::Array2;
use crate::maybe_rayon::*;
use twi_core::raster::{Neighbors, Raster, D8};
use twi_core::{Error, Result};

/// Parameters for D8 direction assignment
#[derive(Debug, Clone)]
pub struct FlowDirectionParams {
    /// Order in which neighbours are tried. When two drops are exactly
    /// equal, the direction listed first wins.
    pub tie_break: [D8; 8],
}

impl Default for FlowDirectionParams {
    fn default() -> Self {
        Self {
            tie_break: D8::DEFAULT_PRIORITY,
        }
    }
}

/// Calculate D8 flow direction from a DEM.
///
/// The input DEM should be hydrologically conditioned (depressions filled),
/// otherwise every pit becomes a sink.
///
/// For each valid cell the drop to each valid neighbour is
/// `(z_center - z_neighbor) / (distance_weight * cell_size)`; the largest
/// strictly positive drop wins. Neighbours are visited in `tie_break`
/// order and only a strictly larger drop replaces the current best, so
/// exact ties resolve to the earliest direction in that list.
///
/// # Returns
/// Raster<u8> with direction codes (`0` sink, `1..=8` direction, `255` nodata)
pub fn flow_direction(dem: &Raster<f64>, params: FlowDirectionParams) -> Result<Raster<u8>> {
    if !D8::is_permutation(&params.tie_break) {
        return Err(Error::InvalidParameter {
            name: "tie_break",
            value: format!("{:?}", params.tie_break),
            reason: "must list each of the 8 directions exactly once".into(),
        });
    }
    dem.validate()?;

    let (rows, cols) = dem.shape();
    let cell_size = dem.transform().uniform_cell_size()?;
    let order = params.tie_break;

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![D8::NODATA; cols];

            for col in 0..cols {
                let center = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(center) {
                    continue;
                }

                let mut max_drop = 0.0_f64;
                let mut best = D8::SINK;

                for (dir, nr, nc) in Neighbors::new(row, col, rows, cols, &order) {
                    let neighbor = unsafe { dem.get_unchecked(nr, nc) };
                    if dem.is_nodata(neighbor) {
                        continue;
                    }

                    let drop = (center - neighbor) / (dir.distance() * cell_size);
                    if drop > max_drop {
                        max_drop = drop;
                        best = dir.code();
                    }
                }

                row_data[col] = best;
            }

            row_data
        })
        .collect();

    let data = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    dem.derive(data, Some(D8::NODATA))
}

#[cfg(test)]
mod tests {
    use super::*;
    use twi_core::GeoTransform;

    fn dem_from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let values = (0..rows * cols).map(|i| f(i / cols, i % cols)).collect();
        let mut dem = Raster::from_vec(values, rows, cols).unwrap();
        dem.set_transform(GeoTransform::with_cell_size(1.0));
        dem
    }

    fn dir_at(fdir: &Raster<u8>, row: usize, col: usize) -> Option<D8> {
        D8::from_code(fdir.get(row, col).unwrap())
    }

    #[test]
    fn test_flow_direction_slope_east() {
        let dem = dem_from_fn(5, 5, |_, c| (5 - c) as f64 * 10.0);
        let fdir = flow_direction(&dem, FlowDirectionParams::default()).unwrap();
        assert_eq!(dir_at(&fdir, 2, 2), Some(D8::E));
    }

    #[test]
    fn test_flow_direction_slope_south() {
        let dem = dem_from_fn(5, 5, |r, _| (5 - r) as f64 * 10.0);
        let fdir = flow_direction(&dem, FlowDirectionParams::default()).unwrap();
        assert_eq!(dir_at(&fdir, 2, 2), Some(D8::S));
    }

    #[test]
    fn test_flow_direction_diagonal() {
        let dem = dem_from_fn(5, 5, |r, c| (10 - r - c) as f64 * 10.0);
        let fdir = flow_direction(&dem, FlowDirectionParams::default()).unwrap();
        // Drop 20/√2 to the SE beats 10 to E or S
        assert_eq!(dir_at(&fdir, 2, 2), Some(D8::SE));
    }

    #[test]
    fn test_flow_direction_pit_is_sink() {
        let mut dem = dem_from_fn(5, 5, |_, _| 10.0);
        dem.set(2, 2, 1.0).unwrap();
        let fdir = flow_direction(&dem, FlowDirectionParams::default()).unwrap();
        assert_eq!(fdir.get(2, 2).unwrap(), D8::SINK);
    }

    #[test]
    fn test_tie_break_follows_priority() {
        // Centre slightly above all 8 neighbours: E and S (and W, N) tie
        let mut dem = dem_from_fn(3, 3, |_, _| 10.0);
        dem.set(1, 1, 10.5).unwrap();

        let fdir = flow_direction(&dem, FlowDirectionParams::default()).unwrap();
        assert_eq!(dir_at(&fdir, 1, 1), Some(D8::E));

        let mut order = D8::DEFAULT_PRIORITY;
        order.reverse(); // NE, N, NW, W, ...
        let fdir = flow_direction(&dem, FlowDirectionParams { tie_break: order }).unwrap();
        assert_eq!(dir_at(&fdir, 1, 1), Some(D8::N));
    }

    #[test]
    fn test_nodata_neighbors_ignored() {
        let mut dem = dem_from_fn(3, 3, |_, c| (3 - c) as f64);
        dem.set_nodata(Some(-9999.0));
        dem.set(1, 2, -9999.0).unwrap();

        let fdir = flow_direction(&dem, FlowDirectionParams::default()).unwrap();
        assert_eq!(fdir.get(1, 2).unwrap(), D8::NODATA);
        // East is nodata; the steepest remaining drop is diagonal
        assert_eq!(dir_at(&fdir, 1, 1), Some(D8::SE));
    }

    #[test]
    fn test_rejects_bad_priority() {
        let dem = dem_from_fn(3, 3, |_, _| 1.0);
        let params = FlowDirectionParams { tie_break: [D8::E; 8] };
        assert!(matches!(
            flow_direction(&dem, params),
            Err(Error::InvalidParameter { name: "tie_break", .. })
        ));
    }
}
