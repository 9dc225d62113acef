//! Flow accumulation over a D8 direction grid
//!
//! Counts, for every cell, how many cells drain through it, itself
//! included. The direction grid is treated as an implicit graph with one
//! outgoing edge per non-sink cell. Cells are processed in an explicit
//! topological order (decreasing elevation) instead of by recursion, so
//! stack depth does not grow with the grid.

use ndarray::Array2;
use twi_core::raster::{Raster, D8};
use twi_core::{Error, Result};

/// Valid cells as flat row-major indices, sorted by decreasing elevation.
///
/// Equal elevations are ordered by ascending index. Every edge produced by
/// [`flow_direction`](super::flow_direction) descends strictly, so this is
/// a topological order of the flow graph.
pub fn topological_order(dem: &Raster<f64>) -> Vec<usize> {
    let cols = dem.cols();
    let data = dem.data();

    let mut order: Vec<usize> = data
        .indexed_iter()
        .filter(|&(_, &z)| !dem.is_nodata(z))
        .map(|((r, c), _)| r * cols + c)
        .collect();

    order.sort_unstable_by(|&a, &b| {
        let za = data[(a / cols, a % cols)];
        let zb = data[(b / cols, b % cols)];
        zb.total_cmp(&za).then(a.cmp(&b))
    });

    order
}

/// Receiver (downstream cell index) of every valid cell, `None` for sinks.
fn receivers(dem: &Raster<f64>, flow_dir: &Raster<u8>, order: &[usize]) -> Result<Vec<Option<usize>>> {
    let (rows, cols) = dem.shape();
    let mut receiver = vec![None; rows * cols];

    for &idx in order {
        let (row, col) = (idx / cols, idx % cols);
        let code = unsafe { flow_dir.get_unchecked(row, col) };
        if code == D8::SINK {
            continue;
        }

        let target = D8::from_code(code)
            .and_then(|dir| dir.step(row, col, rows, cols))
            .filter(|&(nr, nc)| !dem.is_nodata(unsafe { dem.get_unchecked(nr, nc) }));

        match target {
            Some((nr, nc)) => receiver[idx] = Some(nr * cols + nc),
            None => return Err(Error::InvalidFlowDirection { row, col, code }),
        }
    }

    Ok(receiver)
}

/// Explain why the edge leaving `start` runs backwards in the order:
/// either its downstream chain loops, or it is a non-descending edge.
fn classify_violation(start: usize, receiver: &[Option<usize>], cols: usize) -> Error {
    let mut on_path = vec![false; receiver.len()];
    let mut cur = start;

    loop {
        if on_path[cur] {
            return Error::CycleDetected {
                row: cur / cols,
                col: cur % cols,
            };
        }
        on_path[cur] = true;

        match receiver[cur] {
            Some(next) => cur = next,
            None => {
                return Error::FlowOrderViolation {
                    row: start / cols,
                    col: start % cols,
                }
            }
        }
    }
}

/// Calculate flow accumulation from a filled DEM and its D8 direction grid.
///
/// Every valid cell starts with `1` (its own area); walking the
/// [`topological_order`], each cell then adds its total to its receiver.
///
/// # Errors
/// - `SizeMismatch` if the grids differ in shape
/// - `InvalidFlowDirection` for unknown codes or edges leaving the valid area
/// - `CycleDetected` if following directions loops
/// - `FlowOrderViolation` if an edge does not descend in the order
///
/// # Returns
/// Raster<f64> of upstream cell counts, nodata where the DEM is nodata
pub fn flow_accumulation(dem: &Raster<f64>, flow_dir: &Raster<u8>) -> Result<Raster<f64>> {
    if dem.shape() != flow_dir.shape() {
        let (er, ec) = dem.shape();
        let (ar, ac) = flow_dir.shape();
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }
    dem.validate()?;

    let (rows, cols) = dem.shape();
    let order = topological_order(dem);
    let receiver = receivers(dem, flow_dir, &order)?;

    let mut rank = vec![usize::MAX; rows * cols];
    for (pos, &idx) in order.iter().enumerate() {
        rank[idx] = pos;
    }

    for &idx in &order {
        if let Some(next) = receiver[idx] {
            if rank[next] <= rank[idx] {
                return Err(classify_violation(idx, &receiver, cols));
            }
        }
    }

    let nodata = dem.nodata().unwrap_or(f64::NAN);
    let mut acc = vec![nodata; rows * cols];
    for &idx in &order {
        acc[idx] = 1.0;
    }

    for &idx in &order {
        if let Some(next) = receiver[idx] {
            acc[next] += acc[idx];
        }
    }

    let data = Array2::from_shape_vec((rows, cols), acc).map_err(|e| Error::Other(e.to_string()))?;
    dem.derive(data, Some(nodata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction::{flow_direction, FlowDirectionParams};

    fn route(dem: &Raster<f64>) -> (Raster<u8>, Raster<f64>) {
        let fdir = flow_direction(dem, FlowDirectionParams::default()).unwrap();
        let acc = flow_accumulation(dem, &fdir).unwrap();
        (fdir, acc)
    }

    #[test]
    fn test_flow_accumulation_linear() {
        // 1x5 strip sloping east: every cell drains to the next
        let dem = Raster::from_vec(vec![5.0, 4.0, 3.0, 2.0, 1.0], 1, 5).unwrap();
        let (_, acc) = route(&dem);

        for col in 0..5 {
            assert_eq!(acc.get(0, col).unwrap(), (col + 1) as f64);
        }
    }

    #[test]
    fn test_flow_accumulation_convergent() {
        //  5 5 5
        //  5 1 5
        //  5 5 5
        let mut dem: Raster<f64> = Raster::filled(3, 3, 5.0);
        dem.set(1, 1, 1.0).unwrap();

        let (fdir, acc) = route(&dem);
        assert_eq!(fdir.get(1, 1).unwrap(), D8::SINK);
        assert_eq!(acc.get(1, 1).unwrap(), 9.0);
        assert_eq!(acc.get(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_flow_accumulation_plane() {
        // Plane sloping south: each column is an independent chain
        let values: Vec<f64> = (0..25).map(|i| (5 - i / 5) as f64 * 10.0).collect();
        let dem = Raster::from_vec(values, 5, 5).unwrap();
        let (_, acc) = route(&dem);

        for col in 0..5 {
            assert_eq!(acc.get(0, col).unwrap(), 1.0);
            assert_eq!(acc.get(4, col).unwrap(), 5.0);
        }
    }

    #[test]
    fn test_sink_totals_equal_valid_cells() {
        let values: Vec<f64> = (0..36)
            .map(|i| {
                let (r, c) = ((i / 6) as f64, (i % 6) as f64);
                ((r - 2.5).powi(2) + (c - 1.0).powi(2)).sqrt() + ((i * 7) % 5) as f64 * 0.1
            })
            .collect();
        let mut dem = Raster::from_vec(values, 6, 6).unwrap();
        dem.set_nodata(Some(-1.0));
        dem.set(5, 5, -1.0).unwrap();

        let (fdir, acc) = route(&dem);
        let total: f64 = fdir
            .data()
            .indexed_iter()
            .filter(|&(_, &code)| code == D8::SINK)
            .map(|((r, c), _)| acc.get(r, c).unwrap())
            .sum();

        assert_eq!(total, 35.0);
        assert_eq!(acc.get(5, 5).unwrap(), -1.0);
    }

    #[test]
    fn test_topological_order_descends() {
        let dem = Raster::from_vec(vec![3.0, 1.0, 3.0, 2.0], 2, 2).unwrap();
        assert_eq!(topological_order(&dem), vec![0, 2, 3, 1]);
    }

    #[test]
    fn test_cycle_detected() {
        // Two equal cells pointing at each other
        let dem: Raster<f64> = Raster::filled(1, 2, 4.0);
        let fdir = Raster::from_vec(vec![D8::E.code(), D8::W.code()], 1, 2).unwrap();

        assert!(matches!(
            flow_accumulation(&dem, &fdir),
            Err(Error::CycleDetected { row: 0, .. })
        ));
    }

    #[test]
    fn test_uphill_edge_is_order_violation() {
        let dem = Raster::from_vec(vec![1.0, 2.0], 1, 2).unwrap();
        let fdir = Raster::from_vec(vec![D8::E.code(), D8::SINK], 1, 2).unwrap();

        assert!(matches!(
            flow_accumulation(&dem, &fdir),
            Err(Error::FlowOrderViolation { row: 0, col: 0 })
        ));
    }

    #[test]
    fn test_edge_off_grid_is_invalid() {
        let dem = Raster::from_vec(vec![2.0, 1.0], 1, 2).unwrap();
        let fdir = Raster::from_vec(vec![D8::N.code(), D8::SINK], 1, 2).unwrap();

        assert!(matches!(
            flow_accumulation(&dem, &fdir),
            Err(Error::InvalidFlowDirection { row: 0, col: 0, .. })
        ));
    }

    #[test]
    fn test_size_mismatch() {
        let dem: Raster<f64> = Raster::filled(2, 2, 1.0);
        let fdir: Raster<u8> = Raster::new(3, 3);
        assert!(matches!(
            flow_accumulation(&dem, &fdir),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
