//! The D8 neighbourhood: eight compass directions, their offsets and
//! distance weights, and the byte codes used in flow-direction grids.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the eight neighbours of a grid cell.
///
/// Byte encoding in a flow-direction grid:
/// ```text
///   4  3  2
///   5  0  1
///   6  7  8
/// ```
/// `0` is a sink (no downslope neighbour) and `255` is nodata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum D8 {
    E,
    NE,
    N,
    NW,
    W,
    SW,
    S,
    SE,
}

impl D8 {
    /// Code stored for a cell without a downslope neighbour
    pub const SINK: u8 = 0;

    /// Code stored for nodata cells
    pub const NODATA: u8 = 255;

    /// All directions in code order (1..=8)
    pub const ALL: [D8; 8] = [D8::E, D8::NE, D8::N, D8::NW, D8::W, D8::SW, D8::S, D8::SE];

    /// Default tie-break priority: clockwise from east
    pub const DEFAULT_PRIORITY: [D8; 8] =
        [D8::E, D8::SE, D8::S, D8::SW, D8::W, D8::NW, D8::N, D8::NE];

    /// Byte code (1..=8)
    pub fn code(self) -> u8 {
        match self {
            D8::E => 1,
            D8::NE => 2,
            D8::N => 3,
            D8::NW => 4,
            D8::W => 5,
            D8::SW => 6,
            D8::S => 7,
            D8::SE => 8,
        }
    }

    /// Decode a direction; `None` for sink, nodata and unknown codes
    pub fn from_code(code: u8) -> Option<D8> {
        match code {
            1..=8 => Some(D8::ALL[(code - 1) as usize]),
            _ => None,
        }
    }

    /// (row_offset, col_offset)
    pub fn offset(self) -> (isize, isize) {
        match self {
            D8::E => (0, 1),
            D8::NE => (-1, 1),
            D8::N => (-1, 0),
            D8::NW => (-1, -1),
            D8::W => (0, -1),
            D8::SW => (1, -1),
            D8::S => (1, 0),
            D8::SE => (1, 1),
        }
    }

    /// Distance weight in cell units: 1 orthogonal, √2 diagonal
    pub fn distance(self) -> f64 {
        match self {
            D8::E | D8::N | D8::W | D8::S => 1.0,
            _ => std::f64::consts::SQRT_2,
        }
    }

    /// Neighbour coordinate in this direction, if it lies on the grid
    pub fn step(self, row: usize, col: usize, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let (dr, dc) = self.offset();
        let nr = row as isize + dr;
        let nc = col as isize + dc;

        if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
            None
        } else {
            Some((nr as usize, nc as usize))
        }
    }

    /// Check that a priority list names every direction exactly once
    pub fn is_permutation(order: &[D8]) -> bool {
        order.len() == 8 && D8::ALL.iter().all(|d| order.contains(d))
    }
}

impl fmt::Display for D8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            D8::E => "E",
            D8::NE => "NE",
            D8::N => "N",
            D8::NW => "NW",
            D8::W => "W",
            D8::SW => "SW",
            D8::S => "S",
            D8::SE => "SE",
        };
        f.write_str(name)
    }
}

impl FromStr for D8 {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "E" => Ok(D8::E),
            "NE" => Ok(D8::NE),
            "N" => Ok(D8::N),
            "NW" => Ok(D8::NW),
            "W" => Ok(D8::W),
            "SW" => Ok(D8::SW),
            "S" => Ok(D8::S),
            "SE" => Ok(D8::SE),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Iterator over the on-grid neighbours of a cell, in a given direction order.
///
/// Yields `(direction, row, col)`; off-grid neighbours are skipped. Nodata
/// filtering is left to the caller since it depends on the grid values.
pub struct Neighbors<'a> {
    rows: usize,
    cols: usize,
    row: usize,
    col: usize,
    dirs: std::slice::Iter<'a, D8>,
}

impl<'a> Neighbors<'a> {
    pub fn new(row: usize, col: usize, rows: usize, cols: usize, order: &'a [D8]) -> Self {
        Self {
            rows,
            cols,
            row,
            col,
            dirs: order.iter(),
        }
    }

    /// Neighbours in code order (E, NE, N, ...)
    pub fn all(row: usize, col: usize, rows: usize, cols: usize) -> Neighbors<'static> {
        Neighbors::new(row, col, rows, cols, &D8::ALL)
    }
}

impl Iterator for Neighbors<'_> {
    type Item = (D8, usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        for &dir in self.dirs.by_ref() {
            if let Some((r, c)) = dir.step(self.row, self.col, self.rows, self.cols) {
                return Some((dir, r, c));
            }
        }
        None
    }
}
