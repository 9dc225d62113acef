//! Affine geotransformation for rasters

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing rasters.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// North-up grids have zero rotation and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// North-up transform with square cells of `cell_size`, origin at (0, 0)
    pub fn with_cell_size(cell_size: f64) -> Self {
        Self::new(0.0, 0.0, cell_size, -cell_size)
    }

    /// Geographic coordinates of the top-left corner of a pixel
    pub fn pixel_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        let col_f = col as f64;
        let row_f = row as f64;

        let x = self.origin_x + col_f * self.pixel_width + row_f * self.row_rotation;
        let y = self.origin_y + col_f * self.col_rotation + row_f * self.pixel_height;

        (x, y)
    }

    /// Cell size as reported by the pixel width (no validation)
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Cell size, checked to be positive, finite and equal in both axes.
    ///
    /// Terrain derivatives treat the cell size as a single scalar, so
    /// rectangular or rotated cells are rejected.
    pub fn uniform_cell_size(&self) -> Result<f64> {
        let w = self.pixel_width.abs();
        let h = self.pixel_height.abs();

        if !w.is_finite() || !h.is_finite() || w <= 0.0 || h <= 0.0 {
            return Err(Error::InvalidGrid(format!(
                "cell size must be positive and finite, got {} x {}",
                self.pixel_width, self.pixel_height
            )));
        }
        if (w - h).abs() > 1e-9 * w.max(h) {
            return Err(Error::InvalidGrid(format!(
                "cells are not square: {} x {}",
                w, h
            )));
        }
        if self.row_rotation != 0.0 || self.col_rotation != 0.0 {
            return Err(Error::InvalidGrid("rotated grids are not supported".into()));
        }

        Ok(w)
    }

    /// Bounding box (min_x, min_y, max_x, max_y) for a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_geo_corner(0, 0),
            self.pixel_to_geo_corner(width, 0),
            self.pixel_to_geo_corner(0, height),
            self.pixel_to_geo_corner(width, height),
        ];

        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
