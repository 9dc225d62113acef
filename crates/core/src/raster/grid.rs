//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{GeoKeys, GeoTransform, RasterElement};
use ndarray::Array2;

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in a row-major grid together with
/// its geotransform (which carries the cell size), an optional nodata
/// sentinel and the GeoTIFF keys naming its coordinate reference.
///
/// # Example
///
/// ```ignore
/// use twi_core::Raster;
///
/// let mut dem: Raster<f64> = Raster::filled(100, 100, 250.0);
/// dem.set(10, 20, 242.5)?;
/// let value = dem.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// No-data value
    nodata: Option<T>,
    /// Coordinate reference keys read from the source file
    geokeys: Option<GeoKeys>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidGrid(format!(
                "{} values cannot fill a {}x{} grid",
                data.len(),
                rows,
                cols
            )));
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            nodata: None,
            geokeys: None,
        }
    }

    /// Create a raster of a different element type with the same transform
    /// and coordinate reference, holding `data` and declaring `nodata`.
    ///
    /// Stages use this to hand back a freshly owned output grid.
    pub fn derive<U: RasterElement>(&self, data: Array2<U>, nodata: Option<U>) -> Result<Raster<U>> {
        if data.dim() != self.shape() {
            let (er, ec) = self.shape();
            let (ar, ac) = data.dim();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }

        Ok(Raster {
            data,
            transform: self.transform,
            nodata,
            geokeys: self.geokeys.clone(),
        })
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Get the coordinate reference keys
    pub fn geokeys(&self) -> Option<&GeoKeys> {
        self.geokeys.as_ref()
    }

    /// Set the coordinate reference keys
    pub fn set_geokeys(&mut self, geokeys: Option<GeoKeys>) {
        self.geokeys = geokeys;
    }

    /// Cell size (assumes square cells; see [`Raster::validate`])
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Check if cell at (row, col) contains no-data
    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        let value = self.get(row, col)?;
        Ok(self.is_nodata(value))
    }

    /// Number of cells that are not nodata
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    /// Check the invariants every terrain stage relies on.
    ///
    /// - at least one row and one column
    /// - positive, finite, square cells
    /// - at least one valid cell
    /// - no non-finite values outside the nodata mask
    pub fn validate(&self) -> Result<()> {
        let (rows, cols) = self.shape();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidGrid(format!(
                "dimensions must be at least 1x1, got {}x{}",
                rows, cols
            )));
        }

        self.transform.uniform_cell_size()?;

        let mut valid = 0usize;
        for ((row, col), &value) in self.data.indexed_iter() {
            if self.is_nodata(value) {
                continue;
            }
            if !value.is_finite_value() {
                return Err(Error::NumericAnomaly {
                    row,
                    col,
                    value: value.to_f64().unwrap_or(f64::NAN),
                });
            }
            valid += 1;
        }

        if valid == 0 {
            return Err(Error::AllNodata);
        }

        Ok(())
    }

    // Statistics

    /// Descriptive statistics over valid cells (nodata ignored).
    ///
    /// `std_dev` is the population standard deviation.
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut count: usize = 0;
        let mut mean = 0.0_f64;
        let mut m2 = 0.0_f64;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }
            let Some(v) = value.to_f64() else { continue };
            if !v.is_finite() {
                continue;
            }

            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }

            // Welford's running update
            count += 1;
            let delta = v - mean;
            mean += delta / count as f64;
            m2 += delta * (v - mean);
        }

        let (mean, std_dev) = if count > 0 {
            (Some(mean), Some((m2 / count as f64).sqrt()))
        } else {
            (None, None)
        };

        RasterStatistics {
            min,
            max,
            mean,
            std_dev,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
