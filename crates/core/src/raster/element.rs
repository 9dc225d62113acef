//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Elevation, slope, accumulation and TWI grids are `f64`; flow directions
/// are `u8`. Integer GeoTIFF samples of other widths are cast into the
/// requested element type on read.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether the value is a finite number (always true for integers)
    fn is_finite_value(&self) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MAX
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata == Some(*self)
            }

            fn is_finite_value(&self) -> bool {
                true
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            // NaN marks nodata only when no finite sentinel is declared;
            // otherwise a NaN cell is a numeric anomaly, not a hole.
            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) if nd.is_nan() => self.is_nan(),
                    Some(nd) => (self - nd).abs() <= <$t>::EPSILON * nd.abs().max(1.0),
                    None => self.is_nan(),
                }
            }

            fn is_finite_value(&self) -> bool {
                self.is_finite()
            }
        }
    };
}

impl_raster_element_int!(u8);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);
