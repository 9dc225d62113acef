//! GeoTIFF coordinate reference keys
//!
//! The key directory (34735) and its parameter tags (34736 doubles, 34737
//! ASCII) are kept verbatim, so every grid derived from an input DEM is
//! written back with the input's coordinate reference.

/// GeoKey directory plus the parameter values it points into
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoKeys {
    /// `[version, revision, minor, count, (id, location, count, value)*]`
    pub directory: Vec<u16>,
    /// GeoDoubleParamsTag contents
    pub double_params: Vec<f64>,
    /// GeoAsciiParamsTag contents
    pub ascii_params: String,
}

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_PROJECTED: u16 = 1;
const MODEL_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;

impl GeoKeys {
    /// Directory declaring only the model type and PixelIsArea, no CRS
    pub fn unknown_projected() -> Self {
        Self::from_keys(&[
            (GT_MODEL_TYPE, MODEL_PROJECTED),
            (GT_RASTER_TYPE, RASTER_PIXEL_IS_AREA),
        ])
    }

    /// Directory for an EPSG code, projected (`3072`) or geographic (`2048`)
    pub fn from_epsg(epsg: u16, projected: bool) -> Self {
        if projected {
            Self::from_keys(&[
                (GT_MODEL_TYPE, MODEL_PROJECTED),
                (GT_RASTER_TYPE, RASTER_PIXEL_IS_AREA),
                (PROJECTED_CS_TYPE, epsg),
            ])
        } else {
            Self::from_keys(&[
                (GT_MODEL_TYPE, MODEL_GEOGRAPHIC),
                (GT_RASTER_TYPE, RASTER_PIXEL_IS_AREA),
                (GEOGRAPHIC_TYPE, epsg),
            ])
        }
    }

    /// Keys must be given in ascending id order
    fn from_keys(keys: &[(u16, u16)]) -> Self {
        let mut directory = vec![1, 1, 0, keys.len() as u16];
        for &(id, value) in keys {
            directory.extend_from_slice(&[id, 0, 1, value]);
        }
        Self {
            directory,
            ..Default::default()
        }
    }

    /// Value of a key stored inline in the directory
    pub fn key(&self, id: u16) -> Option<u16> {
        let count = *self.directory.get(3)? as usize;
        self.directory
            .get(4..)?
            .chunks_exact(4)
            .take(count)
            .find(|entry| entry[0] == id && entry[1] == 0)
            .map(|entry| entry[3])
    }

    /// EPSG code from ProjectedCSTypeGeoKey, else GeographicTypeGeoKey
    pub fn epsg(&self) -> Option<u16> {
        [PROJECTED_CS_TYPE, GEOGRAPHIC_TYPE]
            .into_iter()
            .filter_map(|id| self.key(id))
            .find(|&code| code != 0 && code != USER_DEFINED)
    }
}
