//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate. Handled georeferencing: pixel scale + tiepoint
//! or the model transformation matrix (the geotransform), the GeoKey
//! directory with its parameter tags (the coordinate reference), and the
//! `GDAL_NODATA` tag. Output is always single-band 64-bit float, so fill
//! increments and large accumulation counts survive a write/read.

use crate::error::{Error, Result};
use crate::raster::{GeoKeys, GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray64Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_samples<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

/// Internal: decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_samples(buf),
        DecodingResult::F64(buf) => cast_samples(buf),
        DecodingResult::U8(buf) => cast_samples(buf),
        DecodingResult::U16(buf) => cast_samples(buf),
        DecodingResult::U32(buf) => cast_samples(buf),
        DecodingResult::I8(buf) => cast_samples(buf),
        DecodingResult::I16(buf) => cast_samples(buf),
        DecodingResult::I32(buf) => cast_samples(buf),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    if data.len() != rows * cols {
        return Err(Error::UnsupportedDataType(format!(
            "expected {} single-band samples, got {}",
            rows * cols,
            data.len()
        )));
    }

    let transform = read_geotransform(&mut decoder).ok_or_else(|| {
        Error::InvalidGrid(
            "no ModelPixelScale/ModelTiepoint or ModelTransformation tags, cell size unknown"
                .to_string(),
        )
    })?;

    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_transform(transform);
    raster.set_nodata(read_nodata(&mut decoder));
    raster.set_geokeys(read_geokeys(&mut decoder));

    Ok(raster)
}

/// GeoTransform from ModelPixelScaleTag + ModelTiepointTag, or else from
/// ModelTransformationTag. `None` when the file carries neither.
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE)).ok();
    let tiepoint = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT)).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // Row-major 4x4: x = t[3] + col * t[0] + row * t[1], y = t[7] + col * t[4] + row * t[5]
    let t = decoder.get_tag_f64_vec(tag(MODEL_TRANSFORMATION)).ok()?;
    if t.len() < 16 {
        return None;
    }
    Some(GeoTransform {
        origin_x: t[3],
        origin_y: t[7],
        pixel_width: t[0],
        pixel_height: t[5],
        row_rotation: t[1],
        col_rotation: t[4],
    })
}

/// GeoKey directory and its parameter tags, if the directory is present
fn read_geokeys<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<GeoKeys> {
    let directory: Vec<u16> = decoder
        .get_tag_u32_vec(tag(GEO_KEY_DIRECTORY))
        .ok()?
        .into_iter()
        .map(|v| v as u16)
        .collect();
    let double_params = decoder
        .get_tag_f64_vec(tag(GEO_DOUBLE_PARAMS))
        .unwrap_or_default();
    let ascii_params = decoder
        .get_tag_ascii_string(tag(GEO_ASCII_PARAMS))
        .map(|s| s.trim_end_matches(char::from(0)).to_string())
        .unwrap_or_default();

    Some(GeoKeys {
        directory,
        double_params,
        ascii_params,
    })
}

/// Nodata sentinel from the GDAL_NODATA ASCII tag
fn read_nodata<T, R>(decoder: &mut Decoder<R>) -> Option<T>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let text = decoder.get_tag_ascii_string(tag(GDAL_NODATA)).ok()?;
    let value: f64 = text.trim_matches(char::from(0)).trim().parse().ok()?;
    num_traits::cast(value)
}

/// Write a Raster to a GeoTIFF file
///
/// Writes as 64-bit float with the raster's transform, coordinate reference
/// keys and nodata value.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_geotiff(raster, BufWriter::new(file))
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

/// Internal: encode a Raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f64> = raster
        .data()
        .iter()
        .map(|&v| v.to_f64().unwrap_or(f64::NAN))
        .collect();

    let mut image = encoder
        .new_image::<Gray64Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(tag(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(tag(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = raster
        .geokeys()
        .cloned()
        .unwrap_or_else(GeoKeys::unknown_projected);
    image
        .encoder()
        .write_tag(tag(GEO_KEY_DIRECTORY), &geokeys.directory[..])
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;
    if !geokeys.double_params.is_empty() {
        image
            .encoder()
            .write_tag(tag(GEO_DOUBLE_PARAMS), &geokeys.double_params[..])
            .map_err(|e| Error::Other(format!("Cannot write geokey doubles: {}", e)))?;
    }
    if !geokeys.ascii_params.is_empty() {
        image
            .encoder()
            .write_tag(tag(GEO_ASCII_PARAMS), geokeys.ascii_params.as_str())
            .map_err(|e| Error::Other(format!("Cannot write geokey ascii: {}", e)))?;
    }

    if let Some(nd) = raster.nodata().and_then(|v| v.to_f64()) {
        let text = if nd.is_nan() { "nan".to_string() } else { nd.to_string() };
        image
            .encoder()
            .write_tag(tag(GDAL_NODATA), text.as_str())
            .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
    }

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}
