//! GeoTIFF reading/writing with the `tiff` crate
//!
//! Handles the subset of GeoTIFF this workspace exchanges: single-band
//! north-up rasters georeferenced with ModelPixelScale + ModelTiepoint,
//! an EPSG code in the GeoKey directory and a GDAL no-data tag.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// EPSG code to record in the GeoKey directory
    pub epsg: Option<u32>,
}

/// A decoded raster plus the CRS found in its GeoKeys
#[derive(Debug, Clone)]
pub struct DecodedGeoTiff<T: RasterElement> {
    pub raster: Raster<T>,
    pub epsg: Option<u32>,
}

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    Ok(decode_geotiff(file)?.raster)
}

/// Read a GeoTIFF from an in-memory buffer, keeping its EPSG code
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<DecodedGeoTiff<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

/// Internal: decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<DecodedGeoTiff<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder = Decoder::new(reader)
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let (rows, cols) = (height as usize, width as usize);

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let mut data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    if data.len() != rows * cols {
        // Multi-sample (chunky) images decode to rows * cols * samples values
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let nodata: Option<T> = decoder
        .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok())
        .and_then(num_traits::cast);

    // Float rasters carry no-data as NaN from here on
    let nodata = match nodata {
        Some(nd) if T::is_float() => {
            for v in data.iter_mut() {
                if v.is_nodata(Some(nd)) {
                    *v = T::default_nodata();
                }
            }
            Some(T::default_nodata())
        }
        other => other,
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_nodata(nodata);

    if let Ok(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    let epsg = read_epsg(&mut decoder);

    Ok(DecodedGeoTiff { raster, epsg })
}

/// Attempt to read GeoTransform from ModelPixelScale + ModelTiepoint
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT))
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// EPSG code from the GeoKey directory (projected CRS first, then geographic)
fn read_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY)).ok()?;
    let entries = keys.get(4..)?;

    let find = |wanted: u16| {
        entries
            .chunks_exact(4)
            // location 0 means the value is stored inline
            .find(|e| e[0] == wanted && e[1] == 0)
            .map(|e| e[3] as u32)
    };

    find(PROJECTED_CS_TYPE_KEY)
        .or_else(|| find(GEOGRAPHIC_TYPE_KEY))
        .filter(|&code| code != 0 && code != 32767)
}

/// Write a Raster to a GeoTIFF file as 32-bit float with NaN no-data
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = BufWriter::new(File::create(path.as_ref())?);
    encode_geotiff(raster, file, options)
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: &GeoTiffOptions) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options)?;
    Ok(buf)
}

fn geo_keys(epsg: Option<u32>) -> Vec<u16> {
    match epsg {
        Some(4326) => vec![
            1, 1, 0, 3,
            GT_MODEL_TYPE_KEY, 0, 1, 2, // ModelTypeGeographic
            GT_RASTER_TYPE_KEY, 0, 1, 1, // RasterPixelIsArea
            GEOGRAPHIC_TYPE_KEY, 0, 1, 4326,
        ],
        Some(code) if code <= u16::MAX as u32 => vec![
            1, 1, 0, 3,
            GT_MODEL_TYPE_KEY, 0, 1, 1, // ModelTypeProjected
            GT_RASTER_TYPE_KEY, 0, 1, 1,
            PROJECTED_CS_TYPE_KEY, 0, 1, code as u16,
        ],
        _ => vec![
            1, 1, 0, 2,
            GT_MODEL_TYPE_KEY, 0, 1, 1,
            GT_RASTER_TYPE_KEY, 0, 1, 1,
        ],
    }
}

/// Internal: encode a Raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata(v) {
                f32::NAN
            } else {
                num_traits::cast(v).unwrap_or(f32::NAN)
            }
        })
        .collect();

    let mut image = encoder
        .new_image::<Gray32Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let gt = raster.transform();
    let tag_err = |what: &str, e: tiff::TiffError| Error::Other(format!("Cannot write {what} tag: {e}"));

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| tag_err("scale", e))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| tag_err("tiepoint", e))?;

    let keys = geo_keys(options.epsg);
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), keys.as_slice())
        .map_err(|e| tag_err("geokey", e))?;

    image
        .encoder()
        .write_tag(Tag::Unknown(GDAL_NODATA), "nan")
        .map_err(|e| tag_err("nodata", e))?;

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}
