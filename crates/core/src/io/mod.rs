//! I/O for rasters (GeoTIFF), vectors (GeoJSON) and point tables (CSV)

mod csv;
mod geojson;
mod native;

pub use self::csv::{write_points, write_points_csv};
pub use self::geojson::{
    load_ground_truth, load_study_areas, parse_ground_truth, parse_study_areas, NAME_PROPERTY,
};
pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer,
    DecodedGeoTiff, GeoTiffOptions,
};
