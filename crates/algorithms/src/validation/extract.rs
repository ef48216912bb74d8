//! Point extraction from a classified raster

use vegchange_core::{ChangeClass, ClassifiedRaster, ReferencePoint};

/// Classifier value under each point at the raster's native resolution.
///
/// `None` where the point is off the grid or on a masked cell.
pub fn extract_at_points(
    classified: &ClassifiedRaster,
    points: &[ReferencePoint],
) -> Vec<Option<ChangeClass>> {
    points
        .iter()
        .map(|p| classified.class_at_point(p.x, p.y))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vegchange_core::raster::Raster;
    use vegchange_core::GeoTransform;

    #[test]
    fn test_extract_hits_and_misses() {
        let mut r = Raster::from_vec(vec![0u8, 2, ClassifiedRaster::NODATA, 1], 2, 2).unwrap();
        r.set_transform(GeoTransform::new(10.0, 20.0, 0.5, -0.5));
        let classified = ClassifiedRaster::new(r, 30.0);

        let points = vec![
            ReferencePoint::ground_truth(10.2, 19.8, None),
            ReferencePoint::ground_truth(10.7, 19.9, None),
            ReferencePoint::ground_truth(10.1, 19.4, None),
            ReferencePoint::ground_truth(50.0, 50.0, None),
        ];
        let values = extract_at_points(&classified, &points);
        assert_eq!(
            values,
            vec![Some(ChangeClass::Decrease), Some(ChangeClass::Increase), None, None]
        );
    }
}
