//! Stratified random sampling of a classified raster
//!
//! Candidate cells are grouped by class and up to `points_per_class`
//! cells are drawn from each group without replacement. The drawn points
//! are then shuffled by a second seeded key and numbered `0..N`, so export
//! order carries no spatial or class pattern.

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;
use vegchange_core::{ChangeClass, ClassifiedRaster, Error, ReferencePoint, Result, StudyArea};

/// Mixed into the seed for the ordering keys so they are independent of
/// the draw sequence.
const ORDER_KEY_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Parameters for [`stratified_sample`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StratifiedParams {
    /// Upper bound on points drawn per class
    pub points_per_class: usize,
    /// Sampling resolution in metres; coarser than the raster thins the
    /// candidate grid
    pub scale_m: f64,
    pub seed: u64,
}

impl Default for StratifiedParams {
    fn default() -> Self {
        Self {
            points_per_class: 100,
            scale_m: 30.0,
            seed: 0,
        }
    }
}

/// Candidate cell of one class
#[derive(Debug, Clone, Copy)]
struct Candidate {
    row: usize,
    col: usize,
}

/// Every `stride`-th row and column whose center is inside the area,
/// bucketed by class in row-major order.
fn candidates_by_class(
    classified: &ClassifiedRaster,
    area: &StudyArea,
    stride: usize,
) -> [Vec<Candidate>; ChangeClass::COUNT] {
    let raster = classified.raster();
    let (rows, cols) = raster.shape();
    let gt = *raster.transform();

    let found: Vec<(ChangeClass, Candidate)> = (0..rows)
        .step_by(stride)
        .collect::<Vec<_>>()
        .into_par_iter()
        .flat_map(|row| {
            let mut row_found = Vec::new();
            for col in (0..cols).step_by(stride) {
                let Some(class) = classified.class_at(row, col) else {
                    continue;
                };
                let (x, y) = gt.pixel_to_geo(col, row);
                if area.contains(x, y) {
                    row_found.push((class, Candidate { row, col }));
                }
            }
            row_found
        })
        .collect();

    let mut buckets: [Vec<Candidate>; ChangeClass::COUNT] = Default::default();
    for (class, cand) in found {
        buckets[class.index()].push(cand);
    }
    buckets
}

/// Draw a class-balanced set of reference points.
///
/// Identical raster, area and parameters give identical points and ids.
/// A class with fewer candidates than `points_per_class` contributes all
/// of them; a class with none contributes nothing.
pub fn stratified_sample(
    classified: &ClassifiedRaster,
    area: &StudyArea,
    params: StratifiedParams,
) -> Result<Vec<ReferencePoint>> {
    if !(params.scale_m.is_finite() && params.scale_m > 0.0) {
        return Err(Error::InvalidParameter {
            name: "scale",
            value: params.scale_m.to_string(),
            reason: "must be a positive number of metres".into(),
        });
    }

    let native = classified.scale_m();
    let stride = if native > 0.0 {
        ((params.scale_m / native).round() as usize).max(1)
    } else {
        1
    };

    let buckets = candidates_by_class(classified, area, stride);
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

    let mut drawn: Vec<(ChangeClass, Candidate)> = Vec::new();
    for class in ChangeClass::ALL {
        let bucket = &buckets[class.index()];
        let amount = params.points_per_class.min(bucket.len());
        if amount == 0 {
            continue;
        }
        for i in index::sample(&mut rng, bucket.len(), amount) {
            drawn.push((class, bucket[i]));
        }
    }

    let mut key_rng = ChaCha8Rng::seed_from_u64(params.seed ^ ORDER_KEY_SALT);
    let mut keyed: Vec<(u64, ChangeClass, Candidate)> = drawn
        .into_iter()
        .map(|(class, cand)| (key_rng.random::<u64>(), class, cand))
        .collect();
    // Stable sort, so equal keys keep draw order
    keyed.sort_by_key(|(key, _, _)| *key);

    let gt = *classified.raster().transform();
    Ok(keyed
        .into_iter()
        .enumerate()
        .map(|(id, (_, class, cand))| {
            let (x, y) = gt.pixel_to_geo(cand.col, cand.row);
            ReferencePoint::sampled(id as u64, x, y, class)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{polygon, MultiPolygon};
    use std::collections::HashSet;
    use vegchange_core::raster::Raster;
    use vegchange_core::GeoTransform;

    /// 20x20 grid over [0, 20] x [0, 20]: left third decrease, middle
    /// no change, right third increase, with a few increase cells only.
    fn make_classified() -> ClassifiedRaster {
        let mut data = Vec::with_capacity(400);
        for row in 0..20 {
            for col in 0..20 {
                let class = if col < 9 {
                    0u8
                } else if col < 19 {
                    1
                } else if row < 5 {
                    2
                } else {
                    ClassifiedRaster::NODATA
                };
                data.push(class);
            }
        }
        let mut r = Raster::from_vec(data, 20, 20).unwrap();
        r.set_transform(GeoTransform::new(0.0, 20.0, 1.0, -1.0));
        ClassifiedRaster::new(r, 10.0)
    }

    fn area() -> StudyArea {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 20.0, y: 0.0),
            (x: 20.0, y: 20.0),
            (x: 0.0, y: 20.0),
            (x: 0.0, y: 0.0),
        ];
        StudyArea::new("grid", MultiPolygon(vec![poly])).unwrap()
    }

    fn params(n: usize, seed: u64) -> StratifiedParams {
        StratifiedParams {
            points_per_class: n,
            scale_m: 10.0,
            seed,
        }
    }

    #[test]
    fn test_per_class_quota_and_shortfall() {
        let points = stratified_sample(&make_classified(), &area(), params(10, 42)).unwrap();

        let count = |c: ChangeClass| points.iter().filter(|p| p.sampled_class == Some(c)).count();
        assert_eq!(count(ChangeClass::Decrease), 10);
        assert_eq!(count(ChangeClass::NoChange), 10);
        // only 5 increase cells exist
        assert_eq!(count(ChangeClass::Increase), 5);
    }

    #[test]
    fn test_dense_ids_and_class_matches_raster() {
        let classified = make_classified();
        let points = stratified_sample(&classified, &area(), params(10, 7)).unwrap();

        let ids: Vec<u64> = points.iter().map(|p| p.id.unwrap()).collect();
        assert_eq!(ids, (0..points.len() as u64).collect::<Vec<_>>());

        for p in &points {
            assert_eq!(classified.class_at_point(p.x, p.y), p.sampled_class);
            assert!(p.label.is_none());
        }

        let unique: HashSet<(u64, u64)> = points.iter().map(|p| (p.x.to_bits(), p.y.to_bits())).collect();
        assert_eq!(unique.len(), points.len());
    }

    #[test]
    fn test_deterministic_for_seed() {
        let classified = make_classified();
        let a = stratified_sample(&classified, &area(), params(8, 1234)).unwrap();
        let b = stratified_sample(&classified, &area(), params(8, 1234)).unwrap();
        assert_eq!(a, b);

        let c = stratified_sample(&classified, &area(), params(8, 4321)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_export_order_is_not_grouped_by_class() {
        let points = stratified_sample(&make_classified(), &area(), params(10, 3)).unwrap();
        let classes: Vec<ChangeClass> = points.iter().filter_map(|p| p.sampled_class).collect();
        let mut grouped = classes.clone();
        grouped.sort();
        assert_ne!(classes, grouped);
    }

    #[test]
    fn test_coarser_scale_thins_candidates() {
        let coarse = StratifiedParams {
            points_per_class: 1000,
            scale_m: 50.0,
            seed: 0,
        };
        let points = stratified_sample(&make_classified(), &area(), coarse).unwrap();
        // stride 5 leaves a 4x4 lattice of candidate cells
        assert_eq!(points.len(), 16);
    }

    #[test]
    fn test_area_restriction() {
        let west = polygon![
            (x: 0.0, y: 0.0),
            (x: 5.0, y: 0.0),
            (x: 5.0, y: 20.0),
            (x: 0.0, y: 20.0),
            (x: 0.0, y: 0.0),
        ];
        let area = StudyArea::new("west", MultiPolygon(vec![west])).unwrap();
        let points = stratified_sample(&make_classified(), &area, params(50, 9)).unwrap();

        assert!(!points.is_empty());
        assert!(points.iter().all(|p| p.x <= 5.0));
        assert!(points.iter().all(|p| p.sampled_class == Some(ChangeClass::Decrease)));
    }

    #[test]
    fn test_empty_raster_gives_no_points() {
        let mut r = Raster::masked(4, 4);
        r.set_transform(GeoTransform::new(0.0, 20.0, 5.0, -5.0));
        let empty = ClassifiedRaster::new(r, 10.0);
        assert!(stratified_sample(&empty, &area(), params(10, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_bad_scale() {
        let bad = StratifiedParams {
            scale_m: 0.0,
            ..Default::default()
        };
        assert!(stratified_sample(&make_classified(), &area(), bad).is_err());
    }
}
