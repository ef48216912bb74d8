//! Vector data: study areas and reference points

use geo::{Area, BoundingRect, Intersects};
use geo_types::{Coord, Geometry, MultiPolygon, Point};
use serde::{Deserialize, Serialize};

use crate::change::ChangeClass;
use crate::error::{Error, Result};

/// A named polygonal region that every raster and vector operation of a
/// run is restricted to. Immutable once built.
#[derive(Debug, Clone)]
pub struct StudyArea {
    name: String,
    geometry: MultiPolygon<f64>,
    bounds: (f64, f64, f64, f64),
}

impl StudyArea {
    /// Validate and wrap a multipolygon.
    ///
    /// Rejects empty geometries, non-finite coordinates, rings with fewer
    /// than four positions and zero-area shapes.
    pub fn new(name: impl Into<String>, geometry: MultiPolygon<f64>) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: &str| Error::InvalidGeometry {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if geometry.0.is_empty() {
            return Err(invalid("geometry has no polygons"));
        }
        for polygon in &geometry.0 {
            if polygon.exterior().0.len() < 4 {
                return Err(invalid("polygon ring has fewer than 4 positions"));
            }
            let all_finite = polygon
                .exterior()
                .coords()
                .chain(polygon.interiors().iter().flat_map(|r| r.coords()))
                .all(|c: &Coord<f64>| c.x.is_finite() && c.y.is_finite());
            if !all_finite {
                return Err(invalid("geometry contains non-finite coordinates"));
            }
        }
        if geometry.unsigned_area() <= 0.0 {
            return Err(invalid("geometry has zero area"));
        }

        let rect = geometry
            .bounding_rect()
            .ok_or_else(|| invalid("geometry has no bounding box"))?;
        let bounds = (rect.min().x, rect.min().y, rect.max().x, rect.max().y);

        Ok(Self {
            name,
            geometry,
            bounds,
        })
    }

    /// Accept a Polygon or MultiPolygon geometry.
    pub fn from_geometry(name: impl Into<String>, geometry: Geometry<f64>) -> Result<Self> {
        let name = name.into();
        match geometry {
            Geometry::Polygon(p) => Self::new(name, MultiPolygon(vec![p])),
            Geometry::MultiPolygon(mp) => Self::new(name, mp),
            other => Err(Error::InvalidGeometry {
                name,
                reason: format!("expected Polygon or MultiPolygon, got {}", geometry_kind(&other)),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    /// Bounding box (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.bounds
    }

    /// Whether the point lies inside or on the boundary of the area
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let (min_x, min_y, max_x, max_y) = self.bounds;
        if x < min_x || x > max_x || y < min_y || y > max_y {
            return false;
        }
        self.geometry.intersects(&Point::new(x, y))
    }
}

fn geometry_kind(g: &Geometry<f64>) -> &'static str {
    match g {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Where a reference point came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Drawn by the stratified sampler, waiting for manual labelling
    Sampled,
    /// Imported, independently labelled ground truth
    GroundTruth,
}

/// A labelled (or to-be-labelled) validation location.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePoint {
    /// Dense export identifier (sampled points only)
    pub id: Option<u64>,
    pub x: f64,
    pub y: f64,
    /// Raw categorical label as found in the source, if any
    pub label: Option<String>,
    /// Classifier value at draw time (sampled points only)
    pub sampled_class: Option<ChangeClass>,
    pub provenance: Provenance,
}

impl ReferencePoint {
    /// An externally labelled ground-truth point
    pub fn ground_truth(x: f64, y: f64, label: Option<String>) -> Self {
        Self {
            id: None,
            x,
            y,
            label,
            sampled_class: None,
            provenance: Provenance::GroundTruth,
        }
    }

    /// A sampler-drawn point with its class pre-filled and no label yet
    pub fn sampled(id: u64, x: f64, y: f64, class: ChangeClass) -> Self {
        Self {
            id: Some(id),
            x,
            y,
            label: None,
            sampled_class: Some(class),
            provenance: Provenance::Sampled,
        }
    }

    /// The label mapped onto the classifier's encoding.
    ///
    /// `None` when the point is unlabelled or the label is outside the
    /// fixed vocabulary; unknown labels never become a fourth class.
    pub fn reference_class(&self) -> Option<ChangeClass> {
        self.label.as_deref().and_then(ChangeClass::from_label)
    }
}

/// An immutable collection of reference points.
///
/// Filtering returns a new set; an imported set is never changed in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSet {
    points: Vec<ReferencePoint>,
}

impl ReferenceSet {
    pub fn new(points: Vec<ReferencePoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[ReferencePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points lying inside (or on the edge of) the study area
    pub fn within(&self, area: &StudyArea) -> ReferenceSet {
        Self::new(
            self.points
                .iter()
                .filter(|p| area.contains(p.x, p.y))
                .cloned()
                .collect(),
        )
    }
}

impl From<Vec<ReferencePoint>> for ReferenceSet {
    fn from(points: Vec<ReferencePoint>) -> Self {
        Self::new(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{line_string, polygon, Polygon};

    fn unit_square() -> Polygon<f64> {
        polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]
    }

    #[test]
    fn study_area_contains() {
        let area = StudyArea::from_geometry("sq", Geometry::Polygon(unit_square())).unwrap();
        assert!(area.contains(0.5, 0.5));
        assert!(area.contains(1.0, 0.5));
        assert!(!area.contains(1.5, 0.5));
        assert_eq!(area.bounds(), (0.0, 0.0, 1.0, 1.0));
        assert_eq!(area.name(), "sq");
    }

    #[test]
    fn empty_geometry_rejected() {
        let err = StudyArea::new("empty", MultiPolygon(vec![])).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry { .. }));
    }

    #[test]
    fn degenerate_geometry_rejected() {
        let flat = Polygon::new(
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 0.0, y: 0.0)],
            vec![],
        );
        assert!(StudyArea::new("flat", MultiPolygon(vec![flat])).is_err());

        let nan = polygon![
            (x: 0.0, y: 0.0),
            (x: f64::NAN, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        assert!(StudyArea::new("nan", MultiPolygon(vec![nan])).is_err());
    }

    #[test]
    fn point_geometry_rejected() {
        let err = StudyArea::from_geometry("pt", Geometry::Point(Point::new(0.0, 0.0))).unwrap_err();
        assert!(err.to_string().contains("Point"));
    }

    #[test]
    fn reference_class_from_label() {
        let p = ReferencePoint::ground_truth(0.0, 0.0, Some("no change".into()));
        assert_eq!(p.reference_class(), Some(ChangeClass::NoChange));

        let unknown = ReferencePoint::ground_truth(0.0, 0.0, Some("burned".into()));
        assert_eq!(unknown.reference_class(), None);

        let sampled = ReferencePoint::sampled(3, 0.0, 0.0, ChangeClass::Increase);
        assert_eq!(sampled.reference_class(), None);
        assert_eq!(sampled.provenance, Provenance::Sampled);
    }

    #[test]
    fn reference_set_within_area() {
        let area = StudyArea::from_geometry("sq", Geometry::Polygon(unit_square())).unwrap();
        let set = ReferenceSet::from(vec![
            ReferencePoint::ground_truth(0.2, 0.2, Some("increase".into())),
            ReferencePoint::ground_truth(3.0, 0.2, Some("decrease".into())),
        ]);

        let inside = set.within(&area);
        assert_eq!(inside.len(), 1);
        assert_eq!(inside.points()[0].x, 0.2);
        assert_eq!(set.len(), 2);
    }
}
