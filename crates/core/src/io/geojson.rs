//! GeoJSON input for study areas and ground-truth points

use geo_types::Geometry;
use geojson::{Feature, GeoJson};
use serde_json::Value;
use std::path::Path;

use crate::error::{Error, Result};
use crate::vector::{ReferencePoint, ReferenceSet, StudyArea};

/// Property holding a study area's name
pub const NAME_PROPERTY: &str = "name";

fn features(geojson: GeoJson) -> Vec<Feature> {
    match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![Feature {
            geometry: Some(g),
            ..Default::default()
        }],
    }
}

fn parse(text: &str) -> Result<Vec<Feature>> {
    let geojson: GeoJson = text.parse()?;
    Ok(features(geojson))
}

fn to_geo(feature: &Feature, what: &str) -> Result<Option<Geometry<f64>>> {
    match &feature.geometry {
        Some(g) => Geometry::<f64>::try_from(g.clone())
            .map(Some)
            .map_err(|e| Error::GeoJson(format!("{what}: {e}"))),
        None => Ok(None),
    }
}

/// Study areas from a FeatureCollection of named (Multi)Polygons.
///
/// Every feature must carry a unique string `name` property and a
/// polygonal geometry; each area is validated with
/// [`StudyArea::from_geometry`].
pub fn parse_study_areas(text: &str) -> Result<Vec<StudyArea>> {
    let features = parse(text)?;
    let mut areas: Vec<StudyArea> = Vec::with_capacity(features.len());

    for (i, feature) in features.iter().enumerate() {
        let name = match feature.property(NAME_PROPERTY) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return Err(Error::GeoJson(format!(
                    "feature {i} has no '{NAME_PROPERTY}' property"
                )))
            }
        };
        if areas.iter().any(|a| a.name() == name) {
            return Err(Error::InvalidGeometry {
                name,
                reason: format!("duplicate area name (feature {i})"),
            });
        }
        let geometry = to_geo(feature, &name)?.ok_or_else(|| Error::InvalidGeometry {
            name: name.clone(),
            reason: "feature has no geometry".into(),
        })?;
        areas.push(StudyArea::from_geometry(name, geometry)?);
    }

    Ok(areas)
}

pub fn load_study_areas<P: AsRef<Path>>(path: P) -> Result<Vec<StudyArea>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_study_areas(&text)
}

fn label_of(feature: &Feature, label_field: &str) -> Option<String> {
    match feature.property(label_field)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Labelled ground-truth points.
///
/// Point and MultiPoint features are accepted; other geometries and
/// features without geometry are skipped. The label is read verbatim from
/// `label_field` (non-string values are stringified) and mapped to a class
/// only at validation time.
pub fn parse_ground_truth(text: &str, label_field: &str) -> Result<ReferenceSet> {
    let mut points = Vec::new();

    for (i, feature) in parse(text)?.iter().enumerate() {
        let label = label_of(feature, label_field);
        match to_geo(feature, &format!("feature {i}"))? {
            Some(Geometry::Point(p)) => {
                points.push(ReferencePoint::ground_truth(p.x(), p.y(), label));
            }
            Some(Geometry::MultiPoint(mp)) => {
                for p in mp.0 {
                    points.push(ReferencePoint::ground_truth(p.x(), p.y(), label.clone()));
                }
            }
            _ => {}
        }
    }

    Ok(ReferenceSet::new(points))
}

pub fn load_ground_truth<P: AsRef<Path>>(path: P, label_field: &str) -> Result<ReferenceSet> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_ground_truth(&text, label_field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeClass;

    const AREAS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "Marsabit"},
             "geometry": {"type": "Polygon", "coordinates": [[[37.9,2.3],[38.0,2.3],[38.0,2.4],[37.9,2.4],[37.9,2.3]]]}},
            {"type": "Feature", "properties": {"name": "Isiolo"},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[37.5,0.3],[37.6,0.3],[37.6,0.4],[37.5,0.3]]]]}}
        ]
    }"#;

    #[test]
    fn areas_are_named_and_validated() {
        let areas = parse_study_areas(AREAS).unwrap();
        assert_eq!(areas.len(), 2);
        assert_eq!(areas[0].name(), "Marsabit");
        assert_eq!(areas[1].name(), "Isiolo");
        assert!(areas[0].contains(37.95, 2.35));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let text = AREAS.replace("Isiolo", "Marsabit");
        let err = parse_study_areas(&text).unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry { ref name, .. } if name == "Marsabit"));
    }

    #[test]
    fn unnamed_area_is_rejected() {
        let text = r#"{"type": "Feature", "properties": {},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}"#;
        let err = parse_study_areas(text).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn point_area_is_rejected() {
        let text = r#"{"type": "Feature", "properties": {"name": "pt"},
            "geometry": {"type": "Point", "coordinates": [0, 0]}}"#;
        assert!(matches!(
            parse_study_areas(text).unwrap_err(),
            Error::InvalidGeometry { .. }
        ));
    }

    #[test]
    fn ground_truth_reads_label_field() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"change": "increase"},
                 "geometry": {"type": "Point", "coordinates": [37.95, 2.35]}},
                {"type": "Feature", "properties": {"change": "burned"},
                 "geometry": {"type": "Point", "coordinates": [37.96, 2.36]}},
                {"type": "Feature", "properties": {"other": "decrease"},
                 "geometry": {"type": "Point", "coordinates": [37.97, 2.37]}},
                {"type": "Feature", "properties": {"change": "decrease"},
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}
            ]
        }"#;

        let set = parse_ground_truth(text, "change").unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.points()[0].reference_class(), Some(ChangeClass::Increase));
        assert_eq!(set.points()[1].label.as_deref(), Some("burned"));
        assert_eq!(set.points()[1].reference_class(), None);
        assert_eq!(set.points()[2].label, None);
    }

    #[test]
    fn malformed_geojson_is_an_error() {
        assert!(matches!(
            parse_ground_truth("{not json", "change").unwrap_err(),
            Error::GeoJson(_)
        ));
    }
}
