//! Attribute collection: the containment join.
//!
//! For each requested attribute key, every polygon gains a list-valued
//! property holding that attribute's value for every point contained in
//! the polygon, in point order. The lists for different keys are
//! positionally aligned: index `i` in every list refers to the same
//! contained point. A point missing a key contributes JSON `null` at its
//! position rather than failing the run.
//!
//! `collect` is a pure transformation: the input layers are never
//! mutated, and the output preserves polygon count, order, geometries,
//! and pre-existing properties. Chaining runs is the caller's business.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::geometry::{self, GeometryError, Polygonal};
use crate::models::FeatureCollection;

/// Invalid input to the containment join.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("polygon layer has no features")]
    EmptyPolygons,

    #[error("no attribute keys requested")]
    EmptyAttributes,

    #[error("polygon feature {index}: {source}")]
    BadPolygon {
        index: usize,
        source: GeometryError,
    },

    #[error("point feature {index}: {source}")]
    BadPoint {
        index: usize,
        source: GeometryError,
    },
}

/// Join every point inside each polygon and store, per attribute key,
/// the ordered list of that attribute's values on the polygon.
///
/// An empty point layer is legal (all collected lists come out empty);
/// an empty polygon layer or key list is not. A key already present on
/// a polygon is overwritten.
pub fn collect(
    polygons: &FeatureCollection,
    points: &FeatureCollection,
    keys: &[String],
) -> Result<FeatureCollection, CollectError> {
    if polygons.features.is_empty() {
        return Err(CollectError::EmptyPolygons);
    }
    if keys.is_empty() {
        return Err(CollectError::EmptyAttributes);
    }

    let polygon_shapes = parse_polygons(polygons)?;
    let point_shapes = parse_points(points)?;

    // The containment matrix is computed once and reused for every key;
    // the geometric test itself never depends on the key.
    let contained: Vec<Vec<usize>> = polygon_shapes
        .iter()
        .map(|shape| {
            point_shapes
                .iter()
                .enumerate()
                .filter(|(_, point)| shape.contains_point(point))
                .map(|(index, _)| index)
                .collect()
        })
        .collect();

    let matched: usize = contained.iter().map(Vec::len).sum();
    debug!(
        "Containment join: {} polygons, {} points, {} matches",
        polygon_shapes.len(),
        point_shapes.len(),
        matched
    );

    let mut result = polygons.clone();
    for key in keys {
        for (feature, point_indices) in result.features.iter_mut().zip(&contained) {
            let values: Vec<Value> = point_indices
                .iter()
                .map(|&i| {
                    points.features[i]
                        .properties
                        .get(key)
                        .cloned()
                        .unwrap_or(Value::Null)
                })
                .collect();
            feature.properties.insert(key.clone(), Value::Array(values));
        }
    }

    Ok(result)
}

fn parse_polygons(layer: &FeatureCollection) -> Result<Vec<Polygonal>, CollectError> {
    layer
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            geometry::parse_polygonal(feature.geometry.as_ref())
                .map_err(|source| CollectError::BadPolygon { index, source })
        })
        .collect()
}

fn parse_points(layer: &FeatureCollection) -> Result<Vec<geo::Point<f64>>, CollectError> {
    layer
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            geometry::parse_point(feature.geometry.as_ref())
                .map_err(|source| CollectError::BadPoint { index, source })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feature, Geometry};
    use serde_json::json;

    fn feature(geometry: Value, properties: Value) -> Feature {
        Feature {
            kind: "Feature".to_string(),
            geometry: Some(Geometry {
                kind: geometry["type"].as_str().unwrap().to_string(),
                coordinates: geometry["coordinates"].clone(),
            }),
            properties: properties.as_object().cloned().unwrap_or_default(),
        }
    }

    fn collection(features: Vec<Feature>) -> FeatureCollection {
        FeatureCollection {
            kind: "FeatureCollection".to_string(),
            name: None,
            features,
            extra: Default::default(),
        }
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64, properties: Value) -> Feature {
        feature(
            json!({
                "type": "Polygon",
                "coordinates": [[[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]]
            }),
            properties,
        )
    }

    fn point(x: f64, y: f64, properties: Value) -> Feature {
        feature(json!({"type": "Point", "coordinates": [x, y]}), properties)
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Two squares partitioning [0,2]x[0,1]: two points in A, one in B.
    fn partition_fixture() -> (FeatureCollection, FeatureCollection) {
        let polygons = collection(vec![
            square(0.0, 0.0, 1.0, 1.0, json!({"name": "A"})),
            square(1.0, 0.0, 2.0, 1.0, json!({"name": "B"})),
        ]);
        let points = collection(vec![
            point(0.2, 0.5, json!({"race": "Black", "gen": "Male"})),
            point(0.8, 0.5, json!({"race": "White", "gen": "Female"})),
            point(1.5, 0.5, json!({"race": "Hispanic or Latino", "gen": "Male"})),
        ]);
        (polygons, points)
    }

    #[test]
    fn test_disjoint_partition() {
        let (polygons, points) = partition_fixture();
        let result = collect(&polygons, &points, &keys(&["race"])).unwrap();

        assert_eq!(result.features[0].properties["race"], json!(["Black", "White"]));
        assert_eq!(
            result.features[1].properties["race"],
            json!(["Hispanic or Latino"])
        );
    }

    #[test]
    fn test_preserves_polygon_count_order_and_geometry() {
        let (polygons, points) = partition_fixture();
        let result = collect(&polygons, &points, &keys(&["race", "gen"])).unwrap();

        assert_eq!(result.features.len(), polygons.features.len());
        for (output, input) in result.features.iter().zip(&polygons.features) {
            let output_geom = serde_json::to_value(&output.geometry).unwrap();
            let input_geom = serde_json::to_value(&input.geometry).unwrap();
            assert_eq!(output_geom, input_geom);
            assert_eq!(output.properties["name"], input.properties["name"]);
        }
    }

    #[test]
    fn test_inputs_not_mutated() {
        let (polygons, points) = partition_fixture();
        let before = serde_json::to_value(&polygons).unwrap();

        let _ = collect(&polygons, &points, &keys(&["race"])).unwrap();

        assert_eq!(serde_json::to_value(&polygons).unwrap(), before);
        assert!(!polygons.features[0].properties.contains_key("race"));
    }

    #[test]
    fn test_parallel_lists_equal_length() {
        let (polygons, points) = partition_fixture();
        let requested = keys(&["race", "gen", "age"]);
        let result = collect(&polygons, &points, &requested).unwrap();

        for polygon in &result.features {
            let lengths: Vec<usize> = requested
                .iter()
                .map(|k| polygon.properties[k].as_array().unwrap().len())
                .collect();
            assert!(lengths.windows(2).all(|w| w[0] == w[1]));
        }
    }

    #[test]
    fn test_missing_attribute_yields_null_marker() {
        let polygons = collection(vec![square(0.0, 0.0, 1.0, 1.0, json!({}))]);
        let points = collection(vec![
            point(0.2, 0.2, json!({"race": "Black", "force": "Yes"})),
            point(0.5, 0.5, json!({"race": "White"})),
            point(0.8, 0.8, json!({"race": "Black", "force": "No"})),
        ]);

        let result = collect(&polygons, &points, &keys(&["race", "force"])).unwrap();
        let properties = &result.features[0].properties;

        assert_eq!(properties["race"], json!(["Black", "White", "Black"]));
        // The second point lacks "force" but keeps its position
        assert_eq!(properties["force"], json!(["Yes", null, "No"]));
    }

    #[test]
    fn test_empty_points_is_not_an_error() {
        let (polygons, _) = partition_fixture();
        let no_points = collection(vec![]);
        let result = collect(&polygons, &no_points, &keys(&["race", "gen"])).unwrap();

        for polygon in &result.features {
            assert_eq!(polygon.properties["race"], json!([]));
            assert_eq!(polygon.properties["gen"], json!([]));
        }
    }

    #[test]
    fn test_point_outside_all_polygons_contributes_nowhere() {
        let (polygons, mut points) = partition_fixture();
        points
            .features
            .push(point(10.0, 10.0, json!({"race": "Other"})));

        let result = collect(&polygons, &points, &keys(&["race"])).unwrap();
        let all: Vec<Value> = result
            .features
            .iter()
            .flat_map(|f| f.properties["race"].as_array().unwrap().clone())
            .collect();

        assert!(!all.contains(&json!("Other")));
    }

    #[test]
    fn test_point_in_overlapping_polygons_contributes_to_each() {
        let polygons = collection(vec![
            square(0.0, 0.0, 2.0, 2.0, json!({})),
            square(1.0, 1.0, 3.0, 3.0, json!({})),
        ]);
        let points = collection(vec![point(1.5, 1.5, json!({"race": "Black"}))]);

        let result = collect(&polygons, &points, &keys(&["race"])).unwrap();
        assert_eq!(result.features[0].properties["race"], json!(["Black"]));
        assert_eq!(result.features[1].properties["race"], json!(["Black"]));
    }

    #[test]
    fn test_existing_key_is_overwritten() {
        let polygons = collection(vec![square(0.0, 0.0, 1.0, 1.0, json!({"race": "stale"}))]);
        let points = collection(vec![point(0.5, 0.5, json!({"race": "Black"}))]);

        let result = collect(&polygons, &points, &keys(&["race"])).unwrap();
        assert_eq!(result.features[0].properties["race"], json!(["Black"]));
    }

    #[test]
    fn test_empty_polygons_rejected() {
        let polygons = collection(vec![]);
        let points = collection(vec![point(0.5, 0.5, json!({}))]);

        assert!(matches!(
            collect(&polygons, &points, &keys(&["race"])),
            Err(CollectError::EmptyPolygons)
        ));
    }

    #[test]
    fn test_empty_keys_rejected() {
        let (polygons, points) = partition_fixture();
        assert!(matches!(
            collect(&polygons, &points, &[]),
            Err(CollectError::EmptyAttributes)
        ));
    }

    #[test]
    fn test_bad_polygon_geometry_rejected_with_index() {
        let mut polygons = collection(vec![
            square(0.0, 0.0, 1.0, 1.0, json!({})),
            point(0.5, 0.5, json!({})), // a point where a polygon belongs
        ]);
        polygons.features[1].properties.clear();
        let points = collection(vec![]);

        match collect(&polygons, &points, &keys(&["race"])) {
            Err(CollectError::BadPolygon { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected BadPolygon, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_point_geometry_rejected_with_index() {
        let polygons = collection(vec![square(0.0, 0.0, 1.0, 1.0, json!({}))]);
        let points = collection(vec![
            point(0.5, 0.5, json!({})),
            square(0.0, 0.0, 0.1, 0.1, json!({})), // a polygon where a point belongs
        ]);

        match collect(&polygons, &points, &keys(&["race"])) {
            Err(CollectError::BadPoint { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected BadPoint, got {:?}", other),
        }
    }

    #[test]
    fn test_values_preserve_point_iteration_order() {
        let polygons = collection(vec![square(0.0, 0.0, 1.0, 1.0, json!({}))]);
        let points = collection(vec![
            point(0.1, 0.1, json!({"age": 31})),
            point(0.2, 0.2, json!({"age": 19})),
            point(0.3, 0.3, json!({"age": 45})),
        ]);

        let result = collect(&polygons, &points, &keys(&["age"])).unwrap();
        assert_eq!(result.features[0].properties["age"], json!([31, 19, 45]));
    }
}
