//! Geometry interpretation and the point-in-polygon test.
//!
//! Raw GeoJSON geometries are converted here into `geo` crate types, and
//! containment is delegated to `geo`'s `Intersects` relation. The
//! convention throughout is boundary-inclusive: a point lying exactly on
//! a polygon edge counts as inside. Holes and multi-part polygons are
//! handled by the `geo` algorithms directly.

use geo::{Coord, Intersects, LineString, MultiPolygon, Point, Polygon};
use serde_json::Value;
use thiserror::Error;

use crate::models::Geometry;

/// Failure to interpret a raw geometry as the expected shape.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("feature has no geometry")]
    Missing,

    #[error("expected {expected} geometry, found {found}")]
    WrongType { expected: &'static str, found: String },

    #[error("malformed coordinates: {0}")]
    BadCoordinates(String),
}

/// A polygonal geometry: single polygon or multi-polygon.
#[derive(Debug, Clone)]
pub enum Polygonal {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Polygonal {
    /// Boundary-inclusive containment test. Deterministic and pure.
    pub fn contains_point(&self, point: &Point<f64>) -> bool {
        match self {
            Polygonal::Polygon(polygon) => polygon.intersects(point),
            Polygonal::MultiPolygon(multi) => multi.intersects(point),
        }
    }
}

/// Interpret a feature geometry as a polygon or multi-polygon.
pub fn parse_polygonal(geometry: Option<&Geometry>) -> Result<Polygonal, GeometryError> {
    let geometry = geometry.ok_or(GeometryError::Missing)?;

    match geometry.kind.as_str() {
        "Polygon" => Ok(Polygonal::Polygon(parse_polygon(&geometry.coordinates)?)),
        "MultiPolygon" => {
            let parts = as_array(&geometry.coordinates)?
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Polygonal::MultiPolygon(MultiPolygon::new(parts)))
        }
        other => Err(GeometryError::WrongType {
            expected: "Polygon or MultiPolygon",
            found: other.to_string(),
        }),
    }
}

/// Interpret a feature geometry as a single point.
pub fn parse_point(geometry: Option<&Geometry>) -> Result<Point<f64>, GeometryError> {
    let geometry = geometry.ok_or(GeometryError::Missing)?;

    match geometry.kind.as_str() {
        "Point" => Ok(Point::from(parse_position(&geometry.coordinates)?)),
        other => Err(GeometryError::WrongType {
            expected: "Point",
            found: other.to_string(),
        }),
    }
}

/// One GeoJSON position: `[x, y]`, possibly with extra ordinates
/// (elevation) which are ignored.
fn parse_position(value: &Value) -> Result<Coord<f64>, GeometryError> {
    let parts = as_array(value)?;
    if parts.len() < 2 {
        return Err(GeometryError::BadCoordinates(format!(
            "position has {} ordinates, need at least 2",
            parts.len()
        )));
    }

    let x = parts[0].as_f64();
    let y = parts[1].as_f64();
    match (x, y) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(GeometryError::BadCoordinates(
            "position ordinates are not numbers".to_string(),
        )),
    }
}

/// A linear ring: an array of positions.
fn parse_ring(value: &Value) -> Result<LineString<f64>, GeometryError> {
    let coords = as_array(value)?
        .iter()
        .map(parse_position)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LineString::new(coords))
}

/// Polygon coordinates: first ring is the exterior, the rest are holes.
fn parse_polygon(value: &Value) -> Result<Polygon<f64>, GeometryError> {
    let rings = as_array(value)?;
    if rings.is_empty() {
        return Err(GeometryError::BadCoordinates(
            "polygon has no rings".to_string(),
        ));
    }

    let exterior = parse_ring(&rings[0])?;
    let interiors = rings[1..]
        .iter()
        .map(parse_ring)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Polygon::new(exterior, interiors))
}

fn as_array(value: &Value) -> Result<&Vec<Value>, GeometryError> {
    value
        .as_array()
        .ok_or_else(|| GeometryError::BadCoordinates("expected a coordinate array".to_string()))
}
