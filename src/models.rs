//! GeoJSON data model.
//!
//! This module contains the serde representation of feature collections
//! as exchanged with upstream data sources and the exporter. Geometry
//! coordinates are kept as raw JSON here; interpreting them as polygons
//! or points is the job of the `geometry` module, so that a malformed
//! geometry surfaces as an aggregation error naming the feature rather
//! than a parse failure for the whole document.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A feature's property bag: arbitrary keys mapped to JSON primitives,
/// arrays, or null.
pub type Properties = Map<String, Value>;

/// Property key under which the derived display label is stored.
pub const LABEL_KEY: &str = "polygonName";

/// A GeoJSON feature collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Always "FeatureCollection" for valid input.
    #[serde(rename = "type")]
    pub kind: String,

    /// Optional collection name (common in exports from GIS tools).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Ordered list of features. Order is significant: collected value
    /// lists preserve point order, and polygon identity is positional.
    pub features: Vec<Feature>,

    /// Any other top-level members (e.g. `crs`), preserved through
    /// deserialize/serialize so exported documents keep them.
    #[serde(flatten)]
    pub extra: Properties,
}

impl FeatureCollection {
    /// Returns true if the document declares itself a FeatureCollection.
    pub fn is_feature_collection(&self) -> bool {
        self.kind == "FeatureCollection"
    }
}

/// A single GeoJSON feature: a geometry plus a property bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,

    /// The feature geometry. GeoJSON allows `null` here; such features
    /// are rejected during aggregation, not during parsing.
    pub geometry: Option<Geometry>,

    /// Property bag. `null` on the wire is treated as empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: Properties,
}

/// A raw GeoJSON geometry: type tag plus uninterpreted coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Value,
}

/// Deserialize a JSON `null` as the type's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let opt = Option::<T>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_collection() {
        let doc = r#"{
            "type": "FeatureCollection",
            "name": "Police_Service_Areas",
            "crs": {"type": "name", "properties": {"name": "EPSG:4326"}},
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [-77.0, 38.9]},
                    "properties": {"race": "Black", "age": 24}
                }
            ]
        }"#;

        let fc: FeatureCollection = serde_json::from_str(doc).unwrap();
        assert!(fc.is_feature_collection());
        assert_eq!(fc.name.as_deref(), Some("Police_Service_Areas"));
        assert_eq!(fc.features.len(), 1);
        assert_eq!(fc.features[0].properties["race"], "Black");
        // Unknown top-level members survive the round trip
        assert!(fc.extra.contains_key("crs"));
        let out = serde_json::to_value(&fc).unwrap();
        assert_eq!(out["crs"]["type"], "name");
    }

    #[test]
    fn test_null_properties_become_empty() {
        let doc = r#"{
            "type": "Feature",
            "geometry": {"type": "Point", "coordinates": [0.0, 0.0]},
            "properties": null
        }"#;

        let feature: Feature = serde_json::from_str(doc).unwrap();
        assert!(feature.properties.is_empty());
    }

    #[test]
    fn test_null_geometry_allowed() {
        let doc = r#"{"type": "Feature", "geometry": null, "properties": {}}"#;
        let feature: Feature = serde_json::from_str(doc).unwrap();
        assert!(feature.geometry.is_none());
    }

    #[test]
    fn test_not_a_feature_collection() {
        let doc = r#"{"type": "GeometryCollection", "features": []}"#;
        let fc: FeatureCollection = serde_json::from_str(doc).unwrap();
        assert!(!fc.is_feature_collection());
    }
}
