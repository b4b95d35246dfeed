//! Display label derivation.
//!
//! Each polygon layer carries one declarative rule describing how to
//! build a human-readable `polygonName` from the polygon's existing
//! properties. The rule is configuration data, so five layers with five
//! naming schemes share a single labeling pass.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::models::{FeatureCollection, Properties, LABEL_KEY};

/// How a layer derives its polygon display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum LabelRule {
    /// Fixed prefix followed by a property value,
    /// e.g. "Police Service Area " + name.
    Prefix { prefix: String, field: String },

    /// A property value used verbatim, e.g. the neighborhood name.
    Field { field: String },
}

impl LabelRule {
    /// Derive the label for one property bag. Returns `None` when the
    /// source field is absent or not a primitive.
    pub fn derive(&self, properties: &Properties) -> Option<String> {
        match self {
            LabelRule::Prefix { prefix, field } => {
                Some(format!("{}{}", prefix, value_as_text(properties.get(field)?)?))
            }
            LabelRule::Field { field } => value_as_text(properties.get(field)?),
        }
    }
}

/// Store the derived label on every polygon under `polygonName`.
/// Re-running with the same rule yields the same labels: the rule only
/// reads source fields, never the label itself.
pub fn apply_labels(layer: &mut FeatureCollection, rule: &LabelRule) {
    for (index, feature) in layer.features.iter_mut().enumerate() {
        match rule.derive(&feature.properties) {
            Some(label) => {
                feature
                    .properties
                    .insert(LABEL_KEY.to_string(), Value::String(label));
            }
            None => {
                warn!("Polygon {}: cannot derive label with {:?}", index, rule);
            }
        }
    }
}

/// Render a primitive JSON value as label text. Numbers keep their JSON
/// form (census tract identifiers are numeric in the source data).
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Feature;
    use serde_json::json;

    fn layer_with_properties(properties: Value) -> FeatureCollection {
        FeatureCollection {
            kind: "FeatureCollection".to_string(),
            name: None,
            features: vec![Feature {
                kind: "Feature".to_string(),
                geometry: None,
                properties: properties.as_object().cloned().unwrap_or_default(),
            }],
            extra: Default::default(),
        }
    }

    #[test]
    fn test_prefix_rule() {
        let rule = LabelRule::Prefix {
            prefix: "Police Service Area ".to_string(),
            field: "name".to_string(),
        };
        let mut layer = layer_with_properties(json!({"name": "3D"}));

        apply_labels(&mut layer, &rule);
        assert_eq!(
            layer.features[0].properties[LABEL_KEY],
            json!("Police Service Area 3D")
        );
    }

    #[test]
    fn test_field_passthrough_rule() {
        let rule = LabelRule::Field {
            field: "NBH_NAMES".to_string(),
        };
        let mut layer = layer_with_properties(json!({"NBH_NAMES": "Columbia Heights"}));

        apply_labels(&mut layer, &rule);
        assert_eq!(
            layer.features[0].properties[LABEL_KEY],
            json!("Columbia Heights")
        );
    }

    #[test]
    fn test_numeric_field_rendered_as_text() {
        let rule = LabelRule::Prefix {
            prefix: "Census Tract ".to_string(),
            field: "TRACT".to_string(),
        };
        let mut layer = layer_with_properties(json!({"TRACT": 7803}));

        apply_labels(&mut layer, &rule);
        assert_eq!(
            layer.features[0].properties[LABEL_KEY],
            json!("Census Tract 7803")
        );
    }

    #[test]
    fn test_idempotent() {
        let rule = LabelRule::Prefix {
            prefix: "Police Sector ".to_string(),
            field: "name".to_string(),
        };
        let mut layer = layer_with_properties(json!({"name": "2"}));

        apply_labels(&mut layer, &rule);
        let first = layer.features[0].properties[LABEL_KEY].clone();
        apply_labels(&mut layer, &rule);
        let second = layer.features[0].properties[LABEL_KEY].clone();

        assert_eq!(first, second);
        assert_eq!(first, json!("Police Sector 2"));
    }

    #[test]
    fn test_missing_field_leaves_label_unset() {
        let rule = LabelRule::Field {
            field: "name".to_string(),
        };
        let mut layer = layer_with_properties(json!({"other": "x"}));

        apply_labels(&mut layer, &rule);
        assert!(!layer.features[0].properties.contains_key(LABEL_KEY));
    }

    #[test]
    fn test_rule_from_toml() {
        let prefix: LabelRule =
            toml::from_str("rule = \"prefix\"\nprefix = \"Ward \"\nfield = \"name\"").unwrap();
        assert_eq!(
            prefix,
            LabelRule::Prefix {
                prefix: "Ward ".to_string(),
                field: "name".to_string()
            }
        );

        let field: LabelRule = toml::from_str("rule = \"field\"\nfield = \"name\"").unwrap();
        assert_eq!(
            field,
            LabelRule::Field {
                field: "name".to_string()
            }
        );
    }
}
