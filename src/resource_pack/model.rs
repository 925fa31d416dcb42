//! Block model parsing.
//!
//! Block models define the 3D geometry of blocks using cuboid elements.

use crate::types::{Direction, ElementRotation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A parsed block model from models/*.json.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockModel {
    /// Parent model to inherit from.
    #[serde(default)]
    pub parent: Option<String>,

    /// Whether to use ambient occlusion. `None` inherits from the parent.
    #[serde(default, rename = "ambientocclusion")]
    pub ambient_occlusion: Option<bool>,

    /// Texture variable definitions.
    #[serde(default)]
    pub textures: BTreeMap<String, String>,

    /// Model elements (cuboids). `None` inherits from the parent.
    #[serde(default)]
    pub elements: Option<Vec<ModelElement>>,
}

impl BlockModel {
    /// Parent reference with the namespace stripped.
    pub fn parent_name(&self) -> Option<String> {
        self.parent.as_deref().map(normalize_model_name)
    }
}

/// Strip the `minecraft:` namespace so references and table keys agree.
/// "minecraft:block/stone" -> "block/stone"
pub fn normalize_model_name(reference: &str) -> String {
    reference
        .strip_prefix("minecraft:")
        .unwrap_or(reference)
        .to_string()
}

/// A cuboid element within a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelElement {
    /// Minimum corner (0-16 range).
    pub from: [f32; 3],
    /// Maximum corner (0-16 range).
    pub to: [f32; 3],
    /// Optional rotation.
    #[serde(default)]
    pub rotation: Option<ElementRotation>,
    /// Whether this element receives shade.
    #[serde(default = "default_shade")]
    pub shade: bool,
    /// Face definitions.
    #[serde(default)]
    pub faces: HashMap<Direction, ModelFace>,
}

fn default_shade() -> bool {
    true
}

/// A face of a model element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFace {
    /// UV coordinates [u1, v1, u2, v2] in 0-16 range.
    #[serde(default)]
    pub uv: Option<[f32; 4]>,
    /// Texture reference (e.g., "#side" or "block/stone").
    pub texture: String,
    /// Face direction for culling (if adjacent block is opaque, hide this face).
    #[serde(default)]
    pub cullface: Option<Direction>,
    /// UV rotation in degrees (0, 90, 180, 270).
    #[serde(default)]
    pub rotation: i32,
    /// Tint index for biome coloring (-1 = no tint).
    #[serde(default = "default_tint_index")]
    pub tintindex: i32,
}

fn default_tint_index() -> i32 {
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_model() {
        let json = r#"{
            "parent": "minecraft:block/cube_all",
            "textures": {
                "all": "minecraft:block/stone"
            }
        }"#;

        let model: BlockModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.parent_name().as_deref(), Some("block/cube_all"));
        assert_eq!(model.textures.get("all"), Some(&"minecraft:block/stone".to_string()));
        assert!(model.elements.is_none());
        assert!(model.ambient_occlusion.is_none());
    }

    #[test]
    fn test_parse_model_with_elements() {
        let json = r##"{
            "ambientocclusion": false,
            "textures": {
                "texture": "block/stone"
            },
            "elements": [
                {
                    "from": [0, 0, 0],
                    "to": [16, 16, 16],
                    "faces": {
                        "down":  { "texture": "#texture", "cullface": "down" },
                        "up":    { "texture": "#texture", "cullface": "up", "tintindex": 0 },
                        "north": { "texture": "#texture", "uv": [0, 0, 8, 8] }
                    }
                }
            ]
        }"##;

        let model: BlockModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.ambient_occlusion, Some(false));

        let elements = model.elements.unwrap();
        let element = &elements[0];
        assert_eq!(element.from, [0.0, 0.0, 0.0]);
        assert_eq!(element.to, [16.0, 16.0, 16.0]);
        assert!(element.shade);
        assert_eq!(element.faces.len(), 3);
        assert_eq!(element.faces[&Direction::Down].cullface, Some(Direction::Down));
        assert_eq!(element.faces[&Direction::Down].tintindex, -1);
        assert_eq!(element.faces[&Direction::Up].tintindex, 0);
        assert_eq!(element.faces[&Direction::North].uv, Some([0.0, 0.0, 8.0, 8.0]));
    }

    #[test]
    fn test_parse_element_with_rotation() {
        let json = r#"{
            "from": [0, 0, 0],
            "to": [16, 16, 16],
            "rotation": {
                "origin": [8, 8, 8],
                "axis": "y",
                "angle": 45,
                "rescale": true
            },
            "faces": {}
        }"#;

        let element: ModelElement = serde_json::from_str(json).unwrap();
        let rotation = element.rotation.unwrap();
        assert_eq!(rotation.origin, [8.0, 8.0, 8.0]);
        assert_eq!(rotation.angle, 45.0);
        assert!(rotation.rescale);
    }

    #[test]
    fn test_normalize_model_name() {
        assert_eq!(normalize_model_name("minecraft:block/stone"), "block/stone");
        assert_eq!(normalize_model_name("block/stone"), "block/stone");
        assert_eq!(normalize_model_name("mymod:block/custom"), "mymod:block/custom");
    }
}
