//! Cross-links entity definitions with their geometry and animations.

use super::animation::BedrockAnimation;
use super::geometry::Bone;
use super::source::BedrockContent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const GEOMETRY_PREFIX: &str = "geometry.";

/// A denormalized entity ready for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEntity {
    pub identifier: String,
    pub textures: BTreeMap<String, String>,
    /// Geometry variant to its bones.
    pub geometry: BTreeMap<String, Vec<Bone>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animations: Option<BTreeMap<String, BedrockAnimation>>,
}

/// Build one [`OutputEntity`] per entity that has at least one geometry.
///
/// Keyed by the identifier without namespace.
pub fn transform(content: &BedrockContent) -> BTreeMap<String, OutputEntity> {
    let mut output = BTreeMap::new();
    let mut dropped = 0usize;

    for entity in &content.entities {
        let geometry: BTreeMap<String, Vec<Bone>> = entity
            .geometry
            .iter()
            .filter_map(|(variant, reference)| {
                let found = lookup_geometry(content, reference);
                if found.is_none() {
                    tracing::debug!(entity = %entity.identifier, geometry = %reference, "geometry reference unresolved");
                }
                found.map(|bones| (variant.clone(), bones.to_vec()))
            })
            .collect();

        if geometry.is_empty() {
            tracing::warn!(entity = %entity.identifier, "no geometry resolved, dropping entity");
            dropped += 1;
            continue;
        }

        // Many references name runtime-composed animations or controllers
        // that have no static file.
        let animations: BTreeMap<String, BedrockAnimation> = entity
            .animations
            .iter()
            .filter_map(|(name, id)| {
                content
                    .animations
                    .get(id)
                    .map(|animation| (name.clone(), animation.clone()))
            })
            .collect();

        output.insert(
            entity.short_name().to_string(),
            OutputEntity {
                identifier: entity.identifier.clone(),
                textures: entity.textures.clone(),
                geometry,
                animations: (!animations.is_empty()).then_some(animations),
            },
        );
    }

    tracing::info!(entities = output.len(), dropped, "entity descriptors built");
    output
}

/// Exact id first, then the same id with the `geometry.` prefix.
fn lookup_geometry<'a>(content: &'a BedrockContent, reference: &str) -> Option<&'a [Bone]> {
    if let Some(geometry) = content.geometries.get(reference) {
        return Some(&geometry.bones);
    }
    if reference.starts_with(GEOMETRY_PREFIX) {
        return None;
    }
    content
        .geometries
        .get(&format!("{}{}", GEOMETRY_PREFIX, reference))
        .map(|geometry| geometry.bones.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bedrock::animation::parse_animation_file;
    use crate::bedrock::entity::BedrockEntityDefinition;
    use crate::bedrock::geometry::parse_geometry_file;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn content() -> BedrockContent {
        let geometries = parse_geometry_file(
            r#"{ "minecraft:geometry": [
                { "description": { "identifier": "geometry.cow" }, "bones": [ { "name": "body" } ] },
                { "description": { "identifier": "geometry.sheep.sheared" }, "bones": [ { "name": "body" }, { "name": "head" } ] }
            ] }"#,
        )
        .unwrap()
        .into_iter()
        .map(|g| (g.identifier.clone(), g))
        .collect();

        let animations = parse_animation_file(
            r#"{ "animations": { "animation.quadruped.walk": { "loop": true } } }"#,
        )
        .unwrap();

        BedrockContent {
            geometries,
            animations,
            entities: vec![
                BedrockEntityDefinition {
                    identifier: "minecraft:cow".to_string(),
                    textures: map(&[("default", "textures/entity/cow/cow")]),
                    geometry: map(&[("default", "geometry.cow")]),
                    animations: map(&[
                        ("walk", "animation.quadruped.walk"),
                        ("look_at_target", "animation.common.look_at_target"),
                    ]),
                },
                BedrockEntityDefinition {
                    identifier: "minecraft:sheep".to_string(),
                    textures: map(&[("default", "textures/entity/sheep/sheep")]),
                    geometry: map(&[("sheared", "sheep.sheared"), ("wool", "geometry.sheep.wool")]),
                    animations: BTreeMap::new(),
                },
                BedrockEntityDefinition {
                    identifier: "minecraft:ghost".to_string(),
                    geometry: map(&[("default", "geometry.ghost")]),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_transform_links_geometry_and_animations() {
        let output = transform(&content());

        let cow = &output["cow"];
        assert_eq!(cow.identifier, "minecraft:cow");
        assert_eq!(cow.geometry["default"][0].name, "body");
        let animations = cow.animations.as_ref().unwrap();
        assert!(animations.contains_key("walk"));
        // Unresolved animation references are dropped silently.
        assert!(!animations.contains_key("look_at_target"));
    }

    #[test]
    fn test_geometry_prefix_retry() {
        let output = transform(&content());
        let sheep = &output["sheep"];
        assert_eq!(sheep.geometry.len(), 1);
        assert_eq!(sheep.geometry["sheared"].len(), 2);
        assert!(sheep.animations.is_none());
    }

    #[test]
    fn test_entity_without_geometry_is_dropped() {
        let output = transform(&content());
        assert!(!output.contains_key("ghost"));
        assert_eq!(output.len(), 2);
    }

    #[test]
    fn test_serialized_shape() {
        let output = transform(&content());
        let json = serde_json::to_value(&output["sheep"]).unwrap();
        assert!(json.get("animations").is_none());
        assert_eq!(json["geometry"]["sheared"][1]["name"], "head");
    }
}
