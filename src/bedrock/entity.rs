//! Client entity definitions (`resource_pack/entity/*.entity.json`).

use serde::Deserialize;
use std::collections::BTreeMap;

/// The parts of a client entity definition that reference other files.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BedrockEntityDefinition {
    /// Namespaced id, e.g. `minecraft:cow`.
    pub identifier: String,
    /// Texture slot to texture path.
    pub textures: BTreeMap<String, String>,
    /// Geometry variant to geometry id.
    pub geometry: BTreeMap<String, String>,
    /// Short animation name to animation (or controller) id.
    pub animations: BTreeMap<String, String>,
}

impl BedrockEntityDefinition {
    /// Identifier without its namespace.
    pub fn short_name(&self) -> &str {
        self.identifier
            .split_once(':')
            .map(|(_, name)| name)
            .unwrap_or(&self.identifier)
    }
}

#[derive(Deserialize)]
struct EntityFile {
    #[serde(rename = "minecraft:client_entity")]
    client_entity: ClientEntity,
}

#[derive(Deserialize)]
struct ClientEntity {
    description: Description,
}

#[derive(Deserialize)]
struct Description {
    identifier: String,
    #[serde(default)]
    textures: BTreeMap<String, String>,
    #[serde(default)]
    geometry: BTreeMap<String, String>,
    #[serde(default)]
    animations: BTreeMap<String, String>,
}

/// Parse a client entity file.
pub fn parse_entity_file(contents: &str) -> Result<BedrockEntityDefinition, serde_json::Error> {
    let file: EntityFile = serde_json::from_str(contents)?;
    let description = file.client_entity.description;
    Ok(BedrockEntityDefinition {
        identifier: description.identifier,
        textures: description.textures,
        geometry: description.geometry,
        animations: description.animations,
    })
}
