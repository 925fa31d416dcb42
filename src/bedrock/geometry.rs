//! Entity geometry files.
//!
//! Two file layouts exist in the wild. Modern files hold an array under
//! `minecraft:geometry`, each record carrying a `description.identifier`.
//! Legacy files are flat objects keyed by `geometry.<name>`, optionally
//! suffixed with `:geometry.<parent>` to inherit bones. Both decode into
//! [`BedrockGeometry`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// One cube of a bone, in model pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cube {
    pub origin: [f32; 3],
    pub size: [f32; 3],
    /// Box UV `[u, v]` or a per-face UV object; passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflate: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<bool>,
}

/// A named node of the bone hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pivot: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cubes: Vec<Cube>,
}

/// Normalized geometry record.
#[derive(Debug, Clone, PartialEq)]
pub struct BedrockGeometry {
    /// Full id including the `geometry.` prefix.
    pub identifier: String,
    /// Legacy parent geometry id, if the key declared one.
    pub parent: Option<String>,
    pub texture_width: u32,
    pub texture_height: u32,
    pub bones: Vec<Bone>,
}

/// A geometry file in either layout, split by the presence of the
/// `minecraft:geometry` key. Records stay raw so one bad record cannot
/// take its siblings down with it.
#[derive(Debug)]
pub enum GeometryFile {
    Modern(Vec<serde_json::Value>),
    Legacy(BTreeMap<String, serde_json::Value>),
}

#[derive(Debug, Deserialize)]
struct ModernGeometry {
    description: ModernDescription,
    #[serde(default)]
    bones: Vec<Bone>,
}

#[derive(Debug, Deserialize)]
struct ModernDescription {
    identifier: String,
    #[serde(default)]
    texture_width: u32,
    #[serde(default)]
    texture_height: u32,
}

#[derive(Debug, Deserialize)]
struct LegacyGeometry {
    #[serde(default, rename = "texturewidth")]
    texture_width: u32,
    #[serde(default, rename = "textureheight")]
    texture_height: u32,
    #[serde(default)]
    bones: Vec<Bone>,
}

impl GeometryFile {
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        let mut entries: BTreeMap<String, serde_json::Value> = serde_json::from_str(contents)?;
        match entries.remove("minecraft:geometry") {
            Some(records) => Ok(GeometryFile::Modern(serde_json::from_value(records)?)),
            None => Ok(GeometryFile::Legacy(entries)),
        }
    }

    /// Decode every geometry in the file. Malformed records are skipped
    /// with a warning.
    pub fn into_geometries(self) -> Vec<BedrockGeometry> {
        match self {
            GeometryFile::Modern(records) => records
                .into_iter()
                .enumerate()
                .filter_map(|(index, record)| {
                    match serde_json::from_value::<ModernGeometry>(record) {
                        Ok(g) => Some(BedrockGeometry {
                            identifier: g.description.identifier,
                            parent: None,
                            texture_width: g.description.texture_width,
                            texture_height: g.description.texture_height,
                            bones: g.bones,
                        }),
                        Err(e) => {
                            tracing::warn!(index, error = %e, "skipping malformed geometry");
                            None
                        }
                    }
                })
                .collect(),
            GeometryFile::Legacy(entries) => entries
                .into_iter()
                .filter(|(key, _)| key.starts_with("geometry."))
                .filter_map(|(key, value)| {
                    let (identifier, parent) = match key.split_once(':') {
                        Some((id, parent)) => (id.to_string(), Some(parent.to_string())),
                        None => (key.clone(), None),
                    };
                    match serde_json::from_value::<LegacyGeometry>(value) {
                        Ok(legacy) => Some(BedrockGeometry {
                            identifier,
                            parent,
                            texture_width: legacy.texture_width,
                            texture_height: legacy.texture_height,
                            bones: legacy.bones,
                        }),
                        Err(e) => {
                            tracing::warn!(geometry = %key, error = %e, "skipping malformed legacy geometry");
                            None
                        }
                    }
                })
                .collect(),
        }
    }
}

/// Parse a geometry file of either layout.
pub fn parse_geometry_file(contents: &str) -> Result<Vec<BedrockGeometry>, serde_json::Error> {
    Ok(GeometryFile::from_json(contents)?.into_geometries())
}

/// Fill in bones and texture size that legacy children inherit.
///
/// A bone already present in the child (by name) wins. Missing parents and
/// parent loops leave the child as declared.
pub fn apply_inheritance(geometries: &mut BTreeMap<String, BedrockGeometry>) {
    let ids: Vec<String> = geometries
        .iter()
        .filter(|(_, g)| g.parent.is_some())
        .map(|(id, _)| id.clone())
        .collect();

    for id in ids {
        let mut visiting = HashSet::new();
        let inherited = inherited_from(&id, geometries, &mut visiting);
        if let (Some(geometry), Some((bones, width, height))) = (geometries.get_mut(&id), inherited) {
            for bone in bones {
                if !geometry.bones.iter().any(|b| b.name == bone.name) {
                    geometry.bones.push(bone);
                }
            }
            if geometry.texture_width == 0 {
                geometry.texture_width = width;
            }
            if geometry.texture_height == 0 {
                geometry.texture_height = height;
            }
        }
    }
}

/// Bones and texture size visible through `id`'s parent chain.
fn inherited_from(
    id: &str,
    geometries: &BTreeMap<String, BedrockGeometry>,
    visiting: &mut HashSet<String>,
) -> Option<(Vec<Bone>, u32, u32)> {
    if !visiting.insert(id.to_string()) {
        tracing::warn!(geometry = %id, "geometry parent loop");
        return None;
    }

    let parent_id = geometries.get(id)?.parent.as_deref()?;
    let Some(parent) = geometries.get(parent_id) else {
        tracing::debug!(geometry = %id, parent = %parent_id, "parent geometry not in archive");
        return None;
    };

    let mut bones = parent.bones.clone();
    let mut width = parent.texture_width;
    let mut height = parent.texture_height;

    if let Some((grand_bones, w, h)) = inherited_from(parent_id, geometries, visiting) {
        for bone in grand_bones {
            if !bones.iter().any(|b| b.name == bone.name) {
                bones.push(bone);
            }
        }
        if width == 0 {
            width = w;
        }
        if height == 0 {
            height = h;
        }
    }

    Some((bones, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODERN: &str = r#"{
        "format_version": "1.12.0",
        "minecraft:geometry": [
            {
                "description": { "identifier": "geometry.cow", "texture_width": 64, "texture_height": 32 },
                "bones": [
                    { "name": "body", "pivot": [0, 19, 2],
                      "cubes": [ { "origin": [-6, 11, -5], "size": [12, 18, 10], "uv": [18, 4] } ] },
                    { "name": "head", "parent": "body", "pivot": [0, 20, -8] }
                ]
            },
            { "description": { "identifier": "geometry.cow.v2" } }
        ]
    }"#;

    const LEGACY: &str = r#"{
        "format_version": "1.8.0",
        "geometry.pig": {
            "texturewidth": 64, "textureheight": 32,
            "bones": [
                { "name": "body", "cubes": [ { "origin": [-5, 7, -5], "size": [10, 16, 8] } ] },
                { "name": "head", "pivot": [0, 12, -6] }
            ]
        },
        "geometry.pig.saddled:geometry.pig": {
            "bones": [ { "name": "head", "pivot": [0, 13, -6] }, { "name": "saddle" } ]
        },
        "geometry.broken": { "bones": "nope" }
    }"#;

    #[test]
    fn test_parse_modern() {
        let geometries = parse_geometry_file(MODERN).unwrap();
        assert_eq!(geometries.len(), 2);

        let cow = &geometries[0];
        assert_eq!(cow.identifier, "geometry.cow");
        assert_eq!((cow.texture_width, cow.texture_height), (64, 32));
        assert_eq!(cow.bones.len(), 2);
        assert_eq!(cow.bones[1].parent.as_deref(), Some("body"));
        assert_eq!(cow.bones[0].cubes[0].size, [12.0, 18.0, 10.0]);
        assert!(geometries[1].bones.is_empty());
    }

    #[test]
    fn test_parse_legacy() {
        let geometries = parse_geometry_file(LEGACY).unwrap();
        // The malformed entry is dropped; format_version is not a geometry.
        assert_eq!(geometries.len(), 2);

        let saddled = geometries
            .iter()
            .find(|g| g.identifier == "geometry.pig.saddled")
            .unwrap();
        assert_eq!(saddled.parent.as_deref(), Some("geometry.pig"));
    }

    #[test]
    fn test_legacy_inheritance() {
        let mut geometries: BTreeMap<String, BedrockGeometry> = parse_geometry_file(LEGACY)
            .unwrap()
            .into_iter()
            .map(|g| (g.identifier.clone(), g))
            .collect();
        apply_inheritance(&mut geometries);

        let saddled = &geometries["geometry.pig.saddled"];
        let names: Vec<_> = saddled.bones.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["head", "saddle", "body"]);
        // Child's own head wins over the parent's.
        assert_eq!(saddled.bones[0].pivot, Some([0.0, 13.0, -6.0]));
        assert_eq!((saddled.texture_width, saddled.texture_height), (64, 32));
        assert_eq!(geometries["geometry.pig"].bones.len(), 2);
    }

    #[test]
    fn test_inheritance_loop_terminates() {
        let mut geometries = BTreeMap::new();
        for (id, parent) in [("geometry.a", "geometry.b"), ("geometry.b", "geometry.a")] {
            geometries.insert(
                id.to_string(),
                BedrockGeometry {
                    identifier: id.to_string(),
                    parent: Some(parent.to_string()),
                    texture_width: 0,
                    texture_height: 0,
                    bones: vec![Bone {
                        name: id.to_string(),
                        parent: None,
                        pivot: None,
                        rotation: None,
                        mirror: None,
                        cubes: Vec::new(),
                    }],
                },
            );
        }
        apply_inheritance(&mut geometries);
        assert!(geometries["geometry.a"].bones.len() <= 2);
    }

    #[test]
    fn test_bad_modern_record_keeps_its_siblings() {
        let geometries = parse_geometry_file(
            r#"{
                "format_version": "1.12.0",
                "minecraft:geometry": [
                    { "description": { "identifier": "geometry.cow" },
                      "bones": [ { "name": "body" } ] },
                    { "description": { "identifier": "geometry.pig" },
                      "bones": [ { "name": "body",
                        "cubes": [ { "origin": [0, 0, 0], "size": [1, 1] } ] } ] }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(geometries.len(), 1);
        assert_eq!(geometries[0].identifier, "geometry.cow");
    }

    #[test]
    fn test_not_a_geometry_file() {
        assert!(parse_geometry_file("[1, 2]").is_err());
        assert!(parse_geometry_file(r#"{ "minecraft:geometry": 5 }"#).is_err());
    }
}
