//! Blockstate definition parsing.
//!
//! Blockstates map block properties to model variants. A definition carries
//! `variants`, `multipart`, or (rarely) both.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A blockstate definition from blockstates/*.json.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockstateDefinition {
    /// Property combinations mapped to one or more weighted models.
    #[serde(default, deserialize_with = "deserialize_variants")]
    pub variants: Option<BTreeMap<String, Vec<ModelVariant>>>,
    /// Conditional model overlays.
    #[serde(default)]
    pub multipart: Option<Vec<MultipartCase>>,
}

fn deserialize_variants<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, Vec<ModelVariant>>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, ApplyValue>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|variants| {
        variants
            .into_iter()
            .map(|(key, value)| (key, value.into_vec()))
            .collect()
    }))
}

/// A model variant reference with optional rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVariant {
    /// Model resource location (e.g., "block/stone" or "minecraft:block/stone").
    pub model: String,
    /// X rotation in degrees (0, 90, 180, 270).
    #[serde(default)]
    pub x: i32,
    /// Y rotation in degrees (0, 90, 180, 270).
    #[serde(default)]
    pub y: i32,
    /// If true, UV coordinates don't rotate with the block.
    #[serde(default)]
    pub uvlock: bool,
    /// Weight for random selection (default 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// A multipart case with optional condition.
#[derive(Debug, Clone, Deserialize)]
pub struct MultipartCase {
    /// Condition for when this case applies.
    #[serde(default)]
    pub when: Option<MultipartCondition>,
    /// Model(s) to apply when condition is met.
    pub apply: ApplyValue,
}

/// A single model or an array of weighted models.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApplyValue {
    Single(ModelVariant),
    Multiple(Vec<ModelVariant>),
}

impl ApplyValue {
    pub fn variants(&self) -> Vec<&ModelVariant> {
        match self {
            ApplyValue::Single(v) => vec![v],
            ApplyValue::Multiple(v) => v.iter().collect(),
        }
    }

    fn into_vec(self) -> Vec<ModelVariant> {
        match self {
            ApplyValue::Single(v) => vec![v],
            ApplyValue::Multiple(v) => v,
        }
    }
}

/// Multipart condition for when a case applies.
///
/// Values stay as raw JSON; the renderer evaluates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultipartCondition {
    /// Any of the sub-conditions must match.
    Or {
        #[serde(rename = "OR")]
        any: Vec<MultipartCondition>,
    },
    /// All of the sub-conditions must match.
    And {
        #[serde(rename = "AND")]
        all: Vec<MultipartCondition>,
    },
    /// All properties must match.
    Simple(BTreeMap<String, serde_json::Value>),
}
