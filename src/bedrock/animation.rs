//! Entity animation files (`resource_pack/animations/*.json`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How an animation behaves when it reaches its end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoopMode {
    Flag(bool),
    /// e.g. `"hold_on_last_frame"`.
    Named(String),
}

impl Default for LoopMode {
    fn default() -> Self {
        LoopMode::Flag(false)
    }
}

/// Channels of one bone. Keyframe values may be numbers, Molang strings or
/// timestamp-keyed objects, so they stay as raw JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoneTimeline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BedrockAnimation {
    #[serde(default, rename = "loop")]
    pub loop_mode: LoopMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_length: Option<f32>,
    #[serde(default)]
    pub bones: BTreeMap<String, BoneTimeline>,
}

#[derive(Deserialize)]
struct AnimationFile {
    #[serde(default)]
    animations: BTreeMap<String, serde_json::Value>,
}

/// Parse an animation file into `animation id -> animation`.
///
/// Individual malformed animations are skipped with a warning.
pub fn parse_animation_file(
    contents: &str,
) -> Result<BTreeMap<String, BedrockAnimation>, serde_json::Error> {
    let file: AnimationFile = serde_json::from_str(contents)?;
    Ok(file
        .animations
        .into_iter()
        .filter_map(|(id, value)| match serde_json::from_value(value) {
            Ok(animation) => Some((id, animation)),
            Err(e) => {
                tracing::warn!(animation = %id, error = %e, "skipping malformed animation");
                None
            }
        })
        .collect())
}
