//! Element rotation carried through to resolved models.

use super::Axis;
use serde::{Deserialize, Serialize};

/// Element-level rotation from model element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRotation {
    /// Origin point for rotation (in 0-16 Minecraft coordinates).
    #[serde(default = "default_origin")]
    pub origin: [f32; 3],
    /// Axis to rotate around.
    pub axis: Axis,
    /// Rotation angle in degrees (-45 to 45, in 22.5 increments).
    pub angle: f32,
    /// Whether to rescale the element after rotation.
    #[serde(default)]
    pub rescale: bool,
}

fn default_origin() -> [f32; 3] {
    [8.0, 8.0, 8.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_origin() {
        let rotation: ElementRotation =
            serde_json::from_str(r#"{ "axis": "x", "angle": 22.5 }"#).unwrap();
        assert_eq!(rotation.origin, [8.0, 8.0, 8.0]);
        assert_eq!(rotation.axis, Axis::X);
        assert!(!rotation.rescale);
    }
}
