//! Texture atlas building.
//!
//! This module packs block textures into a single power-of-two atlas,
//! keeps every animation's frames in one column, and encodes the lookup
//! images the renderer uses to step through frames.

mod builder;
pub mod encoding;

pub use builder::{AtlasBuilder, AtlasInfo, TextureAtlas, UvAnimation, UvRect, MISSING_TEXTURE};
pub use encoding::{encode_animation_lookup, encode_frame_order, AnimationTexel, LookupImage};
