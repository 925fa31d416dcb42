//! Block state and model resolution.
//!
//! This module flattens model inheritance chains, binds texture variables
//! to atlas tiles and expands every block state into renderer-ready models.

pub mod descriptor;
pub mod face_uv;
pub mod model_resolver;

pub use descriptor::{
    DescriptorBuilder, ResolvedBlockState, ResolvedBlockStates, ResolvedElement, ResolvedFace,
    ResolvedModel, ResolvedMultipartCase, ResolvedTexture, ResolvedVariant,
};
pub use model_resolver::{FlattenedModel, ModelResolver};
