//! Secondary content: entity geometry, animations and client entity files.
//!
//! [`BedrockSource`] fetches and streams the sample archive; [`transform`]
//! joins the three file kinds into one descriptor per entity.

pub mod animation;
pub mod entity;
pub mod geometry;
pub mod source;
pub mod transform;

pub use animation::{BedrockAnimation, BoneTimeline, LoopMode};
pub use entity::BedrockEntityDefinition;
pub use geometry::{BedrockGeometry, Bone, Cube, GeometryFile};
pub use source::{read_archive, BedrockContent, BedrockSource};
pub use transform::{transform, OutputEntity};
