//! Client archive content: parsing and extraction.
//!
//! This module streams the block subtrees of a client archive and parses
//! blockstates, models, textures and their animation sidecars.

pub mod blockstate;
pub mod extractor;
pub mod model;
pub mod texture;

pub use blockstate::{ApplyValue, BlockstateDefinition, ModelVariant, MultipartCase, MultipartCondition};
pub use extractor::{ContentExtractor, ExtractedBlockState, ExtractedContent, ExtractedModel};
pub use model::{BlockModel, ModelElement, ModelFace};
pub use texture::{AnimationFrame, AnimationMeta, ExtractedTexture, TextureAnimation, TextureData};
