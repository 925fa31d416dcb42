//! # MC Asset Pipeline
//!
//! Turns a versioned Minecraft client archive into renderer-ready assets.
//!
//! ## Overview
//!
//! For a requested version the pipeline resolves the client archive from the
//! upstream manifest, downloads and SHA-1 verifies it, streams the block
//! textures, models and blockstates out of it, packs the textures into a
//! power-of-two atlas, and resolves every blockstate into fully expanded,
//! UV-mapped models. Entity geometry and animations from the Bedrock sample
//! pack are cross-linked into a separate descriptor.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mc_asset_pipeline::{AssetPipeline, GenerateOptions, PipelineConfig};
//!
//! let config = PipelineConfig::default().with_cache_root("assets");
//! let pipeline = AssetPipeline::with_default_transport(config)?;
//!
//! let assets = pipeline.generate("latest", GenerateOptions::default())?;
//! println!("atlas at {}", assets.texture_path.display());
//! ```
//!
//! ## Outputs
//!
//! Everything lands in `{cache_root}/generated/{version}/`:
//! `textures.png`, `animation.png` (per-tile animation lookup),
//! `frame_order.png` (custom frame sequences, when any exist),
//! `blockstates.json`, `entities.json` and `meta.json`.

pub mod atlas;
pub mod bedrock;
pub mod config;
pub mod download;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod resolver;
pub mod resource_pack;
pub mod types;
pub mod version;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use atlas::{AtlasBuilder, AtlasInfo, TextureAtlas, UvRect};
pub use config::{AtlasConfig, BedrockConfig, LockConfig, PipelineConfig};
pub use error::{PipelineError, Result};
pub use http::{HttpBody, HttpTransport, ReqwestTransport};
pub use pipeline::{
    AssetPipeline, CancellationToken, ErrorResponse, GenerateOptions, GenerateResponse,
    GeneratedAssets, GenerationStage, Progress, VersionStatus,
};
pub use resolver::{DescriptorBuilder, ResolvedBlockStates, ResolvedModel};
pub use version::{ResolvedVersion, VersionResolver};
