//! Generation orchestrator.
//!
//! [`AssetPipeline::generate`] runs the stages in order:
//!
//! 1. resolving
//! 2. downloading
//! 3. extracting
//! 4. extracting-secondary-content (failure is logged and skipped)
//! 5. building-atlas
//! 6. building-descriptors
//! 7. saving
//!
//! Each version has its own lock file, so different versions can generate
//! concurrently while two requests for the same version never both write.

pub mod cache;
pub mod cancel;
pub mod lock;

pub use cache::{CacheLayout, CacheMeta, VersionStatus};
pub use cancel::CancellationToken;
pub use lock::GenerationLock;

use crate::atlas::{encode_animation_lookup, encode_frame_order, AtlasBuilder, AtlasInfo};
use crate::bedrock::{transform, BedrockSource, OutputEntity};
use crate::config::PipelineConfig;
use crate::download::ArchiveDownloader;
use crate::error::{PipelineError, Result};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::resolver::DescriptorBuilder;
use crate::resource_pack::ContentExtractor;
use crate::version::{is_alias, VersionResolver};
use cache::{remove_if_exists, write_atomic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Stage of a generation run, reported through [`Progress::Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStage {
    Resolving,
    Downloading,
    Extracting,
    ExtractingSecondaryContent,
    BuildingAtlas,
    BuildingDescriptors,
    Saving,
}

impl std::fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GenerationStage::Resolving => "resolving",
            GenerationStage::Downloading => "downloading",
            GenerationStage::Extracting => "extracting",
            GenerationStage::ExtractingSecondaryContent => "extracting-secondary-content",
            GenerationStage::BuildingAtlas => "building-atlas",
            GenerationStage::BuildingDescriptors => "building-descriptors",
            GenerationStage::Saving => "saving",
        };
        f.write_str(name)
    }
}

/// Progress events emitted during generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Stage(GenerationStage),
    Download { received: u64, total: Option<u64> },
}

/// Options for one [`AssetPipeline::generate`] call.
#[derive(Default)]
pub struct GenerateOptions<'a> {
    /// Regenerate even if the cache is valid.
    pub force: bool,
    /// Extra texture categories to copy to the raw asset cache.
    pub ensure_raw_assets: Vec<String>,
    /// Abort the run once this much time has passed.
    pub timeout: Option<Duration>,
    /// External cancellation.
    pub cancel: Option<CancellationToken>,
    pub progress: Option<&'a (dyn Fn(Progress) + Sync)>,
}

impl<'a> GenerateOptions<'a> {
    pub fn forced() -> Self {
        Self {
            force: true,
            ..Default::default()
        }
    }

    fn report(&self, event: Progress) {
        if let Some(progress) = self.progress {
            progress(event);
        }
    }

    fn token(&self) -> CancellationToken {
        let base = self.cancel.clone().unwrap_or_default();
        match self.timeout {
            Some(timeout) => base.with_deadline_after(timeout),
            None => base,
        }
    }

    /// Requested categories, deduplicated and sorted.
    fn raw_categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .ensure_raw_assets
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }
}

/// The artifact set for one version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAssets {
    pub version: String,
    pub texture_path: PathBuf,
    pub block_states_path: PathBuf,
    /// `None` when the secondary content stage was skipped or failed.
    pub entities_path: Option<PathBuf>,
    pub raw_assets_path: PathBuf,
    pub from_cache: bool,
    pub generated_at: DateTime<Utc>,
    pub atlas_info: AtlasInfo,
}

/// Success payload of the generation trigger surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub version: String,
    pub from_cache: bool,
    pub atlas_info: AtlasInfo,
    pub generated_at: DateTime<Utc>,
}

impl From<&GeneratedAssets> for GenerateResponse {
    fn from(assets: &GeneratedAssets) -> Self {
        Self {
            success: true,
            version: assets.version.clone(),
            from_cache: assets.from_cache,
            atlas_info: assets.atlas_info.clone(),
            generated_at: assets.generated_at,
        }
    }
}

/// Structured failure payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub error: String,
}

impl From<&PipelineError> for ErrorResponse {
    fn from(err: &PipelineError) -> Self {
        Self {
            success: false,
            code: err.code().to_string(),
            error: err.to_string(),
        }
    }
}

/// Owns every stage component; construct once and share.
pub struct AssetPipeline {
    config: PipelineConfig,
    layout: CacheLayout,
    resolver: VersionResolver,
    downloader: ArchiveDownloader,
    extractor: ContentExtractor,
    bedrock: Option<BedrockSource>,
}

impl AssetPipeline {
    pub fn new(config: PipelineConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let layout = CacheLayout::new(&config.cache_root);
        let resolver = VersionResolver::new(
            Arc::clone(&transport),
            config.manifest_url.clone(),
            config.manifest_ttl,
        );
        let downloader = ArchiveDownloader::new(Arc::clone(&transport), layout.jars_dir());
        let extractor = ContentExtractor::new(layout.extracted_dir());
        let bedrock = config
            .bedrock
            .clone()
            .map(|bedrock| BedrockSource::new(Arc::clone(&transport), bedrock, layout.bedrock_dir()));

        Self {
            config,
            layout,
            resolver,
            downloader,
            extractor,
            bedrock,
        }
    }

    /// Build a pipeline on the production HTTP client.
    pub fn with_default_transport(config: PipelineConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.http_timeout)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    /// Cached versions with completeness flags.
    pub fn status(&self) -> Result<Vec<VersionStatus>> {
        self.layout.status()
    }

    /// Produce (or reuse) the artifact set for a version or alias.
    pub fn generate(&self, version: &str, options: GenerateOptions<'_>) -> Result<GeneratedAssets> {
        let cancel = options.token();
        let categories = options.raw_categories();

        // Aliases need the manifest; concrete ids can be served from disk
        // without touching the network.
        let id = if is_alias(version) {
            self.resolver.resolve_id(version)?
        } else {
            version.to_string()
        };
        validate_id(version, &id)?;

        if !options.force {
            if let Some(assets) = self.cached(&id, &categories) {
                return Ok(assets);
            }
        }

        let lock = GenerationLock::acquire(&self.layout.lock_path(&id), &self.config.lock, &cancel)?;

        // Whoever held the lock may have produced what we need.
        if !options.force {
            if let Some(assets) = self.cached(&id, &categories) {
                return Ok(assets);
            }
        }

        let result = self.run(&id, &categories, &options, &cancel);
        drop(lock);
        if result.is_err() {
            // Only succeeds when the failed run left nothing behind.
            let _ = std::fs::remove_dir(self.layout.generated_dir(&id));
        }
        result
    }

    fn cached(&self, id: &str, categories: &[String]) -> Option<GeneratedAssets> {
        let meta = self.layout.check(id, categories)?;
        tracing::info!(version = %id, "serving generated assets from cache");
        Some(self.assets(id, meta, true))
    }

    fn assets(&self, id: &str, meta: CacheMeta, from_cache: bool) -> GeneratedAssets {
        let entities_path = self.layout.entities_path(id);
        GeneratedAssets {
            version: id.to_string(),
            texture_path: self.layout.textures_path(id),
            block_states_path: self.layout.block_states_path(id),
            entities_path: entities_path.is_file().then_some(entities_path),
            raw_assets_path: self.layout.raw_assets_dir(id),
            from_cache,
            generated_at: meta.generated_at,
            atlas_info: meta.atlas_info,
        }
    }

    fn run(
        &self,
        id: &str,
        categories: &[String],
        options: &GenerateOptions<'_>,
        cancel: &CancellationToken,
    ) -> Result<GeneratedAssets> {
        let stage = |stage: GenerationStage| {
            tracing::info!(version = %id, stage = %stage, "generation stage");
            options.report(Progress::Stage(stage));
        };

        stage(GenerationStage::Resolving);
        let resolved = self.resolver.resolve(id)?;
        cancel.check()?;

        stage(GenerationStage::Downloading);
        let on_bytes = |received: u64, total: Option<u64>| {
            options.report(Progress::Download { received, total });
        };
        let download = self.downloader.download(&resolved, cancel, Some(&on_bytes))?;

        stage(GenerationStage::Extracting);
        // Extraction rewrites the raw asset tree, so the old artifacts stop
        // being a valid cache until a new meta file lands.
        remove_if_exists(&self.layout.meta_path(id))?;
        let content = self
            .extractor
            .extract(&download.path, id, categories, cancel)?;

        stage(GenerationStage::ExtractingSecondaryContent);
        let entities = self.secondary_content(id, cancel)?;

        stage(GenerationStage::BuildingAtlas);
        let atlas_config = &self.config.atlas;
        let atlas = AtlasBuilder::new(atlas_config.tile_size, atlas_config.max_size).build(&content.textures)?;
        cancel.check()?;

        stage(GenerationStage::BuildingDescriptors);
        let block_states = DescriptorBuilder::new(&content.models, &atlas).build(&content.block_states)?;
        cancel.check()?;

        stage(GenerationStage::Saving);
        write_atomic(&self.layout.textures_path(id), &atlas.to_png()?)?;
        write_atomic(
            &self.layout.animation_path(id),
            &encode_animation_lookup(&atlas).to_png()?,
        )?;
        match encode_frame_order(&atlas) {
            Some(image) => write_atomic(&self.layout.frame_order_path(id), &image.to_png()?)?,
            None => remove_if_exists(&self.layout.frame_order_path(id))?,
        }
        write_atomic(
            &self.layout.block_states_path(id),
            &serde_json::to_vec(&block_states)?,
        )?;
        match &entities {
            Some(entities) => write_atomic(&self.layout.entities_path(id), &serde_json::to_vec(entities)?)?,
            None => remove_if_exists(&self.layout.entities_path(id))?,
        }

        let meta = CacheMeta {
            generated_at: Utc::now(),
            atlas_info: atlas.info(),
            ensure_raw_assets_requested: categories.to_vec(),
        };
        self.layout.write_meta(id, &meta)?;

        tracing::info!(
            version = %id,
            tiles = meta.atlas_info.tile_count,
            size = meta.atlas_info.width,
            block_states = block_states.len(),
            entities = entities.as_ref().map(|e| e.len()).unwrap_or(0),
            "generation complete"
        );

        Ok(self.assets(id, meta, false))
    }

    /// Run the secondary stage. Only cancellation propagates; any other
    /// failure leaves the run without entity descriptors.
    fn secondary_content(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<BTreeMap<String, OutputEntity>>> {
        let Some(source) = &self.bedrock else {
            tracing::debug!(version = %id, "secondary content disabled");
            return Ok(None);
        };

        match source.extract(cancel) {
            Ok(content) => Ok(Some(transform(&content))),
            Err(PipelineError::Cancelled) => Err(PipelineError::Cancelled),
            Err(e) => {
                tracing::warn!(version = %id, error = %e, "secondary content failed, continuing without entities");
                Ok(None)
            }
        }
    }
}

/// Reject ids that would escape the cache directories.
fn validate_id(requested: &str, id: &str) -> Result<()> {
    let single_component = Path::new(id).file_name().is_some_and(|name| name == id);
    if id.is_empty() || id.starts_with('.') || !single_component || id.contains(['/', '\\']) {
        return Err(PipelineError::VersionNotFound {
            requested: requested.to_string(),
            closest: None,
        });
    }
    Ok(())
}
