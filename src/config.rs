//! Pipeline configuration.
//!
//! Every knob has a working default. A TOML file can override any subset;
//! durations in the file are whole seconds.

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upstream manifest listing every published client version.
pub const DEFAULT_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Community sample pack with entity geometry, animations and client entity files.
pub const DEFAULT_BEDROCK_ARCHIVE_URL: &str =
    "https://github.com/Mojang/bedrock-samples/archive/refs/heads/main.zip";

/// Atlas packing settings.
#[derive(Debug, Clone)]
pub struct AtlasConfig {
    /// Edge length of one tile in pixels.
    pub tile_size: u32,
    /// Largest allowed atlas edge in pixels.
    pub max_size: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            tile_size: 16,
            max_size: 4096,
        }
    }
}

/// Generation lock timing.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Delay between acquisition attempts.
    pub retry_interval: Duration,
    /// Give up after waiting this long.
    pub timeout: Duration,
    /// A lock file older than this is considered abandoned.
    pub stale_after: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(60),
            stale_after: Duration::from_secs(15 * 60),
        }
    }
}

/// Secondary content archive settings.
#[derive(Debug, Clone)]
pub struct BedrockConfig {
    /// Where to download the archive from.
    pub archive_url: String,
    /// Re-download once the cached copy is older than this.
    pub max_age: Duration,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            archive_url: DEFAULT_BEDROCK_ARCHIVE_URL.to_string(),
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Main pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the on-disk cache (`jars/`, `extracted/`, `generated/`).
    pub cache_root: PathBuf,
    /// Version manifest URL.
    pub manifest_url: String,
    /// How long a fetched manifest stays fresh in memory.
    pub manifest_ttl: Duration,
    /// How long to wait for a connection to an upstream host.
    pub http_timeout: Duration,
    /// Atlas packing settings.
    pub atlas: AtlasConfig,
    /// Lock timing.
    pub lock: LockConfig,
    /// Secondary content settings; `None` skips the entity stage.
    pub bedrock: Option<BedrockConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_root: PathBuf::from(".asset-cache"),
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            manifest_ttl: Duration::from_secs(60 * 60),
            http_timeout: Duration::from_secs(30),
            atlas: AtlasConfig::default(),
            lock: LockConfig::default(),
            bedrock: Some(BedrockConfig::default()),
        }
    }
}

impl PipelineConfig {
    /// Create config rooted at a specific cache directory.
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = root.into();
        self
    }

    /// Point the resolver at a different manifest.
    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = url.into();
        self
    }

    /// Replace the atlas settings.
    pub fn with_atlas(mut self, atlas: AtlasConfig) -> Self {
        self.atlas = atlas;
        self
    }

    /// Replace the lock timing.
    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    /// Replace (or disable with `None`) the secondary content settings.
    pub fn with_bedrock(mut self, bedrock: Option<BedrockConfig>) -> Self {
        self.bedrock = bedrock;
        self
    }

    /// Load a TOML file on top of the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse TOML overrides on top of the defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)?;
        Ok(file.apply(Self::default()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    cache_root: Option<PathBuf>,
    manifest_url: Option<String>,
    manifest_ttl_secs: Option<u64>,
    http_timeout_secs: Option<u64>,
    atlas: AtlasSection,
    lock: LockSection,
    bedrock: BedrockSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AtlasSection {
    tile_size: Option<u32>,
    max_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LockSection {
    retry_interval_ms: Option<u64>,
    timeout_secs: Option<u64>,
    stale_after_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BedrockSection {
    enabled: Option<bool>,
    archive_url: Option<String>,
    max_age_secs: Option<u64>,
}

impl ConfigFile {
    fn apply(self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(root) = self.cache_root {
            config.cache_root = root;
        }
        if let Some(url) = self.manifest_url {
            config.manifest_url = url;
        }
        if let Some(secs) = self.manifest_ttl_secs {
            config.manifest_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.http_timeout_secs {
            config.http_timeout = Duration::from_secs(secs);
        }

        if let Some(tile_size) = self.atlas.tile_size {
            config.atlas.tile_size = tile_size;
        }
        if let Some(max_size) = self.atlas.max_size {
            config.atlas.max_size = max_size;
        }

        if let Some(ms) = self.lock.retry_interval_ms {
            config.lock.retry_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = self.lock.timeout_secs {
            config.lock.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.lock.stale_after_secs {
            config.lock.stale_after = Duration::from_secs(secs);
        }

        if self.bedrock.enabled == Some(false) {
            config.bedrock = None;
        } else {
            let mut bedrock = config.bedrock.take().unwrap_or_default();
            if let Some(url) = self.bedrock.archive_url {
                bedrock.archive_url = url;
            }
            if let Some(secs) = self.bedrock.max_age_secs {
                bedrock.max_age = Duration::from_secs(secs);
            }
            config.bedrock = Some(bedrock);
        }

        config
    }
}
