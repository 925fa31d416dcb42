//! On-disk cache layout, metadata and validity checks.
//!
//! ```text
//! {root}/jars/{version}.jar
//! {root}/extracted/{version}/{category}/...
//! {root}/generated/{version}/textures.png
//!                           /animation.png
//!                           /frame_order.png
//!                           /blockstates.json
//!                           /entities.json
//!                           /meta.json
//!                           /.generate.lock
//! {root}/bedrock/bedrock-samples.zip
//! ```

use crate::atlas::AtlasInfo;
use crate::error::{PipelineError, Result};
use crate::resource_pack::extractor::BLOCK_CATEGORY;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TEXTURES_FILE: &str = "textures.png";
pub const ANIMATION_FILE: &str = "animation.png";
pub const FRAME_ORDER_FILE: &str = "frame_order.png";
pub const BLOCK_STATES_FILE: &str = "blockstates.json";
pub const ENTITIES_FILE: &str = "entities.json";
pub const META_FILE: &str = "meta.json";
pub const LOCK_FILE: &str = ".generate.lock";

/// Sidecar record written last; its presence marks a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMeta {
    pub generated_at: DateTime<Utc>,
    pub atlas_info: AtlasInfo,
    #[serde(default)]
    pub ensure_raw_assets_requested: Vec<String>,
}

/// Per-version completeness flags for the status surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionStatus {
    pub version: String,
    pub has_archive: bool,
    pub has_textures: bool,
    pub has_block_states: bool,
    pub has_entities: bool,
    pub has_meta: bool,
    pub complete: bool,
}

/// Paths under the cache root.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn jars_dir(&self) -> PathBuf {
        self.root.join("jars")
    }

    pub fn archive_path(&self, version: &str) -> PathBuf {
        self.jars_dir().join(format!("{}.jar", version))
    }

    pub fn extracted_dir(&self) -> PathBuf {
        self.root.join("extracted")
    }

    pub fn raw_assets_dir(&self, version: &str) -> PathBuf {
        self.extracted_dir().join(version)
    }

    pub fn bedrock_dir(&self) -> PathBuf {
        self.root.join("bedrock")
    }

    pub fn generated_root(&self) -> PathBuf {
        self.root.join("generated")
    }

    pub fn generated_dir(&self, version: &str) -> PathBuf {
        self.generated_root().join(version)
    }

    pub fn textures_path(&self, version: &str) -> PathBuf {
        self.generated_dir(version).join(TEXTURES_FILE)
    }

    pub fn animation_path(&self, version: &str) -> PathBuf {
        self.generated_dir(version).join(ANIMATION_FILE)
    }

    pub fn frame_order_path(&self, version: &str) -> PathBuf {
        self.generated_dir(version).join(FRAME_ORDER_FILE)
    }

    pub fn block_states_path(&self, version: &str) -> PathBuf {
        self.generated_dir(version).join(BLOCK_STATES_FILE)
    }

    pub fn entities_path(&self, version: &str) -> PathBuf {
        self.generated_dir(version).join(ENTITIES_FILE)
    }

    pub fn meta_path(&self, version: &str) -> PathBuf {
        self.generated_dir(version).join(META_FILE)
    }

    pub fn lock_path(&self, version: &str) -> PathBuf {
        self.generated_dir(version).join(LOCK_FILE)
    }

    /// Read `meta.json`. A missing or unreadable file is a miss.
    pub fn read_meta(&self, version: &str) -> Option<CacheMeta> {
        let path = self.meta_path(version);
        let contents = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&contents) {
            Ok(meta) => Some(meta),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable cache metadata");
                None
            }
        }
    }

    pub fn write_meta(&self, version: &str, meta: &CacheMeta) -> Result<()> {
        write_atomic(&self.meta_path(version), &serde_json::to_vec_pretty(meta)?)
    }

    /// Return the cached metadata if the generated set satisfies the request.
    ///
    /// A hit needs the core artifacts and metadata on disk, every requested
    /// raw category present and non-empty, and a recorded request that
    /// covers the current one.
    pub fn check(&self, version: &str, ensure_raw_assets: &[String]) -> Option<CacheMeta> {
        let required = [
            self.textures_path(version),
            self.block_states_path(version),
            self.meta_path(version),
        ];
        if let Some(missing) = required.iter().find(|p| !p.is_file()) {
            tracing::debug!(version, missing = %missing.display(), "cache miss");
            return None;
        }

        let raw_dir = self.raw_assets_dir(version);
        for category in std::iter::once(BLOCK_CATEGORY).chain(ensure_raw_assets.iter().map(String::as_str)) {
            if !dir_has_entries(&raw_dir.join(category)) {
                tracing::debug!(version, category, "cache miss: raw assets missing");
                return None;
            }
        }

        let meta = self.read_meta(version)?;
        let recorded: BTreeSet<&str> = meta
            .ensure_raw_assets_requested
            .iter()
            .map(String::as_str)
            .collect();
        if let Some(category) = ensure_raw_assets.iter().find(|c| !recorded.contains(c.as_str())) {
            tracing::debug!(version, category = %category, "cache miss: raw category not recorded");
            return None;
        }

        Some(meta)
    }

    /// Every version with any cached state, sorted by id.
    pub fn status(&self) -> Result<Vec<VersionStatus>> {
        let mut versions = BTreeSet::new();

        for entry in read_dir_if_exists(&self.generated_root())? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                versions.insert(entry.file_name().to_string_lossy().into_owned());
            }
        }
        for entry in read_dir_if_exists(&self.jars_dir())? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "jar") {
                if let Some(stem) = path.file_stem() {
                    versions.insert(stem.to_string_lossy().into_owned());
                }
            }
        }

        Ok(versions
            .into_iter()
            .map(|version| {
                let has_textures = self.textures_path(&version).is_file();
                let has_block_states = self.block_states_path(&version).is_file();
                let has_meta = self.meta_path(&version).is_file();
                VersionStatus {
                    has_archive: self.archive_path(&version).is_file(),
                    has_entities: self.entities_path(&version).is_file(),
                    complete: has_textures && has_block_states && has_meta,
                    has_textures,
                    has_block_states,
                    has_meta,
                    version,
                }
            })
            .collect())
    }
}

fn dir_has_entries(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn read_dir_if_exists(path: &Path) -> Result<Vec<std::io::Result<std::fs::DirEntry>>> {
    match std::fs::read_dir(path) {
        Ok(entries) => Ok(entries.collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Write to a temp sibling and rename over `path`, so readers never see a
/// partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| PipelineError::Io(std::io::Error::other("path has no parent directory")))?;
    std::fs::create_dir_all(parent)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.persist(path).map_err(|e| PipelineError::Io(e.error))?;
    Ok(())
}

/// Remove a file if present.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
