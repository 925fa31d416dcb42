//! Streaming extraction of block assets from a client archive.
//!
//! Entries are read one at a time and filtered by path prefix. Only block
//! textures, blockstates and block models are parsed; other texture
//! categories can be copied to the raw asset cache on request.

use super::texture::{image_dimensions, parse_mcmeta, AnimationMeta, ExtractedTexture, TextureAnimation};
use super::{BlockModel, BlockstateDefinition};
use crate::error::Result;
use crate::pipeline::CancellationToken;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

const TEXTURES_PREFIX: &str = "assets/minecraft/textures/";
const BLOCKSTATES_PREFIX: &str = "assets/minecraft/blockstates/";
const MODELS_PREFIX: &str = "assets/minecraft/models/";

/// Texture category that feeds the atlas.
pub const BLOCK_CATEGORY: &str = "block";

/// A named blockstate definition.
#[derive(Debug, Clone)]
pub struct ExtractedBlockState {
    /// Block id without namespace, e.g. `oak_log`.
    pub name: String,
    pub definition: BlockstateDefinition,
}

/// A named, unresolved block model.
#[derive(Debug, Clone)]
pub struct ExtractedModel {
    /// Model path without namespace, e.g. `block/oak_log`.
    pub name: String,
    pub model: BlockModel,
}

/// Everything the descriptor and atlas stages need from one archive.
#[derive(Debug, Clone, Default)]
pub struct ExtractedContent {
    pub textures: Vec<ExtractedTexture>,
    pub block_states: Vec<ExtractedBlockState>,
    pub models: Vec<ExtractedModel>,
    /// `{cache_root}/extracted/{version}`.
    pub raw_assets_dir: PathBuf,
}

/// What an archive entry is, judged by its path.
#[derive(Debug, PartialEq, Eq)]
enum EntryKind<'a> {
    BlockState { name: &'a str },
    Model { name: &'a str },
    Texture { category: &'a str, name: &'a str },
    TextureMeta { category: &'a str, name: &'a str },
}

/// Classify an entry path. Returns `None` for anything outside the subtrees
/// of interest.
fn classify(path: &str) -> Option<EntryKind<'_>> {
    if let Some(rest) = path.strip_prefix(BLOCKSTATES_PREFIX) {
        let name = rest.strip_suffix(".json")?;
        return (!name.contains('/')).then_some(EntryKind::BlockState { name });
    }

    if let Some(rest) = path.strip_prefix(MODELS_PREFIX) {
        let name = rest.strip_suffix(".json")?;
        return name
            .starts_with("block/")
            .then_some(EntryKind::Model { name });
    }

    if let Some(rest) = path.strip_prefix(TEXTURES_PREFIX) {
        let (category, _) = rest.split_once('/')?;
        if let Some(name) = rest.strip_suffix(".png.mcmeta") {
            return Some(EntryKind::TextureMeta { category, name });
        }
        if let Some(name) = rest.strip_suffix(".png") {
            return Some(EntryKind::Texture { category, name });
        }
    }

    None
}

/// Extracts block assets into memory and raw textures onto disk.
pub struct ContentExtractor {
    extracted_root: PathBuf,
}

impl ContentExtractor {
    pub fn new(extracted_root: impl Into<PathBuf>) -> Self {
        Self {
            extracted_root: extracted_root.into(),
        }
    }

    /// Raw asset directory for a version.
    pub fn raw_assets_dir(&self, version: &str) -> PathBuf {
        self.extracted_root.join(version)
    }

    /// Stream the archive and collect block assets.
    ///
    /// `extra_categories` names texture folders (e.g. `entity`) that are
    /// copied to the raw asset cache without entering the atlas.
    pub fn extract(
        &self,
        archive_path: &Path,
        version: &str,
        extra_categories: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExtractedContent> {
        let raw_dir = self.raw_assets_dir(version);
        if raw_dir.exists() {
            std::fs::remove_dir_all(&raw_dir)?;
        }
        std::fs::create_dir_all(&raw_dir)?;

        let file = BufReader::new(File::open(archive_path)?);
        let mut archive = zip::ZipArchive::new(file)?;

        let mut content = ExtractedContent {
            raw_assets_dir: raw_dir.clone(),
            ..Default::default()
        };

        // Sidecar metadata may precede its image in the archive, so it is
        // reconciled after all entries have been seen.
        let mut pending_meta: HashMap<String, AnimationMeta> = HashMap::new();

        for i in 0..archive.len() {
            cancel.check()?;

            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let entry_path = file.name().to_string();

            let Some(kind) = classify(&entry_path) else {
                continue;
            };

            match kind {
                EntryKind::BlockState { name } => {
                    let contents = read_bytes(&mut file)?;
                    match serde_json::from_slice::<BlockstateDefinition>(&contents) {
                        Ok(definition) => content.block_states.push(ExtractedBlockState {
                            name: name.to_string(),
                            definition,
                        }),
                        Err(e) => {
                            tracing::warn!(entry = %entry_path, error = %e, "skipping malformed blockstate")
                        }
                    }
                }
                EntryKind::Model { name } => {
                    let contents = read_bytes(&mut file)?;
                    match serde_json::from_slice::<BlockModel>(&contents) {
                        Ok(model) => content.models.push(ExtractedModel {
                            name: name.to_string(),
                            model,
                        }),
                        Err(e) => {
                            tracing::warn!(entry = %entry_path, error = %e, "skipping malformed model")
                        }
                    }
                }
                EntryKind::Texture { category, name } => {
                    let wanted = category == BLOCK_CATEGORY
                        || extra_categories.iter().any(|c| c == category);
                    if !wanted {
                        continue;
                    }

                    let mut bytes = Vec::with_capacity(file.size() as usize);
                    file.read_to_end(&mut bytes)?;
                    write_raw(&raw_dir, &format!("{}.png", name), &bytes)?;

                    if category == BLOCK_CATEGORY {
                        content.textures.push(ExtractedTexture {
                            name: name.to_string(),
                            source_path: entry_path.clone(),
                            bytes,
                            animation: None,
                        });
                    }
                }
                EntryKind::TextureMeta { category, name } => {
                    if category != BLOCK_CATEGORY {
                        continue;
                    }
                    let contents = read_bytes(&mut file)?;
                    write_raw(&raw_dir, &format!("{}.png.mcmeta", name), &contents)?;

                    let contents = match std::str::from_utf8(&contents) {
                        Ok(contents) => contents,
                        Err(e) => {
                            tracing::warn!(entry = %entry_path, error = %e, "skipping animation metadata that is not UTF-8");
                            continue;
                        }
                    };
                    match parse_mcmeta(contents) {
                        Ok(Some(meta)) => {
                            pending_meta.insert(name.to_string(), meta);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(entry = %entry_path, error = %e, "skipping malformed animation metadata")
                        }
                    }
                }
            }
        }

        for texture in &mut content.textures {
            let Some(meta) = pending_meta.remove(&texture.name) else {
                continue;
            };
            match image_dimensions(&texture.bytes) {
                Ok((width, height)) => {
                    texture.animation = TextureAnimation::from_meta(meta, width, height);
                }
                Err(e) => {
                    tracing::warn!(texture = %texture.name, error = %e, "cannot read image header, dropping animation")
                }
            }
        }
        for name in pending_meta.keys() {
            tracing::debug!(texture = %name, "animation metadata without image");
        }

        content.textures.sort_by(|a, b| a.name.cmp(&b.name));
        content.block_states.sort_by(|a, b| a.name.cmp(&b.name));
        content.models.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::info!(
            version,
            textures = content.textures.len(),
            animated = content.textures.iter().filter(|t| t.is_animated()).count(),
            block_states = content.block_states.len(),
            models = content.models.len(),
            "extracted archive content"
        );

        Ok(content)
    }
}

fn read_bytes(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut contents = Vec::new();
    reader.read_to_end(&mut contents)?;
    Ok(contents)
}

fn write_raw(raw_dir: &Path, relative: &str, bytes: &[u8]) -> Result<()> {
    let path = raw_dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png, write_zip};

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("assets/minecraft/blockstates/stone.json"),
            Some(EntryKind::BlockState { name: "stone" })
        );
        assert_eq!(
            classify("assets/minecraft/models/block/stone.json"),
            Some(EntryKind::Model { name: "block/stone" })
        );
        assert_eq!(classify("assets/minecraft/models/item/stick.json"), None);
        assert_eq!(
            classify("assets/minecraft/textures/block/stone.png"),
            Some(EntryKind::Texture { category: "block", name: "block/stone" })
        );
        assert_eq!(
            classify("assets/minecraft/textures/block/water_still.png.mcmeta"),
            Some(EntryKind::TextureMeta { category: "block", name: "block/water_still" })
        );
        assert_eq!(
            classify("assets/minecraft/textures/entity/cow/cow.png"),
            Some(EntryKind::Texture { category: "entity", name: "entity/cow/cow" })
        );
        assert_eq!(classify("pack.mcmeta"), None);
        assert_eq!(classify("data/minecraft/recipes/test.json"), None);
        assert_eq!(classify("net/minecraft/client/Main.class"), None);
    }

    fn fixture_archive(path: &Path) {
        let water_meta = br#"{ "animation": { "frametime": 2, "interpolate": true } }"#.to_vec();
        write_zip(
            path,
            &[
                ("assets/minecraft/textures/block/", Vec::new()),
                // Sidecar appears before its image.
                ("assets/minecraft/textures/block/water_still.png.mcmeta", water_meta),
                ("assets/minecraft/textures/block/water_still.png", png(16, 64, [0, 0, 255, 255])),
                ("assets/minecraft/textures/block/stone.png", png(16, 16, [128, 128, 128, 255])),
                // Metadata on a single-frame image is discarded.
                (
                    "assets/minecraft/textures/block/lever.png.mcmeta",
                    br#"{ "animation": {} }"#.to_vec(),
                ),
                ("assets/minecraft/textures/block/lever.png", png(16, 16, [1, 2, 3, 255])),
                ("assets/minecraft/textures/entity/cow/cow.png", png(64, 32, [90, 60, 30, 255])),
                ("assets/minecraft/textures/item/stick.png", png(16, 16, [90, 60, 30, 255])),
                (
                    "assets/minecraft/blockstates/stone.json",
                    br#"{ "variants": { "": { "model": "minecraft:block/stone" } } }"#.to_vec(),
                ),
                ("assets/minecraft/blockstates/broken.json", b"{ not json".to_vec()),
                (
                    "assets/minecraft/models/block/stone.json",
                    br#"{ "parent": "block/cube_all", "textures": { "all": "block/stone" } }"#.to_vec(),
                ),
                ("assets/minecraft/models/block/broken.json", b"[1, 2".to_vec()),
                ("net/minecraft/client/Main.class", vec![0xCA, 0xFE, 0xBA, 0xBE]),
            ],
        );
    }

    #[test]
    fn test_extract_block_assets() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("1.21.4.jar");
        fixture_archive(&archive);

        let extractor = ContentExtractor::new(dir.path().join("extracted"));
        let content = extractor
            .extract(&archive, "1.21.4", &[], &CancellationToken::new())
            .unwrap();

        let names: Vec<_> = content.textures.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["block/lever", "block/stone", "block/water_still"]);

        let water = content.textures.iter().find(|t| t.name == "block/water_still").unwrap();
        let anim = water.animation.as_ref().unwrap();
        assert_eq!(anim.frame_count, 4);
        assert_eq!(anim.frame_duration_ticks, 2);
        assert!(anim.interpolate);
        assert_eq!(water.source_path, "assets/minecraft/textures/block/water_still.png");

        let lever = content.textures.iter().find(|t| t.name == "block/lever").unwrap();
        assert!(lever.animation.is_none());

        assert_eq!(content.block_states.len(), 1);
        assert_eq!(content.block_states[0].name, "stone");
        assert_eq!(content.models.len(), 1);
        assert_eq!(content.models[0].name, "block/stone");

        assert!(content.raw_assets_dir.join("block/stone.png").is_file());
        assert!(content.raw_assets_dir.join("block/water_still.png.mcmeta").is_file());
        assert!(!content.raw_assets_dir.join("entity").exists());
    }

    #[test]
    fn test_extract_extra_categories() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("1.21.4.jar");
        fixture_archive(&archive);

        let extractor = ContentExtractor::new(dir.path().join("extracted"));
        let content = extractor
            .extract(&archive, "1.21.4", &["entity".to_string()], &CancellationToken::new())
            .unwrap();

        assert!(content.raw_assets_dir.join("entity/cow/cow.png").is_file());
        assert!(!content.raw_assets_dir.join("item").exists());
        assert!(content.textures.iter().all(|t| t.name.starts_with("block/")));
    }

    #[test]
    fn test_non_utf8_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("1.21.4.jar");
        let garbage = vec![0xFF, 0xFE, b'{', b'}'];
        write_zip(
            &archive,
            &[
                ("assets/minecraft/blockstates/bad.json", garbage.clone()),
                (
                    "assets/minecraft/blockstates/stone.json",
                    br#"{ "variants": { "": { "model": "minecraft:block/stone" } } }"#.to_vec(),
                ),
                ("assets/minecraft/models/block/bad.json", garbage.clone()),
                (
                    "assets/minecraft/models/block/stone.json",
                    br#"{ "parent": "block/cube_all", "textures": { "all": "block/stone" } }"#.to_vec(),
                ),
                ("assets/minecraft/textures/block/fire.png.mcmeta", garbage),
                ("assets/minecraft/textures/block/fire.png", png(16, 32, [255, 128, 0, 255])),
            ],
        );

        let extractor = ContentExtractor::new(dir.path().join("extracted"));
        let content = extractor
            .extract(&archive, "1.21.4", &[], &CancellationToken::new())
            .unwrap();

        assert_eq!(content.block_states.len(), 1);
        assert_eq!(content.block_states[0].name, "stone");
        assert_eq!(content.models.len(), 1);
        assert_eq!(content.models[0].name, "block/stone");
        assert_eq!(content.textures.len(), 1);
        assert!(content.textures[0].animation.is_none());
    }

    #[test]
    fn test_extract_honours_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("1.21.4.jar");
        fixture_archive(&archive);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let extractor = ContentExtractor::new(dir.path().join("extracted"));
        let result = extractor.extract(&archive, "1.21.4", &[], &cancel);
        assert!(matches!(result, Err(crate::error::PipelineError::Cancelled)));
    }
}
