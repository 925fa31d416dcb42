//! Download and stream the secondary content archive.

use super::animation::{parse_animation_file, BedrockAnimation};
use super::entity::{parse_entity_file, BedrockEntityDefinition};
use super::geometry::{apply_inheritance, parse_geometry_file, BedrockGeometry};
use crate::config::BedrockConfig;
use crate::error::{PipelineError, Result};
use crate::http::HttpTransport;
use crate::pipeline::CancellationToken;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

const ARCHIVE_FILE: &str = "bedrock-samples.zip";

const GEOMETRY_DIR: &str = "resource_pack/models/entity/";
const ANIMATION_DIR: &str = "resource_pack/animations/";
const ENTITY_DIR: &str = "resource_pack/entity/";

/// Everything extracted from the secondary archive, keyed for lookup.
#[derive(Debug, Clone, Default)]
pub struct BedrockContent {
    /// Geometry id to geometry, with legacy inheritance applied.
    pub geometries: BTreeMap<String, BedrockGeometry>,
    /// Animation id to animation.
    pub animations: BTreeMap<String, BedrockAnimation>,
    pub entities: Vec<BedrockEntityDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subtree {
    Geometry,
    Animation,
    Entity,
}

/// Locate an entry in one of the three subtrees.
///
/// GitHub archives wrap everything in a `<repo>-<ref>/` directory, so the
/// subtree may start at the root or after the first path component.
fn classify(path: &str) -> Option<Subtree> {
    if !path.ends_with(".json") {
        return None;
    }
    let inner = match path.split_once('/') {
        Some((_, rest)) if !path.starts_with("resource_pack/") => rest,
        _ => path,
    };
    if inner.starts_with(GEOMETRY_DIR) {
        Some(Subtree::Geometry)
    } else if inner.starts_with(ANIMATION_DIR) {
        Some(Subtree::Animation)
    } else if inner.starts_with(ENTITY_DIR) {
        Some(Subtree::Entity)
    } else {
        None
    }
}

/// Caches the archive under `{cache_root}/bedrock/` and extracts from it.
pub struct BedrockSource {
    transport: Arc<dyn HttpTransport>,
    config: BedrockConfig,
    cache_dir: PathBuf,
}

impl BedrockSource {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: BedrockConfig,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            config,
            cache_dir: cache_dir.into(),
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.cache_dir.join(ARCHIVE_FILE)
    }

    /// Download the archive unless a cached copy is younger than `max_age`.
    pub fn ensure_archive(&self, cancel: &CancellationToken) -> Result<PathBuf> {
        let path = self.archive_path();
        if let Some(age) = file_age(&path) {
            if age < self.config.max_age {
                tracing::debug!(age_secs = age.as_secs(), "secondary archive cache hit");
                return Ok(path);
            }
            tracing::info!(age_secs = age.as_secs(), "secondary archive expired");
        }

        std::fs::create_dir_all(&self.cache_dir)?;
        tracing::info!(url = %self.config.archive_url, "downloading secondary archive");

        let mut body = self.transport.get(&self.config.archive_url)?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.cache_dir)?;
        let mut buffer = vec![0u8; 64 * 1024];
        let mut received = 0u64;
        loop {
            cancel.check()?;
            let read = body.reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            temp.write_all(&buffer[..read])?;
            received += read as u64;
        }
        temp.flush()?;

        if let Some(expected) = body.content_length {
            if expected != received {
                return Err(PipelineError::Integrity {
                    expected: format!("{} bytes", expected),
                    actual: format!("{} bytes", received),
                });
            }
        }

        temp.persist(&path).map_err(|e| PipelineError::Io(e.error))?;
        tracing::info!(size = received, "secondary archive cached");
        Ok(path)
    }

    /// Ensure the archive and extract its three subtrees.
    pub fn extract(&self, cancel: &CancellationToken) -> Result<BedrockContent> {
        let path = self.ensure_archive(cancel)?;
        read_archive(&path, cancel)
    }
}

fn file_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}

/// Stream an archive and parse every geometry, animation and entity file.
///
/// One bad file never aborts the read; it is logged and skipped.
pub fn read_archive(path: &Path, cancel: &CancellationToken) -> Result<BedrockContent> {
    let mut archive = zip::ZipArchive::new(BufReader::new(File::open(path)?))?;
    let mut content = BedrockContent::default();

    for i in 0..archive.len() {
        cancel.check()?;

        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let entry_path = file.name().to_string();
        let Some(subtree) = classify(&entry_path) else {
            continue;
        };

        let mut contents = String::new();
        if let Err(e) = file.read_to_string(&mut contents) {
            tracing::warn!(entry = %entry_path, error = %e, "skipping unreadable entry");
            continue;
        }

        match subtree {
            Subtree::Geometry => match parse_geometry_file(&contents) {
                Ok(geometries) => {
                    for geometry in geometries {
                        content.geometries.insert(geometry.identifier.clone(), geometry);
                    }
                }
                Err(e) => tracing::warn!(entry = %entry_path, error = %e, "skipping malformed geometry file"),
            },
            Subtree::Animation => match parse_animation_file(&contents) {
                Ok(animations) => content.animations.extend(animations),
                Err(e) => tracing::warn!(entry = %entry_path, error = %e, "skipping malformed animation file"),
            },
            Subtree::Entity => match parse_entity_file(&contents) {
                Ok(entity) => content.entities.push(entity),
                Err(e) => tracing::warn!(entry = %entry_path, error = %e, "skipping malformed entity file"),
            },
        }
    }

    apply_inheritance(&mut content.geometries);
    content.entities.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    tracing::info!(
        geometries = content.geometries.len(),
        animations = content.animations.len(),
        entities = content.entities.len(),
        "extracted secondary content"
    );

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::MemoryTransport;
    use crate::test_support::write_zip;

    const URL: &str = "https://archive.test/bedrock.zip";

    fn fixture_archive(path: &Path) {
        write_zip(
            path,
            &[
                ("bedrock-samples-main/", Vec::new()),
                (
                    "bedrock-samples-main/resource_pack/models/entity/cow.geo.json",
                    br#"{ "minecraft:geometry": [ { "description": { "identifier": "geometry.cow" },
                         "bones": [ { "name": "body" } ] } ] }"#
                        .to_vec(),
                ),
                (
                    "bedrock-samples-main/resource_pack/models/entity/pig.json",
                    br#"{ "geometry.pig": { "bones": [ { "name": "body" } ] },
                         "geometry.pig.v2:geometry.pig": { "bones": [ { "name": "snout" } ] } }"#
                        .to_vec(),
                ),
                (
                    "bedrock-samples-main/resource_pack/models/entity/broken.json",
                    b"{ not json".to_vec(),
                ),
                (
                    "bedrock-samples-main/resource_pack/animations/quadruped.animation.json",
                    br#"{ "animations": { "animation.quadruped.walk": { "loop": true } } }"#.to_vec(),
                ),
                (
                    "bedrock-samples-main/resource_pack/entity/cow.entity.json",
                    br#"{ "minecraft:client_entity": { "description": {
                         "identifier": "minecraft:cow", "geometry": { "default": "geometry.cow" },
                         "animations": { "walk": "animation.quadruped.walk" } } } }"#
                        .to_vec(),
                ),
                (
                    "bedrock-samples-main/behavior_pack/entities/cow.json",
                    b"{}".to_vec(),
                ),
            ],
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("bedrock-samples-main/resource_pack/models/entity/cow.geo.json"),
            Some(Subtree::Geometry)
        );
        assert_eq!(classify("resource_pack/entity/cow.entity.json"), Some(Subtree::Entity));
        assert_eq!(
            classify("x/resource_pack/animations/a.json"),
            Some(Subtree::Animation)
        );
        assert_eq!(classify("x/resource_pack/textures/cow.png"), None);
        assert_eq!(classify("x/behavior_pack/entities/cow.json"), None);
        assert_eq!(classify("x/y/resource_pack/entity/cow.json"), None);
    }

    #[test]
    fn test_read_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("samples.zip");
        fixture_archive(&archive);

        let content = read_archive(&archive, &CancellationToken::new()).unwrap();
        assert_eq!(content.geometries.len(), 3);
        assert_eq!(content.animations.len(), 1);
        assert_eq!(content.entities.len(), 1);

        let names: Vec<_> = content.geometries["geometry.pig.v2"]
            .bones
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(names, vec!["snout", "body"]);
    }

    #[test]
    fn test_archive_is_cached_by_age() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("fixture.zip");
        fixture_archive(&zip_path);

        let transport = Arc::new(MemoryTransport::new());
        transport.serve(URL, std::fs::read(&zip_path).unwrap());

        let config = BedrockConfig {
            archive_url: URL.to_string(),
            max_age: Duration::from_secs(3600),
        };
        let source = BedrockSource::new(transport.clone(), config, dir.path().join("bedrock"));
        let cancel = CancellationToken::new();

        let content = source.extract(&cancel).unwrap();
        assert_eq!(content.entities.len(), 1);
        source.extract(&cancel).unwrap();
        assert_eq!(transport.requests_for(URL), 1);

        // A zero max age always refetches.
        let config = BedrockConfig {
            archive_url: URL.to_string(),
            max_age: Duration::ZERO,
        };
        let source = BedrockSource::new(transport.clone(), config, dir.path().join("bedrock"));
        source.ensure_archive(&cancel).unwrap();
        assert_eq!(transport.requests_for(URL), 2);
    }

    #[test]
    fn test_download_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = BedrockSource::new(
            Arc::new(MemoryTransport::new()),
            BedrockConfig {
                archive_url: URL.to_string(),
                max_age: Duration::from_secs(60),
            },
            dir.path(),
        );
        assert!(matches!(
            source.ensure_archive(&CancellationToken::new()),
            Err(PipelineError::Http { .. })
        ));
        assert!(!source.archive_path().exists());
    }
}
