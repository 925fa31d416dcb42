//! Upstream manifest documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The top-level version manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<ManifestEntry>,
}

/// Pointers to the current release and snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// One version as listed in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: VersionKind,
    /// URL of the per-version detail document.
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(rename = "releaseTime")]
    pub release_time: DateTime<Utc>,
}

/// Symbolic names that map onto the manifest's `latest` pointers.
pub const VERSION_ALIASES: &[&str] = &["latest", "latest-release", "release", "snapshot", "latest-snapshot"];

/// Whether `request` must be looked up in the manifest to get a concrete id.
pub fn is_alias(request: &str) -> bool {
    VERSION_ALIASES.contains(&request)
}

impl VersionManifest {
    /// Find a version by exact id.
    pub fn get(&self, id: &str) -> Option<&ManifestEntry> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// Map an alias to a concrete id. Non-alias requests pass through.
    pub fn resolve_alias<'a>(&'a self, request: &'a str) -> &'a str {
        match request {
            "latest" | "latest-release" | "release" => &self.latest.release,
            "snapshot" | "latest-snapshot" => &self.latest.snapshot,
            other => other,
        }
    }
}

/// Release channel of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionKind {
    Release,
    Snapshot,
    #[serde(alias = "old_beta", alias = "old_alpha")]
    Legacy,
}

impl std::fmt::Display for VersionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionKind::Release => write!(f, "release"),
            VersionKind::Snapshot => write!(f, "snapshot"),
            VersionKind::Legacy => write!(f, "legacy"),
        }
    }
}

/// The per-version detail document (only the parts the pipeline reads).
#[derive(Debug, Clone, Deserialize)]
pub struct VersionDetail {
    pub id: String,
    pub downloads: VersionDownloads,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionDownloads {
    pub client: DownloadArtifact,
}

/// A downloadable, digest-addressed file.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub url: String,
    pub sha1: String,
    pub size: u64,
}
