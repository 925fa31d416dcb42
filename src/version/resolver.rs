//! Manifest-backed version resolver with an in-memory TTL cache.

use super::manifest::{VersionDetail, VersionKind, VersionManifest};
use crate::error::{PipelineError, Result};
use crate::http::{fetch_json, HttpTransport};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A version request resolved to a concrete downloadable archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVersion {
    pub id: String,
    pub kind: VersionKind,
    pub archive_url: String,
    /// Lowercase hex SHA-1 of the archive.
    pub archive_digest: String,
    pub archive_size: u64,
    pub release_timestamp: DateTime<Utc>,
}

struct CachedManifest {
    fetched_at: Instant,
    manifest: Arc<VersionManifest>,
}

/// Resolves version ids and aliases against the upstream manifest.
pub struct VersionResolver {
    transport: Arc<dyn HttpTransport>,
    manifest_url: String,
    ttl: Duration,
    cache: Mutex<Option<CachedManifest>>,
}

impl VersionResolver {
    pub fn new(transport: Arc<dyn HttpTransport>, manifest_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            transport,
            manifest_url: manifest_url.into(),
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Fetch the manifest, reusing the cached copy while it is fresh.
    pub fn manifest(&self) -> Result<Arc<VersionManifest>> {
        let mut cache = self.cache.lock();

        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.manifest));
            }
        }

        tracing::debug!(url = %self.manifest_url, "fetching version manifest");
        let manifest: VersionManifest = fetch_json(self.transport.as_ref(), &self.manifest_url)?;
        let manifest = Arc::new(manifest);
        *cache = Some(CachedManifest {
            fetched_at: Instant::now(),
            manifest: Arc::clone(&manifest),
        });

        Ok(manifest)
    }

    /// Drop the cached manifest so the next call refetches.
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }

    /// Map an alias to a concrete id without fetching the detail document.
    pub fn resolve_id(&self, request: &str) -> Result<String> {
        let manifest = self.manifest()?;
        let id = manifest.resolve_alias(request);
        if manifest.get(id).is_none() {
            return Err(self.not_found(&manifest, request));
        }
        Ok(id.to_string())
    }

    /// Resolve a version id or alias to its client archive descriptor.
    pub fn resolve(&self, request: &str) -> Result<ResolvedVersion> {
        let manifest = self.manifest()?;
        let id = manifest.resolve_alias(request);

        let entry = manifest
            .get(id)
            .ok_or_else(|| self.not_found(&manifest, request))?;

        let detail: VersionDetail = fetch_json(self.transport.as_ref(), &entry.url)?;
        if detail.id != entry.id {
            return Err(PipelineError::InvalidManifest(format!(
                "detail document for {} describes {}",
                entry.id, detail.id
            )));
        }

        let client = detail.downloads.client;
        tracing::info!(version = %entry.id, kind = %entry.kind, size = client.size, "resolved version");

        Ok(ResolvedVersion {
            id: entry.id.clone(),
            kind: entry.kind,
            archive_url: client.url,
            archive_digest: client.sha1.to_ascii_lowercase(),
            archive_size: client.size,
            release_timestamp: entry.release_time,
        })
    }

    /// Nearest numeric version available upstream.
    pub fn find_closest_version(&self, version: &str) -> Result<Option<String>> {
        let manifest = self.manifest()?;
        Ok(closest_version(version, manifest.versions.iter().map(|v| v.id.as_str()))
            .map(str::to_string))
    }

    fn not_found(&self, manifest: &VersionManifest, request: &str) -> PipelineError {
        PipelineError::VersionNotFound {
            requested: request.to_string(),
            closest: closest_version(request, manifest.versions.iter().map(|v| v.id.as_str()))
                .map(str::to_string),
        }
    }
}

/// Parse `major.minor[.patch]` into a numeric triple.
fn parse_triple(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

/// Pick the candidate nearest to `target` by weighted Manhattan distance
/// over `(major, minor, patch)`. Ties keep the earliest candidate.
pub fn closest_version<'a>(
    target: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Option<&'a str> {
    let (tm, tn, tp) = parse_triple(target)?;

    candidates
        .into_iter()
        .filter_map(|candidate| {
            let (m, n, p) = parse_triple(candidate)?;
            let distance = 10_000 * tm.abs_diff(m) as u64
                + 100 * tn.abs_diff(n) as u64
                + tp.abs_diff(p) as u64;
            Some((distance, candidate))
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}
