//! Client archive download with digest verification.
//!
//! The archive is streamed to a temporary sibling of its cache slot while a
//! SHA-1 digest is computed. Only a verified file is renamed into place, so
//! the cache slot never holds unverified content.

use crate::error::{PipelineError, Result};
use crate::http::HttpTransport;
use crate::pipeline::CancellationToken;
use crate::version::ResolvedVersion;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CHUNK_SIZE: usize = 64 * 1024;

/// Outcome of [`ArchiveDownloader::download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    /// Final location of the verified archive.
    pub path: PathBuf,
    /// True when the archive was already cached and nothing was fetched.
    pub cached: bool,
    /// Archive size in bytes.
    pub size: u64,
}

/// Byte-count progress callback: `(received, total)`.
pub type DownloadProgress<'a> = &'a dyn Fn(u64, Option<u64>);

/// Downloads client archives into `{cache_root}/jars/`.
pub struct ArchiveDownloader {
    transport: Arc<dyn HttpTransport>,
    jars_dir: PathBuf,
}

impl ArchiveDownloader {
    pub fn new(transport: Arc<dyn HttpTransport>, jars_dir: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            jars_dir: jars_dir.into(),
        }
    }

    /// Cache slot for a version's archive.
    pub fn archive_path(&self, version_id: &str) -> PathBuf {
        self.jars_dir.join(format!("{}.jar", version_id))
    }

    /// Ensure a verified copy of the version's archive is on disk.
    pub fn download(
        &self,
        version: &ResolvedVersion,
        cancel: &CancellationToken,
        progress: Option<DownloadProgress<'_>>,
    ) -> Result<DownloadResult> {
        let path = self.archive_path(&version.id);

        if path.is_file() {
            let digest = sha1_file(&path)?;
            if digest == version.archive_digest {
                let size = std::fs::metadata(&path)?.len();
                tracing::debug!(version = %version.id, "archive cache hit");
                return Ok(DownloadResult {
                    path,
                    cached: true,
                    size,
                });
            }
            tracing::warn!(
                version = %version.id,
                expected = %version.archive_digest,
                actual = %digest,
                "cached archive digest mismatch, downloading again"
            );
        }

        std::fs::create_dir_all(&self.jars_dir)?;
        tracing::info!(version = %version.id, url = %version.archive_url, "downloading archive");

        let mut body = self.transport.get(&version.archive_url)?;
        let total = body.content_length.or(Some(version.archive_size));

        // Dropping the temp file on any error path deletes it.
        let mut temp = tempfile::NamedTempFile::new_in(&self.jars_dir)?;
        let mut hasher = Sha1::new();
        let mut received = 0u64;
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            cancel.check()?;
            let read = body.reader.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
            temp.write_all(&buffer[..read])?;
            received += read as u64;
            if let Some(report) = progress {
                report(received, total);
            }
        }
        temp.flush()?;

        if received != version.archive_size {
            return Err(PipelineError::Integrity {
                expected: format!("{} bytes", version.archive_size),
                actual: format!("{} bytes", received),
            });
        }

        let digest = hex::encode(hasher.finalize());
        if digest != version.archive_digest {
            tracing::warn!(version = %version.id, "archive digest mismatch, discarding download");
            return Err(PipelineError::Integrity {
                expected: version.archive_digest.clone(),
                actual: digest,
            });
        }

        temp.persist(&path).map_err(|e| PipelineError::Io(e.error))?;
        tracing::info!(version = %version.id, size = received, "archive verified");

        Ok(DownloadResult {
            path,
            cached: false,
            size: received,
        })
    }
}

/// Lowercase hex SHA-1 of a file, streamed.
pub fn sha1_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Lowercase hex SHA-1 of an in-memory buffer.
pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::MemoryTransport;
    use crate::version::VersionKind;
    use std::cell::Cell;

    const URL: &str = "https://files.test/client.jar";

    fn version_for(bytes: &[u8]) -> ResolvedVersion {
        ResolvedVersion {
            id: "1.21.4".to_string(),
            kind: VersionKind::Release,
            archive_url: URL.to_string(),
            archive_digest: sha1_hex(bytes),
            archive_size: bytes.len() as u64,
            release_timestamp: "2024-12-03T10:12:57Z".parse().unwrap(),
        }
    }

    fn payload() -> Vec<u8> {
        (0..200_000u32).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_sha1_hex() {
        assert_eq!(sha1_hex(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_download_then_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let bytes = payload();
        transport.serve(URL, bytes.clone());

        let downloader = ArchiveDownloader::new(transport.clone(), dir.path().join("jars"));
        let version = version_for(&bytes);

        let progress_calls = Cell::new(0u32);
        let last = Cell::new(0u64);
        let report = |received: u64, total: Option<u64>| {
            progress_calls.set(progress_calls.get() + 1);
            last.set(received);
            assert_eq!(total, Some(bytes.len() as u64));
        };

        let first = downloader
            .download(&version, &CancellationToken::new(), Some(&report))
            .unwrap();
        assert!(!first.cached);
        assert_eq!(first.size, bytes.len() as u64);
        assert_eq!(std::fs::read(&first.path).unwrap(), bytes);
        assert!(progress_calls.get() >= 2);
        assert_eq!(last.get(), bytes.len() as u64);

        let second = downloader
            .download(&version, &CancellationToken::new(), None)
            .unwrap();
        assert!(second.cached);
        assert_eq!(transport.requests_for(URL), 1);
    }

    #[test]
    fn test_digest_mismatch_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let jars = dir.path().join("jars");
        let transport = Arc::new(MemoryTransport::new());
        let bytes = payload();
        let version = version_for(&bytes);

        let mut corrupted = bytes.clone();
        corrupted[1234] ^= 0xFF;
        transport.serve(URL, corrupted);

        let downloader = ArchiveDownloader::new(transport, &jars);
        let result = downloader.download(&version, &CancellationToken::new(), None);

        assert!(matches!(result, Err(PipelineError::Integrity { .. })));
        assert!(!downloader.archive_path("1.21.4").exists());
        assert_eq!(std::fs::read_dir(&jars).unwrap().count(), 0);
    }

    #[test]
    fn test_truncated_download_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let bytes = payload();
        let version = version_for(&bytes);
        transport.serve(URL, bytes[..1000].to_vec());

        let downloader = ArchiveDownloader::new(transport, dir.path());
        let result = downloader.download(&version, &CancellationToken::new(), None);
        assert!(matches!(result, Err(PipelineError::Integrity { .. })));
        assert!(!downloader.archive_path("1.21.4").exists());
    }

    #[test]
    fn test_stale_cached_archive_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let bytes = payload();
        transport.serve(URL, bytes.clone());

        let downloader = ArchiveDownloader::new(transport.clone(), dir.path());
        std::fs::write(downloader.archive_path("1.21.4"), b"old contents").unwrap();

        let result = downloader
            .download(&version_for(&bytes), &CancellationToken::new(), None)
            .unwrap();
        assert!(!result.cached);
        assert_eq!(std::fs::read(&result.path).unwrap(), bytes);
    }

    #[test]
    fn test_cancelled_download() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MemoryTransport::new());
        let bytes = payload();
        transport.serve(URL, bytes.clone());

        let downloader = ArchiveDownloader::new(transport, dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = downloader.download(&version_for(&bytes), &cancel, None);
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert!(!downloader.archive_path("1.21.4").exists());
    }
}
