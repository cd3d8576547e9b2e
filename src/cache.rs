//! Version-aware download cache for catalog snapshot exports.
//!
//! The marketplace publishes its catalog as gzipped NDJSON exports plus a
//! `meta.json` carrying the export version. Files are downloaded lazily on
//! first access and re-downloaded when the published version changes.

use crate::config;
use crate::error::{MarketError, Result};
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const VERSION_FILE: &str = "version.txt";

/// Downloads and caches catalog snapshot files.
pub struct SnapshotCache {
    /// Directory where cached files are stored.
    pub cache_dir: PathBuf,
    /// If true, never download (use cached files only).
    pub offline: bool,
    timeout: Duration,
    base_url: String,
    meta_url: String,
    client: Option<Client>,
    remote_ver: Option<String>,
}

impl SnapshotCache {
    /// Create a new snapshot cache.
    ///
    /// If `cache_dir` is `None`, uses the platform-appropriate default cache directory.
    /// Creates the cache directory if it does not exist.
    pub fn new(cache_dir: Option<PathBuf>, offline: bool, timeout: Duration) -> Result<Self> {
        let dir = cache_dir.unwrap_or_else(config::default_cache_dir);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            cache_dir: dir,
            offline,
            timeout,
            base_url: config::SNAPSHOT_BASE.to_string(),
            meta_url: config::SNAPSHOT_META_URL.to_string(),
            client: None,
            remote_ver: None,
        })
    }

    /// Point the cache at a different export host (mirrors, tests).
    ///
    /// `meta.json` is expected directly under `base_url`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base = base_url.into().trim_end_matches('/').to_string();
        self.meta_url = format!("{}/meta.json", base);
        self.base_url = base;
        self.remote_ver = None;
        self
    }

    fn client(&mut self) -> Result<Client> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .timeout(self.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        self.client = Some(client.clone());
        Ok(client)
    }

    /// Read the locally cached export version from `version.txt`.
    pub fn local_version(&self) -> Option<String> {
        fs::read_to_string(self.cache_dir.join(VERSION_FILE))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn save_version(&self, version: &str) {
        if let Err(e) = fs::write(self.cache_dir.join(VERSION_FILE), version) {
            tracing::warn!(error = %e, "could not record snapshot version");
        }
    }

    /// Fetch the published export version from `meta.json`.
    ///
    /// Returns `None` when offline or when the export host is unreachable.
    /// The result is memoized for the lifetime of the cache.
    pub fn remote_version(&mut self) -> Result<Option<String>> {
        if self.remote_ver.is_some() {
            return Ok(self.remote_ver.clone());
        }
        if self.offline {
            return Ok(None);
        }
        let client = self.client()?;
        match client.get(&self.meta_url).send() {
            Ok(resp) => {
                let data: serde_json::Value = resp.error_for_status()?.json()?;
                let version = data
                    .get("version")
                    .or_else(|| data.get("data").and_then(|d| d.get("version")))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());
                self.remote_ver = version.clone();
                Ok(version)
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.meta_url, "snapshot version check failed");
                Ok(None)
            }
        }
    }

    /// Whether the local snapshot is missing or older than the published one.
    ///
    /// An unreachable host counts as fresh.
    pub fn is_stale(&mut self) -> Result<bool> {
        let Some(local) = self.local_version() else {
            return Ok(true);
        };
        Ok(match self.remote_version()? {
            Some(remote) => local != remote,
            None => false,
        })
    }

    /// Download to a temp file and rename, so an interrupted download never
    /// leaves a partial file behind.
    fn download_file(&mut self, filename: &str, dest: &Path) -> Result<()> {
        let url = format!("{}/{}", self.base_url, filename);
        tracing::info!(%url, "downloading catalog snapshot");

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_dest = dest.with_file_name(format!("{}.tmp", filename));

        let client = self.client()?;
        let result = (|| -> Result<()> {
            let bytes = client.get(&url).send()?.error_for_status()?.bytes()?;
            fs::write(&tmp_dest, &bytes)?;
            fs::rename(&tmp_dest, dest)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_dest);
        }
        result
    }

    /// Ensure the export for `table` is cached locally, downloading if needed.
    ///
    /// Returns the local path to the gzipped NDJSON file.
    pub fn ensure_snapshot(&mut self, table: &str) -> Result<PathBuf> {
        let filename = config::snapshot_files()
            .into_iter()
            .find(|(name, _)| *name == table)
            .map(|(_, file)| file)
            .ok_or_else(|| MarketError::NotFound(format!("Unknown snapshot table: {}", table)))?;

        let local_path = self.cache_dir.join(filename);
        if local_path.exists() && (self.offline || !self.is_stale()?) {
            return Ok(local_path);
        }
        if self.offline {
            return Err(MarketError::NotFound(format!(
                "Snapshot {} not cached and offline mode is enabled",
                filename
            )));
        }

        self.download_file(filename, &local_path)?;
        if let Ok(Some(version)) = self.remote_version() {
            self.save_version(&version);
        }
        Ok(local_path)
    }

    /// Path where the export for `table` is (or would be) cached.
    pub fn snapshot_path(&self, table: &str) -> Option<PathBuf> {
        config::snapshot_files()
            .into_iter()
            .find(|(name, _)| *name == table)
            .map(|(_, file)| self.cache_dir.join(file))
    }

    /// Remove all cached files and recreate the cache directory.
    pub fn clear(&self) -> Result<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Drop the HTTP client and the memoized remote version.
    pub fn close(&mut self) {
        self.client = None;
        self.remote_ver = None;
    }
}
