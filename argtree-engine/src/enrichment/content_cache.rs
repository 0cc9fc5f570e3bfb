//! Full-text content cache
//!
//! In-memory map keyed by URL, optionally mirrored to a directory where each
//! entry is a JSON file named by the SHA-256 of its URL. Disk errors are
//! logged and never fail a lookup or store.

use argtree_common::config::EnrichmentConfig;
use argtree_common::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    url: String,
    content: String,
    stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentCacheStats {
    pub entries: usize,
    pub total_chars: usize,
    pub disk_backed: bool,
}

pub struct ContentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    disk_dir: Option<PathBuf>,
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// File stem for a URL
pub fn cache_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

impl ContentCache {
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            disk_dir: None,
        }
    }

    /// Mirror entries under `dir`, creating it if needed
    pub async fn with_disk(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        info!(dir = %dir.display(), "Content cache directory ready");
        Ok(Self {
            entries: RwLock::new(HashMap::new()),
            disk_dir: Some(dir),
        })
    }

    /// Disk-backed when `cache_dir` is configured
    pub async fn from_config(config: &EnrichmentConfig) -> Result<Self> {
        match &config.cache_dir {
            Some(dir) => Self::with_disk(dir).await,
            None => Ok(Self::in_memory()),
        }
    }

    fn entry_path(&self, url: &str) -> Option<PathBuf> {
        self.disk_dir.as_ref().map(|d| d.join(format!("{}.json", cache_key(url))))
    }

    pub async fn get(&self, url: &str) -> Option<String> {
        if let Some(entry) = self.entries.read().await.get(url) {
            return Some(entry.content.clone());
        }

        let path = self.entry_path(url)?;
        let raw = tokio::fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) if entry.url == url => {
                debug!(url, "Content cache disk hit");
                let content = entry.content.clone();
                self.entries.write().await.insert(url.to_string(), entry);
                Some(content)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt content cache entry ignored");
                None
            }
        }
    }

    pub async fn put(&self, url: &str, content: &str) {
        let entry = CacheEntry {
            url: url.to_string(),
            content: content.to_string(),
            stored_at: Utc::now(),
        };

        if let Some(path) = self.entry_path(url) {
            match serde_json::to_string(&entry) {
                Ok(json) => {
                    if let Err(e) = tokio::fs::write(&path, json).await {
                        warn!(path = %path.display(), error = %e, "Failed to write content cache entry");
                    }
                }
                Err(e) => warn!(url, error = %e, "Failed to serialize content cache entry"),
            }
        }

        self.entries.write().await.insert(url.to_string(), entry);
    }

    pub async fn stats(&self) -> ContentCacheStats {
        let entries = self.entries.read().await;
        ContentCacheStats {
            entries: entries.len(),
            total_chars: entries.values().map(|e| e.content.chars().count()).sum(),
            disk_backed: self.disk_dir.is_some(),
        }
    }

    /// Drop entries stored more than `days` ago; returns how many were removed
    pub async fn clear_older_than(&self, days: f64) -> usize {
        let cutoff = Utc::now() - ChronoDuration::seconds((days * 86_400.0) as i64);
        let mut removed = Vec::new();
        {
            let mut entries = self.entries.write().await;
            entries.retain(|url, entry| {
                let keep = entry.stored_at >= cutoff;
                if !keep {
                    removed.push(url.clone());
                }
                keep
            });
        }

        for url in &removed {
            if let Some(path) = self.entry_path(url) {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    debug!(path = %path.display(), error = %e, "Could not remove cache file");
                }
            }
        }

        if !removed.is_empty() {
            info!(removed = removed.len(), days, "Content cache pruned");
        }
        removed.len()
    }
}
