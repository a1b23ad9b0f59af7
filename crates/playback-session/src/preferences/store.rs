use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use super::PlaybackPreferences;

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("preference store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("preference store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// External preference persistence, keyed by storage key.
///
/// Reads are served from memory; writes may hit storage.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Read preferences for `key`, falling back to defaults.
    fn read(&self, key: &str) -> PlaybackPreferences;

    async fn write(&self, key: &str, preferences: &PlaybackPreferences) -> Result<(), PreferenceError>;
}

/// Storage key isolating preferences per media library: `"<media_type>:<url>"`
/// with a trailing `/` removed from the url.
pub fn storage_key(media_type: &str, url: &str) -> String {
    let url = url.trim();
    let url = url.strip_suffix('/').unwrap_or(url);
    format!("{media_type}:{url}")
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    entries: DashMap<String, PlaybackPreferences>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, preferences: PlaybackPreferences) {
        self.entries.insert(key.into(), preferences);
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    fn read(&self, key: &str) -> PlaybackPreferences {
        self.entries
            .get(key)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    async fn write(&self, key: &str, preferences: &PlaybackPreferences) -> Result<(), PreferenceError> {
        self.insert(key, preferences.clone());
        Ok(())
    }
}

/// Store persisted as one JSON object mapping storage keys to preferences.
///
/// The file is read once on open and rewritten on every write. Memory is only
/// updated after the file was replaced.
#[derive(Debug)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, PlaybackPreferences>>,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFilePreferenceStore {
    /// Open (or lazily create) the store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PreferenceError> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened preference store");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, PlaybackPreferences>) -> Result<(), PreferenceError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    fn read(&self, key: &str) -> PlaybackPreferences {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }

    async fn write(&self, key: &str, preferences: &PlaybackPreferences) -> Result<(), PreferenceError> {
        // Serializes writers so the file always holds the latest map.
        let _guard = self.write_lock.lock().await;

        let mut next = self.entries.read().clone();
        next.insert(key.to_string(), preferences.clone());
        if let Err(e) = self.persist(&next).await {
            warn!(key, error = %e, "Failed to persist playback preferences");
            return Err(e);
        }
        *self.entries.write() = next;
        Ok(())
    }
}
