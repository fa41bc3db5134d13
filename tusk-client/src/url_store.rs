//! Fingerprint to upload-URL storage for cross-session resume

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use crate::{ClientError, Result};

/// Where the client remembers which URL a source was uploaded to
#[async_trait]
pub trait UrlStore: Send + Sync {
    async fn lookup(&self, fingerprint: &str) -> Result<Option<String>>;

    async fn record(&self, fingerprint: &str, url: &str) -> Result<()>;

    async fn remove(&self, fingerprint: &str) -> Result<()>;
}

/// Process-local store
#[derive(Default)]
pub struct MemoryUrlStore {
    urls: Mutex<HashMap<String, String>>,
}

impl MemoryUrlStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn urls(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.urls
            .lock()
            .map_err(|_| ClientError::UrlStore("url store poisoned".to_string()))
    }
}

#[async_trait]
impl UrlStore for MemoryUrlStore {
    async fn lookup(&self, fingerprint: &str) -> Result<Option<String>> {
        Ok(self.urls()?.get(fingerprint).cloned())
    }

    async fn record(&self, fingerprint: &str, url: &str) -> Result<()> {
        self.urls()?.insert(fingerprint.to_string(), url.to_string());
        Ok(())
    }

    async fn remove(&self, fingerprint: &str) -> Result<()> {
        self.urls()?.remove(fingerprint);
        Ok(())
    }
}

/// JSON object on disk, shared between processes and runs.
///
/// File work runs on the blocking pool. Every write goes to a synced
/// temporary file that is then renamed over the map, so a crash leaves
/// either the old map or the new one.
pub struct FileUrlStore {
    path: PathBuf,
    writer: tokio::sync::Mutex<()>,
}

impl FileUrlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileUrlStore {
            path: path.into(),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> bool + Send + 'static,
    ) -> Result<()> {
        let _writer = self.writer.lock().await;
        let path = self.path.clone();

        blocking(move || {
            let mut urls = load(&path)?;
            if f(&mut urls) {
                save(&path, &urls)?;
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl UrlStore for FileUrlStore {
    async fn lookup(&self, fingerprint: &str) -> Result<Option<String>> {
        let path = self.path.clone();
        let urls = blocking(move || load(&path)).await?;
        Ok(urls.get(fingerprint).cloned())
    }

    async fn record(&self, fingerprint: &str, url: &str) -> Result<()> {
        let (fingerprint, url) = (fingerprint.to_string(), url.to_string());
        self.update(move |urls| {
            urls.insert(fingerprint, url);
            true
        })
        .await
    }

    async fn remove(&self, fingerprint: &str) -> Result<()> {
        let fingerprint = fingerprint.to_string();
        self.update(move |urls| urls.remove(&fingerprint).is_some())
            .await
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ClientError::UrlStore(format!("url store task failed: {}", e)))?
}

fn load(path: &Path) -> Result<BTreeMap<String, String>> {
    match fs::read(path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!("Ignoring unreadable url store {}: {}", path.display(), e);
                Ok(BTreeMap::new())
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

fn save(path: &Path, urls: &BTreeMap<String, String>) -> Result<()> {
    let json = serde_json::to_vec_pretty(urls).map_err(|e| ClientError::UrlStore(e.to_string()))?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(&json)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, path)?;

    // Persist the rename itself
    #[cfg(unix)]
    if let Some(parent) = parent {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}
