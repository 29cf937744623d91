use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    /// Milliseconds since the Unix epoch.
    timestamp: i64,
    /// Time to live in milliseconds.
    ttl: u64,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.timestamp) >= self.ttl as i64
    }
}

/// File-backed TTL cache, one directory per namespace.
///
/// Every failure is logged and swallowed: a broken cache degrades to a miss.
#[derive(Debug, Clone)]
pub struct ResultCache {
    dir: PathBuf,
    default_ttl: Duration,
    enabled: bool,
}

impl ResultCache {
    pub fn new(root: impl AsRef<Path>, namespace: &str, default_ttl: Duration) -> Self {
        Self {
            dir: root.as_ref().join(namespace),
            default_ttl,
            enabled: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            default_ttl: Duration::ZERO,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(hasher.finalize())))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }
        let path = self.path_for(key);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("[CACHE] failed to read {:?}: {}", path, e);
                return None;
            }
        };

        match serde_json::from_slice::<CacheEntry<T>>(&raw) {
            Ok(entry) if !entry.is_expired(chrono::Utc::now().timestamp_millis()) => {
                debug!("[CACHE] hit {}", key);
                Some(entry.data)
            }
            Ok(_) => {
                debug!("[CACHE] expired {}", key);
                self.remove_stale(&path, &raw);
                None
            }
            Err(e) => {
                debug!("[CACHE] dropping undecodable entry {}: {}", key, e);
                self.remove_stale(&path, &raw);
                None
            }
        }
    }

    /// Store `data`; the file is replaced atomically by rename.
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Option<Duration>) {
        if !self.enabled {
            return;
        }
        let ttl = ttl.unwrap_or(self.default_ttl);
        let entry = CacheEntry {
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
            ttl: ttl.as_millis() as u64,
        };
        if let Err(e) = self.write_entry(key, &entry) {
            warn!("[CACHE] failed to store {}: {}", key, e);
        }
    }

    fn write_entry<T: Serialize>(&self, key: &str, entry: &CacheEntry<&T>) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let temp = path.with_extension(format!(
            "tmp-{}-{}",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let bytes = serde_json::to_vec(entry)?;
        let mut file = std::fs::File::create(&temp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp, &path).inspect_err(|_| {
            let _ = std::fs::remove_file(&temp);
        })
    }

    pub async fn wrap<T, F, Fut>(&self, key: &str, ttl: Option<Duration>, producer: F) -> crate::error::Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = crate::error::Result<T>>,
    {
        self.wrap_when(key, ttl, |_| true, producer).await
    }

    /// Like [`ResultCache::wrap`], storing the produced value only when `keep` accepts it.
    pub async fn wrap_when<T, K, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        keep: K,
        producer: F,
    ) -> crate::error::Result<T>
    where
        T: Serialize + DeserializeOwned,
        K: FnOnce(&T) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = crate::error::Result<T>>,
    {
        if let Some(hit) = self.get::<T>(key) {
            return Ok(hit);
        }
        let value = producer().await?;
        if keep(&value) {
            self.set(key, &value, ttl);
        }
        Ok(value)
    }

    pub fn invalidate(&self, key: &str) {
        if self.enabled {
            self.remove_file(&self.path_for(key));
        }
    }

    /// Drop every entry of this namespace.
    pub fn evict_namespace(&self) {
        if !self.enabled {
            return;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!("[CACHE] evicted {:?}", self.dir),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("[CACHE] failed to evict {:?}: {}", self.dir, e),
        }
    }

    /// Delete `path` only while it still holds `seen`; a concurrent `set` may
    /// have renamed a fresh entry into place since it was read.
    fn remove_stale(&self, path: &Path, seen: &[u8]) {
        match std::fs::read(path) {
            Ok(current) if current == seen => self.remove_file(path),
            Ok(_) => debug!("[CACHE] {:?} was replaced, keeping it", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("[CACHE] failed to re-read {:?}: {}", path, e),
        }
    }

    fn remove_file(&self, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("[CACHE] failed to remove {:?}: {}", path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_hashed_per_namespace() {
        let cache = ResultCache::new("/tmp/mp", "eros", Duration::from_secs(60));
        let path = cache.path_for("search:solo leveling/../1");
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 64 + ".json".len());
        assert!(name.chars().take(64).all(|c| c.is_ascii_hexdigit()));
        assert_eq!(path.parent().unwrap(), Path::new("/tmp/mp/eros"));
    }

    #[test]
    fn stale_removal_keeps_a_replaced_entry() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = ResultCache::new(dir.path(), "eros", Duration::from_secs(60));
        cache.set("detail:x", &1u32, Some(Duration::ZERO));
        let path = cache.path_for("detail:x");
        let stale = std::fs::read(&path).unwrap();

        cache.set("detail:x", &2u32, None);
        cache.remove_stale(&path, &stale);
        assert_eq!(cache.get::<u32>("detail:x"), Some(2));

        let fresh = std::fs::read(&path).unwrap();
        cache.remove_stale(&path, &fresh);
        assert!(!path.exists());
    }

    #[test]
    fn disabled_cache_never_hits() {
        let cache = ResultCache::disabled();
        cache.set("k", &1u32, None);
        assert_eq!(cache.get::<u32>("k"), None);
    }
}
