use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// How long an observed signed URL or token stays usable.
pub const TOKEN_TTL: Duration = Duration::from_secs(30);

/// Short-lived in-memory store for values observed on the wire.
///
/// The lock is never held across an await.
#[derive(Debug)]
pub struct TokenCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match entries.get(key) {
            Some((value, stored)) if stored.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        entries.retain(|_, (_, stored)| now.duration_since(*stored) < self.ttl);
        entries.insert(key.into(), (value.into(), now));
    }

    pub fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.remove(key);
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(TOKEN_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = TokenCache::default();
        cache.put("/read/a.1/en/chapter-1", "https://mangafire.to/ajax/read/chapter/9?vrf=x");
        assert!(cache.get("/read/a.1/en/chapter-1").is_some());

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(cache.get("/read/a.1/en/chapter-1").is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("/read/a.1/en/chapter-1"), None);
    }
}
