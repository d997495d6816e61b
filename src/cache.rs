use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::embeddings::Embedding;
use crate::extractor::PageContent;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub content: PageContent,
    /// Parallel to the chunker's output for `content`
    pub embeddings: Option<Vec<Embedding>>,
    /// Insertion time; expiry is measured from here
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u32,
}

/// Session-scoped store of extracted pages and their embeddings.
///
/// Entries are evicted in insertion order once `capacity` is exceeded and
/// expire lazily: an expired entry is only removed when someone looks it up.
/// Nothing is persisted.
pub struct ContentCache {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
    capacity: usize,
    ttl: chrono::Duration,
}

impl ContentCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            ttl: chrono::Duration::from_std(ttl)
                .unwrap_or_else(|_| chrono::Duration::days(365)),
        }
    }

    pub fn set(
        &mut self,
        url: &str,
        title: &str,
        content: PageContent,
        embeddings: Option<Vec<Embedding>>,
    ) {
        self.set_at(url, title, content, embeddings, Utc::now());
    }

    pub fn set_at(
        &mut self,
        url: &str,
        title: &str,
        content: PageContent,
        embeddings: Option<Vec<Embedding>>,
        now: DateTime<Utc>,
    ) {
        let key = cache_key(url, title);

        // Overwrite counts as a fresh insertion
        if self.entries.remove(&key).is_some() {
            self.order.retain(|k| k != &key);
        }

        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    log::debug!("cache full, evicting {}", oldest);
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                content,
                embeddings,
                created_at: now,
                last_accessed: now,
                access_count: 0,
            },
        );
    }

    pub fn get(&mut self, url: &str, title: &str) -> Option<&CacheEntry> {
        self.get_at(url, title, Utc::now())
    }

    pub fn get_at(&mut self, url: &str, title: &str, now: DateTime<Utc>) -> Option<&CacheEntry> {
        let key = cache_key(url, title);

        let expired = match self.entries.get(&key) {
            Some(entry) => now - entry.created_at > self.ttl,
            None => return None,
        };

        if expired {
            log::debug!("cache entry {} expired", key);
            self.entries.remove(&key);
            self.order.retain(|k| k != &key);
            return None;
        }

        let entry = self.entries.get_mut(&key)?;
        entry.access_count += 1;
        entry.last_accessed = now;
        Some(&*entry)
    }

    /// Attach embeddings to an existing entry. Returns false if the entry is gone.
    pub fn attach_embeddings(
        &mut self,
        url: &str,
        title: &str,
        embeddings: Vec<Embedding>,
    ) -> bool {
        match self.entries.get_mut(&cache_key(url, title)) {
            Some(entry) => {
                entry.embeddings = Some(embeddings);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, url: &str, title: &str) -> bool {
        self.entries.contains_key(&cache_key(url, title))
    }
}

/// Stable key for a (url, title) pair
pub fn cache_key(url: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update([0u8]);
    hasher.update(title.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30 * 60);

    fn page(url: &str, text: &str) -> PageContent {
        PageContent {
            url: url.to_string(),
            title: "Title".to_string(),
            raw_text: text.to_string(),
            structural_hints: vec![],
            description: None,
        }
    }

    #[test]
    fn test_get_twice_returns_same_content() {
        let mut cache = ContentCache::new(10, TTL);
        cache.set("https://a", "Title", page("https://a", "hello"), None);

        let first = cache.get("https://a", "Title").unwrap().content.clone();
        let second = cache.get("https://a", "Title").unwrap();
        assert_eq!(first, second.content);
        assert_eq!(second.access_count, 2);
    }

    #[test]
    fn test_expiry_window() {
        let mut cache = ContentCache::new(10, TTL);
        let t0 = Utc::now();
        cache.set_at("https://a", "Title", page("https://a", "x"), None, t0);

        let half = t0 + chrono::Duration::minutes(15);
        assert!(cache.get_at("https://a", "Title", half).is_some());

        let past = t0 + chrono::Duration::minutes(30) + chrono::Duration::milliseconds(1);
        assert!(cache.get_at("https://a", "Title", past).is_none());
        // Lazily deleted on that lookup
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reads_do_not_extend_expiry() {
        let mut cache = ContentCache::new(10, TTL);
        let t0 = Utc::now();
        cache.set_at("https://a", "Title", page("https://a", "x"), None, t0);
        cache.get_at("https://a", "Title", t0 + chrono::Duration::minutes(29));
        assert!(cache
            .get_at("https://a", "Title", t0 + chrono::Duration::minutes(31))
            .is_none());
    }

    #[test]
    fn test_capacity_evicts_first_inserted() {
        let mut cache = ContentCache::new(3, TTL);
        for i in 0..4 {
            let url = format!("https://p/{}", i);
            cache.set(&url, "Title", page(&url, "x"), None);
        }
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("https://p/0", "Title"));
        assert!(cache.contains("https://p/3", "Title"));
    }

    #[test]
    fn test_eviction_is_fifo_not_lru() {
        let mut cache = ContentCache::new(2, TTL);
        cache.set("https://a", "T", page("https://a", "a"), None);
        cache.set("https://b", "T", page("https://b", "b"), None);
        // Reading `a` must not protect it
        cache.get("https://a", "T");
        cache.set("https://c", "T", page("https://c", "c"), None);
        assert!(!cache.contains("https://a", "T"));
        assert!(cache.contains("https://b", "T"));
    }

    #[test]
    fn test_overwrite_does_not_evict_others() {
        let mut cache = ContentCache::new(2, TTL);
        cache.set("https://a", "T", page("https://a", "a"), None);
        cache.set("https://b", "T", page("https://b", "b"), None);
        cache.set("https://a", "T", page("https://a", "a2"), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("https://a", "T").unwrap().content.raw_text, "a2");
    }

    #[test]
    fn test_attach_embeddings_and_clear() {
        let mut cache = ContentCache::new(2, TTL);
        cache.set("https://a", "T", page("https://a", "a"), None);
        assert!(cache.attach_embeddings("https://a", "T", vec![vec![1.0, 0.0]]));
        assert!(!cache.attach_embeddings("https://missing", "T", vec![]));
        assert_eq!(
            cache.get("https://a", "T").unwrap().embeddings.as_ref().map(|e| e.len()),
            Some(1)
        );
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_key_distinguishes_title() {
        assert_ne!(cache_key("https://a", "One"), cache_key("https://a", "Two"));
        assert_eq!(cache_key("https://a", "One").len(), 16);
    }
}
