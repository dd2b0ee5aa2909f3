//! Content-addressed document cache keyed by URL hash.
//!
//! Grounded on `original_source/src/agents/architect.py::_download_pdf`'s
//! cache-by-hash behavior, generalized to an in-process map (the original
//! used a directory of files on disk); naming follows
//! `wg-ragsmith::ingestion::cache` conventions.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

fn url_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A cached document's bytes plus the checksum computed over its content.
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub bytes: Vec<u8>,
    pub checksum: String,
}

fn checksum_of(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Caches downloaded documents by a hash of their source URL so a repeat
/// ingestion of the same URL reuses the bytes and checksum instead of
/// re-fetching (§8: "Ingest(same url) twice ... second run uses cache").
#[derive(Default)]
pub struct DocumentCache {
    entries: RwLock<HashMap<String, CachedDocument>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<CachedDocument> {
        self.entries.read().get(&url_key(url)).cloned()
    }

    pub fn put(&self, url: &str, bytes: Vec<u8>) -> CachedDocument {
        let checksum = checksum_of(&bytes);
        let doc = CachedDocument { bytes, checksum };
        self.entries.write().insert(url_key(url), doc.clone());
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_put_for_same_url_overwrites_same_key() {
        let cache = DocumentCache::new();
        cache.put("https://example.org/a.pdf", vec![1, 2, 3]);
        assert!(cache.get("https://example.org/a.pdf").is_some());
        assert!(cache.get("https://example.org/b.pdf").is_none());
    }

    #[test]
    fn checksum_is_deterministic() {
        let cache = DocumentCache::new();
        let a = cache.put("https://example.org/a.pdf", vec![1, 2, 3]);
        let b = checksum_of(&[1, 2, 3]);
        assert_eq!(a.checksum, b);
    }
}
