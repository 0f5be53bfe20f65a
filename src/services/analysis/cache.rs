// Analysis result cache
// Keyed by a fingerprint of the document text and its detected language.

use crate::models::AnalysisResult;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

pub trait AnalysisCache: Send + Sync {
    fn get(&self, key: &str) -> Option<AnalysisResult>;
    fn set(&self, key: &str, value: AnalysisResult);
}

/// SHA-256 hex digest of `text` followed by `language`.
pub fn fingerprint(text: &str, language: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(language.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Process-local cache without eviction.
#[derive(Default)]
pub struct MemoryAnalysisCache {
    entries: Mutex<HashMap<String, AnalysisResult>>,
}

impl MemoryAnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnalysisCache for MemoryAnalysisCache {
    fn get(&self, key: &str) -> Option<AnalysisResult> {
        // poisoned lock reads as a miss
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: AnalysisResult) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value);
        }
    }
}

/// Cache that stores nothing. Used when caching is switched off in config.
pub struct NoopAnalysisCache;

impl AnalysisCache for NoopAnalysisCache {
    fn get(&self, _key: &str) -> Option<AnalysisResult> {
        None
    }

    fn set(&self, _key: &str, _value: AnalysisResult) {}
}
