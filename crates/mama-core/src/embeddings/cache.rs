//! Embedding cache
//!
//! Deduplicates embedding work across identical input texts. Keyed by a
//! blake3 hash of the text so large texts aren't held as keys. Bounded:
//! once the size passes capacity plus ~10% slack, entries are evicted in
//! LRU order by `last_accessed`, ties broken by lowest hit count, until
//! size is back at capacity.
//!
//! Callers supply the clock (milliseconds) on every access; entries touched
//! in the same millisecond are ordered by hits, then by access sequence.
//! One instance lives on the engine; nothing is persisted across restarts.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Default maximum number of cached embeddings
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
struct CacheEntry {
    vector: Vec<f32>,
    /// Last access time, milliseconds
    last_accessed: i64,
    hits: u64,
    created_at: i64,
    /// Access sequence, the final deterministic tie-break
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<[u8; 32], CacheEntry>,
    seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Cache usage statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Lookup hits
    pub hits: u64,
    /// Lookup misses
    pub misses: u64,
    /// Entries evicted so far
    pub evictions: u64,
    /// Current number of entries
    pub size: usize,
    /// hits / (hits + misses), 0 when empty
    pub hit_ratio: f64,
}

/// Bounded LRU cache of text embeddings
pub struct EmbeddingCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl EmbeddingCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.max(1),
        }
    }

    /// Slack above capacity before an eviction sweep runs.
    fn eviction_slack(&self) -> usize {
        (self.capacity / 10).max(1)
    }

    fn key(text: &str) -> [u8; 32] {
        *blake3::hash(text.as_bytes()).as_bytes()
    }

    /// Look up the embedding for `text`, promoting the entry on hit.
    pub fn get(&self, text: &str, now_ms: i64) -> Option<Vec<f32>> {
        let key = Self::key(text);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.seq += 1;
        let seq = state.seq;
        match state.entries.get_mut(&key) {
            Some(entry) => {
                entry.last_accessed = now_ms;
                entry.hits += 1;
                entry.seq = seq;
                let vector = entry.vector.clone();
                state.hits += 1;
                Some(vector)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Insert or refresh the embedding for `text`, evicting if over slack.
    pub fn set(&self, text: &str, vector: Vec<f32>, now_ms: i64) {
        let key = Self::key(text);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.seq += 1;
        let seq = state.seq;
        match state.entries.get_mut(&key) {
            Some(entry) => {
                entry.vector = vector;
                entry.last_accessed = now_ms;
                entry.seq = seq;
            }
            None => {
                state.entries.insert(
                    key,
                    CacheEntry {
                        vector,
                        last_accessed: now_ms,
                        hits: 0,
                        created_at: now_ms,
                        seq,
                    },
                );
            }
        }

        if state.entries.len() > self.capacity + self.eviction_slack() {
            self.evict(&mut state);
        }
    }

    /// Evict in LRU order (ties by lowest hits, then oldest access
    /// sequence) until size ≤ capacity.
    fn evict(&self, state: &mut CacheState) {
        let excess = state.entries.len().saturating_sub(self.capacity);
        if excess == 0 {
            return;
        }

        let mut order: Vec<([u8; 32], i64, u64, u64)> = state
            .entries
            .iter()
            .map(|(key, entry)| (*key, entry.last_accessed, entry.hits, entry.seq))
            .collect();
        order.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)).then(a.3.cmp(&b.3)));

        for (key, _, _, _) in order.into_iter().take(excess) {
            state.entries.remove(&key);
            state.evictions += 1;
        }
    }

    /// Drop every entry (model change invalidates all vectors).
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let dropped = state.entries.len();
        state.entries.clear();
        if dropped > 0 {
            tracing::debug!("Embedding cache cleared ({} entries)", dropped);
        }
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Usage statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let lookups = state.hits + state.misses;
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            size: state.entries.len(),
            hit_ratio: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
        }
    }

    /// Oldest creation timestamp still cached, for diagnostics.
    pub fn oldest_entry_ms(&self) -> Option<i64> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.entries.values().map(|e| e.created_at).min()
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
