//! Bounded cache for compiled statements.
//!
//! The cache is set-associative: a key hashes to one row, and each row
//! holds at most `blocks` entries, newest first.
//!
//! ```text
//!            block 0    block 1    ...  block n-1
//!   row 0  [ newest ] [        ] ...  [ oldest ]  ──► evicted on put
//!   row 1  [        ] [        ] ...  [        ]
//!   ...
//!   row = hash(key) & (rows - 1)
//! ```
//!
//! Keys are statement fingerprints (see [`fingerprint`]). Size, hits and
//! misses are exported as prometheus metrics.

mod hash;
pub use hash::fingerprint;

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use prometheus::{IntCounter, IntGauge, Registry};

use crate::config::CacheSettings;

/// Errors that can occur while building a cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Invalid cache geometry: {blocks} blocks x {rows} rows")]
    InvalidGeometry { blocks: usize, rows: usize },

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

// ============================================================================
// Metrics
// ============================================================================

/// Counters a cache reports through.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    pub size: IntGauge,
    pub hits: IntCounter,
    pub misses: IntCounter,
}

impl CacheMetrics {
    /// Unregistered metrics named `<namespace>_size`, `_hits_total` and
    /// `_misses_total`.
    pub fn new(namespace: &str) -> CacheResult<Self> {
        Ok(Self {
            size: IntGauge::new(format!("{namespace}_size"), "Entries held by the cache")?,
            hits: IntCounter::new(format!("{namespace}_hits_total"), "Cache lookups that found an entry")?,
            misses: IntCounter::new(
                format!("{namespace}_misses_total"),
                "Cache lookups that found nothing",
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> CacheResult<()> {
        registry.register(Box::new(self.size.clone()))?;
        registry.register(Box::new(self.hits.clone()))?;
        registry.register(Box::new(self.misses.clone()))?;
        Ok(())
    }

    fn record(&self, hit: bool) {
        if hit {
            self.hits.inc();
        } else {
            self.misses.inc();
        }
    }
}

// ============================================================================
// Cache
// ============================================================================

#[derive(Debug)]
pub struct AssociativeCache<V> {
    rows: Vec<VecDeque<(String, V)>>,
    blocks: usize,
    metrics: CacheMetrics,
}

impl<V> AssociativeCache<V> {
    /// A cache of `blocks x rows` entries, both rounded up to powers of two.
    pub fn new(blocks: usize, rows: usize) -> CacheResult<Self> {
        Self::with_metrics(blocks, rows, CacheMetrics::new("chronoql_cache")?)
    }

    pub fn from_settings(settings: &CacheSettings) -> CacheResult<Self> {
        Self::new(settings.blocks, settings.rows)
    }

    pub fn with_metrics(blocks: usize, rows: usize, metrics: CacheMetrics) -> CacheResult<Self> {
        if blocks == 0 || rows == 0 {
            return Err(CacheError::InvalidGeometry { blocks, rows });
        }
        let blocks = blocks.next_power_of_two();
        let rows = rows.next_power_of_two();
        metrics.size.set(0);
        Ok(Self {
            rows: (0..rows).map(|_| VecDeque::with_capacity(blocks)).collect(),
            blocks,
            metrics,
        })
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn capacity(&self) -> usize {
        self.blocks * self.rows.len()
    }

    pub fn len(&self) -> usize {
        self.rows.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(VecDeque::is_empty)
    }

    fn row_of(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & (self.rows.len() - 1)
    }

    fn sync_size(&self) {
        self.metrics.size.set(self.len() as i64);
    }

    /// Insert at the front of the key's row and return the value pushed out
    /// of it: the previous value for `key`, else the row's oldest entry
    /// once the row is full.
    pub fn put(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        let row_index = self.row_of(&key);
        let blocks = self.blocks;
        let row = &mut self.rows[row_index];

        let evicted = match row.iter().position(|(k, _)| *k == key) {
            Some(i) => row.remove(i).map(|(_, v)| v),
            None if row.len() == blocks => row.pop_back().map(|(_, v)| v),
            None => None,
        };
        row.push_front((key, value));
        self.sync_size();
        evicted
    }

    /// Look a key up without removing it.
    pub fn peek(&self, key: &str) -> Option<&V> {
        let found = self.rows[self.row_of(key)]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v);
        self.metrics.record(found.is_some());
        found
    }

    /// Remove and return the value for `key`.
    pub fn poll(&mut self, key: &str) -> Option<V> {
        let row_index = self.row_of(key);
        let row = &mut self.rows[row_index];
        let found = row
            .iter()
            .position(|(k, _)| k == key)
            .and_then(|i| row.remove(i))
            .map(|(_, v)| v);
        self.metrics.record(found.is_some());
        self.sync_size();
        found
    }

    pub fn clear(&mut self) {
        for row in &mut self.rows {
            row.clear();
        }
        self.metrics.size.set(0);
    }
}
