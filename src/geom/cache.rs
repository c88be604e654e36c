//! Memoization of bend results.
//!
//! A bend is keyed by the identity of its inputs rather than their contents:
//! the source snapshot id, the spline id and version (or the curve's node
//! data), the resolved interval and the filling mode. Any node edit bumps the
//! spline version, so stale entries are never returned; they simply age out.
//!
//! ```ignore
//! let mut cache = BendCache::with_capacity(4);
//! let output = cache.get_or_insert_with(key, || compute_bend());
//! println!("hit rate {:.2}", cache.stats().hit_rate());
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::bender::FillingMode;
use super::diagnostics::BendDiagnostics;
use super::mesh::GeomMesh;

/// Entries kept unless a capacity is given.
pub const DEFAULT_BEND_CACHE_CAPACITY: usize = 8;

/// Identity of the curve or path portion a mesh was bent along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKey {
    /// Bit patterns of both nodes plus the cache resolution.
    Curve { nodes: [u64; 24], resolution: usize },
    Spline {
        id: u64,
        version: u64,
        start_bits: u64,
        end_bits: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BendKey {
    pub source_id: u64,
    pub target: TargetKey,
    pub mode: FillingMode,
}

/// A bent mesh and the diagnostics produced when it was computed.
#[derive(Debug, Clone, PartialEq)]
pub struct BendOutput {
    pub mesh: Arc<GeomMesh>,
    pub diagnostics: BendDiagnostics,
}

#[derive(Debug)]
pub struct BendCache {
    entries: HashMap<BendKey, Arc<BendOutput>>,
    order: VecDeque<BendKey>,
    capacity: usize,
    hits: usize,
    misses: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BendCacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
    pub estimated_memory_bytes: usize,
}

impl BendCacheStats {
    /// Hits over lookups, 0.0 before the first lookup.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl Default for BendCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_BEND_CACHE_CAPACITY)
    }
}

impl BendCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `capacity` results (at least one); the oldest
    /// entry is evicted first.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    #[must_use]
    pub fn get(&self, key: &BendKey) -> Option<Arc<BendOutput>> {
        self.entries.get(key).cloned()
    }

    /// Returns the cached output for `key`, computing and storing it on a miss.
    /// The boolean is true on a hit.
    pub fn get_or_insert_with(
        &mut self,
        key: BendKey,
        compute: impl FnOnce() -> BendOutput,
    ) -> (Arc<BendOutput>, bool) {
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            return (Arc::clone(hit), true);
        }
        self.misses += 1;
        let output = Arc::new(compute());
        self.insert(key, Arc::clone(&output));
        (output, false)
    }

    fn insert(&mut self, key: BendKey, output: Arc<BendOutput>) {
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        self.order.push_back(key);
        self.entries.insert(key, output);
    }

    #[must_use]
    pub fn stats(&self) -> BendCacheStats {
        BendCacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            estimated_memory_bytes: self.estimate_memory_usage(),
        }
    }

    /// Drops every entry and resets counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.hits = 0;
        self.misses = 0;
    }

    /// Drops entries keyed on a given source snapshot.
    pub fn invalidate_source(&mut self, source_id: u64) {
        self.entries.retain(|key, _| key.source_id != source_id);
        self.order.retain(|key| key.source_id != source_id);
    }

    #[must_use]
    pub fn estimate_memory_usage(&self) -> usize {
        let entry_overhead = std::mem::size_of::<(BendKey, Arc<BendOutput>)>();
        self.entries
            .values()
            .map(|output| {
                let mesh = &output.mesh;
                let uv_len: usize = mesh.uv_channels.iter().flatten().map(Vec::len).sum();
                mesh.positions.len() * 24
                    + mesh.normals.as_ref().map_or(0, Vec::len) * 24
                    + mesh.indices.len() * 4
                    + uv_len * 16
                    + entry_overhead
            })
            .sum()
    }
}
