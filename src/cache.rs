//! Compiled-template cache keyed by filename

use crate::template::CompiledTemplate;
use dashmap::DashMap;
use log::debug;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Store for compiled templates, shared by every compile that sets `cache`
///
/// Entries are never invalidated by file changes; only `reset` drops them.
pub trait TemplateCache: Send + Sync {
    fn get(&self, filename: &Path) -> Option<Arc<CompiledTemplate>>;
    fn set(&self, filename: &Path, template: Arc<CompiledTemplate>);
    fn reset(&self);
}

/// Counters reported by [`MemoryTemplateCache::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// In-process cache backed by a concurrent map
#[derive(Default)]
pub struct MemoryTemplateCache {
    entries: DashMap<PathBuf, Arc<CompiledTemplate>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryTemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

impl TemplateCache for MemoryTemplateCache {
    fn get(&self, filename: &Path) -> Option<Arc<CompiledTemplate>> {
        match self.entries.get(filename) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn set(&self, filename: &Path, template: Arc<CompiledTemplate>) {
        self.entries.insert(filename.to_path_buf(), template);
    }

    fn reset(&self) {
        debug!("Clearing {} cached templates", self.entries.len());
        self.entries.clear();
    }
}

/// Cache that stores nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTemplateCache;

impl TemplateCache for NoopTemplateCache {
    fn get(&self, _filename: &Path) -> Option<Arc<CompiledTemplate>> {
        None
    }

    fn set(&self, _filename: &Path, _template: Arc<CompiledTemplate>) {}

    fn reset(&self) {}
}
