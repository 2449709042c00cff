//! Process-wide module cache of one compiler instance.

use std::sync::Arc;

use dashmap::DashMap;
use diptych_carton::hash::hash_str;

use crate::module::{ingest_source, FileId, ModuleInfo};

/// Ingested modules keyed by file identity.
///
/// Entries are immutable once inserted. Re-ingesting a file replaces its
/// entry unless the source text is unchanged.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: DashMap<FileId, Arc<ModuleInfo>>,
    /// xxh3 of the source each ingested entry was parsed from.
    hashes: DashMap<FileId, u64>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Arc<ModuleInfo>> {
        self.modules.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// Insert or replace a module.
    pub fn insert(&self, info: ModuleInfo) -> Arc<ModuleInfo> {
        let info = Arc::new(info);
        self.hashes.remove(&info.id);
        self.modules.insert(info.id.clone(), Arc::clone(&info));
        info
    }

    /// Parse `source` and cache the resulting module under `id`.
    pub fn ingest(&self, id: &str, source: &str) -> Arc<ModuleInfo> {
        let hash = hash_str(source);
        if self.hashes.get(id).is_some_and(|entry| *entry == hash) {
            if let Some(existing) = self.get(id) {
                tracing::debug!(file = id, "module unchanged");
                return existing;
            }
        }

        let info = ingest_source(id, source);
        tracing::debug!(
            file = id,
            bindings = info.bindings.len(),
            exports = info.exports.len(),
            "ingested module"
        );
        let info = self.insert(info);
        self.hashes.insert(FileId::from(id), hash);
        info
    }

    /// Apply `update` to a copy of the module (or an empty one) and store it.
    pub fn update(&self, id: &str, update: impl FnOnce(&mut ModuleInfo)) -> Arc<ModuleInfo> {
        let mut info = self
            .get(id)
            .map(|existing| (*existing).clone())
            .unwrap_or_else(|| ModuleInfo::new(id));
        update(&mut info);
        self.insert(info)
    }

    pub fn remove(&self, id: &str) -> bool {
        self.hashes.remove(id);
        self.modules.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
