//! The persisted original-import -> local-path map that powers IDE
//! navigation. One instance can be shared across resolutions in a session;
//! constructing a fresh one per target file is equally valid because the
//! on-disk file is the source of truth.

use crate::adapter::IoAdapter;
use crate::config::SoldepConfig;
use crate::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;

pub struct ResolutionIndex {
    path: PathBuf,
    cache_root: String,
    loaded: OnceCell<()>,
    map: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
    dirty: AtomicBool,
}

impl ResolutionIndex {
    pub fn new(config: &SoldepConfig) -> Self {
        ResolutionIndex {
            path: config.index_path(),
            cache_root: config.cache_root.display().to_string(),
            loaded: OnceCell::new(),
            map: Mutex::new(BTreeMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Idempotent, memoized load; concurrent callers share one in-flight
    /// read. A missing or unparseable file loads as an empty index.
    pub async fn load<A: IoAdapter>(&self, adapter: &A) {
        self.loaded
            .get_or_init(|| async {
                if let Ok(data) = adapter.read_file(&self.path)
                    && let Ok(parsed) =
                        serde_json::from_str::<BTreeMap<String, BTreeMap<String, String>>>(&data)
                {
                    *self.map.lock().unwrap() = parsed;
                }
            })
            .await;
    }

    /// Drops a source file's whole inner map. Called before re-recording a
    /// file's imports so entries for since-removed imports vanish.
    pub fn clear_file_resolutions(&self, source_file: &str) {
        let key = self.normalize_source(source_file);
        if self.map.lock().unwrap().remove(&key).is_some() {
            self.dirty.store(true, Ordering::Relaxed);
        }
    }

    pub fn record_resolution(&self, source_file: &str, original_import: &str, resolved: &str) {
        let key = self.normalize_source(source_file);
        let value = self.normalize_resolved(resolved);
        let mut map = self.map.lock().unwrap();
        let inner = map.entry(key).or_default();
        if inner.get(original_import).map(String::as_str) != Some(value.as_str()) {
            inner.insert(original_import.to_string(), value);
            self.dirty.store(true, Ordering::Relaxed);
        }
    }

    pub fn resolution_for(&self, source_file: &str, original_import: &str) -> Option<String> {
        let key = self.normalize_source(source_file);
        self.map
            .lock()
            .unwrap()
            .get(&key)
            .and_then(|inner| inner.get(original_import))
            .cloned()
    }

    /// Persists the whole index, but only when something changed since the
    /// last save.
    pub fn save<A: IoAdapter>(&self, adapter: &A) -> Result<()> {
        if !self.dirty.swap(false, Ordering::Relaxed) {
            return Ok(());
        }
        let data = {
            let map = self.map.lock().unwrap();
            serde_json::to_string_pretty(&*map).unwrap_or_else(|_| "{}".to_string())
        };
        adapter.set_file(&self.path, &data)
    }

    /// Outer keys drop the cache-root prefix for package-cache files, so a
    /// file addressed by path or by specifier lands on the same entry. Raw
    /// HTTP sources keep their full URL.
    fn normalize_source(&self, source_file: &str) -> String {
        if source_file.starts_with("http://") || source_file.starts_with("https://") {
            return source_file.to_string();
        }
        let npm_prefix = format!("{}/npm/", self.cache_root);
        if let Some(rest) = source_file.strip_prefix(npm_prefix.as_str()) {
            return rest.to_string();
        }
        if let Some(rest) = source_file.strip_prefix("npm/") {
            return rest.to_string();
        }
        source_file.to_string()
    }

    /// Bare npm-style paths (they carry a version marker) map to their
    /// canonical cache subpath; URL-rooted and already-cache-rooted paths are
    /// left alone.
    fn normalize_resolved(&self, resolved: &str) -> String {
        if resolved.starts_with("http://")
            || resolved.starts_with("https://")
            || resolved.starts_with(self.cache_root.as_str())
        {
            return resolved.to_string();
        }
        if looks_like_versioned_package_path(resolved) {
            return format!("{}/npm/{}", self.cache_root, resolved);
        }
        resolved.to_string()
    }
}

/// True for `pkg@1.0.0/a.sol` and `@scope/pkg/a.sol` shapes, false for plain
/// workspace-relative paths.
fn looks_like_versioned_package_path(path: &str) -> bool {
    if path.starts_with('@') {
        return true;
    }
    match path.split('/').next() {
        Some(first) => first.contains('@'),
        None => false,
    }
}
