//! The narrow boundary between the resolution core and whatever host it runs
//! in. Core algorithms only ever touch files and the network through this
//! trait; `DiskAdapter` is the reference local-filesystem-plus-HTTP
//! implementation.

use crate::{Result, SoldepError};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

#[allow(async_fn_in_trait)]
pub trait IoAdapter {
    fn read_file(&self, path: &Path) -> Result<String>;

    fn write_file(&self, path: &Path, text: &str) -> Result<()>;

    /// Write plus implicit parent-directory creation.
    fn set_file(&self, path: &Path, text: &str) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn mkdir(&self, path: &Path) -> Result<()>;

    async fn fetch(&self, url: &str) -> Result<String>;

    fn cache_enabled(&self) -> bool;

    fn set_cache_enabled(&self, enabled: bool);

    /// Fetch-and-cache in one call. With caching enabled and the target
    /// already materialized, the network round trip is skipped entirely; the
    /// target path is deterministic for a given specifier, so a warm cache is
    /// reused across sessions.
    async fn resolve_and_save(&self, url: &str, target: Option<&Path>) -> Result<String> {
        if let Some(target) = target {
            if self.cache_enabled() && self.exists(target) {
                return self.read_file(target);
            }
            let text = self.fetch(url).await?;
            self.set_file(target, &text)?;
            Ok(text)
        } else {
            self.fetch(url).await
        }
    }
}

impl<T: IoAdapter> IoAdapter for &T {
    fn read_file(&self, path: &Path) -> Result<String> {
        (**self).read_file(path)
    }

    fn write_file(&self, path: &Path, text: &str) -> Result<()> {
        (**self).write_file(path, text)
    }

    fn set_file(&self, path: &Path, text: &str) -> Result<()> {
        (**self).set_file(path, text)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        (**self).mkdir(path)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        (**self).fetch(url).await
    }

    fn cache_enabled(&self) -> bool {
        (**self).cache_enabled()
    }

    fn set_cache_enabled(&self, enabled: bool) {
        (**self).set_cache_enabled(enabled)
    }

    async fn resolve_and_save(&self, url: &str, target: Option<&Path>) -> Result<String> {
        (**self).resolve_and_save(url, target).await
    }
}

pub struct DiskAdapter {
    client: reqwest::Client,
    cache_enabled: AtomicBool,
}

impl DiskAdapter {
    pub fn new() -> Self {
        DiskAdapter {
            client: reqwest::Client::new(),
            cache_enabled: AtomicBool::new(true),
        }
    }
}

impl Default for DiskAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl IoAdapter for DiskAdapter {
    fn read_file(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|source| SoldepError::ReadFile {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_file(&self, path: &Path, text: &str) -> Result<()> {
        fs::write(path, text).map_err(|source| SoldepError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    fn set_file(&self, path: &Path, text: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.mkdir(parent)?;
        }
        self.write_file(path, text)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|source| SoldepError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| SoldepError::Http {
                url: url.to_string(),
                source,
            })?;

        response
            .error_for_status()
            .map_err(|source| SoldepError::Http {
                url: url.to_string(),
                source,
            })?
            .text()
            .await
            .map_err(|source| SoldepError::Http {
                url: url.to_string(),
                source,
            })
    }

    fn cache_enabled(&self) -> bool {
        self.cache_enabled.load(Ordering::Relaxed)
    }

    fn set_cache_enabled(&self, enabled: bool) {
        self.cache_enabled.store(enabled, Ordering::Relaxed);
    }
}
