//! Best-effort readers for foreign lockfiles. These feed one precedence tier
//! of version resolution; a lockfile that cannot be parsed simply contributes
//! nothing.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Default)]
pub struct Lockfile {
    versions: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct NpmLock {
    #[serde(default)]
    packages: BTreeMap<String, NpmLockEntry>,
    #[serde(default)]
    dependencies: BTreeMap<String, NpmLockEntry>,
}

#[derive(Debug, Deserialize)]
struct NpmLockEntry {
    version: Option<String>,
}

impl Lockfile {
    /// Reads `yarn.lock` and/or `package-lock.json` from `root`. Yarn entries
    /// win when both name a package, matching the precedence a yarn-managed
    /// workspace would expect.
    pub fn load(root: &Path) -> Self {
        let mut versions = BTreeMap::new();

        if let Ok(data) = fs::read_to_string(root.join("package-lock.json")) {
            parse_npm_lock(&data, &mut versions);
        }
        if let Ok(data) = fs::read_to_string(root.join("yarn.lock")) {
            parse_yarn_lock(&data, &mut versions);
        }

        Lockfile { versions }
    }

    pub fn version_for(&self, name: &str) -> Option<&str> {
        self.versions.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_yarn(data: &str) -> Self {
        let mut versions = BTreeMap::new();
        parse_yarn_lock(data, &mut versions);
        Lockfile { versions }
    }

    #[cfg(test)]
    pub(crate) fn from_npm(data: &str) -> Self {
        let mut versions = BTreeMap::new();
        parse_npm_lock(data, &mut versions);
        Lockfile { versions }
    }
}

/// Scans classic yarn.lock blocks:
///
/// ```text
/// "@scope/pkg@^1.0.0", "@scope/pkg@~1.2.0":
///   version "1.2.3"
/// ```
fn parse_yarn_lock(data: &str, versions: &mut BTreeMap<String, String>) {
    let mut pending: Vec<String> = Vec::new();

    for line in data.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        if !line.starts_with(' ') && !line.starts_with('\t') {
            pending = line
                .trim_end()
                .trim_end_matches(':')
                .split(',')
                .filter_map(|key| package_name_of(key.trim().trim_matches('"')))
                .collect();
            continue;
        }

        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("version ") {
            let version = rest.trim().trim_matches('"');
            if !version.is_empty() {
                for name in pending.drain(..) {
                    versions.insert(name, version.to_string());
                }
            }
        }
    }
}

/// `"@scope/pkg@^1.0.0"` -> `@scope/pkg`; the range after the last `@` is
/// dropped.
fn package_name_of(key: &str) -> Option<String> {
    let at = key.rfind('@')?;
    if at == 0 {
        return None;
    }
    Some(key[..at].to_string())
}

fn parse_npm_lock(data: &str, versions: &mut BTreeMap<String, String>) {
    let Ok(lock) = serde_json::from_str::<NpmLock>(data) else {
        return;
    };

    // Legacy v1 shape first so that modern "packages" entries win.
    for (name, entry) in lock.dependencies {
        if let Some(version) = entry.version {
            versions.insert(name, version);
        }
    }

    for (key, entry) in lock.packages {
        let Some(version) = entry.version else {
            continue;
        };
        // Keys look like "node_modules/@scope/pkg", possibly nested.
        let Some(idx) = key.rfind("node_modules/") else {
            continue;
        };
        let name = &key[idx + "node_modules/".len()..];
        if !name.is_empty() {
            versions.insert(name.to_string(), version);
        }
    }
}
