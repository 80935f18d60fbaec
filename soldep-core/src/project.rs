use crate::{Result, SoldepError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A `package.json`-shaped manifest with the fields resolution cares about
/// spelled out explicitly. Anything else in the file is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub resolutions: BTreeMap<String, String>,
    // npm allows nested override objects; only plain string pins participate.
    #[serde(default)]
    pub overrides: BTreeMap<String, serde_json::Value>,
}

impl Manifest {
    pub fn parse(path: &Path, data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|source| SoldepError::ParseJson {
            path: path.to_path_buf(),
            source,
        })
    }

    /// A workspace pin for `name` from `resolutions` or a string-valued
    /// `overrides` entry.
    pub fn pinned_version(&self, name: &str) -> Option<String> {
        if let Some(version) = self.resolutions.get(name) {
            return Some(version.clone());
        }
        self.overrides
            .get(name)
            .and_then(|value| value.as_str())
            .map(str::to_string)
    }

    /// An `npm:<name>@<version>` alias anywhere in the dependency fields pins
    /// `name` to `version` for the whole session.
    pub fn alias_version(&self, name: &str) -> Option<String> {
        let needle = format!("npm:{}@", name);
        self.dependencies
            .values()
            .chain(self.dev_dependencies.values())
            .chain(self.peer_dependencies.values())
            .find_map(|value| value.strip_prefix(needle.as_str()))
            .map(str::to_string)
    }

    /// Dependency keys whose value is an `npm:` alias, longest key first, for
    /// prefix-matching specifiers against workspace aliases.
    pub fn alias_keys(&self) -> Vec<(String, String)> {
        let mut keys: Vec<(String, String)> = self
            .dependencies
            .iter()
            .chain(self.dev_dependencies.iter())
            .filter_map(|(key, value)| {
                value
                    .strip_prefix("npm:")
                    .map(|target| (key.clone(), target.to_string()))
            })
            .collect();
        keys.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
        keys
    }
}

#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
}

impl Project {
    pub fn discover(start: &Path) -> Result<Self> {
        let mut current = Some(start);

        while let Some(dir) = current {
            let candidate = dir.join("package.json");
            if candidate.is_file() {
                return Self::from_manifest_path(candidate);
            }
            current = dir.parent();
        }

        Err(SoldepError::ManifestMissing {
            path: start.to_path_buf(),
        })
    }

    pub fn from_manifest_path(path: PathBuf) -> Result<Self> {
        let data = fs::read_to_string(&path).map_err(|source| SoldepError::ReadFile {
            path: path.clone(),
            source,
        })?;

        let manifest = Manifest::parse(&path, &data)?;

        let root = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| SoldepError::ManifestInvalid {
                path: path.clone(),
                reason: "manifest has no parent directory".into(),
            })?;

        Ok(Project {
            root,
            manifest_path: path,
            manifest,
        })
    }
}
