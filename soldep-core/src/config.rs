use std::env;
use std::path::PathBuf;

pub const DEFAULT_NPM_CDN: &str = "https://unpkg.com";
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io";
pub const DEFAULT_SWARM_GATEWAY: &str = "https://swarm-gateways.net";

#[derive(Debug, Clone)]
pub struct SoldepConfig {
    pub cache_root: PathBuf,
    pub npm_cdn_base: String,
    pub ipfs_gateway: String,
    pub swarm_gateway: String,
    pub cache_enabled: bool,
    pub source_extensions: Vec<String>,
}

impl SoldepConfig {
    pub fn from_env() -> Self {
        let cache_root = env::var_os("SOLDEP_CACHE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".deps"));

        SoldepConfig {
            cache_root,
            npm_cdn_base: read_base_url("SOLDEP_NPM_CDN", DEFAULT_NPM_CDN),
            ipfs_gateway: read_base_url("SOLDEP_IPFS_GATEWAY", DEFAULT_IPFS_GATEWAY),
            swarm_gateway: read_base_url("SOLDEP_SWARM_GATEWAY", DEFAULT_SWARM_GATEWAY),
            cache_enabled: env::var_os("SOLDEP_NO_CACHE").is_none(),
            source_extensions: vec![".sol".to_string()],
        }
    }

    pub fn npm_dir(&self) -> PathBuf {
        self.cache_root.join("npm")
    }

    pub fn index_path(&self) -> PathBuf {
        self.npm_dir().join(".resolution-index.json")
    }

    /// Absolute-ish on-disk location for a cache-relative path such as
    /// `npm/pkg@1.0.0/a.sol` or `github/o/r@main/p.sol`.
    pub fn target_path(&self, cache_relative: &str) -> PathBuf {
        self.cache_root.join(cache_relative)
    }

    pub fn has_source_extension(&self, specifier: &str) -> bool {
        self.source_extensions
            .iter()
            .any(|ext| specifier.ends_with(ext.as_str()))
    }
}

impl Default for SoldepConfig {
    fn default() -> Self {
        SoldepConfig {
            cache_root: PathBuf::from(".deps"),
            npm_cdn_base: DEFAULT_NPM_CDN.to_string(),
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            swarm_gateway: DEFAULT_SWARM_GATEWAY.to_string(),
            cache_enabled: true,
            source_extensions: vec![".sol".to_string()],
        }
    }
}

fn read_base_url(var: &str, default: &str) -> String {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value.trim().trim_end_matches('/').to_string(),
        _ => default.to_string(),
    }
}
