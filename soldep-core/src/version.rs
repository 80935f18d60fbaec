//! Version precedence for unversioned package imports: workspace pins beat
//! the parent package's declared range, which beats the lockfile, which
//! beats asking the registry. The first tier that answers wins; there is no
//! range negotiation across the graph.

use crate::adapter::IoAdapter;
use crate::normalize;
use crate::project::Manifest;
use crate::resolve::Session;
use crate::resolve::types::{ResolvedVersion, VersionSource};
use semver::Version;

impl<A: IoAdapter> Session<A> {
    /// Resolves a concrete version for `name`, consulting the active parent
    /// context for tier 2. Never fails: a total miss yields
    /// `{version: None, source: Registry}` and the caller leaves the
    /// specifier unversioned.
    pub(crate) async fn resolve_version(&mut self, name: &str) -> ResolvedVersion {
        if let Some(manifest) = self.project.as_ref().map(|p| &p.manifest) {
            if let Some(pinned) = manifest.pinned_version(name) {
                if let Some(version) = clean_version(&pinned) {
                    return ResolvedVersion {
                        version: Some(version),
                        source: VersionSource::Workspace,
                    };
                }
            }
            if let Some(aliased) = manifest.alias_version(name) {
                if let Some(version) = clean_version(&aliased) {
                    return ResolvedVersion {
                        version: Some(version),
                        source: VersionSource::Alias,
                    };
                }
            }
        }

        if let Some(parent) = self.active_parent.as_ref()
            && let Some(range) = parent.context.declared_range(name)
            && let Some(version) = clean_version(range)
        {
            return ResolvedVersion {
                version: Some(version),
                source: VersionSource::Parent(parent.key.clone()),
            };
        }

        if let Some(version) = self.lockfile.version_for(name) {
            let version = version.to_string();
            if let Some(version) = clean_version(&version) {
                return ResolvedVersion {
                    version: Some(version),
                    source: VersionSource::Lockfile,
                };
            }
        }

        self.resolve_from_registry(name).await
    }

    /// Tier 4: fetch `<name>/package.json` from the CDN and take its
    /// `version` field as-is. The fetched manifest is persisted into the
    /// cache and its declared dependencies recorded as a parent context for
    /// transitive resolution.
    async fn resolve_from_registry(&mut self, name: &str) -> ResolvedVersion {
        let manifest_specifier = format!("{}/package.json", name);
        let url = normalize::to_http_url(&manifest_specifier, &self.config);

        let data = match self.adapter.fetch(&url).await {
            Ok(data) => data,
            Err(_) => {
                return ResolvedVersion {
                    version: None,
                    source: VersionSource::Registry,
                };
            }
        };

        let cache_path = self
            .config
            .target_path(&format!("npm/{}/package.json", name));
        let manifest = match Manifest::parse(&cache_path, &data) {
            Ok(manifest) => manifest,
            Err(_) => {
                return ResolvedVersion {
                    version: None,
                    source: VersionSource::Registry,
                };
            }
        };

        let Some(version) = manifest.version.clone() else {
            return ResolvedVersion {
                version: None,
                source: VersionSource::Registry,
            };
        };

        let versioned = self
            .config
            .target_path(&format!("npm/{}@{}/package.json", name, version));
        if let Err(err) = self.adapter.set_file(&versioned, &data) {
            self.emit(
                crate::console::Severity::Info,
                format!("could not cache manifest for {}@{}: {}", name, version, err),
            );
        }

        self.record_package_context(name, &version, &manifest);

        ResolvedVersion {
            version: Some(version),
            source: VersionSource::Registry,
        }
    }
}

/// Reduces a declared range to a concrete version when it names one:
/// `^4.9.0` -> `4.9.0`, `>=1.2 <2` -> `1.2.0`. Wildcards and tags yield
/// `None`.
pub fn clean_version(range: &str) -> Option<String> {
    let token = range.split_whitespace().next()?;
    let token = token.trim_start_matches(['^', '~', '=', '>', '<', 'v']);
    if token.is_empty() {
        return None;
    }
    let core = token.split(['-', '+']).next()?;
    if core.contains(['*', 'x', 'X']) || !core.chars().next()?.is_ascii_digit() {
        return None;
    }

    let mut candidate = token.to_string();
    if core.matches('.').count() < 2 {
        if token.len() != core.len() {
            // `1.2-beta` is not a shape worth guessing at.
            return None;
        }
        for _ in core.matches('.').count()..2 {
            candidate.push_str(".0");
        }
    }

    Version::parse(&candidate).ok().map(|v| v.to_string())
}

/// The major component a range is asking for, best effort.
pub fn requested_major(range: &str) -> Option<u64> {
    if let Some(version) = clean_version(range) {
        return Version::parse(&version).ok().map(|v| v.major);
    }
    let digits: String = range
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_range_operators() {
        assert_eq!(clean_version("^4.9.0").as_deref(), Some("4.9.0"));
        assert_eq!(clean_version("~1.2.3").as_deref(), Some("1.2.3"));
        assert_eq!(clean_version(">=1.2.0 <2.0.0").as_deref(), Some("1.2.0"));
        assert_eq!(clean_version("v2.0.1").as_deref(), Some("2.0.1"));
    }

    #[test]
    fn pads_short_versions() {
        assert_eq!(clean_version("^4").as_deref(), Some("4.0.0"));
        assert_eq!(clean_version("1.2").as_deref(), Some("1.2.0"));
    }

    #[test]
    fn keeps_prerelease_versions() {
        assert_eq!(
            clean_version("1.0.0-beta.1").as_deref(),
            Some("1.0.0-beta.1")
        );
    }

    #[test]
    fn wildcards_and_tags_yield_nothing() {
        assert_eq!(clean_version("*"), None);
        assert_eq!(clean_version("4.x"), None);
        assert_eq!(clean_version("latest"), None);
        assert_eq!(clean_version(""), None);
    }

    #[test]
    fn major_extraction_is_lenient() {
        assert_eq!(requested_major("^4.9.0"), Some(4));
        assert_eq!(requested_major(">=2"), Some(2));
        assert_eq!(requested_major("garbage"), None);
    }
}
