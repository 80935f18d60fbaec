//! Advisory diagnostics over resolved package manifests. Nothing here blocks
//! resolution; each distinct conflict is reported at most once per session.

use crate::adapter::IoAdapter;
use crate::console::{Diagnostic, Severity};
use crate::project::Manifest;
use crate::resolve::Session;
use crate::resolve::types::PackageContext;
use crate::version::requested_major;
use semver::{Version, VersionReq};
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DepKind {
    Dependency,
    PeerDependency,
}

impl DepKind {
    fn as_str(self) -> &'static str {
        match self {
            DepKind::Dependency => "dependency",
            DepKind::PeerDependency => "peerDependency",
        }
    }
}

/// De-duplicates diagnostics by composite key; each unique key is emitted at
/// most once per session.
#[derive(Default)]
pub struct ConflictTracker {
    seen: BTreeSet<String>,
}

impl ConflictTracker {
    fn once(&mut self, key: String, diagnostic: Diagnostic) -> Option<Diagnostic> {
        if self.seen.insert(key) {
            Some(diagnostic)
        } else {
            None
        }
    }

    pub fn duplicate_file(
        &mut self,
        package: &str,
        relative_path: &str,
        previous: &str,
        requested: &str,
    ) -> Option<Diagnostic> {
        let key = format!("dup:{}:{}:{}:{}", package, relative_path, previous, requested);
        self.once(
            key,
            Diagnostic::new(
                Severity::Error,
                format!(
                    "{}/{} was already resolved at version {} but is now requested at {}; \
                     import it with an explicit version (e.g. {}@{}/{}) to disambiguate",
                    package, relative_path, previous, requested, package, requested, relative_path
                ),
            ),
        )
    }

    pub fn dependency_mismatch(
        &mut self,
        kind: DepKind,
        package: &str,
        dependency: &str,
        range: &str,
        resolved: &str,
        breaking: bool,
    ) -> Option<Diagnostic> {
        let key = format!(
            "dep:{}:{}:{}:{}:{}",
            kind.as_str(),
            package,
            dependency,
            range,
            resolved
        );
        let (severity, detail) = if breaking {
            (Severity::Error, "major version mismatch")
        } else {
            (Severity::Warn, "outside the declared range")
        };
        self.once(
            key,
            Diagnostic::new(
                severity,
                format!(
                    "{} declares {} {}@{} but this session resolves {}@{} ({})",
                    package,
                    kind.as_str(),
                    dependency,
                    range,
                    dependency,
                    resolved,
                    detail
                ),
            ),
        )
    }

    pub fn multi_parent(
        &mut self,
        dependency: &str,
        parents: &[(String, String)],
    ) -> Option<Diagnostic> {
        let mut versions: Vec<&str> = parents.iter().map(|(_, v)| v.as_str()).collect();
        versions.sort_unstable();
        versions.dedup();
        let key = format!("multi:{}:{}", dependency, versions.join(","));
        let listing = parents
            .iter()
            .map(|(parent, version)| format!("{} requires {}", parent, version))
            .collect::<Vec<_>>()
            .join("; ");
        self.once(
            key,
            Diagnostic::new(
                Severity::Warn,
                format!(
                    "conflicting version requirements for {}: {}",
                    dependency, listing
                ),
            ),
        )
    }
}

impl<A: IoAdapter> Session<A> {
    /// Records a fetched manifest as the parent context for
    /// `<name>@<version>` and runs the conflict scans over its declared
    /// dependencies.
    pub(crate) fn record_package_context(&mut self, name: &str, version: &str, manifest: &Manifest) {
        let key = format!("{}@{}", name, version);
        self.contexts.insert(
            key.clone(),
            PackageContext {
                dependencies: manifest.dependencies.clone(),
                peer_dependencies: manifest.peer_dependencies.clone(),
            },
        );

        for (dep, range) in manifest
            .dependencies
            .iter()
            .chain(manifest.peer_dependencies.iter())
        {
            let ranges = self.declared.entry(dep.clone()).or_default();
            ranges
                .entry(range.clone())
                .or_default()
                .insert(key.clone());

            let parents: Option<Vec<(String, String)>> = if ranges.len() >= 2 {
                Some(
                    ranges
                        .iter()
                        .flat_map(|(range, parents)| {
                            parents.iter().map(|p| (p.clone(), range.clone()))
                        })
                        .collect(),
                )
            } else {
                None
            };

            if let Some(parents) = parents {
                let distinct: BTreeSet<&str> = parents.iter().map(|(p, _)| p.as_str()).collect();
                if distinct.len() >= 2
                    && let Some(diagnostic) = self.conflicts.multi_parent(dep, &parents)
                {
                    self.sink.emit(&diagnostic);
                }
            }
        }

        self.check_package_dependencies(name, version, manifest);
    }

    /// Compares every declared dependency/peerDependency of a resolved
    /// package against what this session actually resolves that name to.
    /// Non-peer dependencies that have not been imported yet carry no
    /// contradicting constraint and are skipped on purpose; resolving them
    /// speculatively just to warn would make diagnostics depend on registry
    /// state.
    pub(crate) fn check_package_dependencies(
        &mut self,
        name: &str,
        version: &str,
        manifest: &Manifest,
    ) {
        let package_key = format!("{}@{}", name, version);
        let checks: Vec<(DepKind, String, String)> = manifest
            .dependencies
            .iter()
            .map(|(d, r)| (DepKind::Dependency, d.clone(), r.clone()))
            .chain(
                manifest
                    .peer_dependencies
                    .iter()
                    .map(|(d, r)| (DepKind::PeerDependency, d.clone(), r.clone())),
            )
            .collect();

        for (kind, dependency, range) in checks {
            let Some(resolved) = self.session_resolution_for(&dependency, kind) else {
                continue;
            };
            let Ok(resolved_version) = Version::parse(&resolved) else {
                continue;
            };

            let ranges = parse_ranges(&range);
            if ranges.iter().any(|r| r.matches(&resolved_version)) {
                continue;
            }

            let diagnostic = match requested_major(&range) {
                Some(major) if major != resolved_version.major => {
                    self.conflicts.dependency_mismatch(
                        kind,
                        &package_key,
                        &dependency,
                        &range,
                        &resolved,
                        true,
                    )
                }
                _ if !ranges.is_empty() => self.conflicts.dependency_mismatch(
                    kind,
                    &package_key,
                    &dependency,
                    &range,
                    &resolved,
                    false,
                ),
                _ => None,
            };
            if let Some(diagnostic) = diagnostic {
                self.sink.emit(&diagnostic);
            }
        }
    }

    /// What this session will resolve `dependency` to, without triggering any
    /// new resolution. An existing session pin always answers; otherwise only
    /// peer dependencies consult the workspace and lockfile tiers.
    fn session_resolution_for(&self, dependency: &str, kind: DepKind) -> Option<String> {
        if let Some(version) = self.pkg_versions.get(dependency) {
            return Some(version.clone());
        }
        if kind != DepKind::PeerDependency {
            return None;
        }
        if let Some(manifest) = self.project.as_ref().map(|p| &p.manifest) {
            if let Some(pinned) = manifest
                .pinned_version(dependency)
                .or_else(|| manifest.alias_version(dependency))
            {
                return crate::version::clean_version(&pinned);
            }
        }
        self.lockfile
            .version_for(dependency)
            .and_then(crate::version::clean_version)
    }
}

/// npm-style `a || b` alternatives, each parsed best effort; unparseable
/// parts are dropped.
fn parse_ranges(range: &str) -> Vec<VersionReq> {
    range
        .split("||")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| VersionReq::parse(part).ok())
        .collect()
}
