//! The per-entry resolution session. All session-wide mutable state (the
//! package version pins, the processed set, the conflict dedup sets) lives on
//! one `Session` value, so independent resolutions never share state.

pub mod types;

use crate::adapter::IoAdapter;
use crate::config::SoldepConfig;
use crate::conflicts::ConflictTracker;
use crate::console::{ConsoleSink, Diagnostic, DiagnosticSink, Severity};
use crate::index::ResolutionIndex;
use crate::lockfile::Lockfile;
use crate::normalize;
use crate::project::Project;
use crate::remap::Remapping;
use crate::{Result, SoldepError};
use async_recursion::async_recursion;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use types::{PackagePath, ParentContext};

pub struct Session<A: IoAdapter> {
    pub(crate) config: SoldepConfig,
    pub(crate) adapter: A,
    pub(crate) project: Option<Project>,
    pub(crate) lockfile: Lockfile,
    pub(crate) remappings: Vec<Remapping>,
    pub(crate) sink: Box<dyn DiagnosticSink>,
    pub(crate) index: ResolutionIndex,

    /// Package name -> version pinned by the first unversioned import.
    pub(crate) pkg_versions: BTreeMap<String, String>,
    /// `<name>@<version>` -> that package's declared dependencies.
    pub(crate) contexts: BTreeMap<String, types::PackageContext>,
    /// Package name -> relative file path -> last version it was fetched at.
    pub(crate) file_versions: BTreeMap<String, BTreeMap<String, String>>,
    /// Original specifier -> local resolved path.
    pub(crate) mappings: BTreeMap<String, String>,
    pub(crate) processed: BTreeSet<String>,
    pub(crate) sources: BTreeMap<String, String>,
    pub(crate) edges: BTreeMap<String, BTreeSet<String>>,
    pub(crate) conflicts: ConflictTracker,
    /// Dependency name -> declared range -> parents declaring it.
    pub(crate) declared: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
    /// The package whose files are currently being walked.
    pub(crate) active_parent: Option<ParentContext>,
}

impl<A: IoAdapter> Session<A> {
    pub fn new(config: SoldepConfig, adapter: A) -> Self {
        let index = ResolutionIndex::new(&config);
        adapter.set_cache_enabled(config.cache_enabled);
        Session {
            config,
            adapter,
            project: None,
            lockfile: Lockfile::default(),
            remappings: Vec::new(),
            sink: Box::new(ConsoleSink),
            index,
            pkg_versions: BTreeMap::new(),
            contexts: BTreeMap::new(),
            file_versions: BTreeMap::new(),
            mappings: BTreeMap::new(),
            processed: BTreeSet::new(),
            sources: BTreeMap::new(),
            edges: BTreeMap::new(),
            conflicts: ConflictTracker::default(),
            declared: BTreeMap::new(),
            active_parent: None,
        }
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.project = Some(project);
        self
    }

    pub fn with_lockfile(mut self, lockfile: Lockfile) -> Self {
        self.lockfile = lockfile;
        self
    }

    pub fn with_remappings(mut self, remappings: Vec<Remapping>) -> Self {
        self.remappings = remappings;
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// The session-wide original-specifier -> resolved-path map.
    pub fn mappings(&self) -> &BTreeMap<String, String> {
        &self.mappings
    }

    /// The resolved source bundle built so far, keyed by specifier.
    pub fn sources(&self) -> &BTreeMap<String, String> {
        &self.sources
    }

    /// The version every package was pinned to this session.
    pub fn pinned_versions(&self) -> &BTreeMap<String, String> {
        &self.pkg_versions
    }

    pub(crate) fn emit(&mut self, severity: Severity, message: String) {
        self.sink.emit(&Diagnostic::new(severity, message));
    }

    fn validate_specifier(&self, specifier: &str) -> Result<()> {
        if self.config.has_source_extension(specifier) || specifier.ends_with("package.json") {
            Ok(())
        } else {
            Err(SoldepError::MalformedSpecifier {
                specifier: specifier.to_string(),
                reason: "import does not end in a recognized source extension".to_string(),
            })
        }
    }

    /// Longest-prefix match of the specifier against workspace `npm:` alias
    /// keys; `my-erc20/token.sol` becomes `@openzeppelin/contracts@4.9.0/token.sol`
    /// if the root manifest aliases `my-erc20` that way.
    fn apply_workspace_alias(&self, specifier: &str) -> Option<String> {
        let manifest = &self.project.as_ref()?.manifest;
        for (key, target) in manifest.alias_keys() {
            if specifier == key {
                return Some(target);
            }
            if let Some(rest) = specifier.strip_prefix(format!("{}/", key).as_str()) {
                return Some(format!("{}/{}", target, rest));
            }
        }
        None
    }

    fn record_mapping(&mut self, original: &str, resolved: String) {
        self.mappings.insert(original.to_string(), resolved);
    }

    fn target_for(&self, cache_relative: &str, override_path: Option<&str>) -> PathBuf {
        match override_path {
            Some(path) => PathBuf::from(path),
            None => self.config.target_path(cache_relative),
        }
    }

    /// Resolves one specifier, fetches its content through the IO adapter,
    /// persists it at the deterministic cache path, and records the
    /// specifier -> path mapping for the session.
    pub async fn resolve_and_save(
        &mut self,
        specifier: &str,
        target_path: Option<&str>,
    ) -> Result<String> {
        self.resolve_and_save_with(specifier, target_path, false)
            .await
    }

    #[async_recursion(?Send)]
    pub async fn resolve_and_save_with(
        &mut self,
        specifier: &str,
        target_path: Option<&str>,
        skip_mapping_reuse: bool,
    ) -> Result<String> {
        self.validate_specifier(specifier)?;

        if !skip_mapping_reuse
            && let Some(resolved) = self.mappings.get(specifier)
        {
            if let Some(content) = self.sources.get(specifier) {
                return Ok(content.clone());
            }
            if let Ok(content) = self.adapter.read_file(Path::new(resolved)) {
                return Ok(content);
            }
        }

        if specifier.starts_with("http://") || specifier.starts_with("https://") {
            return self.resolve_url(specifier, target_path).await;
        }

        if let Some(normalized) = normalize::normalize_ipfs(specifier, &self.config)
            .or_else(|| normalize::normalize_swarm(specifier, &self.config))
        {
            let target = self.target_for(&normalized.normalized_path, target_path);
            let content = self
                .adapter
                .resolve_and_save(&normalized.fetch_url, Some(&target))
                .await?;
            self.record_mapping(specifier, target.display().to_string());
            return Ok(content);
        }

        if let Some(rest) = specifier.strip_prefix("npm:") {
            let rest = rest.to_string();
            let content = self
                .resolve_and_save_with(&rest, target_path, skip_mapping_reuse)
                .await?;
            if let Some(resolved) = self.mappings.get(&rest).cloned() {
                self.record_mapping(specifier, resolved);
            }
            return Ok(content);
        }

        if specifier.starts_with("./") || specifier.starts_with("../") {
            return Err(SoldepError::MalformedSpecifier {
                specifier: specifier.to_string(),
                reason: "relative import reached the resolver without a file context".to_string(),
            });
        }

        if let Some(aliased) = self.apply_workspace_alias(specifier) {
            let content = self
                .resolve_and_save_with(&aliased, target_path, skip_mapping_reuse)
                .await?;
            if let Some(resolved) = self.mappings.get(&aliased).cloned() {
                self.record_mapping(specifier, resolved);
            }
            return Ok(content);
        }

        self.resolve_package_path(specifier, target_path).await
    }

    async fn resolve_url(&mut self, specifier: &str, target_path: Option<&str>) -> Result<String> {
        let effective = normalize::github_blob_to_raw(specifier)
            .unwrap_or_else(|| specifier.to_string());

        // CDN npm mirrors re-enter the bare-npm pipeline so only one
        // version-resolution path exists.
        if let Some(npm_path) = normalize::cdn_to_npm(&effective) {
            let content = self
                .resolve_and_save_with(&npm_path, target_path, true)
                .await?;
            if let Some(resolved) = self.mappings.get(&npm_path).cloned() {
                self.record_mapping(specifier, resolved);
            }
            return Ok(content);
        }

        let cache_relative = match normalize::normalize_raw_github(&effective) {
            Some(normalized) => normalized.normalized_path,
            None => normalize::http_cache_path(&effective).ok_or_else(|| {
                SoldepError::MalformedSpecifier {
                    specifier: specifier.to_string(),
                    reason: "URL carries no fetchable path".to_string(),
                }
            })?,
        };

        let target = self.target_for(&cache_relative, target_path);
        let content = self
            .adapter
            .resolve_and_save(&effective, Some(&target))
            .await?;
        self.record_mapping(specifier, target.display().to_string());
        Ok(content)
    }

    async fn resolve_package_path(
        &mut self,
        specifier: &str,
        target_path: Option<&str>,
    ) -> Result<String> {
        let pkg = PackagePath::parse(specifier).ok_or_else(|| SoldepError::MalformedSpecifier {
            specifier: specifier.to_string(),
            reason: "not a recognizable package path".to_string(),
        })?;

        let versioned_specifier = match &pkg.version {
            Some(version) => {
                let version = version.clone();
                self.ensure_manifest(&pkg.name, &version).await;
                self.track_file_version(&pkg, &version);
                specifier.to_string()
            }
            None => {
                let version = match self.pkg_versions.get(&pkg.name).cloned() {
                    Some(pinned) => Some(pinned),
                    None => {
                        let resolved = self.resolve_version(&pkg.name).await;
                        if let Some(version) = &resolved.version {
                            // First unversioned import decides for the session.
                            self.pkg_versions
                                .insert(pkg.name.clone(), version.clone());
                        }
                        resolved.version
                    }
                };
                match version {
                    Some(version) => {
                        self.ensure_manifest(&pkg.name, &version).await;
                        self.track_file_version(&pkg, &version);
                        pkg.with_version(&version)
                    }
                    // No tier produced a version: leave the specifier
                    // unversioned rather than failing the walk.
                    None => specifier.to_string(),
                }
            }
        };

        let cache_relative = format!("npm/{}", versioned_specifier);
        let target = self.target_for(&cache_relative, target_path);
        let url = normalize::to_http_url(&versioned_specifier, &self.config);
        let content = self.adapter.resolve_and_save(&url, Some(&target)).await?;

        let resolved = target.display().to_string();
        if versioned_specifier != specifier {
            self.record_mapping(&versioned_specifier, resolved.clone());
        }
        self.record_mapping(specifier, resolved);
        Ok(content)
    }

    /// Same relative file under a different version of the same package is a
    /// compiler-level ambiguity; flag it once per combination and proceed
    /// with the newly requested version.
    fn track_file_version(&mut self, pkg: &PackagePath, version: &str) {
        if pkg.relative_path.is_empty() || pkg.relative_path.ends_with("package.json") {
            return;
        }
        let previous = self
            .file_versions
            .entry(pkg.name.clone())
            .or_default()
            .insert(pkg.relative_path.clone(), version.to_string());
        if let Some(previous) = previous
            && previous != version
        {
            let diagnostic =
                self.conflicts
                    .duplicate_file(&pkg.name, &pkg.relative_path, &previous, version);
            if let Some(diagnostic) = diagnostic {
                self.sink.emit(&diagnostic);
            }
        }
    }

    /// Fetches and records `<name>@<version>/package.json` once per session:
    /// its declared dependencies become the parent context for files of this
    /// package, and the conflict checker runs over them. Failure is
    /// tolerated; the package simply contributes no context.
    pub(crate) async fn ensure_manifest(&mut self, name: &str, version: &str) {
        let key = format!("{}@{}", name, version);
        if self.contexts.contains_key(&key) {
            return;
        }

        let manifest_specifier = format!("{}/package.json", key);
        let cache_relative = format!("npm/{}", manifest_specifier);
        let target = self.config.target_path(&cache_relative);
        let url = normalize::to_http_url(&manifest_specifier, &self.config);

        match self.adapter.resolve_and_save(&url, Some(&target)).await {
            Ok(data) => match crate::project::Manifest::parse(&target, &data) {
                Ok(manifest) => {
                    self.record_package_context(name, version, &manifest);
                }
                Err(_) => {
                    self.emit(
                        Severity::Info,
                        format!("manifest for {} is not valid JSON; ignoring", key),
                    );
                    self.contexts.insert(key, types::PackageContext::default());
                }
            },
            Err(err) => {
                self.emit(
                    Severity::Info,
                    format!("could not fetch manifest for {}: {}", key, err),
                );
                self.contexts.insert(key, types::PackageContext::default());
            }
        }
    }
}
