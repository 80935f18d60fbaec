use std::collections::BTreeMap;

/// Which precedence tier produced a version.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VersionSource {
    /// An `npm:<pkg>@<version>` alias in the root manifest.
    Alias,
    /// Root manifest `resolutions` / `overrides`.
    Workspace,
    /// The declared dependency range of the named parent package.
    Parent(String),
    /// yarn.lock / package-lock.json.
    Lockfile,
    /// The registry/CDN `package.json` fetch, or a total miss
    /// (`version: None`).
    Registry,
}

/// Outcome of version resolution for one (package, session) pair. Immutable
/// once computed; the session pins the first answer for every later
/// unversioned import of the same package.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedVersion {
    pub version: Option<String>,
    pub source: VersionSource,
}

/// Declared dependencies of a resolved `<package>@<version>`, kept per
/// session so that files belonging to that package can resolve their own
/// unversioned imports against it.
#[derive(Clone, Debug, Default)]
pub struct PackageContext {
    pub dependencies: BTreeMap<String, String>,
    pub peer_dependencies: BTreeMap<String, String>,
}

impl PackageContext {
    pub fn declared_range(&self, name: &str) -> Option<&str> {
        self.dependencies
            .get(name)
            .or_else(|| self.peer_dependencies.get(name))
            .map(String::as_str)
    }
}

/// The package currently being walked, threaded through each recursive call
/// of the graph builder.
#[derive(Clone, Debug)]
pub struct ParentContext {
    /// `<name>@<version>` key of the owning package.
    pub key: String,
    pub context: PackageContext,
}

/// A bare package path split into its parts:
/// `@scope/pkg@1.2.3/src/A.sol` -> (`@scope/pkg`, `1.2.3`, `src/A.sol`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackagePath {
    pub name: String,
    pub version: Option<String>,
    pub relative_path: String,
}

impl PackagePath {
    pub fn parse(specifier: &str) -> Option<PackagePath> {
        let name_end = if let Some(rest) = specifier.strip_prefix('@') {
            // Scoped: the name spans the scope and one more segment.
            let scope_slash = rest.find('/')?;
            let tail = &rest[scope_slash + 1..];
            let offset = 1 + scope_slash + 1;
            match tail.find(['/', '@']) {
                Some(i) => offset + i,
                None => specifier.len(),
            }
        } else {
            specifier.find(['/', '@']).unwrap_or(specifier.len())
        };

        let name = &specifier[..name_end];
        if name.is_empty() || name == "@" {
            return None;
        }
        let remainder = &specifier[name_end..];

        let (version, relative_path) = if let Some(rest) = remainder.strip_prefix('@') {
            match rest.find('/') {
                Some(i) => (Some(rest[..i].to_string()), rest[i + 1..].to_string()),
                None => (Some(rest.to_string()), String::new()),
            }
        } else {
            (None, remainder.trim_start_matches('/').to_string())
        };

        if version.as_deref() == Some("") {
            return None;
        }

        Some(PackagePath {
            name: name.to_string(),
            version,
            relative_path,
        })
    }

    /// The specifier with the session-decided version spliced in.
    pub fn with_version(&self, version: &str) -> String {
        if self.relative_path.is_empty() {
            format!("{}@{}", self.name, version)
        } else {
            format!("{}@{}/{}", self.name, version, self.relative_path)
        }
    }

    pub fn unversioned(&self) -> String {
        if self.relative_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.name, self.relative_path)
        }
    }
}
