//! Recursive dependency walk: one entry file in, a de-duplicated bundle of
//! resolved sources out. The walk is strictly sequential because version
//! resolution is order-dependent - the first unversioned import of a package
//! decides its version for the whole session.

use crate::Result;
use crate::adapter::IoAdapter;
use crate::console::Severity;
use crate::remap;
use crate::resolve::Session;
use crate::resolve::types::{PackagePath, ParentContext};
use async_recursion::async_recursion;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

impl<A: IoAdapter> Session<A> {
    /// Walks `entry` recursively and returns the resolved source bundle,
    /// keyed by the exact specifier strings the compiler will ask for.
    /// Failures below the entry file drop that subtree and keep walking; a
    /// failure on the entry itself is fatal.
    pub async fn build_dependency_tree(&mut self, entry: &str) -> Result<BTreeMap<String, String>> {
        self.index.load(&self.adapter).await;
        self.process_file(entry.to_string(), None).await?;
        self.index.save(&self.adapter)?;
        Ok(self.sources.clone())
    }

    /// The file-to-imports edges discovered so far.
    pub fn graph(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.edges
    }

    #[async_recursion(?Send)]
    async fn process_file(
        &mut self,
        specifier: String,
        parent: Option<ParentContext>,
    ) -> Result<()> {
        if !self.config.has_source_extension(&specifier) && !specifier.ends_with("package.json") {
            self.emit(
                Severity::Info,
                format!("skipping {}: not a recognized source file", specifier),
            );
            return Ok(());
        }

        // First resolution wins; identical specifiers later are no-ops.
        if !self.processed.insert(specifier.clone()) {
            return Ok(());
        }

        let local = self.is_local(&specifier);
        let content = if local {
            let content = self.adapter.read_file(Path::new(&specifier))?;
            self.mappings.insert(specifier.clone(), specifier.clone());
            content
        } else {
            self.active_parent = parent.clone();
            self.resolve_and_save(&specifier, None).await?
        };

        self.sources.insert(specifier.clone(), content.clone());
        // A versioned key also materializes under its unversioned twin so
        // compiler-facing unversioned references resolve within the bundle.
        if !specifier.contains("://")
            && let Some(pkg) = PackagePath::parse(&specifier)
            && pkg.version.is_some()
        {
            self.sources
                .entry(pkg.unversioned())
                .or_insert_with(|| content.clone());
        }

        let own_context = if local {
            None
        } else {
            self.derive_context(&specifier)
        };

        let imports = extract_imports(&content);
        self.index.clear_file_resolutions(&specifier);
        let mut children = BTreeSet::new();

        for original in imports {
            let child = if original.starts_with("./") || original.starts_with("../") {
                resolve_relative(&specifier, &original)
            } else {
                remap::apply(&self.remappings, &original)
            };
            children.insert(child.clone());

            if let Err(err) = self.process_file(child.clone(), own_context.clone()).await {
                self.emit(Severity::Warn, format!("skipping {}: {}", child, err));
            }

            let resolved = self
                .mappings
                .get(&child)
                .cloned()
                .unwrap_or_else(|| child.clone());
            self.index.record_resolution(&specifier, &original, &resolved);
        }

        self.edges.insert(specifier, children);
        Ok(())
    }

    /// Local files are read directly, with no version machinery: no scheme,
    /// no version marker, not under a dependency directory, and actually
    /// present on disk (which is what separates a project path from an
    /// unscoped, unversioned package import).
    fn is_local(&self, specifier: &str) -> bool {
        !specifier.contains("://")
            && !specifier.starts_with("npm:")
            && !specifier.contains('@')
            && !specifier.contains("node_modules/")
            && self.adapter.exists(Path::new(specifier))
    }

    /// The package owning this file, used as the parent context when its own
    /// imports are resolved.
    fn derive_context(&self, specifier: &str) -> Option<ParentContext> {
        if specifier.contains("://") {
            return None;
        }
        let pkg = PackagePath::parse(specifier)?;
        let version = pkg
            .version
            .clone()
            .or_else(|| self.pkg_versions.get(&pkg.name).cloned())?;
        let key = format!("{}@{}", pkg.name, version);
        let context = self.contexts.get(&key).cloned().unwrap_or_default();
        Some(ParentContext { key, context })
    }
}

/// Resolves `./` and `../` imports against the directory of the importer's
/// specifier string (not its on-disk path), so relative imports inside
/// packages and URLs stay in their origin's namespace.
pub(crate) fn resolve_relative(importer: &str, import: &str) -> String {
    let (scheme, rest) = split_scheme(importer);
    let dir = match rest.rfind('/') {
        Some(i) => &rest[..i],
        None => "",
    };
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in import.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("{}{}", scheme, parts.join("/"))
}

fn split_scheme(specifier: &str) -> (&str, &str) {
    match specifier.find("://") {
        Some(i) => specifier.split_at(i + 3),
        None => ("", specifier),
    }
}

#[derive(Clone, Copy, Eq, PartialEq)]
enum ScanState {
    Code,
    Line,
    Block,
    Str(char),
}

/// Removes `//` and `/* */` comments while tracking string-literal spans, so
/// a `//` inside a quoted URL import survives.
pub(crate) fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut state = ScanState::Code;

    while let Some(c) = chars.next() {
        match state {
            ScanState::Code => match c {
                '"' | '\'' => {
                    state = ScanState::Str(c);
                    out.push(c);
                }
                '/' => match chars.peek() {
                    Some('/') => {
                        chars.next();
                        state = ScanState::Line;
                    }
                    Some('*') => {
                        chars.next();
                        state = ScanState::Block;
                    }
                    _ => out.push(c),
                },
                _ => out.push(c),
            },
            ScanState::Line => {
                if c == '\n' {
                    out.push('\n');
                    state = ScanState::Code;
                }
            }
            ScanState::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = ScanState::Code;
                }
            }
            ScanState::Str(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote {
                    state = ScanState::Code;
                }
            }
        }
    }

    out
}

/// Pulls the quoted specifier out of every import statement. All supported
/// shapes (plain, named, namespace, default, default-plus-named) carry
/// exactly one quoted path per statement.
pub(crate) fn extract_imports(source: &str) -> Vec<String> {
    let cleaned = strip_comments(source);
    let bytes = cleaned.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while let Some(pos) = cleaned[i..].find("import") {
        let start = i + pos;
        let after = start + "import".len();
        let boundary_before = start == 0 || !is_ident_byte(bytes[start - 1]);
        let boundary_after = after < bytes.len()
            && (bytes[after].is_ascii_whitespace() || matches!(bytes[after], b'"' | b'\'' | b'{' | b'*'));

        if !(boundary_before && boundary_after) {
            i = after;
            continue;
        }

        let end = cleaned[after..]
            .find(';')
            .map(|e| after + e)
            .unwrap_or(cleaned.len());
        if let Some(specifier) = first_quoted(&cleaned[after..end]) {
            out.push(specifier);
        }
        i = end;
    }

    out
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn first_quoted(statement: &str) -> Option<String> {
    let open = statement.find(['"', '\''])?;
    let quote = statement.as_bytes()[open] as char;
    let rest = &statement[open + 1..];
    let close = rest.find(quote)?;
    Some(rest[..close].to_string())
}
