//! Flattening: the whole import graph concatenated into one import-free
//! file, dependencies first, with a single hoisted license line and version
//! pragma.

use crate::Result;
use crate::adapter::IoAdapter;
use crate::resolve::Session;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug)]
pub struct FlattenOutput {
    /// Emission order, dependencies before dependents.
    pub order: Vec<String>,
    /// The full resolved bundle, including unversioned twin keys.
    pub sources: BTreeMap<String, String>,
    pub flattened: String,
}

impl<A: IoAdapter> Session<A> {
    /// Builds the graph from `entry`, persists the resolution index, and
    /// emits the concatenated source. Deterministic for a given session
    /// configuration: a second run over a warm cache produces identical
    /// bytes.
    pub async fn flatten(
        &mut self,
        entry: &str,
        pragma_override: Option<&str>,
    ) -> Result<FlattenOutput> {
        self.build_dependency_tree(entry).await?;

        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        post_order(entry, &self.edges, &mut visited, &mut order);

        let mut license: Option<String> = None;
        let mut pragma: Option<String> = None;
        let mut bodies = Vec::new();

        for file in &order {
            // Files whose fetch failed contribute nothing.
            let Some(source) = self.sources.get(file) else {
                continue;
            };
            let body = clean_body(source, &mut license, &mut pragma);
            bodies.push(format!("// File: {}\n{}", file, body));
        }

        let mut flattened = String::new();
        if let Some(license) = &license {
            flattened.push_str(license);
            flattened.push('\n');
        }
        match pragma_override {
            Some(range) => {
                flattened.push_str("pragma solidity ");
                flattened.push_str(range);
                flattened.push_str(";\n");
            }
            None => {
                if let Some(pragma) = &pragma {
                    flattened.push_str(pragma);
                    flattened.push('\n');
                }
            }
        }
        flattened.push('\n');
        flattened.push_str(&bodies.join("\n"));

        Ok(FlattenOutput {
            order,
            sources: self.sources.clone(),
            flattened,
        })
    }
}

/// Dependencies emit before dependents; every node exactly once, first seen
/// wins, so import cycles terminate.
fn post_order(
    node: &str,
    edges: &BTreeMap<String, BTreeSet<String>>,
    visited: &mut BTreeSet<String>,
    order: &mut Vec<String>,
) {
    if !visited.insert(node.to_string()) {
        return;
    }
    if let Some(children) = edges.get(node) {
        for child in children {
            post_order(child, edges, visited, order);
        }
    }
    order.push(node.to_string());
}

/// Strips import statements, license headers, and version pragmas from one
/// body. The first license line and first pragma seen across the whole
/// document are captured for the header; every other occurrence is dropped.
fn clean_body(source: &str, license: &mut Option<String>, pragma: &mut Option<String>) -> String {
    let mut out = String::new();
    let mut in_import = false;

    for line in source.lines() {
        let trimmed = line.trim();

        if in_import {
            if let Some(i) = trimmed.find(';') {
                in_import = false;
                let rest = trimmed[i + 1..].trim();
                if !rest.is_empty() {
                    out.push_str(rest);
                    out.push('\n');
                }
            }
            continue;
        }

        if trimmed.contains("SPDX-License-Identifier") {
            license.get_or_insert_with(|| trimmed.to_string());
            continue;
        }

        if trimmed.starts_with("pragma solidity") {
            pragma.get_or_insert_with(|| trimmed.to_string());
            continue;
        }

        if is_import_start(trimmed) {
            match trimmed.find(';') {
                Some(i) => {
                    let rest = trimmed[i + 1..].trim();
                    if !rest.is_empty() {
                        out.push_str(rest);
                        out.push('\n');
                    }
                }
                None => in_import = true,
            }
            continue;
        }

        out.push_str(line);
        out.push('\n');
    }

    // One trailing newline per body keeps the concatenation stable.
    let trimmed = out.trim_matches('\n');
    format!("{}\n", trimmed)
}

fn is_import_start(trimmed: &str) -> bool {
    trimmed == "import"
        || trimmed.starts_with("import ")
        || trimmed.starts_with("import\"")
        || trimmed.starts_with("import'")
        || trimmed.starts_with("import{")
        || trimmed.starts_with("import*")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::memory::MemoryAdapter;
    use crate::config::SoldepConfig;
    use crate::project::{Manifest, Project};
    use crate::resolve::Session;
    use std::path::{Path, PathBuf};

    fn pinned_project() -> Project {
        Project {
            root: PathBuf::from("."),
            manifest_path: PathBuf::from("package.json"),
            manifest: Manifest::parse(
                Path::new("package.json"),
                r#"{ "resolutions": { "@scope/pkg": "1.2.3" } }"#,
            )
            .unwrap(),
        }
    }

    fn bundle_adapter() -> MemoryAdapter {
        MemoryAdapter::new()
            .with_file(
                "Entry.sol",
                "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\nimport \"./lib/A.sol\";\nimport \"@scope/pkg/a.sol\";\ncontract Entry {}\n",
            )
            .with_file(
                "lib/A.sol",
                "// SPDX-License-Identifier: GPL-3.0\npragma solidity ^0.8.1;\ncontract A {}\n",
            )
            .with_url(
                "https://unpkg.com/@scope/pkg@1.2.3/a.sol",
                "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\ncontract PkgA {}\n",
            )
            .with_url(
                "https://unpkg.com/@scope/pkg@1.2.3/package.json",
                r#"{ "name": "@scope/pkg", "version": "1.2.3" }"#,
            )
    }

    #[tokio::test]
    async fn flatten_hoists_one_header_and_strips_imports() {
        let adapter = bundle_adapter();
        let mut session =
            Session::new(SoldepConfig::default(), &adapter).with_project(pinned_project());

        let output = session.flatten("Entry.sol", None).await.unwrap();

        let spdx_lines = output
            .flattened
            .lines()
            .filter(|l| l.contains("SPDX-License-Identifier"))
            .count();
        let pragma_lines = output
            .flattened
            .lines()
            .filter(|l| l.trim_start().starts_with("pragma solidity"))
            .count();
        let import_lines = output
            .flattened
            .lines()
            .filter(|l| l.trim_start().starts_with("import"))
            .count();

        assert_eq!(spdx_lines, 1);
        assert_eq!(pragma_lines, 1);
        assert_eq!(import_lines, 0);
        assert_eq!(*output.order.last().unwrap(), "Entry.sol");
        assert!(output.flattened.contains("// File: @scope/pkg/a.sol"));
        assert!(output.flattened.contains("contract PkgA {}"));
    }

    #[tokio::test]
    async fn flatten_twice_on_a_warm_cache_is_byte_identical() {
        let adapter = bundle_adapter();

        let first = Session::new(SoldepConfig::default(), &adapter)
            .with_project(pinned_project())
            .flatten("Entry.sol", None)
            .await
            .unwrap();
        let cold_fetches = adapter.fetch_count();

        let second = Session::new(SoldepConfig::default(), &adapter)
            .with_project(pinned_project())
            .flatten("Entry.sol", None)
            .await
            .unwrap();

        assert_eq!(first.flattened, second.flattened);
        assert_eq!(first.order, second.order);
        // Warm cache: the second run never touched the network.
        assert_eq!(adapter.fetch_count(), cold_fetches);
    }

    #[tokio::test]
    async fn pragma_override_replaces_the_hoisted_pragma() {
        let adapter = bundle_adapter();
        let mut session =
            Session::new(SoldepConfig::default(), &adapter).with_project(pinned_project());

        let output = session.flatten("Entry.sol", Some("0.8.19")).await.unwrap();

        assert!(output.flattened.contains("pragma solidity 0.8.19;"));
        assert!(!output.flattened.contains("pragma solidity ^0.8.0;"));
    }

    #[test]
    fn post_order_emits_dependencies_first() {
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        edges.insert(
            "entry.sol".into(),
            ["a.sol".to_string(), "b.sol".to_string()].into(),
        );
        edges.insert("a.sol".into(), ["b.sol".to_string()].into());

        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        post_order("entry.sol", &edges, &mut visited, &mut order);

        assert_eq!(order, vec!["b.sol", "a.sol", "entry.sol"]);
    }

    #[test]
    fn post_order_survives_cycles() {
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        edges.insert("a.sol".into(), ["b.sol".to_string()].into());
        edges.insert("b.sol".into(), ["a.sol".to_string()].into());

        let mut visited = BTreeSet::new();
        let mut order = Vec::new();
        post_order("a.sol", &edges, &mut visited, &mut order);

        assert_eq!(order, vec!["b.sol", "a.sol"]);
    }

    #[test]
    fn clean_body_hoists_first_license_and_pragma() {
        let mut license = None;
        let mut pragma = None;
        let body = clean_body(
            "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\nimport \"./A.sol\";\ncontract C {}\n",
            &mut license,
            &mut pragma,
        );
        assert_eq!(license.as_deref(), Some("// SPDX-License-Identifier: MIT"));
        assert_eq!(pragma.as_deref(), Some("pragma solidity ^0.8.0;"));
        assert_eq!(body, "contract C {}\n");

        // A second body keeps the first capture and drops its own headers.
        let second = clean_body(
            "// SPDX-License-Identifier: GPL-3.0\npragma solidity ^0.8.1;\ncontract D {}\n",
            &mut license,
            &mut pragma,
        );
        assert_eq!(license.as_deref(), Some("// SPDX-License-Identifier: MIT"));
        assert_eq!(pragma.as_deref(), Some("pragma solidity ^0.8.0;"));
        assert_eq!(second, "contract D {}\n");
    }

    #[test]
    fn clean_body_handles_multiline_imports() {
        let mut license = None;
        let mut pragma = None;
        let body = clean_body(
            "import {\n    A,\n    B\n} from \"./AB.sol\";\ncontract C {}\n",
            &mut license,
            &mut pragma,
        );
        assert_eq!(body, "contract C {}\n");
    }
}
