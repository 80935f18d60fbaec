#[cfg(test)]
mod tests {
    use crate::adapter::IoAdapter;
    use crate::adapter::memory::MemoryAdapter;
    use crate::config::SoldepConfig;
    use crate::console::Severity;
    use crate::console::recording::RecordingSink;
    use crate::lockfile::Lockfile;
    use crate::project::{Manifest, Project};
    use crate::resolve::Session;
    use std::path::{Path, PathBuf};

    fn project_with(manifest_json: &str) -> Project {
        Project {
            root: PathBuf::from("."),
            manifest_path: PathBuf::from("package.json"),
            manifest: Manifest::parse(Path::new("package.json"), manifest_json).unwrap(),
        }
    }

    fn session(adapter: &MemoryAdapter) -> Session<&MemoryAdapter> {
        Session::new(SoldepConfig::default(), adapter)
    }

    #[tokio::test]
    async fn unversioned_imports_pin_one_version_per_session() {
        let adapter = MemoryAdapter::new()
            .with_file("Entry.sol", "import \"pkg/a.sol\";\nimport \"pkg/b.sol\";\n")
            .with_url(
                "https://unpkg.com/pkg/package.json",
                r#"{ "name": "pkg", "version": "1.5.0" }"#,
            )
            .with_url("https://unpkg.com/pkg@1.5.0/a.sol", "contract A {}\n")
            .with_url("https://unpkg.com/pkg@1.5.0/b.sol", "contract B {}\n");

        let mut session = session(&adapter);
        session.build_dependency_tree("Entry.sol").await.unwrap();

        assert_eq!(
            session.pinned_versions().get("pkg").map(String::as_str),
            Some("1.5.0")
        );
        assert!(adapter.file(".deps/npm/pkg@1.5.0/a.sol").is_some());
        assert!(adapter.file(".deps/npm/pkg@1.5.0/b.sol").is_some());
        // One metadata fetch decides the version; the second import reuses it.
        let manifest_fetches = adapter
            .fetch_log
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.ends_with("pkg/package.json"))
            .count();
        assert_eq!(manifest_fetches, 1);
    }

    #[tokio::test]
    async fn workspace_pin_beats_lockfile_and_registry() {
        let adapter = MemoryAdapter::new()
            .with_file("Entry.sol", "import \"@scope/pkg/a.sol\";\n")
            .with_url(
                "https://unpkg.com/@scope/pkg@1.2.3/a.sol",
                "contract A {}\n",
            )
            .with_url(
                "https://unpkg.com/@scope/pkg@1.2.3/package.json",
                r#"{ "name": "@scope/pkg", "version": "1.2.3" }"#,
            );

        let lockfile = Lockfile::from_yarn("\"@scope/pkg@^9.0.0\":\n  version \"9.9.9\"\n");
        let mut session = session(&adapter)
            .with_project(project_with(
                r#"{ "resolutions": { "@scope/pkg": "1.2.3" } }"#,
            ))
            .with_lockfile(lockfile);

        session.build_dependency_tree("Entry.sol").await.unwrap();

        assert!(adapter.file(".deps/npm/@scope/pkg@1.2.3/a.sol").is_some());
        assert!(adapter.file(".deps/npm/@scope/pkg@9.9.9/a.sol").is_none());
    }

    #[tokio::test]
    async fn same_file_under_two_versions_raises_one_duplicate_diagnostic() {
        let sink = RecordingSink::default();
        let adapter = MemoryAdapter::new()
            .with_file(
                "Entry.sol",
                "import \"pkg@1.0.0/a.sol\";\nimport \"pkg@2.0.0/a.sol\";\n",
            )
            .with_url("https://unpkg.com/pkg@1.0.0/a.sol", "contract A1 {}\n")
            .with_url("https://unpkg.com/pkg@2.0.0/a.sol", "contract A2 {}\n")
            .with_url(
                "https://unpkg.com/pkg@1.0.0/package.json",
                r#"{ "name": "pkg", "version": "1.0.0" }"#,
            )
            .with_url(
                "https://unpkg.com/pkg@2.0.0/package.json",
                r#"{ "name": "pkg", "version": "2.0.0" }"#,
            );

        let mut session = session(&adapter).with_sink(Box::new(sink.clone()));
        session.build_dependency_tree("Entry.sol").await.unwrap();

        let duplicates: Vec<_> = sink
            .emitted
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.severity == Severity::Error && d.message.contains("already resolved"))
            .cloned()
            .collect();
        assert_eq!(duplicates.len(), 1);
        // Both versioned files still exist independently in the cache.
        assert!(adapter.file(".deps/npm/pkg@1.0.0/a.sol").is_some());
        assert!(adapter.file(".deps/npm/pkg@2.0.0/a.sol").is_some());
    }

    #[tokio::test]
    async fn blob_and_raw_github_urls_share_one_cache_path() {
        let adapter = MemoryAdapter::new().with_url(
            "https://raw.githubusercontent.com/o/r/v1/p.sol",
            "contract P {}\n",
        );

        let mut session = session(&adapter);
        let via_blob = session
            .resolve_and_save("https://github.com/o/r/blob/v1/p.sol", None)
            .await
            .unwrap();
        let via_raw = session
            .resolve_and_save("https://raw.githubusercontent.com/o/r/v1/p.sol", None)
            .await
            .unwrap();

        assert_eq!(via_blob, via_raw);
        assert!(adapter.file(".deps/github/o/r@v1/p.sol").is_some());
        // The second resolution is served from the warm cache.
        assert_eq!(adapter.fetch_count(), 1);
    }

    #[tokio::test]
    async fn explicit_and_pinned_versions_coexist_in_cache_and_index() {
        let adapter = MemoryAdapter::new()
            .with_file(
                "Entry.sol",
                "import \"@scope/pkg/a.sol\";\nimport \"@scope/pkg@2.0.0/b.sol\";\n",
            )
            .with_url(
                "https://unpkg.com/@scope/pkg@1.2.3/a.sol",
                "contract A {}\n",
            )
            .with_url(
                "https://unpkg.com/@scope/pkg@2.0.0/b.sol",
                "contract B {}\n",
            )
            .with_url(
                "https://unpkg.com/@scope/pkg@1.2.3/package.json",
                r#"{ "name": "@scope/pkg", "version": "1.2.3" }"#,
            )
            .with_url(
                "https://unpkg.com/@scope/pkg@2.0.0/package.json",
                r#"{ "name": "@scope/pkg", "version": "2.0.0" }"#,
            );

        let mut session = session(&adapter).with_project(project_with(
            r#"{ "resolutions": { "@scope/pkg": "1.2.3" } }"#,
        ));
        session.build_dependency_tree("Entry.sol").await.unwrap();

        assert!(adapter.file(".deps/npm/@scope/pkg@1.2.3/a.sol").is_some());
        assert!(adapter.file(".deps/npm/@scope/pkg@2.0.0/b.sol").is_some());
        assert_eq!(
            session.mappings().get("@scope/pkg/a.sol").map(String::as_str),
            Some(".deps/npm/@scope/pkg@1.2.3/a.sol")
        );
        assert_eq!(
            session
                .mappings()
                .get("@scope/pkg@2.0.0/b.sol")
                .map(String::as_str),
            Some(".deps/npm/@scope/pkg@2.0.0/b.sol")
        );

        // The persisted index carries the same per-file mappings.
        let raw_index = adapter.file(".deps/npm/.resolution-index.json").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw_index).unwrap();
        assert_eq!(
            parsed["Entry.sol"]["@scope/pkg/a.sol"],
            ".deps/npm/@scope/pkg@1.2.3/a.sol"
        );
        assert_eq!(
            parsed["Entry.sol"]["@scope/pkg@2.0.0/b.sol"],
            ".deps/npm/@scope/pkg@2.0.0/b.sol"
        );
    }

    #[tokio::test]
    async fn sibling_parents_requiring_different_versions_warn_once() {
        let sink = RecordingSink::default();
        let adapter = MemoryAdapter::new()
            .with_file("Entry.sol", "import \"a/x.sol\";\nimport \"b/y.sol\";\n")
            .with_url(
                "https://unpkg.com/a/package.json",
                r#"{ "name": "a", "version": "1.0.0", "dependencies": { "c": "^1.0.0" } }"#,
            )
            .with_url(
                "https://unpkg.com/b/package.json",
                r#"{ "name": "b", "version": "2.0.0", "dependencies": { "c": "^2.0.0" } }"#,
            )
            .with_url("https://unpkg.com/a@1.0.0/x.sol", "contract X {}\n")
            .with_url("https://unpkg.com/b@2.0.0/y.sol", "contract Y {}\n");

        let mut session = session(&adapter).with_sink(Box::new(sink.clone()));
        session.build_dependency_tree("Entry.sol").await.unwrap();

        let conflicts: Vec<_> = sink
            .messages()
            .into_iter()
            .filter(|m| m.contains("conflicting version requirements for c"))
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].contains("a@1.0.0 requires ^1.0.0"));
        assert!(conflicts[0].contains("b@2.0.0 requires ^2.0.0"));
    }

    #[tokio::test]
    async fn peer_dependency_major_mismatch_is_breaking() {
        let sink = RecordingSink::default();
        let adapter = MemoryAdapter::new()
            .with_file("Entry.sol", "import \"c/z.sol\";\nimport \"d/w.sol\";\n")
            .with_url(
                "https://unpkg.com/c/package.json",
                r#"{ "name": "c", "version": "2.0.0" }"#,
            )
            .with_url(
                "https://unpkg.com/d/package.json",
                r#"{ "name": "d", "version": "1.0.0", "peerDependencies": { "c": "^1.0.0" } }"#,
            )
            .with_url("https://unpkg.com/c@2.0.0/z.sol", "contract Z {}\n")
            .with_url("https://unpkg.com/d@1.0.0/w.sol", "contract W {}\n");

        let mut session = session(&adapter).with_sink(Box::new(sink.clone()));
        session.build_dependency_tree("Entry.sol").await.unwrap();

        let breaking: Vec<_> = sink
            .emitted
            .lock()
            .unwrap()
            .iter()
            .filter(|d| {
                d.severity == Severity::Error && d.message.contains("major version mismatch")
            })
            .cloned()
            .collect();
        assert_eq!(breaking.len(), 1);
        assert!(breaking[0].message.contains("d@1.0.0"));
        assert!(breaking[0].message.contains("c@^1.0.0"));
    }

    #[tokio::test]
    async fn cache_disabled_config_reaches_the_adapter_and_refetches() {
        let adapter = MemoryAdapter::new()
            .with_url("https://unpkg.com/pkg@1.0.0/a.sol", "contract A {}\n")
            .with_url(
                "https://unpkg.com/pkg@1.0.0/package.json",
                r#"{ "name": "pkg", "version": "1.0.0" }"#,
            );
        let config = SoldepConfig {
            cache_enabled: false,
            ..SoldepConfig::default()
        };

        let mut first = Session::new(config.clone(), &adapter);
        first.resolve_and_save("pkg@1.0.0/a.sol", None).await.unwrap();
        assert!(!adapter.cache_enabled());
        let cold = adapter.fetch_count();

        let mut second = Session::new(config, &adapter);
        second.resolve_and_save("pkg@1.0.0/a.sol", None).await.unwrap();

        // The files are already on disk, but the disabled cache goes back to
        // the network for every one of them.
        assert!(adapter.file(".deps/npm/pkg@1.0.0/a.sol").is_some());
        assert!(adapter.fetch_count() > cold);
    }

    #[tokio::test]
    async fn malformed_specifier_is_a_hard_error() {
        let adapter = MemoryAdapter::new();
        let mut session = session(&adapter);
        let err = session.resolve_and_save("pkg/README.md", None).await;
        assert!(matches!(
            err,
            Err(crate::SoldepError::MalformedSpecifier { .. })
        ));
    }

    #[tokio::test]
    async fn fetch_failure_drops_subtree_and_continues() {
        let sink = RecordingSink::default();
        let adapter = MemoryAdapter::new()
            .with_file(
                "Entry.sol",
                "import \"https://gone.test/missing.sol\";\nimport \"./Ok.sol\";\n",
            )
            .with_file("Ok.sol", "contract Ok {}\n");

        let mut session = session(&adapter).with_sink(Box::new(sink.clone()));
        let sources = session.build_dependency_tree("Entry.sol").await.unwrap();

        assert!(sources.contains_key("Ok.sol"));
        assert!(!sources.contains_key("https://gone.test/missing.sol"));
        assert!(
            sink.messages()
                .iter()
                .any(|m| m.contains("skipping https://gone.test/missing.sol"))
        );
    }
}
