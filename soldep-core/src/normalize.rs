//! Pure specifier translations. Every function here is total and
//! deterministic: the same input always yields the same normalized output,
//! which is what makes the on-disk cache paths stable across sessions.

use crate::config::SoldepConfig;

/// A scheme-specific specifier reduced to a cache-relative path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Normalized {
    /// Cache-relative path, e.g. `github/owner/repo@main/src/Lib.sol`.
    pub normalized_path: String,
    /// Concrete URL the content can be fetched from.
    pub fetch_url: String,
}

fn strip_scheme(url: &str) -> Option<&str> {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
}

/// `github.com/<owner>/<repo>/blob/<ref>/<path>` to the raw.githubusercontent
/// equivalent. Returns `None` for anything that is not a GitHub blob URL.
pub fn github_blob_to_raw(url: &str) -> Option<String> {
    let rest = strip_scheme(url)?;
    let rest = rest.strip_prefix("github.com/")?;
    let mut parts = rest.splitn(4, '/');
    let owner = parts.next()?;
    let repo = parts.next()?;
    if parts.next()? != "blob" {
        return None;
    }
    let ref_and_path = parts.next()?;
    Some(format!(
        "https://raw.githubusercontent.com/{}/{}/{}",
        owner, repo, ref_and_path
    ))
}

/// A raw GitHub URL becomes `github/<owner>/<repo>@<ref>/<path>`. A ref of
/// the form `refs/heads/<branch>` collapses to just the branch name.
pub fn normalize_raw_github(url: &str) -> Option<Normalized> {
    let rest = strip_scheme(url)?;
    let rest = rest.strip_prefix("raw.githubusercontent.com/")?;
    let mut parts = rest.split('/');
    let owner = parts.next()?;
    let repo = parts.next()?;
    let mut segments: Vec<&str> = parts.collect();
    if segments.len() < 2 {
        return None;
    }
    let reference = if segments.len() >= 4 && segments[0] == "refs" && segments[1] == "heads" {
        let branch = segments[2];
        segments.drain(..3);
        branch
    } else {
        let reference = segments[0];
        segments.remove(0);
        reference
    };
    if segments.is_empty() {
        return None;
    }
    Some(Normalized {
        normalized_path: format!("github/{}/{}@{}/{}", owner, repo, reference, segments.join("/")),
        fetch_url: url.to_string(),
    })
}

/// Rewrites a CDN npm mirror URL (jsDelivr, unpkg) back into a bare npm path
/// such as `@scope/pkg@1.2.3/src/Lib.sol`, so the CDN variants re-enter the
/// single npm resolution pipeline.
pub fn cdn_to_npm(url: &str) -> Option<String> {
    let rest = strip_scheme(url)?;
    if let Some(path) = rest.strip_prefix("cdn.jsdelivr.net/npm/") {
        return Some(path.trim_start_matches('/').to_string());
    }
    if let Some(path) = rest.strip_prefix("unpkg.com/") {
        return Some(path.trim_start_matches('/').to_string());
    }
    None
}

/// `ipfs://[ipfs/]<hash>/<path>` to the cache-relative `ipfs/<hash>/<path>`.
pub fn normalize_ipfs(specifier: &str, config: &SoldepConfig) -> Option<Normalized> {
    let rest = specifier.strip_prefix("ipfs://")?;
    let rest = rest.strip_prefix("ipfs/").unwrap_or(rest);
    if rest.is_empty() {
        return None;
    }
    Some(Normalized {
        normalized_path: format!("ipfs/{}", rest),
        fetch_url: format!("{}/ipfs/{}", config.ipfs_gateway, rest),
    })
}

/// `bzz://` or `bzz-raw://<hash>/<path>` to the cache-relative
/// `swarm/<hash>/<path>`.
pub fn normalize_swarm(specifier: &str, config: &SoldepConfig) -> Option<Normalized> {
    let rest = specifier
        .strip_prefix("bzz-raw://")
        .or_else(|| specifier.strip_prefix("bzz://"))?;
    if rest.is_empty() {
        return None;
    }
    Some(Normalized {
        normalized_path: format!("swarm/{}", rest),
        fetch_url: format!("{}/bzz-raw:/{}", config.swarm_gateway, rest),
    })
}

/// Cache-relative path for a generic HTTP(S) URL: `http/<host>/<path>`.
pub fn http_cache_path(url: &str) -> Option<String> {
    let rest = strip_scheme(url)?;
    let (host, path) = rest.split_once('/')?;
    if host.is_empty() || path.is_empty() {
        return None;
    }
    Some(format!("http/{}/{}", host, path))
}

/// Maps any specifier to a concrete fetchable URL. HTTP(S) URLs pass through
/// (GitHub blob URLs are rewritten to their raw form first); content-addressed
/// schemes go through the configured gateways; everything else is assumed to
/// be a bare npm path served by the configured CDN.
pub fn to_http_url(specifier: &str, config: &SoldepConfig) -> String {
    if specifier.starts_with("http://") || specifier.starts_with("https://") {
        return github_blob_to_raw(specifier).unwrap_or_else(|| specifier.to_string());
    }
    if let Some(normalized) = normalize_ipfs(specifier, config) {
        return normalized.fetch_url;
    }
    if let Some(normalized) = normalize_swarm(specifier, config) {
        return normalized.fetch_url;
    }
    format!("{}/{}", config.npm_cdn_base, specifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_url_becomes_raw() {
        let raw = github_blob_to_raw(
            "https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v4.9.0/contracts/token/ERC20/ERC20.sol",
        );
        assert_eq!(
            raw.as_deref(),
            Some(
                "https://raw.githubusercontent.com/OpenZeppelin/openzeppelin-contracts/v4.9.0/contracts/token/ERC20/ERC20.sol"
            )
        );
    }

    #[test]
    fn non_blob_urls_are_left_alone() {
        assert!(github_blob_to_raw("https://github.com/o/r/tree/main/a.sol").is_none());
        assert!(github_blob_to_raw("https://example.com/o/r/blob/main/a.sol").is_none());
    }

    #[test]
    fn raw_github_normalizes_to_cache_path() {
        let normalized =
            normalize_raw_github("https://raw.githubusercontent.com/o/r/v1.0.0/src/Lib.sol")
                .unwrap();
        assert_eq!(normalized.normalized_path, "github/o/r@v1.0.0/src/Lib.sol");
    }

    #[test]
    fn refs_heads_collapses_to_branch() {
        let normalized = normalize_raw_github(
            "https://raw.githubusercontent.com/o/r/refs/heads/master/src/Lib.sol",
        )
        .unwrap();
        assert_eq!(normalized.normalized_path, "github/o/r@master/src/Lib.sol");
    }

    #[test]
    fn cdn_urls_become_bare_npm_paths() {
        assert_eq!(
            cdn_to_npm("https://cdn.jsdelivr.net/npm/@openzeppelin/contracts@4.9.0/token.sol")
                .as_deref(),
            Some("@openzeppelin/contracts@4.9.0/token.sol")
        );
        assert_eq!(
            cdn_to_npm("https://unpkg.com/solmate/src/auth/Owned.sol").as_deref(),
            Some("solmate/src/auth/Owned.sol")
        );
        assert!(cdn_to_npm("https://example.com/npm/pkg/a.sol").is_none());
    }

    #[test]
    fn ipfs_with_and_without_marker_segment() {
        let config = SoldepConfig::default();
        let a = normalize_ipfs("ipfs://Qmhash/token.sol", &config).unwrap();
        let b = normalize_ipfs("ipfs://ipfs/Qmhash/token.sol", &config).unwrap();
        assert_eq!(a.normalized_path, "ipfs/Qmhash/token.sol");
        assert_eq!(a.normalized_path, b.normalized_path);
        assert_eq!(a.fetch_url, "https://ipfs.io/ipfs/Qmhash/token.sol");
    }

    #[test]
    fn swarm_schemes_normalize() {
        let config = SoldepConfig::default();
        let a = normalize_swarm("bzz-raw://abcd/token.sol", &config).unwrap();
        let b = normalize_swarm("bzz://abcd/token.sol", &config).unwrap();
        assert_eq!(a.normalized_path, "swarm/abcd/token.sol");
        assert_eq!(a.normalized_path, b.normalized_path);
    }

    #[test]
    fn http_cache_path_splits_host() {
        assert_eq!(
            http_cache_path("https://example.com/contracts/Lib.sol").as_deref(),
            Some("http/example.com/contracts/Lib.sol")
        );
    }

    #[test]
    fn to_http_url_defaults_to_npm_cdn() {
        let config = SoldepConfig::default();
        assert_eq!(
            to_http_url("@scope/pkg@1.0.0/a.sol", &config),
            "https://unpkg.com/@scope/pkg@1.0.0/a.sol"
        );
        assert_eq!(
            to_http_url("https://example.com/a.sol", &config),
            "https://example.com/a.sol"
        );
    }

    #[test]
    fn to_http_url_is_referentially_transparent() {
        let config = SoldepConfig::default();
        let first = to_http_url("ipfs://Qmhash/a.sol", &config);
        let second = to_http_url("ipfs://Qmhash/a.sol", &config);
        assert_eq!(first, second);
    }
}
