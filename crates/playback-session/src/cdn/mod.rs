//! CDN host health and candidate ordering.

mod health;
mod strategy;

pub use health::CdnHealthTracker;
pub use strategy::{HostOverride, resolve_urls};

use std::collections::HashSet;

use url::Url;

/// Extracts the lowercase host from an absolute URL.
///
/// Returns `None` when the URL cannot be parsed or has no host.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Trim, drop blanks and deduplicate while keeping first-seen order.
pub(crate) fn dedup_urls<'a>(urls: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .filter(|url| seen.insert(url.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_host_without_port() {
        assert_eq!(
            host_of("https://cn-gdfs-ct-01-01.bilivideo.com:8082/upgcxcode/x.m4s?e=1"),
            Some("cn-gdfs-ct-01-01.bilivideo.com".to_string())
        );
    }

    #[test]
    fn lowercases_host() {
        assert_eq!(
            host_of("http://UPOS-SZ-MirrorCos.BiliVideo.com/x"),
            Some("upos-sz-mirrorcos.bilivideo.com".to_string())
        );
    }

    #[test]
    fn rejects_relative_or_garbage() {
        assert_eq!(host_of("/relative/path"), None);
        assert_eq!(host_of(""), None);
        assert_eq!(host_of("mailto:someone@example.com"), None);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let urls = dedup_urls(["https://a/1", " https://b/1 ", "", "https://a/1"]);
        assert_eq!(urls, vec!["https://a/1", "https://b/1"]);
    }
}
