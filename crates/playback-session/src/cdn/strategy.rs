//! Ordering of direct-URL candidates and optional host rewriting.

use url::Url;

use super::dedup_urls;

/// Penalty for plain-http links.
const SCORE_HTTP: u32 = 10;
/// Penalty for `-302` redirector hosts.
const SCORE_REDIRECTOR: u32 = 100;
/// Penalty for PCDN (`mcdn`) hosts, which are the least reliable.
const SCORE_MCDN: u32 = 200;

/// Target of a CDN host override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOverride {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl HostOverride {
    /// Parse `scheme://host[:port]` or a bare host (https assumed).
    pub fn parse(raw: &str) -> Option<Self> {
        let input = raw.trim();
        if input.is_empty() {
            return None;
        }

        let normalized = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{input}")
        };

        let url = Url::parse(&normalized).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        let host = url.host_str()?.to_ascii_lowercase();
        Some(Self {
            scheme: url.scheme().to_string(),
            host,
            port: url.port(),
        })
    }

    /// Rewrite scheme and host of `url`, and its port if the override names
    /// one. Returns `None` if `url` is not an http(s) URL.
    pub fn rewrite(&self, url: &str) -> Option<String> {
        let mut parsed = Url::parse(url).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        parsed.set_scheme(&self.scheme).ok()?;
        parsed.set_host(Some(&self.host)).ok()?;
        if let Some(port) = self.port {
            parsed.set_port(Some(port)).ok()?;
        }
        Some(parsed.to_string())
    }
}

/// Merge a primary URL and its backups into an ordered candidate list.
///
/// Blank entries are dropped and duplicates removed. Candidates are stably
/// ranked so that https, non-redirector, non-PCDN hosts come first. When
/// `host_override` parses, rewritten URLs are listed first and the unrewritten ones
/// follow as fallbacks.
pub fn resolve_urls(base_url: &str, backup_urls: &[String], host_override: Option<&str>) -> Vec<String> {
    let candidates = dedup_urls(
        std::iter::once(base_url).chain(backup_urls.iter().map(String::as_str)),
    );
    if candidates.is_empty() {
        return candidates;
    }

    let mut ranked: Vec<(u32, String)> = candidates
        .into_iter()
        .map(|url| (score(&url), url))
        .collect();
    // sort_by_key is stable, so equal scores keep their input order
    ranked.sort_by_key(|(score, _)| *score);
    let ranked: Vec<String> = ranked.into_iter().map(|(_, url)| url).collect();

    let Some(host_override) = host_override.and_then(HostOverride::parse) else {
        return ranked;
    };

    let rewritten: Vec<String> = ranked
        .iter()
        .filter_map(|url| host_override.rewrite(url))
        .collect();

    dedup_urls(
        rewritten
            .iter()
            .map(String::as_str)
            .chain(ranked.iter().map(String::as_str)),
    )
}

fn score(url: &str) -> u32 {
    let Ok(parsed) = Url::parse(url) else {
        return u32::MAX;
    };

    let mut score = 0;
    if parsed.scheme().eq_ignore_ascii_case("http") {
        score += SCORE_HTTP;
    }

    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    if host.contains("-302") {
        score += SCORE_REDIRECTOR;
    }

    let is_mcdn_query = parsed
        .query_pairs()
        .any(|(key, value)| key == "os" && value.eq_ignore_ascii_case("mcdn"));
    if is_mcdn_query || host.contains("mcdn.") {
        score += SCORE_MCDN;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn flattens_and_dedups_in_order() {
        let urls = resolve_urls(
            "https://a.example.com/v.mp4",
            &s(&["https://b.example.com/v.mp4", "", "https://a.example.com/v.mp4"]),
            None,
        );
        assert_eq!(
            urls,
            s(&["https://a.example.com/v.mp4", "https://b.example.com/v.mp4"])
        );
    }

    #[test]
    fn ranks_unreliable_hosts_last() {
        let urls = resolve_urls(
            "https://xy1x2x3x4xy.mcdn.bilivideo.cn:4483/v.mp4",
            &s(&[
                "http://plain.example.com/v.mp4",
                "https://upos-sz-302.example.com/v.mp4",
                "https://good.example.com/v.mp4?os=cos",
                "https://pcdn.example.com/v.mp4?os=mcdn",
            ]),
            None,
        );
        assert_eq!(
            urls,
            s(&[
                "https://good.example.com/v.mp4?os=cos",
                "http://plain.example.com/v.mp4",
                "https://upos-sz-302.example.com/v.mp4",
                "https://xy1x2x3x4xy.mcdn.bilivideo.cn:4483/v.mp4",
                "https://pcdn.example.com/v.mp4?os=mcdn",
            ])
        );
    }

    #[test]
    fn override_puts_rewritten_first_and_keeps_source_urls() {
        let urls = resolve_urls(
            "https://a.example.com/v.mp4?deadline=1",
            &s(&["https://b.example.com/v.mp4?deadline=1"]),
            Some("upos-sz-mirrorali.bilivideo.com"),
        );
        assert_eq!(
            urls,
            s(&[
                "https://upos-sz-mirrorali.bilivideo.com/v.mp4?deadline=1",
                "https://a.example.com/v.mp4?deadline=1",
                "https://b.example.com/v.mp4?deadline=1",
            ])
        );
    }

    #[test]
    fn override_with_scheme_and_port() {
        let o = HostOverride::parse("http://proxy.local:8080").unwrap();
        assert_eq!(o.scheme, "http");
        assert_eq!(o.port, Some(8080));
        assert_eq!(
            o.rewrite("https://a.example.com:4483/x?y=1").as_deref(),
            Some("http://proxy.local:8080/x?y=1")
        );
    }

    #[test]
    fn override_without_port_keeps_source_port() {
        let o = HostOverride::parse("upos-sz-mirrorali.bilivideo.com").unwrap();
        assert_eq!(
            o.rewrite("https://xy1x2x3x4xy.mcdn.bilivideo.cn:4483/v.mp4?os=mcdn").as_deref(),
            Some("https://upos-sz-mirrorali.bilivideo.com:4483/v.mp4?os=mcdn")
        );
        assert_eq!(
            o.rewrite("https://a.example.com/v.mp4").as_deref(),
            Some("https://upos-sz-mirrorali.bilivideo.com/v.mp4")
        );
    }

    #[test]
    fn blank_or_invalid_override_is_ignored() {
        assert_eq!(HostOverride::parse("  "), None);
        assert_eq!(HostOverride::parse("ftp://files.example.com"), None);
        let urls = resolve_urls("https://a.example.com/v", &[], Some(" "));
        assert_eq!(urls, s(&["https://a.example.com/v"]));
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(resolve_urls("", &s(&["  "]), Some("x.example.com")).is_empty());
    }
}
