use std::fmt;

/// URL the player was fetching when playback failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailingUrl {
    #[default]
    Unknown,
    Known(String),
}

impl FailingUrl {
    /// Blank or missing URLs collapse to `Unknown`.
    pub fn from_option(url: Option<&str>) -> Self {
        match url.map(str::trim) {
            Some(url) if !url.is_empty() => Self::Known(url.to_string()),
            _ => Self::Unknown,
        }
    }

    pub fn as_known(&self) -> Option<&str> {
        match self {
            Self::Known(url) => Some(url),
            Self::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// HTTP status of the failed request, if the player saw one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HttpStatus {
    #[default]
    Unknown,
    Code(u16),
}

impl HttpStatus {
    /// 403, 404 and 410 mean the signed link is dead and must be re-fetched.
    pub fn is_link_gone(self) -> bool {
        matches!(self, Self::Code(403 | 404 | 410))
    }

    pub fn code(self) -> Option<u16> {
        match self {
            Self::Code(code) => Some(code),
            Self::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureKind {
    /// Fetching or demuxing failed.
    #[default]
    Source,
    /// The decoder rejected the stream.
    Decoder,
}

/// What the player reports back when playback fails. Any part may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureContext {
    pub failing_url: FailingUrl,
    pub http_status: HttpStatus,
    pub kind: FailureKind,
}

impl FailureContext {
    /// Failure with nothing known about it.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn decoder() -> Self {
        Self {
            kind: FailureKind::Decoder,
            ..Self::default()
        }
    }

    /// Build from the loosely typed values a player hands over.
    pub fn from_parts(failing_url: Option<&str>, http_status: Option<u16>, is_decoder_error: bool) -> Self {
        Self {
            failing_url: FailingUrl::from_option(failing_url),
            http_status: http_status.map_or(HttpStatus::Unknown, HttpStatus::Code),
            kind: if is_decoder_error {
                FailureKind::Decoder
            } else {
                FailureKind::Source
            },
        }
    }

    pub fn with_url(mut self, url: impl AsRef<str>) -> Self {
        self.failing_url = FailingUrl::from_option(Some(url.as_ref()));
        self
    }

    pub fn with_status(mut self, code: u16) -> Self {
        self.http_status = HttpStatus::Code(code);
        self
    }

    pub fn is_decoder_error(&self) -> bool {
        self.kind == FailureKind::Decoder
    }

    /// Decide whether recovery must re-fetch the descriptor.
    ///
    /// Checked in order: a dead-link status, a selection about to expire, and
    /// an unattributed error while a DASH descriptor is active.
    pub fn refresh_reason(&self, expiring_soon: bool, dash_active: bool) -> Option<RefreshReason> {
        if let HttpStatus::Code(code) = self.http_status
            && self.http_status.is_link_gone()
        {
            return Some(RefreshReason::LinkGone(code));
        }
        if expiring_soon {
            return Some(RefreshReason::ExpiringSoon);
        }
        if self.failing_url.is_unknown() && dash_active {
            return Some(RefreshReason::UnattributedDashError);
        }
        None
    }
}

/// Why a recovery attempt re-fetched the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    LinkGone(u16),
    ExpiringSoon,
    /// Error without a URL while DASH was active; treated as descriptor-level.
    UnattributedDashError,
    /// Direct rotation found no usable candidate.
    RotationExhausted,
}

impl fmt::Display for RefreshReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkGone(code) => write!(f, "link gone (HTTP {code})"),
            Self::ExpiringSoon => f.write_str("link expiring soon"),
            Self::UnattributedDashError => f.write_str("unattributed DASH error"),
            Self::RotationExhausted => f.write_str("direct rotation exhausted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_url_is_unknown() {
        assert!(FailureContext::from_parts(Some("  "), None, false).failing_url.is_unknown());
        assert_eq!(
            FailureContext::unknown().with_url(" https://a/v ").failing_url,
            FailingUrl::Known("https://a/v".into())
        );
    }

    #[test]
    fn dead_link_codes() {
        for code in [403, 404, 410] {
            assert!(HttpStatus::Code(code).is_link_gone());
        }
        for code in [200, 416, 500, 502] {
            assert!(!HttpStatus::Code(code).is_link_gone());
        }
        assert!(!HttpStatus::Unknown.is_link_gone());
    }

    #[test]
    fn refresh_decision_table() {
        let known = FailureContext::unknown().with_url("https://a/v");

        assert_eq!(
            known.clone().with_status(403).refresh_reason(false, false),
            Some(RefreshReason::LinkGone(403))
        );
        assert_eq!(known.refresh_reason(true, false), Some(RefreshReason::ExpiringSoon));
        assert_eq!(known.refresh_reason(false, true), None);
        assert_eq!(known.clone().with_status(500).refresh_reason(false, false), None);

        let unattributed = FailureContext::unknown();
        assert_eq!(
            unattributed.refresh_reason(false, true),
            Some(RefreshReason::UnattributedDashError)
        );
        assert_eq!(unattributed.refresh_reason(false, false), None);
    }

    #[test]
    fn status_takes_precedence_over_expiry() {
        let failure = FailureContext::from_parts(None, Some(410), false);
        assert_eq!(failure.refresh_reason(true, true), Some(RefreshReason::LinkGone(410)));
        assert_eq!(failure.http_status.code(), Some(410));
    }
}
