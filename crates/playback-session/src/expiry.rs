//! Link expiry estimation from signed-URL query parameters.
//!
//! CDN links carry their expiry in one of a small family of query parameters,
//! checked in priority order: `deadline`, then the legacy `expires` and
//! `expire`. Values above [`MS_THRESHOLD`] are already milliseconds; smaller
//! values are seconds.

use url::Url;

use crate::descriptor::DashMedia;

/// Expiry parameter names in priority order.
pub const EXPIRY_PARAMS: [&str; 3] = ["deadline", "expires", "expire"];

/// Values above this are epoch milliseconds, at or below are epoch seconds.
pub const MS_THRESHOLD: i64 = 10_000_000_000;

/// Parse the absolute expiry (epoch ms) encoded in `url`.
///
/// Returns `None` when no known parameter is present, the value is not an
/// integer, or it is not positive.
pub fn parse_expiry_ms(url: &str) -> Option<i64> {
    let parsed = Url::parse(url.trim()).ok()?;

    let raw = EXPIRY_PARAMS.iter().find_map(|name| {
        parsed
            .query_pairs()
            .find(|(key, _)| key == *name)
            .map(|(_, value)| value.into_owned())
    })?;

    let value = raw.trim().parse::<i64>().ok()?;
    if value <= 0 {
        return None;
    }

    if value > MS_THRESHOLD {
        Some(value)
    } else {
        value.checked_mul(1000)
    }
}

/// Earliest expiry across every URL of the given representations.
///
/// URLs without a parseable expiry are skipped rather than treated as never
/// or already expired.
pub fn earliest_expiry_ms<'a>(media: impl IntoIterator<Item = &'a DashMedia>) -> Option<i64> {
    media
        .into_iter()
        .flat_map(DashMedia::urls)
        .filter_map(parse_expiry_ms)
        .min()
}

/// True if `expires_at_ms` falls within `margin_ms` of `now_ms` (or earlier).
pub fn expires_within(expires_at_ms: Option<i64>, now_ms: i64, margin_ms: i64) -> bool {
    match expires_at_ms {
        Some(expires_at) => now_ms >= expires_at.saturating_sub(margin_ms),
        None => false,
    }
}
