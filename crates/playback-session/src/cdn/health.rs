//! Per-session blacklist of CDN hosts that recently failed.
//!
//! Entries expire after a fixed TTL. Expired entries are dropped lazily on
//! lookup and by [`CdnHealthTracker::cleanup`]; there is no background timer.
//! The tracker is safe to share across threads so an out-of-band refresh
//! callback can blacklist a host without holding the session lock.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::host_of;
use crate::clock::Clock;

pub struct CdnHealthTracker {
    /// host -> expiry (epoch ms)
    entries: DashMap<String, i64>,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl CdnHealthTracker {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
        }
    }

    /// Blacklist the host of `url`.
    ///
    /// Returns `true` if the host was newly blacklisted, `false` if it was
    /// already blacklisted (its expiry is extended) or the URL has no host.
    pub fn blacklist(&self, url: &str) -> bool {
        match host_of(url) {
            Some(host) => self.blacklist_host(&host),
            None => false,
        }
    }

    /// Blacklist a host directly. Same return contract as [`Self::blacklist`].
    pub fn blacklist_host(&self, host: &str) -> bool {
        let host = host.trim().to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }

        let now = self.clock.now_ms();
        let expires_at = now.saturating_add(self.ttl_ms);
        match self.entries.entry(host) {
            Entry::Occupied(mut entry) => {
                let was_live = *entry.get() > now;
                entry.insert(expires_at);
                debug!(host = %entry.key(), was_live, "CDN host blacklist extended");
                !was_live
            }
            Entry::Vacant(entry) => {
                debug!(host = %entry.key(), "CDN host blacklisted");
                entry.insert(expires_at);
                true
            }
        }
    }

    /// Check whether `host` is currently blacklisted.
    pub fn is_blacklisted(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let now = self.clock.now_ms();

        let expires_at = match self.entries.get(&host) {
            Some(entry) => *entry,
            None => return false,
        };

        if expires_at <= now {
            self.entries.remove_if(&host, |_, exp| *exp <= now);
            return false;
        }
        true
    }

    /// Drop all expired entries. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        if self.entries.is_empty() {
            return 0;
        }

        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Expired CDN blacklist entries dropped");
        }
        removed
    }

    /// Hosts that are blacklisted right now.
    pub fn hosts(&self) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut hosts: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| *entry.value() > now)
            .map(|entry| entry.key().clone())
            .collect();
        hosts.sort();
        hosts
    }

    /// Expiry of a host's entry, if any (expired or not).
    pub fn expires_at_ms(&self, host: &str) -> Option<i64> {
        self.entries
            .get(&host.to_ascii_lowercase())
            .map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for CdnHealthTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdnHealthTracker")
            .field("entries", &self.entries.len())
            .field("ttl_ms", &self.ttl_ms)
            .finish()
    }
}
