//! Session identity and item references.
//!
//! A unique key is a `bilibili://` URI naming one playable item:
//!
//! | Item | Key |
//! |------|-----|
//! | Archive part | `bilibili://archive/<bvid>?cid=<cid>` |
//! | PGC episode | `bilibili://pgc/ep/<ep_id>?cid=<cid>[&sid=<season>][&aid=<avid>]` |
//! | PGC season | `bilibili://pgc/season/<season_id>` |
//! | Live room | `bilibili://live/<room_id>` |

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

const SCHEME: &str = "bilibili";
const HOST_ARCHIVE: &str = "archive";
const HOST_LIVE: &str = "live";
const HOST_PGC: &str = "pgc";
const PATH_PGC_EPISODE: &str = "ep";
const PATH_PGC_SEASON: &str = "season";
const QUERY_CID: &str = "cid";
const QUERY_SEASON_ID: &str = "sid";
const QUERY_AVID: &str = "aid";

/// Identity of one playable item inside one storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub storage_id: i64,
    pub unique_key: String,
}

impl SessionKey {
    pub fn new(storage_id: i64, unique_key: impl Into<String>) -> Self {
        Self {
            storage_id,
            unique_key: unique_key.into(),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.storage_id, self.unique_key)
    }
}

/// What a unique key points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemRef {
    Archive {
        bvid: String,
        cid: Option<u64>,
    },
    PgcEpisode {
        ep_id: u64,
        cid: u64,
        season_id: Option<u64>,
        avid: Option<u64>,
    },
    PgcSeason {
        season_id: u64,
    },
    Live {
        room_id: u64,
    },
}

impl ItemRef {
    /// Parse a unique key. Returns `None` for foreign schemes or malformed keys.
    pub fn parse(unique_key: &str) -> Option<Self> {
        let url = Url::parse(unique_key.trim()).ok()?;
        if !url.scheme().eq_ignore_ascii_case(SCHEME) {
            return None;
        }
        let authority = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        match authority.as_str() {
            HOST_ARCHIVE => {
                let bvid = segments.first()?.trim();
                if bvid.is_empty() {
                    return None;
                }
                Some(Self::Archive {
                    bvid: bvid.to_string(),
                    cid: positive_query(&url, QUERY_CID),
                })
            }
            HOST_LIVE => Some(Self::Live {
                room_id: positive(segments.first()?)?,
            }),
            HOST_PGC => {
                let kind = segments.first()?;
                if kind.eq_ignore_ascii_case(PATH_PGC_EPISODE) {
                    Some(Self::PgcEpisode {
                        ep_id: positive(segments.get(1)?)?,
                        cid: positive_query(&url, QUERY_CID)?,
                        season_id: positive_query(&url, QUERY_SEASON_ID),
                        avid: positive_query(&url, QUERY_AVID),
                    })
                } else if kind.eq_ignore_ascii_case(PATH_PGC_SEASON) {
                    Some(Self::PgcSeason {
                        season_id: positive(segments.get(1)?)?,
                    })
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn archive_directory_key(bvid: &str) -> String {
        format!("{SCHEME}://{HOST_ARCHIVE}/{bvid}")
    }

    pub fn archive_part_key(bvid: &str, cid: u64) -> String {
        format!("{SCHEME}://{HOST_ARCHIVE}/{bvid}?{QUERY_CID}={cid}")
    }

    pub fn live_room_key(room_id: u64) -> String {
        format!("{SCHEME}://{HOST_LIVE}/{room_id}")
    }

    pub fn pgc_season_key(season_id: u64) -> String {
        format!("{SCHEME}://{HOST_PGC}/{PATH_PGC_SEASON}/{season_id}")
    }

    pub fn pgc_episode_key(
        ep_id: u64,
        cid: u64,
        season_id: Option<u64>,
        avid: Option<u64>,
    ) -> String {
        let mut key = format!("{SCHEME}://{HOST_PGC}/{PATH_PGC_EPISODE}/{ep_id}?{QUERY_CID}={cid}");
        if let Some(season_id) = season_id.filter(|v| *v > 0) {
            key.push_str(&format!("&{QUERY_SEASON_ID}={season_id}"));
        }
        if let Some(avid) = avid.filter(|v| *v > 0) {
            key.push_str(&format!("&{QUERY_AVID}={avid}"));
        }
        key
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }
}

fn positive(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|v| *v > 0)
}

fn positive_query(url: &Url, name: &str) -> Option<u64> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .and_then(|(_, value)| positive(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_archive_part() {
        let key = ItemRef::archive_part_key("BV1xx411c7mD", 12345);
        assert_eq!(
            ItemRef::parse(&key),
            Some(ItemRef::Archive {
                bvid: "BV1xx411c7mD".to_string(),
                cid: Some(12345),
            })
        );
    }

    #[test]
    fn archive_without_cid_still_parses() {
        let key = ItemRef::archive_directory_key("BV1xx411c7mD");
        assert_eq!(
            ItemRef::parse(&key),
            Some(ItemRef::Archive {
                bvid: "BV1xx411c7mD".to_string(),
                cid: None,
            })
        );
        assert_eq!(
            ItemRef::parse("bilibili://archive/BV1?cid=0"),
            Some(ItemRef::Archive {
                bvid: "BV1".to_string(),
                cid: None,
            })
        );
    }

    #[test]
    fn parses_pgc_episode_with_optional_ids() {
        let key = ItemRef::pgc_episode_key(100, 200, Some(300), None);
        assert_eq!(key, "bilibili://pgc/ep/100?cid=200&sid=300");
        assert_eq!(
            ItemRef::parse(&key),
            Some(ItemRef::PgcEpisode {
                ep_id: 100,
                cid: 200,
                season_id: Some(300),
                avid: None,
            })
        );
    }

    #[test]
    fn pgc_episode_requires_cid() {
        assert_eq!(ItemRef::parse("bilibili://pgc/ep/100"), None);
    }

    #[test]
    fn parses_live_and_season() {
        assert_eq!(
            ItemRef::parse(&ItemRef::live_room_key(21452505)),
            Some(ItemRef::Live { room_id: 21452505 })
        );
        assert_eq!(
            ItemRef::parse(&ItemRef::pgc_season_key(42)),
            Some(ItemRef::PgcSeason { season_id: 42 })
        );
    }

    #[test]
    fn rejects_foreign_or_malformed_keys() {
        assert_eq!(ItemRef::parse("https://archive/BV1"), None);
        assert_eq!(ItemRef::parse("bilibili://live/abc"), None);
        assert_eq!(ItemRef::parse("bilibili://live/0"), None);
        assert_eq!(ItemRef::parse("bilibili://unknown/1"), None);
        assert_eq!(ItemRef::parse("not a url"), None);
    }

    #[test]
    fn session_key_display() {
        let key = SessionKey::new(7, "bilibili://live/1");
        assert_eq!(key.to_string(), "7:bilibili://live/1");
    }
}
