use thiserror::Error;

use crate::catalog::CatalogError;
use crate::manifest::ManifestError;
use crate::preferences::PreferenceError;

/// Failures surfaced by session operations.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Neither DASH nor direct URLs yielded anything playable.
    #[error("no playable stream")]
    NoPlayableStream,

    #[error("archive key has no cid")]
    MissingCid,

    #[error("unsupported item: {0}")]
    UnsupportedItem(String),

    #[error("invalid unique key: {0}")]
    InvalidKey(String),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("preference store error: {0}")]
    Preferences(#[from] PreferenceError),

    #[error("recovery budget exhausted after {attempts} attempts")]
    RecoveryBudgetExhausted { attempts: u32 },
}

impl PlaybackError {
    /// Whether another `recover` / `prepare` attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlaybackError::Catalog(e) => e.is_retryable(),
            PlaybackError::Manifest(ManifestError::Io(_)) => true,
            PlaybackError::NoPlayableStream
            | PlaybackError::MissingCid
            | PlaybackError::UnsupportedItem(_)
            | PlaybackError::InvalidKey(_)
            | PlaybackError::Manifest(_)
            | PlaybackError::Preferences(_)
            | PlaybackError::RecoveryBudgetExhausted { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(PlaybackError::Catalog(CatalogError::Network("reset".into())).is_retryable());
        assert!(
            !PlaybackError::Catalog(CatalogError::Api {
                code: -404,
                message: "not found".into()
            })
            .is_retryable()
        );
        assert!(PlaybackError::Manifest(ManifestError::Io(std::io::Error::other("disk full"))).is_retryable());
        assert!(!PlaybackError::NoPlayableStream.is_retryable());
        assert!(!PlaybackError::RecoveryBudgetExhausted { attempts: 3 }.is_retryable());
        assert!(
            !PlaybackError::Manifest(ManifestError::InvalidInput("no video".into())).is_retryable()
        );
    }

    #[test]
    fn messages() {
        assert_eq!(
            PlaybackError::RecoveryBudgetExhausted { attempts: 3 }.to_string(),
            "recovery budget exhausted after 3 attempts"
        );
        assert_eq!(PlaybackError::NoPlayableStream.to_string(), "no playable stream");
    }
}
