//! DASH manifest writer boundary.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::descriptor::{DashDescriptor, DashMedia};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to write manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid manifest input: {0}")]
    InvalidInput(String),
}

/// Everything a writer needs to emit one manifest.
#[derive(Debug, Clone)]
pub struct ManifestRequest<'a> {
    pub path: &'a Path,
    pub dash: &'a DashDescriptor,
    pub video: &'a DashMedia,
    /// Selected video first, then player-side fallbacks.
    pub videos: &'a [DashMedia],
    pub audio: Option<&'a DashMedia>,
    /// Selected audio first, then player-side fallbacks.
    pub audios: &'a [DashMedia],
    pub cdn_host_override: Option<&'a str>,
    /// Hosts the writer should leave out of the manifest.
    pub blacklisted_hosts: Vec<String>,
}

#[async_trait]
pub trait ManifestWriter: Send + Sync {
    async fn write(&self, request: ManifestRequest<'_>) -> Result<(), ManifestError>;
}
